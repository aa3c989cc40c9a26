use crate::config::DEFAULT_ERROR_THRESHOLD;
use crate::error::{Result, SlurpError};

/// Counts recoverable failures for one run and trips once more than
/// `threshold` of them have been recorded.
///
/// The budget is owned by the run and passed where failures are recorded.
/// Tripping is reported as [`SlurpError::ErrorBudgetExhausted`] from
/// [`record`](Self::record); the caller decides to stop.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    threshold: usize,
    messages: Vec<String>,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}

impl ErrorBudget {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            messages: Vec::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Messages of every recorded failure, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_exhausted(&self) -> bool {
        self.count() > self.threshold
    }

    /// Record one failure.
    ///
    /// # Errors
    ///
    /// Returns [`SlurpError::ErrorBudgetExhausted`] once the count exceeds
    /// the threshold, and on every call after that.
    pub fn record(&mut self, error: &SlurpError) -> Result<()> {
        self.messages.push(error.to_string());
        tracing::error!(
            count = self.count(),
            threshold = self.threshold,
            error = %error,
            "Failure recorded"
        );

        if self.is_exhausted() {
            tracing::error!(
                count = self.count(),
                threshold = self.threshold,
                "Too many failures encountered, aborting run"
            );
            return Err(SlurpError::ErrorBudgetExhausted {
                count: self.count(),
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(n: usize) -> SlurpError {
        SlurpError::MalformedRow {
            line: n,
            reason: "bad".into(),
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut budget = ErrorBudget::new(3);
        for n in 0..3 {
            assert!(budget.record(&failure(n)).is_ok());
        }
        assert!(!budget.is_exhausted());
        assert!(matches!(
            budget.record(&failure(3)),
            Err(SlurpError::ErrorBudgetExhausted {
                count: 4,
                threshold: 3
            })
        ));
        assert!(budget.is_exhausted());
    }

    #[test]
    fn zero_threshold_trips_on_first_failure() {
        let mut budget = ErrorBudget::new(0);
        assert!(budget.record(&failure(1)).is_err());
    }

    #[test]
    fn default_threshold_is_ten() {
        let budget = ErrorBudget::default();
        assert_eq!(budget.threshold(), 10);
        assert_eq!(budget.count(), 0);
    }

    #[test]
    fn keeps_messages() {
        let mut budget = ErrorBudget::new(5);
        budget.record(&failure(7)).unwrap();
        assert_eq!(budget.messages().len(), 1);
        assert!(budget.messages()[0].contains("row 7"));
    }
}
