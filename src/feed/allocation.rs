use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SlurpError;

/// An allocation as the registry wants it to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    pub allocation_id: String,
    pub project_id: String,
    /// Explicit parent account; `None` means derive it from the project id
    pub parent: Option<String>,
    pub collaborators: BTreeSet<String>,
    pub amount: u64,
    /// QoS labels on top of the cluster default set, in registry order
    pub qos_addenda: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub deactivated: bool,
}

impl AllocationRecord {
    pub fn new(project_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let project_id = project_id.into();
        Self {
            allocation_id: project_id.clone(),
            project_id,
            parent: None,
            collaborators: BTreeSet::new(),
            amount: 0,
            qos_addenda: Vec::new(),
            start_date,
            end_date,
            deactivated: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_collaborators<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborators = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_qos_addenda<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qos_addenda = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.deactivated = true;
        self
    }

    /// Whether the allocation may run work on `today`. The window is inclusive.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        !self.deactivated && self.start_date <= today && today <= self.end_date
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireScalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl WireScalar {
    fn label(&self) -> String {
        match self {
            WireScalar::Integer(n) => n.to_string(),
            WireScalar::Float(f) => f.to_string(),
            WireScalar::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireCollaborators {
    List(Vec<String>),
    /// List literal encoded as a string, e.g. `"[u'alice', u'bob']"`
    Encoded(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireProject {
    pub project_id: String,
    #[serde(default)]
    pub parent_account: Option<String>,
    #[serde(default)]
    pub collaborators: Option<WireCollaborators>,
    #[serde(default)]
    pub qos_addenda: Option<String>,
    /// `null` counts as not deactivated
    #[serde(default)]
    pub deactivated: Option<bool>,
}

/// One element of the registry's allocation array.
#[derive(Debug, Clone, Deserialize)]
pub struct WireAllocation {
    #[serde(default)]
    pub allocation_id: Option<WireScalar>,
    pub project: WireProject,
    #[serde(default)]
    pub parent: Option<String>,
    pub amount: WireScalar,
    pub start_date: String,
    pub end_date: String,
}

/// Parse a string-encoded list literal of user names.
///
/// Accepts single or double quotes, an optional `u` prefix on each item and
/// an empty string for "no collaborators".
pub fn parse_list_literal(encoded: &str) -> Result<Vec<String>, String> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("collaborators {:?} is not a list", encoded))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let Some(mut c) = chars.next() else {
            break;
        };
        if c == 'u' || c == 'U' {
            c = chars
                .next()
                .ok_or_else(|| format!("dangling prefix in {:?}", encoded))?;
        }
        if c != '\'' && c != '"' {
            return Err(format!("unexpected {:?} in collaborators {:?}", c, encoded));
        }
        let quote = c;
        let mut item = String::new();
        let mut closed = false;
        while let Some(next) = chars.next() {
            match next {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        item.push(escaped);
                    }
                }
                n if n == quote => {
                    closed = true;
                    break;
                }
                n => item.push(n),
            }
        }
        if !closed {
            return Err(format!("unterminated string in collaborators {:?}", encoded));
        }
        items.push(item);
    }
    Ok(items)
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| format!("invalid date {:?}", value))
}

fn parse_amount(value: &WireScalar) -> Result<u64, String> {
    let number = match value {
        WireScalar::Integer(n) => {
            return u64::try_from(*n).map_err(|_| format!("invalid amount {}", n));
        }
        WireScalar::Float(f) => *f,
        WireScalar::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid amount {:?}", s))?,
    };
    // u64::MAX as f64 rounds up to 2^64, which is already out of range
    if !number.is_finite() || number < 0.0 || number.round() >= u64::MAX as f64 {
        return Err(format!("invalid amount {}", value.label()));
    }
    Ok(number.round() as u64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl TryFrom<WireAllocation> for AllocationRecord {
    type Error = SlurpError;

    fn try_from(wire: WireAllocation) -> Result<Self, Self::Error> {
        let project_id = wire.project.project_id.trim().to_string();
        let allocation_id = wire
            .allocation_id
            .as_ref()
            .map(WireScalar::label)
            .unwrap_or_else(|| project_id.clone());
        let malformed = |reason: String| SlurpError::MalformedAllocation {
            allocation: allocation_id.clone(),
            reason,
        };

        if project_id.is_empty() {
            return Err(malformed("empty project id".into()));
        }

        let start_date = parse_date(&wire.start_date).map_err(&malformed)?;
        let end_date = parse_date(&wire.end_date).map_err(&malformed)?;
        if start_date > end_date {
            return Err(malformed(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }

        let amount = parse_amount(&wire.amount).map_err(&malformed)?;

        let collaborators = match wire.project.collaborators {
            None => Vec::new(),
            Some(WireCollaborators::List(users)) => users,
            Some(WireCollaborators::Encoded(encoded)) => {
                parse_list_literal(&encoded).map_err(&malformed)?
            }
        };

        let mut qos_addenda: Vec<String> = Vec::new();
        for label in wire
            .project
            .qos_addenda
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            if !qos_addenda.iter().any(|l| l == label) {
                qos_addenda.push(label.to_string());
            }
        }

        Ok(AllocationRecord {
            allocation_id: allocation_id.clone(),
            parent: non_empty(wire.project.parent_account).or_else(|| non_empty(wire.parent)),
            project_id,
            collaborators: collaborators
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            amount,
            qos_addenda,
            start_date,
            end_date,
            deactivated: wire.project.deactivated.unwrap_or(false),
        })
    }
}
