//! Parser for `sacctmgr show associations --parsable2 --noheader` output.
//!
//! Grammar, one row per line:
//!
//! ```text
//! row     := account '|' user '|' maxjobs '|' qos '|' amount
//! maxjobs := '' | '-1' | digits
//! qos     := '' | label (',' label)*
//! amount  := '' | digits
//! ```
//!
//! A row with an empty `user` is an account row and creates the record. A
//! row with a user is a member row and attaches that user to an account
//! seen earlier. What happens to member rows that arrive before their
//! account row is governed by [`RowPolicy`].
//!
//! An account named by a row that breaks the grammar is unreadable: its
//! record, if any, cannot be trusted, so it is listed in
//! [`ParsedAssociations::unreadable`] and left to the caller.

use std::collections::{BTreeSet, HashMap};

use crate::accounting::record::{AccountRecord, AccountState, MaxJobs};
use crate::config::RowPolicy;
use crate::error::SlurpError;

const FIELD_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Row {
    Account {
        account: String,
        max_jobs: MaxJobs,
        qos: Vec<String>,
        amount: Option<u64>,
    },
    Member {
        account: String,
        user: String,
    },
}

/// Result of parsing a full association listing.
#[derive(Debug, Default)]
pub struct ParsedAssociations {
    pub accounts: AccountState,
    /// One [`SlurpError::MalformedRow`] per rejected line, in line order
    pub rejected: Vec<SlurpError>,
    /// Accounts named by a rejected row; their state is unknown
    pub unreadable: BTreeSet<String>,
}

/// Split a comma-separated QoS field into labels, keeping first occurrence order.
pub fn split_qos(field: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in field.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

fn parse_row(line: &str) -> Result<Row, String> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            fields.len()
        ));
    }

    let account = fields[0].trim();
    if account.is_empty() {
        return Err("empty account field".to_string());
    }
    let user = fields[1].trim();
    if !user.is_empty() {
        return Ok(Row::Member {
            account: account.to_string(),
            user: user.to_string(),
        });
    }

    let max_jobs = MaxJobs::parse(fields[2])?;
    let amount = match fields[4].trim() {
        "" => None,
        value => Some(
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid amount {:?}", value))?,
        ),
    };

    Ok(Row::Account {
        account: account.to_string(),
        max_jobs,
        qos: split_qos(fields[3]),
        amount,
    })
}

/// Parse association rows into account records.
pub fn parse_associations(output: &str, policy: RowPolicy) -> ParsedAssociations {
    let mut parsed = ParsedAssociations::default();
    // account -> (line, user) for member rows waiting on their account row
    let mut pending: HashMap<String, Vec<(usize, String)>> = HashMap::new();

    for (index, raw) in output.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line) {
            Ok(Row::Account {
                account,
                max_jobs,
                qos,
                amount,
            }) => {
                let record = parsed
                    .accounts
                    .entry(account.clone())
                    .or_insert_with(|| AccountRecord::new(account.clone()));
                record.max_jobs = max_jobs;
                record.qos = qos;
                record.amount = amount;
                if let Some(waiting) = pending.remove(&account) {
                    record.members.extend(waiting.into_iter().map(|(_, user)| user));
                }
            }
            Ok(Row::Member { account, user }) => match parsed.accounts.get_mut(&account) {
                Some(record) => {
                    record.members.insert(user);
                }
                None if parsed.unreadable.contains(&account) => {
                    tracing::debug!(line = line_no, account = %account, user = %user, "Dropping member row of unreadable account");
                }
                None => match policy {
                    RowPolicy::Legacy => {
                        tracing::debug!(line = line_no, account = %account, user = %user, "Dropping orphan member row");
                    }
                    RowPolicy::Strict => parsed.rejected.push(SlurpError::MalformedRow {
                        line: line_no,
                        reason: format!(
                            "member row for {} precedes any account row for {}",
                            user, account
                        ),
                    }),
                    RowPolicy::Reorder => {
                        pending.entry(account).or_default().push((line_no, user));
                    }
                },
            },
            Err(reason) => {
                if let Some(account) = line.split('|').next().map(str::trim) {
                    if !account.is_empty() {
                        parsed.unreadable.insert(account.to_string());
                    }
                }
                parsed.rejected.push(SlurpError::MalformedRow {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    let mut orphans: Vec<(usize, String, String)> = pending
        .into_iter()
        .filter(|(account, _)| !parsed.unreadable.contains(account))
        .flat_map(|(account, rows)| {
            rows.into_iter()
                .map(move |(line, user)| (line, account.clone(), user))
        })
        .collect();
    orphans.sort();
    parsed.rejected.extend(
        orphans
            .into_iter()
            .map(|(line, account, user)| SlurpError::MalformedRow {
                line,
                reason: format!("member row for {} has no account row for {}", user, account),
            }),
    );
    parsed.rejected.sort_by_key(|e| match e {
        SlurpError::MalformedRow { line, .. } => *line,
        _ => 0,
    });

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
ucb1||||1000
ucb1|alice|||
ucb1|bob|||
ucb2||0|normal,long,debug,special1|500
ucb2|carol|||
";

    #[test]
    fn parses_account_and_member_rows() {
        let parsed = parse_associations(LISTING, RowPolicy::Strict);
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.accounts.len(), 2);

        let ucb1 = &parsed.accounts["ucb1"];
        assert_eq!(ucb1.max_jobs, MaxJobs::Unlimited);
        assert_eq!(ucb1.amount, Some(1000));
        assert!(ucb1.qos.is_empty());
        assert_eq!(ucb1.members.len(), 2);

        let ucb2 = &parsed.accounts["ucb2"];
        assert!(ucb2.max_jobs.is_disabled());
        assert_eq!(ucb2.qos, vec!["normal", "long", "debug", "special1"]);
        assert!(ucb2.members.contains("carol"));
    }

    #[test]
    fn wrong_field_count_is_attributed_to_line() {
        let parsed = parse_associations("ucb1||||1000\nucb1|alice\n", RowPolicy::Strict);
        assert_eq!(parsed.rejected.len(), 1);
        assert!(matches!(
            parsed.rejected[0],
            SlurpError::MalformedRow { line: 2, .. }
        ));
        assert!(parsed.accounts["ucb1"].members.is_empty());
        assert!(parsed.unreadable.contains("ucb1"));
    }

    #[test]
    fn bad_numbers_reject_the_account_row() {
        let parsed = parse_associations("ucb1||x||\nucb2|||normal|ten\n", RowPolicy::Strict);
        assert_eq!(parsed.rejected.len(), 2);
        assert!(parsed.accounts.is_empty());
    }

    #[test]
    fn rejected_account_row_marks_account_unreadable() {
        let parsed = parse_associations(
            "ucb1||x|normal,long,debug|100\nucb1|alice|||\nucb2||||5\n",
            RowPolicy::Strict,
        );
        assert_eq!(parsed.rejected.len(), 1);
        assert!(matches!(
            parsed.rejected[0],
            SlurpError::MalformedRow { line: 1, .. }
        ));
        assert!(parsed.unreadable.contains("ucb1"));
        assert!(!parsed.accounts.contains_key("ucb1"));
        assert!(parsed.accounts.contains_key("ucb2"));
    }

    #[test]
    fn reorder_does_not_report_members_of_unreadable_accounts() {
        let parsed = parse_associations("ucb1|alice|||\nucb1|||normal|lots\n", RowPolicy::Reorder);
        assert_eq!(parsed.rejected.len(), 1);
        assert!(parsed.unreadable.contains("ucb1"));
    }

    #[test]
    fn split_qos_dedups_and_trims() {
        assert_eq!(split_qos("normal, long,,normal"), vec!["normal", "long"]);
        assert!(split_qos("").is_empty());
    }
}
