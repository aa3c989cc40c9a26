//! Accounting state reader: the query it issues, row policies and the way
//! failed queries surface.


use std::sync::Arc;

use slurp::accounting::{AccountingReader, MaxJobs};
use slurp::backend::scripted::ScriptedResponse;
use slurp::backend::{CommandOutput, ScriptedBackend};
use slurp::config::RowPolicy;
use slurp::error::SlurpError;
use test_harness::{cluster, converged_account, listing};

const OUT_OF_ORDER: &str = "\
ucb1|alice|||
ucb1||||100
ucb1|bob|||
ucb2|carol|||
";

fn reader(backend: &Arc<ScriptedBackend>, policy: RowPolicy) -> AccountingReader {
    AccountingReader::new(backend.clone(), cluster()).with_row_policy(policy)
}

#[tokio::test]
async fn test_issues_single_association_query() {
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::ok("")]));
    let parsed = reader(&backend, RowPolicy::Strict).read().await.unwrap();

    assert!(parsed.accounts.is_empty());
    assert_eq!(
        backend.call_lines(),
        vec!["show associations format=account,user,maxjobs,qos,grpcpumins cluster=summit --noheader --parsable2"]
    );
}

#[tokio::test]
async fn test_reads_back_rendered_listing() {
    let records = vec![
        converged_account("ucb1", &["alice", "bob"], 100),
        converged_account("csu2", &[], 7).with_max_jobs(MaxJobs::Limited(0)),
    ];
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::ok(
        listing(&records),
    )]));

    let parsed = reader(&backend, RowPolicy::Strict).read().await.unwrap();
    assert!(parsed.rejected.is_empty());
    assert_eq!(parsed.accounts.len(), 2);
    assert_eq!(parsed.accounts["ucb1"], records[0]);
    assert_eq!(parsed.accounts["csu2"], records[1]);
}

#[tokio::test]
async fn test_strict_policy_rejects_orphan_member_rows() {
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::ok(
        OUT_OF_ORDER,
    )]));
    let parsed = reader(&backend, RowPolicy::Strict).read().await.unwrap();

    let lines: Vec<usize> = parsed
        .rejected
        .iter()
        .map(|e| match e {
            SlurpError::MalformedRow { line, .. } => *line,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(lines, vec![1, 4]);
    let members: Vec<&str> = parsed.accounts["ucb1"]
        .members
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(members, vec!["bob"]);
}

#[tokio::test]
async fn test_legacy_policy_drops_orphans_silently() {
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::ok(
        OUT_OF_ORDER,
    )]));
    let parsed = reader(&backend, RowPolicy::Legacy).read().await.unwrap();

    assert!(parsed.rejected.is_empty());
    assert_eq!(parsed.accounts.len(), 1);
    assert_eq!(parsed.accounts["ucb1"].members.len(), 1);
}

#[tokio::test]
async fn test_reorder_policy_attaches_late_account_rows() {
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::ok(
        OUT_OF_ORDER,
    )]));
    let parsed = reader(&backend, RowPolicy::Reorder).read().await.unwrap();

    let members: Vec<&str> = parsed.accounts["ucb1"]
        .members
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(members, vec!["alice", "bob"]);
    assert_eq!(parsed.rejected.len(), 1);
    assert!(matches!(
        parsed.rejected[0],
        SlurpError::MalformedRow { line: 4, .. }
    ));
}

#[tokio::test]
async fn test_failed_query_is_backend_query_error() {
    let backend = Arc::new(ScriptedBackend::with_outputs(vec![CommandOutput::failed(
        1,
        "sacctmgr: error: Problem talking to the database: Connection refused",
    )]));
    let err = reader(&backend, RowPolicy::Strict).read().await.unwrap_err();

    match err {
        SlurpError::BackendQueryError { command, diagnostic } => {
            assert!(command.starts_with("show associations"));
            assert!(diagnostic.contains("Connection refused"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_program_is_backend_unavailable() {
    let backend = Arc::new(ScriptedBackend::with_responses(vec![
        ScriptedResponse::Unavailable("No such file or directory".into()),
    ]));
    let err = reader(&backend, RowPolicy::Strict).read().await.unwrap_err();
    assert!(matches!(err, SlurpError::BackendUnavailable { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_stderr_on_success_fails_only_when_configured() {
    let noisy = CommandOutput {
        status: Some(0),
        stdout: "ucb1||||5\n".into(),
        stderr: "sacctmgr: warning: slow database\n".into(),
    };

    let backend = Arc::new(ScriptedBackend::with_outputs(vec![noisy.clone()]));
    let parsed = reader(&backend, RowPolicy::Strict).read().await.unwrap();
    assert_eq!(parsed.accounts["ucb1"].amount, Some(5));

    let backend = Arc::new(ScriptedBackend::with_outputs(vec![noisy]));
    let err = reader(&backend, RowPolicy::Strict)
        .with_stderr_is_failure(true)
        .read()
        .await
        .unwrap_err();
    assert!(matches!(err, SlurpError::BackendQueryError { .. }));
}
