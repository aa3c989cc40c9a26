use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use slurp::backend::{Backend, DryRunBackend, ProcessBackend};
use slurp::compare::{compare_membership, MembershipDelta};
use slurp::config::{RowPolicy, Settings};
use slurp::error::{Result, SlurpError};
use slurp::feed::FeedClient;
use slurp::run::{RunReport, SyncRun};

#[derive(Parser, Debug)]
#[command(name = "slurp")]
#[command(version)]
#[command(
    about = "Slurp is a Slurm state manager. It pulls allocations from the registry and reconciles them into Slurm accounting state."
)]
#[command(propagate_version = true)]
struct Args {
    /// TOML settings file
    #[arg(long, short = 'c', global = true, env = "SLURP_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Reconcile the allocation feed into accounting state
    Sync(SyncArgs),

    /// Show how account membership differs from directory groups
    Compare(CompareArgs),
}

// =============================================================================
// Sync Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct SyncArgs {
    /// Print mutation commands instead of running them
    #[arg(long, short = 'd')]
    debug: bool,

    /// Cluster selector
    #[arg(long, env = "SLURP_CLUSTER")]
    cluster: Option<String>,

    /// Association attribute that carries the resource grant
    #[arg(long, env = "SLURP_AMOUNT_ATTRIBUTE")]
    amount_attribute: Option<String>,

    /// Allocation registry endpoint
    #[arg(long, env = "SLURP_FEED_URL")]
    feed_url: Option<String>,

    /// Accounting CLI binary
    #[arg(long, env = "SLURP_SACCTMGR")]
    sacctmgr: Option<PathBuf>,

    /// Recoverable failures tolerated before the run is aborted
    #[arg(long, env = "SLURP_ERROR_THRESHOLD")]
    error_threshold: Option<usize>,

    /// Handling of member rows listed before their account row
    #[arg(long, value_enum, env = "SLURP_ROW_POLICY")]
    row_policy: Option<RowPolicy>,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

// =============================================================================
// Compare Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct CompareArgs {
    /// Account/group pair as "account=group"; repeatable. Defaults to the
    /// pairs in the settings file.
    #[arg(long = "pair", value_parser = parse_pair)]
    pairs: Vec<(String, String)>,

    /// Accounting CLI binary
    #[arg(long, env = "SLURP_SACCTMGR")]
    sacctmgr: Option<PathBuf>,
}

fn parse_pair(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((account, group)) if !account.is_empty() && !group.is_empty() => {
            Ok((account.to_string(), group.to_string()))
        }
        _ => Err(format!("expected account=group, got {:?}", value)),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

fn apply_sync_overrides(settings: &mut Settings, args: &SyncArgs) {
    if let Some(cluster) = &args.cluster {
        settings.cluster.name = cluster.clone();
    }
    if let Some(attribute) = &args.amount_attribute {
        settings.cluster.amount_attribute = attribute.clone();
    }
    if let Some(url) = &args.feed_url {
        settings.feed.url = Some(url.clone());
    }
    if let Some(program) = &args.sacctmgr {
        settings.backend.program = program.clone();
    }
    if let Some(threshold) = args.error_threshold {
        settings.error_threshold = threshold;
    }
    if let Some(policy) = args.row_policy {
        settings.backend.row_policy = policy;
    }
}

fn print_report(report: &RunReport, format: &ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| SlurpError::Config(format!("cannot render report: {}", e)))?;
            println!("{}", json);
        }
        ReportFormat::Text => {
            println!("Run:               {}", report.run_id);
            println!("Cluster:           {}", report.cluster);
            println!("Accounts observed: {}", report.accounts_observed);
            println!("Allocations:       {}", report.allocations);
            println!(
                "Mutations:         {} applied of {} planned",
                report.intents_applied, report.intents_planned
            );
            if !report.failures.is_empty() {
                println!("Failures:");
                for failure in &report.failures {
                    println!("  {}", failure);
                }
            }
        }
    }
    Ok(())
}

async fn run_sync(mut settings: Settings, args: SyncArgs) -> Result<()> {
    apply_sync_overrides(&mut settings, &args);
    settings.validate_for_sync()?;

    let query_backend: Arc<dyn Backend> =
        Arc::new(ProcessBackend::new(settings.backend.program.clone()));
    let mutation_backend: Arc<dyn Backend> = if args.debug {
        tracing::info!("Debug mode: mutations are printed, not applied");
        Arc::new(DryRunBackend::new(settings.backend.program.clone()))
    } else {
        query_backend.clone()
    };
    let source = Arc::new(FeedClient::from_config(&settings.feed)?);

    let run = SyncRun::from_settings(&settings, query_backend, mutation_backend, source);
    let today = chrono::Local::now().date_naive();
    let report = run.execute(today).await?;
    print_report(&report, &args.report)
}

fn print_delta(delta: &MembershipDelta) {
    println!("I would remove these users from {}:", delta.account);
    for user in &delta.to_remove {
        println!("{}", user);
    }
    println!("I would add these users to {}:", delta.account);
    for user in &delta.to_add {
        println!("{}", user);
    }
    println!();
}

async fn run_compare(mut settings: Settings, args: CompareArgs) -> Result<()> {
    if let Some(program) = args.sacctmgr {
        settings.backend.program = program;
    }
    let pairs: Vec<(String, String)> = if args.pairs.is_empty() {
        settings.directory_pairs.clone().into_iter().collect()
    } else {
        args.pairs
    };
    if pairs.is_empty() {
        return Err(SlurpError::Config(
            "no account=group pairs given (use --pair or directory_pairs)".into(),
        ));
    }

    let accounting = ProcessBackend::new(settings.backend.program.clone());
    let directory = ProcessBackend::new(settings.backend.directory_program.clone());
    let deltas = compare_membership(
        &accounting,
        &directory,
        pairs.iter().map(|(a, g)| (a.as_str(), g.as_str())),
    )
    .await?;

    for delta in &deltas {
        print_delta(delta);
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match Settings::load(args.config.as_deref()) {
        Ok(settings) => match args.command {
            Commands::Sync(sync_args) => run_sync(settings, sync_args).await,
            Commands::Compare(compare_args) => run_compare(settings, compare_args).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair_accepts_account_equals_group() {
        assert_eq!(
            parse_pair("acct1=ldap_acct1").unwrap(),
            ("acct1".to_string(), "ldap_acct1".to_string())
        );
        assert!(parse_pair("acct1").is_err());
        assert!(parse_pair("=group").is_err());
    }

    #[test]
    fn cli_parses_sync_flags() {
        let args = Args::try_parse_from([
            "slurp",
            "sync",
            "--debug",
            "--cluster",
            "summit",
            "--row-policy",
            "legacy",
            "--error-threshold",
            "3",
        ])
        .unwrap();
        let Commands::Sync(sync) = args.command else {
            panic!("expected sync");
        };
        assert!(sync.debug);
        assert_eq!(sync.cluster.as_deref(), Some("summit"));
        assert_eq!(sync.row_policy, Some(RowPolicy::Legacy));

        let mut settings = Settings::default();
        apply_sync_overrides(&mut settings, &sync);
        assert_eq!(settings.cluster.name, "summit");
        assert_eq!(settings.error_threshold, 3);
        assert_eq!(settings.backend.row_policy, RowPolicy::Legacy);
    }
}
