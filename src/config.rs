use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlurpError};

pub const DEFAULT_ERROR_THRESHOLD: usize = 10;
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Maps project ids with a given prefix onto their parent account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRule {
    pub prefix: String,
    pub parent: String,
}

impl ParentRule {
    pub fn new(prefix: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            parent: parent.into(),
        }
    }
}

/// How the association parser treats member rows whose account row has not
/// been seen yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Drop orphan member rows without reporting them.
    Legacy,
    /// Report orphan member rows as malformed.
    #[default]
    Strict,
    /// Hold orphan member rows until their account row shows up; report the rest.
    Reorder,
}

/// Per-cluster reconciliation policy.
///
/// Everything that used to differ between cluster-specific copies of the
/// sync job lives here: the cluster selector, which association attribute
/// carries the resource grant, the default QoS set, general accounts and
/// the prefix table used to derive parent accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster selector passed to every accounting command
    pub name: String,
    /// Association attribute holding the resource grant (e.g. "grpcpumins")
    pub amount_attribute: String,
    /// QoS labels every account carries. The first one is the default QoS.
    pub default_qos: Vec<String>,
    /// Aggregation accounts that also become their members' default account
    pub general_accounts: Vec<String>,
    /// Ordered prefix table; the first matching rule wins
    pub parent_rules: Vec<ParentRule>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            amount_attribute: "grpcpumins".to_string(),
            default_qos: vec!["normal".into(), "long".into(), "debug".into()],
            general_accounts: vec!["ucball".into(), "rmaccall".into(), "csuall".into()],
            parent_rules: vec![
                ParentRule::new("ucb", "ucballoc"),
                ParentRule::new("rmacc", "rmaccalloc"),
                ParentRule::new("csu", "csualloc"),
            ],
        }
    }
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_amount_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.amount_attribute = attribute.into();
        self
    }

    pub fn with_default_qos<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_qos = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_general_account(mut self, account: impl Into<String>) -> Self {
        self.general_accounts.push(account.into());
        self
    }

    pub fn with_parent_rule(mut self, prefix: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parent_rules.push(ParentRule::new(prefix, parent));
        self
    }

    /// The QoS label used as `defaultqos` when creating accounts.
    pub fn default_qos_label(&self) -> Option<&str> {
        self.default_qos.first().map(String::as_str)
    }

    /// `cluster=<name>` selector argument.
    pub fn selector(&self) -> String {
        format!("cluster={}", self.name)
    }

    pub fn is_general_account(&self, account: &str) -> bool {
        self.general_accounts.iter().any(|a| a == account)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SlurpError::Config("cluster name must be set".into()));
        }
        if self.amount_attribute.trim().is_empty() {
            return Err(SlurpError::Config("amount attribute must be set".into()));
        }
        if self.default_qos.is_empty() {
            return Err(SlurpError::Config("default QoS set must not be empty".into()));
        }
        if let Some(rule) = self.parent_rules.iter().find(|r| r.prefix.is_empty()) {
            return Err(SlurpError::Config(format!(
                "parent rule for {} has an empty prefix",
                rule.parent
            )));
        }
        Ok(())
    }
}

/// Where allocations come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
        }
    }
}

/// How the accounting subsystem is invoked and interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Accounting CLI binary
    pub program: PathBuf,
    /// Directory lookup binary used by `compare`
    pub directory_program: PathBuf,
    /// Treat any stderr output as failure even when the exit status is zero.
    pub stderr_is_failure: bool,
    pub row_policy: RowPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("sacctmgr"),
            directory_program: PathBuf::from("getent"),
            stderr_is_failure: false,
            row_policy: RowPolicy::default(),
        }
    }
}

/// Complete settings for one process, loaded from an optional TOML file
/// and overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cluster: ClusterConfig,
    pub feed: FeedConfig,
    pub backend: BackendConfig,
    pub error_threshold: usize,
    /// Account name -> directory group name, for `compare`
    pub directory_pairs: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            feed: FeedConfig::default(),
            backend: BackendConfig::default(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            directory_pairs: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Without a path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        if !path.exists() {
            return Err(SlurpError::Config(format!(
                "settings file {} does not exist",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validate everything a `sync` run needs.
    pub fn validate_for_sync(&self) -> Result<()> {
        self.cluster.validate()?;
        match self.feed.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(()),
            _ => Err(SlurpError::Config("allocation feed URL must be set".into())),
        }
    }
}
