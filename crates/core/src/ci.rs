//! Per-backend pipeline configuration.
//!
//! One [`PipelineConfig`] describes one generated CI file. A host may carry
//! several (different backends, or the same backend with different
//! suffixes); each is compiled independently against the same targets.

use serde::{Deserialize, Serialize};

/// Include/exclude filter. An empty list means "no restriction".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Patterns to include
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Patterns to exclude
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl FilterConfig {
    /// Whether neither list has entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Push (CI) trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Turn the push trigger off entirely
    pub disabled: bool,
    /// Batch changes while a run is in progress
    pub batch: bool,
    /// Branch filter
    pub branches: FilterConfig,
    /// Tag filter
    pub tags: FilterConfig,
    /// Path filter
    pub paths: FilterConfig,
}

impl TriggerConfig {
    /// True when nothing deviates from the backend's default trigger.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Pull request trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestConfig {
    /// Turn pull request builds off
    pub disabled: bool,
    /// Cancel superseded runs. `None` keeps the backend default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cancel: Option<bool>,
    /// Target branch filter
    pub branches: FilterConfig,
    /// Path filter
    pub paths: FilterConfig,
}

impl PullRequestConfig {
    /// True when nothing deviates from the backend's default pull request trigger.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Run targets through a globally installed tool instead of a checked-in
/// build script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalToolConfig {
    /// Package to install
    pub package: String,
    /// Command name once installed; defaults to the package name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Install command line; defaults to `cargo install <package>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
}

impl GlobalToolConfig {
    /// Command name to run
    #[must_use]
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.package)
    }

    /// Command line installing the tool
    #[must_use]
    pub fn install_command(&self) -> String {
        self.install_command
            .clone()
            .unwrap_or_else(|| format!("cargo install {}", self.package))
    }
}

fn default_cache_path() -> String {
    "~/.cache".to_string()
}

/// Configuration of one backend instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Output file suffix: `<stem>.<suffix>.yml`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// One stage is generated per image
    pub images: Vec<String>,
    /// Targets the pipeline runs
    pub invoked_targets: Vec<String>,
    /// Declarations exposed as pipeline parameters
    pub pipeline_parameters: Vec<String>,
    /// Secrets allowed into the pipeline
    pub import_secrets: Vec<String>,
    /// Variable groups imported from the CI host
    pub import_variable_groups: Vec<String>,
    /// Environment variable name bound to the CI system access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_system_access_token_as: Option<String>,
    /// Cache key globs; caching is off when empty
    pub cache_key_files: Vec<String>,
    /// Cached directory
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// Directory the build runs in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Run through a global tool instead of a build script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_tool: Option<GlobalToolConfig>,
    /// Push trigger
    pub trigger: TriggerConfig,
    /// Pull request trigger
    pub pull_requests: PullRequestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            suffix: None,
            images: Vec::new(),
            invoked_targets: Vec::new(),
            pipeline_parameters: Vec::new(),
            import_secrets: Vec::new(),
            import_variable_groups: Vec::new(),
            import_system_access_token_as: None,
            cache_key_files: Vec::new(),
            cache_path: default_cache_path(),
            working_directory: None,
            global_tool: None,
            trigger: TriggerConfig::default(),
            pull_requests: PullRequestConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Configuration running `invoked` on each of `images`.
    #[must_use]
    pub fn new<I, S>(images: I, invoked: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            images: images.into_iter().map(Into::into).collect(),
            invoked_targets: invoked.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Whether `name` is on the secret import allow-list.
    #[must_use]
    pub fn imports_secret(&self, name: &str) -> bool {
        self.import_secrets.iter().any(|s| s == name)
    }
}
