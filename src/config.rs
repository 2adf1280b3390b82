use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analytics::{layout, releases};
use crate::error::StepwatchError;

/// Configuration file structure for stepwatch.
///
/// Carries the repository, tracked step and file locations shared by the
/// collector, the storage layer and the report builder. Constructed once and
/// passed to each component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repository path (e.g., 'owner/repo')
    pub repo: Option<String>,

    /// Branch whose workflow runs are tracked
    #[serde(default = "default_branch")]
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollectorConfig {
    /// Name of the workflow step whose duration is recorded
    #[serde(default = "default_step_name")]
    pub step_name: String,

    /// Case-insensitive job name fragments that mark infrastructure jobs
    #[serde(default = "default_exclude_job_patterns")]
    pub exclude_job_patterns: Vec<String>,

    /// Number of runs per progress batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_dataset_file")]
    pub dataset_file: String,

    #[serde(default = "default_raw_cache_file")]
    pub raw_cache_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Tick budget for the combined chart
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,

    /// Tick budget for per-variant charts
    #[serde(default = "default_variant_max_ticks")]
    pub variant_max_ticks: usize,

    /// Maximum distance between a release and its matched run
    #[serde(default = "default_release_tolerance_days")]
    pub release_tolerance_days: i64,

    /// Output format for `report`
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Terminal tables
    #[default]
    Summary,
    /// Full chart data for a rendering consumer
    Json,
    /// Statistics document
    Markdown,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_github_base_url(),
            repo: None,
            branch: default_branch(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            step_name: default_step_name(),
            exclude_job_patterns: default_exclude_job_patterns(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            dataset_file: default_dataset_file(),
            raw_cache_file: default_raw_cache_file(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            variant_max_ticks: default_variant_max_ticks(),
            release_tolerance_days: default_release_tolerance_days(),
            format: OutputFormat::Summary,
            pretty: false,
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_step_name() -> String {
    "Setup environment and install".to_string()
}

fn default_exclude_job_patterns() -> Vec<String> {
    vec!["(build)".to_string(), "(new release)".to_string()]
}

fn default_batch_size() -> usize {
    10
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_dataset_file() -> String {
    "durations.csv".to_string()
}

fn default_raw_cache_file() -> String {
    "runs.json".to_string()
}

fn default_max_ticks() -> usize {
    layout::DEFAULT_MAX_TICKS
}

fn default_variant_max_ticks() -> usize {
    10
}

fn default_release_tolerance_days() -> i64 {
    releases::DEFAULT_TOLERANCE_DAYS
}

const CONFIG_CANDIDATES: [&str; 4] = [
    "stepwatch.toml",
    "stepwatch.json",
    "stepwatch.yaml",
    "stepwatch.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. `./stepwatch.{toml,json,yaml,yml}`
    /// 3. `<platform config dir>/stepwatch/stepwatch.{toml,json,yaml,yml}`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if path.exists() {
                return Self::load_from_path(path);
            }
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_dir = dirs::config_dir().map(|dir| dir.join("stepwatch"));

        let search_dirs = std::iter::once(PathBuf::from(".")).chain(config_dir);

        for dir in search_dirs {
            for candidate in &CONFIG_CANDIDATES {
                let path = dir.join(candidate);
                if path.exists() {
                    log::debug!("Loading config from {}", path.display());
                    return Self::load_from_path(&path);
                }
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Checks the settings every command relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.repo_parts()?;

        if self.collector.batch_size == 0 {
            return Err(StepwatchError::Config("batch-size must be at least 1".into()));
        }
        if self.report.max_ticks == 0 || self.report.variant_max_ticks == 0 {
            return Err(StepwatchError::Config("max-ticks must be at least 1".into()));
        }
        if self.report.release_tolerance_days < 0 {
            return Err(StepwatchError::Config(
                "release-tolerance-days must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Splits the configured repository into `(owner, name)`.
    pub fn repo_parts(&self) -> crate::error::Result<(&str, &str)> {
        let repo = self
            .github
            .repo
            .as_deref()
            .ok_or_else(|| StepwatchError::Config("repository is not set".into()))?;

        match repo.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok((*owner, *name)),
            _ => Err(StepwatchError::Config(format!(
                "repository must be in format 'owner/repo', got '{repo}'"
            ))),
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.dataset_file)
    }

    pub fn raw_cache_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.raw_cache_file)
    }
}
