use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::analytics::ReportBuilder;
use crate::auth::Token;
use crate::collector::Collector;
use crate::config::{Config, OutputFormat};
use crate::output::{export_report, print_summary, PhaseProgress};
use crate::providers::github::GitHubClient;
use crate::providers::ReleaseFeed;
use crate::storage::{self, DatasetStore};

#[derive(Parser)]
#[command(name = "stepwatch")]
#[command(author, version, about = "CI Step Duration Tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./stepwatch.toml or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args, Debug, Default)]
struct RepoArgs {
    /// Repository as owner/name
    #[arg(short, long)]
    repo: Option<String>,

    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,

    /// Directory holding the dataset and the raw cache
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new step executions and merge them into the dataset
    Update {
        #[command(flatten)]
        repo: RepoArgs,

        #[arg(short, long)]
        branch: Option<String>,

        /// Name of the tracked step
        #[arg(short, long)]
        step: Option<String>,
    },
    /// Build chart data and statistics from the dataset
    Report {
        #[command(flatten)]
        repo: RepoArgs,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
}

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The dataset gained at least one observation
    NewData,
    /// Nothing new was found; the dataset is untouched
    NoNewData,
    ReportWritten,
}

impl Outcome {
    /// `0` when the dataset changed or a report was written, `1` when an
    /// update found nothing new. Failures exit with `2`.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::NewData | Self::ReportWritten => ExitCode::SUCCESS,
            Self::NoNewData => ExitCode::from(1),
        }
    }
}

impl RepoArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(repo) = &self.repo {
            config.github.repo = Some(repo.clone());
        }
        if let Some(token) = &self.token {
            config.github.token = Some(token.clone());
        }
        if let Some(url) = &self.api_url {
            config.github.base_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
    }
}

fn create_client(config: &Config) -> Result<GitHubClient> {
    let (owner, name) = config.repo_parts()?;
    let token = config.github.token.as_deref().map(Token::from);
    if token.is_none() {
        warn!("No GitHub token configured, requests are subject to anonymous rate limits");
    }
    Ok(GitHubClient::new(&config.github.base_url, owner, name, token)?)
}

impl Cli {
    /// Command-line flags take precedence over the configuration file.
    fn apply_overrides(&self, config: &mut Config) {
        match &self.command {
            Commands::Update { repo, branch, step } => {
                repo.apply(config);
                if let Some(branch) = branch {
                    config.github.branch = branch.clone();
                }
                if let Some(step) = step {
                    config.collector.step_name = step.clone();
                }
            }
            Commands::Report { repo, format } => {
                repo.apply(config);
                if let Some(format) = format {
                    config.report.format = *format;
                }
            }
        }
        if self.pretty {
            config.report.pretty = true;
        }
    }

    async fn execute_update(&self, config: &Config) -> Result<Outcome> {
        info!(
            "Tracking step '{}' on {}@{}",
            config.collector.step_name,
            config.github.repo.as_deref().unwrap_or_default(),
            config.github.branch
        );

        let client = create_client(config)?;
        let store = DatasetStore::new(config);

        let existing = store.load_for_update().with_context(|| {
            format!(
                "Refusing to update {}, fix or remove the unreadable rows first",
                store.dataset_file().display()
            )
        })?;
        let watermark = storage::watermark(&existing);

        let collector = Collector::new(&client, config);
        let mut progress = PhaseProgress::start();

        let collected = collector
            .collect_with_progress(watermark, |event| progress.on_event(event))
            .await;
        let incoming = match collected {
            Ok(incoming) => incoming,
            Err(e) => {
                progress.abandon();
                return Err(e.into());
            }
        };

        if incoming.is_empty() {
            progress.finish(0, existing.len());
            info!("No new data to add");
            return Ok(Outcome::NoNewData);
        }

        let committed = match store.commit(existing, &incoming) {
            Ok(committed) => committed,
            Err(e) => {
                progress.abandon();
                return Err(e.into());
            }
        };
        progress.finish(committed.new_count, committed.total);

        info!(
            "Added {} new records, dataset now holds {}",
            committed.new_count, committed.total
        );

        if committed.new_count > 0 {
            Ok(Outcome::NewData)
        } else {
            Ok(Outcome::NoNewData)
        }
    }

    async fn execute_report(&self, config: &Config) -> Result<Outcome> {
        let store = DatasetStore::new(config);
        if !store.exists() {
            bail!(
                "No dataset at {}, run `stepwatch update` first",
                store.dataset_file().display()
            );
        }

        let observations = store.load().with_context(|| {
            format!("Failed to read dataset {}", store.dataset_file().display())
        })?;
        info!("Loaded {} observations", observations.len());

        let client = create_client(config)?;
        let releases = match client.list_releases().await {
            Ok(releases) => releases,
            Err(e) => {
                warn!("Could not fetch releases, reporting without markers: {e}");
                Vec::new()
            }
        };

        let (owner, name) = config.repo_parts()?;
        let repo = format!("{owner}/{name}");
        let report = ReportBuilder::new(
            &repo,
            &config.collector.step_name,
            &releases,
            &config.report,
        )
        .build(&observations);

        let format = config.report.format;
        let pretty = config.report.pretty;

        if let Some(output_path) = &self.output {
            let mut file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            export_report(&report, format, pretty, &mut file)?;
            info!("Report written to: {}", output_path.display());
        } else if format == OutputFormat::Summary {
            print_summary(&report);
        } else {
            export_report(&report, format, pretty, &mut io::stdout().lock())?;
        }

        Ok(Outcome::ReportWritten)
    }

    async fn run(&self, mut config: Config) -> Result<Outcome> {
        self.apply_overrides(&mut config);
        config.validate()?;

        match &self.command {
            Commands::Update { .. } => self.execute_update(&config).await,
            Commands::Report { .. } => self.execute_report(&config).await,
        }
    }

    pub async fn execute(&self) -> Result<Outcome> {
        let config = Config::load(self.config.as_deref())?;
        self.run(config).await
    }
}
