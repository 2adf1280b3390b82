use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::dataset::Observation;
use crate::error::{Result, StepwatchError};
use crate::merge::merge;

/// Row layout of the dataset file.
///
/// Only the first five columns are read back; the rest are derived and
/// recomputed on load.
#[derive(Debug, Serialize)]
struct DatasetRow<'a> {
    run_id: &'a str,
    job: &'a str,
    name: &'a str,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    duration_minutes: f64,
    variant: String,
    os: String,
    python_version: String,
    tool_version: String,
}

impl<'a> From<&'a Observation> for DatasetRow<'a> {
    fn from(obs: &'a Observation) -> Self {
        let variant = obs.variant();
        Self {
            run_id: &obs.run_id,
            job: &obs.job,
            name: &obs.name,
            started_at: obs.started_at,
            completed_at: obs.completed_at,
            duration_minutes: obs.duration_minutes(),
            variant: variant.label,
            os: variant.os,
            python_version: variant.python_version,
            tool_version: variant.tool_version,
        }
    }
}

/// Latest `started_at` among `observations`, used to bound the next fetch.
pub fn watermark(observations: &[Observation]) -> Option<DateTime<Utc>> {
    let latest = observations.iter().map(|obs| obs.started_at).max();
    if let Some(latest) = latest {
        info!(
            "Latest existing data from: {}",
            latest.format("%Y-%m-%dT%H:%M:%SZ")
        );
    }
    latest
}

/// Outcome of one merge-and-persist step.
#[derive(Debug)]
pub struct CommitOutcome {
    pub total: usize,
    pub new_count: usize,
}

/// Durable home of the dataset file and the raw cache.
///
/// A missing dataset file is the normal initial state and reads as an empty
/// dataset.
pub struct DatasetStore {
    dataset_file: PathBuf,
    raw_cache_file: PathBuf,
}

impl DatasetStore {
    pub fn new(config: &Config) -> Self {
        Self::with_paths(config.dataset_path(), config.raw_cache_path())
    }

    pub fn with_paths(dataset_file: PathBuf, raw_cache_file: PathBuf) -> Self {
        Self {
            dataset_file,
            raw_cache_file,
        }
    }

    pub fn dataset_file(&self) -> &Path {
        &self.dataset_file
    }

    pub fn exists(&self) -> bool {
        self.dataset_file.exists()
    }

    /// Loads the dataset sorted by `started_at`.
    ///
    /// Rows that cannot be parsed or that finish before they start are
    /// dropped with a warning. Used for reporting, where a partial dataset is
    /// still worth charting.
    pub fn load(&self) -> Result<Vec<Observation>> {
        self.read(false)
    }

    /// Loads the dataset ahead of a rewrite.
    ///
    /// # Errors
    ///
    /// Any row that fails to parse aborts the load. Saving what did load
    /// would silently delete the rest.
    pub fn load_for_update(&self) -> Result<Vec<Observation>> {
        self.read(true)
    }

    fn read(&self, strict: bool) -> Result<Vec<Observation>> {
        if !self.dataset_file.exists() {
            info!("No existing data found, starting fresh");
            return Ok(Vec::new());
        }

        info!("Loading existing data from {}", self.dataset_file.display());

        let mut reader = csv::Reader::from_path(&self.dataset_file)?;
        let mut observations = Vec::new();

        for (line, row) in reader.deserialize::<Observation>().enumerate() {
            let parsed = row.map_err(StepwatchError::from).and_then(|obs| {
                Observation::new(obs.run_id, obs.job, obs.name, obs.started_at, obs.completed_at)
            });

            match parsed {
                Ok(obs) => observations.push(obs),
                Err(e) if strict => {
                    return Err(StepwatchError::MalformedRecord(format!(
                        "row {} in {}: {e}",
                        line + 2,
                        self.dataset_file.display()
                    )));
                }
                Err(e) => warn!(
                    "Skipping malformed row {} in {}: {e}",
                    line + 2,
                    self.dataset_file.display()
                ),
            }
        }

        observations.sort_by_key(|obs| obs.started_at);
        debug!("Loaded {} records", observations.len());

        Ok(observations)
    }

    /// Writes the whole dataset, replacing the file only once the new
    /// contents are completely on disk.
    pub fn save(&self, observations: &[Observation]) -> Result<()> {
        let dir = self
            .dataset_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            for obs in observations {
                writer.serialize(DatasetRow::from(obs))?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.dataset_file)
            .map_err(|e| StepwatchError::Io(e.error))?;

        info!(
            "Wrote {} records to {}",
            observations.len(),
            self.dataset_file.display()
        );

        Ok(())
    }

    /// Appends observations to the raw cache, one JSON object per line, in
    /// the order given.
    pub fn append_raw(&self, observations: &[Observation]) -> Result<()> {
        if observations.is_empty() {
            return Ok(());
        }

        if let Some(dir) = self.raw_cache_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut buffer = String::new();
        for obs in observations {
            buffer.push_str(&serde_json::to_string(obs)?);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.raw_cache_file)?;
        file.write_all(buffer.as_bytes())?;

        info!(
            "Appended {} raw records to {}",
            observations.len(),
            self.raw_cache_file.display()
        );

        Ok(())
    }

    /// Merges `incoming` into `existing` and persists the result.
    ///
    /// The dataset file is rewritten only when something new was added. The
    /// raw cache receives every incoming record regardless.
    pub fn commit(
        &self,
        existing: Vec<Observation>,
        incoming: &[Observation],
    ) -> Result<CommitOutcome> {
        let (merged, new_count) = merge(existing, incoming);

        if new_count > 0 {
            self.save(&merged)?;
        } else {
            info!("All fetched data were duplicates - no new records to add");
        }

        self.append_raw(incoming)?;

        Ok(CommitOutcome {
            total: merged.len(),
            new_count,
        })
    }
}
