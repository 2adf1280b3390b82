use chrono::{DateTime, Utc};

use crate::error::Result;

pub mod github;

use github::types::{Job, Release, WorkflowRun};

/// Query side of a CI provider.
///
/// `list_runs` failing aborts an update cycle; `get_job_steps` failing only
/// costs the run it was asked about.
pub(crate) trait CiQueryService {
    /// Runs on `branch`, restricted to those created strictly after
    /// `created_after` when given.
    async fn list_runs(
        &self,
        branch: &str,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkflowRun>>;

    /// Jobs of one run, each with its steps.
    async fn get_job_steps(&self, run_id: u64) -> Result<Vec<Job>>;
}

/// Source of published releases.
pub(crate) trait ReleaseFeed {
    async fn list_releases(&self) -> Result<Vec<Release>>;
}
