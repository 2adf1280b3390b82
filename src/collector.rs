use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::Config;
use crate::dataset::{is_excluded_job, Observation};
use crate::error::{Result, StepwatchError};
use crate::providers::github::types::{Job, Step};
use crate::providers::CiQueryService;

/// Milestones reported while a collection is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectEvent {
    /// Runs to inspect after the watermark filter
    RunsListed(usize),
    /// 1-based batch about to be fetched
    Batch { index: usize, total: usize },
    /// Jobs fetched across all runs
    JobsFetched(usize),
}

/// Incremental collector of tracked-step observations.
///
/// Lists the runs created after the watermark on the tracked branch, fetches
/// each run's jobs one run at a time and keeps the successful executions of
/// the tracked step.
pub(crate) struct Collector<'a, C> {
    client: &'a C,
    branch: String,
    step_name: String,
    exclude_job_patterns: Vec<String>,
    batch_size: usize,
}

impl<'a, C: CiQueryService> Collector<'a, C> {
    pub fn new(client: &'a C, config: &Config) -> Self {
        Self {
            client,
            branch: config.github.branch.clone(),
            step_name: config.collector.step_name.clone(),
            exclude_job_patterns: config.collector.exclude_job_patterns.clone(),
            batch_size: config.collector.batch_size.max(1),
        }
    }

    /// Collects observations newer than `watermark`.
    ///
    /// An empty result means there is nothing new and is not an error.
    ///
    /// # Errors
    ///
    /// Fails only when the run listing fails. A run whose jobs cannot be
    /// fetched is logged and skipped.
    pub async fn collect(&self, watermark: Option<DateTime<Utc>>) -> Result<Vec<Observation>> {
        self.collect_with_progress(watermark, |_| {}).await
    }

    pub async fn collect_with_progress<F>(
        &self,
        watermark: Option<DateTime<Utc>>,
        mut on_event: F,
    ) -> Result<Vec<Observation>>
    where
        F: FnMut(CollectEvent),
    {
        match watermark {
            Some(since) => info!(
                "Fetching runs from {} branch since: {}",
                self.branch,
                since.format("%Y-%m-%dT%H:%M:%SZ")
            ),
            None => info!("Fetching all workflow runs from {} branch...", self.branch),
        }

        let runs = self.client.list_runs(&self.branch, watermark).await?;
        on_event(CollectEvent::RunsListed(runs.len()));

        if runs.is_empty() {
            info!("No workflow runs found");
            return Ok(Vec::new());
        }
        info!("Found {} runs to process", runs.len());

        let run_ids: Vec<u64> = runs.iter().map(|run| run.id).collect();
        let jobs = self.fetch_all_jobs(&run_ids, &mut on_event).await;
        on_event(CollectEvent::JobsFetched(jobs.len()));

        if jobs.is_empty() {
            info!("No job data found");
            return Ok(Vec::new());
        }

        let mut observations =
            extract_observations(&jobs, &self.step_name, &self.exclude_job_patterns);

        if let Some(since) = watermark {
            let before = observations.len();
            observations.retain(|obs| obs.started_at > since);
            if observations.len() < before {
                debug!(
                    "Dropped {} observations not newer than the watermark",
                    before - observations.len()
                );
            }
        }

        if observations.is_empty() {
            info!("No matching job steps found");
        } else {
            info!("Found {} successful job steps", observations.len());
        }

        Ok(observations)
    }

    async fn fetch_all_jobs<F>(&self, run_ids: &[u64], on_event: &mut F) -> Vec<Job>
    where
        F: FnMut(CollectEvent),
    {
        let total = run_ids.len().div_ceil(self.batch_size);
        let mut all_jobs = Vec::new();

        for (i, batch) in run_ids.chunks(self.batch_size).enumerate() {
            info!("Processing batch {}/{}", i + 1, total);
            on_event(CollectEvent::Batch {
                index: i + 1,
                total,
            });

            for &run_id in batch {
                match self.client.get_job_steps(run_id).await {
                    Ok(jobs) => all_jobs.extend(jobs.into_iter().map(|mut job| {
                        job.run_id = run_id;
                        job
                    })),
                    Err(e) => warn!("Skipping run {run_id}, could not fetch its jobs: {e}"),
                }
            }
        }

        info!("Fetched {} jobs", all_jobs.len());
        all_jobs
    }
}

/// Turns job payloads into observations of `step_name`.
///
/// Excluded jobs are skipped before their steps are looked at. Only steps
/// that completed successfully count; a matching step without timestamps,
/// or one that ends before it starts, is dropped with a warning.
pub fn extract_observations(
    jobs: &[Job],
    step_name: &str,
    exclude_job_patterns: &[String],
) -> Vec<Observation> {
    jobs.iter()
        .filter(|job| !is_excluded_job(&job.name, exclude_job_patterns))
        .flat_map(|job| {
            job.steps
                .iter()
                .filter(|step| step.name == step_name && step.succeeded())
                .map(move |step| to_observation(job, step))
        })
        .filter_map(|result| result.inspect_err(|e| warn!("{e}")).ok())
        .collect()
}

fn to_observation(job: &Job, step: &Step) -> Result<Observation> {
    let (Some(started_at), Some(completed_at)) = (step.started_at, step.completed_at) else {
        return Err(StepwatchError::MalformedRecord(format!(
            "step '{}' in job '{}' of run {} has no start or completion time",
            step.name, job.name, job.run_id
        )));
    };

    Observation::new(
        job.run_id.to_string(),
        job.name.clone(),
        step.name.clone(),
        started_at,
        completed_at,
    )
}
