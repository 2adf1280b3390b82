use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StepwatchError};

/// Identity of an observation: `(run_id, job_name, started_at)`.
///
/// Two observations with the same key describe the same step execution,
/// whatever their other fields say.
pub type ObservationKey = (String, String, DateTime<Utc>);

/// One successful execution of the tracked step within one CI job.
///
/// This is also the shape written verbatim to the raw cache, one JSON object
/// per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Workflow run identifier, shared by every job of one invocation
    pub run_id: String,
    /// Full job name, including the parenthesized variant suffix
    pub job: String,
    /// Step name
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Observation {
    /// Builds an observation, rejecting steps that finish before they start.
    pub fn new(
        run_id: impl Into<String>,
        job: impl Into<String>,
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let observation = Self {
            run_id: run_id.into(),
            job: job.into(),
            name: name.into(),
            started_at,
            completed_at,
        };

        if observation.completed_at < observation.started_at {
            return Err(StepwatchError::MalformedRecord(format!(
                "step '{}' in job '{}' of run {} completed before it started",
                observation.name, observation.job, observation.run_id
            )));
        }

        Ok(observation)
    }

    pub fn key(&self) -> ObservationKey {
        (self.run_id.clone(), self.job.clone(), self.started_at)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn duration_minutes(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 60_000.0
    }

    pub fn variant(&self) -> Variant {
        Variant::parse(&self.job)
    }
}

/// Test configuration parsed from the last parenthesized group of a job name.
///
/// `"test (ubuntu-22.04, 3.10, 2024.1.4)"` yields os `ubuntu-22.04`, python
/// version `3.10` and tool version `2024.1.4`. Missing parts are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variant {
    pub label: String,
    pub os: String,
    pub python_version: String,
    pub tool_version: String,
}

impl Variant {
    pub fn parse(job_name: &str) -> Self {
        let Some(label) = last_parenthesized_group(job_name) else {
            return Self::default();
        };

        let mut parts = label.splitn(3, ',').map(str::trim);
        let os = parts.next().unwrap_or_default().to_string();
        let python_version = parts.next().unwrap_or_default().to_string();
        let tool_version = parts.next().unwrap_or_default().to_string();

        Self {
            label: label.to_string(),
            os,
            python_version,
            tool_version,
        }
    }
}

/// Returns the contents of the last non-empty `(...)` group without nested
/// parentheses.
fn last_parenthesized_group(name: &str) -> Option<&str> {
    let mut open = None;
    let mut last = None;

    for (i, c) in name.char_indices() {
        match c {
            '(' => open = Some(i + 1),
            ')' => {
                if let Some(start) = open.take() {
                    if i > start {
                        last = Some(&name[start..i]);
                    }
                }
            }
            _ => {}
        }
    }

    last
}

/// Whether a job name marks a build or release job that never yields
/// observations. Patterns match case-insensitively anywhere in the name.
pub fn is_excluded_job(job_name: &str, patterns: &[String]) -> bool {
    let lower = job_name.to_lowercase();
    patterns
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_duration_minutes() {
        let obs = Observation::new("1", "job", "step", ts(10, 0, 0), ts(10, 7, 30)).unwrap();
        assert_eq!(obs.duration_minutes(), 7.5);
    }

    #[test]
    fn test_completed_before_started_is_rejected() {
        let result = Observation::new("1", "job", "step", ts(10, 5, 0), ts(10, 0, 0));
        assert!(matches!(result, Err(StepwatchError::MalformedRecord(_))));
    }

    #[test]
    fn test_zero_duration_is_allowed() {
        let obs = Observation::new("1", "job", "step", ts(10, 0, 0), ts(10, 0, 0)).unwrap();
        assert_eq!(obs.duration_minutes(), 0.0);
    }

    #[test]
    fn test_variant_parse() {
        let variant = Variant::parse("test (ubuntu-22.04, 3.10, 2024.1.4)");
        assert_eq!(variant.label, "ubuntu-22.04, 3.10, 2024.1.4");
        assert_eq!(variant.os, "ubuntu-22.04");
        assert_eq!(variant.python_version, "3.10");
        assert_eq!(variant.tool_version, "2024.1.4");
    }

    #[test]
    fn test_variant_uses_last_group() {
        let variant = Variant::parse("install (fast) (debian-12, 3.8, 2023.2.3)");
        assert_eq!(variant.os, "debian-12");
        assert_eq!(variant.python_version, "3.8");
    }

    #[test]
    fn test_variant_missing_parts() {
        let variant = Variant::parse("test (fedora-39)");
        assert_eq!(variant.os, "fedora-39");
        assert_eq!(variant.python_version, "");
        assert_eq!(variant.tool_version, "");

        assert_eq!(Variant::parse("plain job"), Variant::default());
        assert_eq!(Variant::parse("empty ()"), Variant::default());
    }

    #[test]
    fn test_variant_extra_commas_stay_in_tool_version() {
        let variant = Variant::parse("t (a, b, c, d)");
        assert_eq!(variant.tool_version, "c, d");
    }

    #[test]
    fn test_is_excluded_job() {
        let patterns = vec!["(build)".to_string(), "(new release)".to_string()];
        assert!(is_excluded_job("Package (Build)", &patterns));
        assert!(is_excluded_job("publish (new release)", &patterns));
        assert!(!is_excluded_job("test (ubuntu-22.04, 3.10, 2024.1.4)", &patterns));
    }

    #[test]
    fn test_key_ignores_completion_time() {
        let a = Observation::new("1", "job", "step", ts(10, 0, 0), ts(10, 5, 0)).unwrap();
        let b = Observation::new("1", "job", "other", ts(10, 0, 0), ts(10, 9, 0)).unwrap();
        assert_eq!(a.key(), b.key());
    }
}
