use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, StepwatchError};
use crate::providers::{CiQueryService, ReleaseFeed};

use super::types::{Job, Release, WorkflowJobsResponse, WorkflowRun, WorkflowRunsResponse};

const MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
pub(super) const PAGE_SIZE: usize = 100;

/// GitHub REST client for workflow runs, jobs and releases of one repository.
pub struct GitHubClient {
    client: Client,
    /// `<base>/repos/<owner>/<repo>/`
    repo_url: Url,
    token: Option<Token>,
    retry_delay: Duration,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `owner` - Repository owner/organization
    /// * `repo` - Repository name
    /// * `token` - Optional GitHub personal access token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is invalid.
    pub fn new(base_url: &str, owner: &str, repo: &str, token: Option<Token>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = Client::builder()
            .user_agent(concat!("stepwatch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| StepwatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let repo_url = Url::parse(&base)
            .map_err(|e| StepwatchError::Config(format!("Invalid base URL: {e}")))?
            .join(&format!("repos/{owner}/{repo}/"))
            .map_err(|e| StepwatchError::Config(format!("Invalid repository URL: {e}")))?;

        Ok(Self {
            client,
            repo_url,
            token,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.repo_url
            .join(path)
            .map_err(|e| StepwatchError::Config(format!("Invalid endpoint URL: {e}")))
    }

    /// GET a JSON document, retrying network errors, rate limiting and
    /// server errors.
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {}s ({}/{})...",
                        e,
                        self.retry_delay.as_secs(),
                        retry_count + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(StepwatchError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "GitHub API error (status {status}). Waiting {} seconds before retry {}/{}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(StepwatchError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Follows `page` numbers until a page comes back short.
    async fn get_paginated<T, F>(&self, url: Url, extract: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(serde_json::Value) -> Result<Vec<serde_json::Value>>,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let body: serde_json::Value = self.get_json(page_url).await?;
            let values = extract(body)?;
            let fetched = values.len();

            items.extend(values.into_iter().filter_map(|value| {
                serde_json::from_value::<T>(value)
                    .inspect_err(|e| {
                        warn!(
                            "Dropping malformed {} record: {e}",
                            short_type_name::<T>()
                        );
                    })
                    .ok()
            }));

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

impl CiQueryService for GitHubClient {
    async fn list_runs(
        &self,
        branch: &str,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkflowRun>> {
        let mut url = self.endpoint("actions/runs")?;
        url.query_pairs_mut().append_pair("branch", branch);
        if let Some(after) = created_after {
            url.query_pairs_mut().append_pair(
                "created",
                &format!(">{}", after.format("%Y-%m-%dT%H:%M:%SZ")),
            );
        }

        let runs: Vec<WorkflowRun> = self
            .get_paginated(url, |body| {
                Ok(serde_json::from_value::<WorkflowRunsResponse>(body)?.workflow_runs)
            })
            .await?;

        // The API filter is date based; enforce the exact bounds here.
        let runs: Vec<WorkflowRun> = runs
            .into_iter()
            .filter(|run| run.head_branch.as_deref() == Some(branch))
            .filter(|run| created_after.map_or(true, |after| run.created_at > after))
            .collect();

        debug!("Listed {} runs on branch {branch}", runs.len());

        Ok(runs)
    }

    async fn get_job_steps(&self, run_id: u64) -> Result<Vec<Job>> {
        let url = self.endpoint(&format!("actions/runs/{run_id}/jobs"))?;

        self.get_paginated(url, |body| {
            Ok(serde_json::from_value::<WorkflowJobsResponse>(body)?.jobs)
        })
        .await
    }
}

impl ReleaseFeed for GitHubClient {
    async fn list_releases(&self) -> Result<Vec<Release>> {
        let url = self.endpoint("releases")?;

        self.get_paginated(url, |body| match body {
            serde_json::Value::Array(values) => Ok(values),
            other => Err(StepwatchError::MalformedRecord(format!(
                "expected a list of releases, got {other}"
            ))),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn create_client(server: &mockito::ServerGuard) -> GitHubClient {
        GitHubClient::new(
            &server.url(),
            "octo",
            "widgets",
            Some(Token::from("test-token")),
        )
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
    }

    fn run_json(id: u64, branch: &str, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "head_branch": branch,
            "status": "completed",
            "created_at": created_at,
        })
    }

    #[test]
    fn test_client_rejects_invalid_base_url() {
        let result = GitHubClient::new("not a url", "octo", "widgets", None);
        assert!(matches!(result, Err(StepwatchError::Config(_))));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            GitHubClient::new("https://ghe.example.com/api/v3", "octo", "widgets", None).unwrap();
        assert_eq!(
            client.endpoint("releases").unwrap().as_str(),
            "https://ghe.example.com/api/v3/repos/octo/widgets/releases"
        );
    }

    #[tokio::test]
    async fn test_list_runs_filters_branch_and_watermark() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/actions/runs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("branch".into(), "main".into()),
                Matcher::UrlEncoded("created".into(), ">2024-01-01T00:00:00Z".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "total_count": 4,
                    "workflow_runs": [
                        run_json(3, "main", "2024-01-03T00:00:00Z"),
                        run_json(2, "feature", "2024-01-02T00:00:00Z"),
                        run_json(1, "main", "2024-01-01T00:00:00Z"),
                        {"id": "broken"},
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let watermark = "2024-01-01T00:00:00Z".parse().unwrap();
        let runs = client.list_runs("main", Some(watermark)).await.unwrap();

        mock.assert_async().await;
        let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn test_list_runs_follows_pages() {
        let mut server = mockito::Server::new_async().await;

        let first_page: Vec<_> = (0..PAGE_SIZE as u64)
            .map(|i| run_json(1000 + i, "main", "2024-02-01T00:00:00Z"))
            .collect();
        let page_1 = server
            .mock("GET", "/repos/octo/widgets/actions/runs")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(serde_json::json!({ "workflow_runs": first_page }).to_string())
            .create_async()
            .await;
        let page_2 = server
            .mock("GET", "/repos/octo/widgets/actions/runs")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "workflow_runs": [run_json(1, "main", "2024-01-01T00:00:00Z")]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let runs = client.list_runs("main", None).await.unwrap();

        page_1.assert_async().await;
        page_2.assert_async().await;
        assert_eq!(runs.len(), PAGE_SIZE + 1);
    }

    #[tokio::test]
    async fn test_get_job_steps_drops_malformed_jobs() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octo/widgets/actions/runs/42/jobs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "jobs": [
                        {
                            "id": 7,
                            "run_id": 42,
                            "name": "test (ubuntu-22.04, 3.10, 2024.1.4)",
                            "steps": [{
                                "name": "Setup environment and install",
                                "status": "completed",
                                "conclusion": "success",
                                "started_at": "2024-01-01T00:00:00Z",
                                "completed_at": "2024-01-01T00:06:00Z"
                            }]
                        },
                        { "id": 8, "run_id": 42 }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let jobs = client.get_job_steps(42).await.unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].steps.len(), 1);
        assert!(jobs[0].steps[0].succeeded());
    }

    #[tokio::test]
    async fn test_not_found_is_reported_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/actions/runs/42/jobs")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = create_client(&server);
        let result = client.get_job_steps(42).await;

        mock.assert_async().await;
        match result {
            Err(StepwatchError::ApiError { status, message }) => {
                assert_eq!(status, 404);
                assert!(message.contains("Not Found"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let unavailable = server
            .mock("GET", "/repos/octo/widgets/releases")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let recovered = server
            .mock("GET", "/repos/octo/widgets/releases")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!([
                    {"tag_name": "v1.0.0", "name": "One", "published_at": "2024-03-01T12:00:00Z"},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let releases = client.list_releases().await.unwrap();

        unavailable.assert_async().await;
        recovered.assert_async().await;
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].tag_name, "v1.0.0");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/actions/runs/42/jobs")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(6)
            .create_async()
            .await;

        let client = create_client(&server);
        let result = client.get_job_steps(42).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(StepwatchError::ApiErrorAfterRetries {
                status: 503,
                retries: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/repos/octo/widgets/actions/runs")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/repos/octo/widgets/actions/runs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "workflow_runs": [run_json(5, "main", "2024-01-05T00:00:00Z")]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let runs = client.list_runs("main", None).await.unwrap();

        limited.assert_async().await;
        ok.assert_async().await;
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_list_releases_drops_malformed_entries() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octo/widgets/releases")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!([
                    {"tag_name": "v2.0.0", "name": "Two", "published_at": "2024-03-01T12:00:00Z"},
                    {"tag_name": "draft", "name": "Draft", "published_at": null},
                    {"tag_name": "v1.0.0", "name": null, "published_at": "not-a-date"},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_client(&server);
        let releases = client.list_releases().await.unwrap();

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].tag_name, "v2.0.0");
    }
}
