// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Upstream clients for the proxied third-party APIs.
//!
//! One reqwest client serves GitHub REST, GitHub GraphQL, the raw content
//! mirror, and LeetCode GraphQL. Non-2xx statuses and GraphQL `errors`
//! arrays are normalized into typed failures; nothing here retries.

use std::time::Duration;

use anyhow::anyhow;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::mapper;
use crate::model::{ReadmeMetadata, RepoTopics};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Rate-limit headers forwarded verbatim by the passthrough endpoint.
pub const FORWARDED_HEADERS: [&str; 4] = [
    "etag",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-reset",
];

/// Candidate filenames probed against the raw mirror when the metadata
/// endpoint 404s.
const README_CANDIDATES: [&str; 4] = ["README.md", "Readme.md", "readme.md", "README.MD"];

const CALENDAR_QUERY: &str = r#"
query($login:String!, $from:DateTime!, $to:DateTime!) {
  user(login:$login) {
    login
    contributionsCollection(from:$from, to:$to) {
      contributionCalendar {
        totalContributions
        weeks {
          firstDay
          contributionDays {
            date
            weekday
            contributionCount
            color
          }
        }
      }
    }
  }
  rateLimit {
    limit
    remaining
    resetAt
  }
}
"#;

const CATALOG_QUERY: &str = r#"
query($login:String!, $first:Int!) {
  user(login: $login) {
    pinnedItems(first: 6, types: REPOSITORY) {
      nodes { ...RepoFrag }
    }
    repositories(
      first: $first,
      privacy: PUBLIC,
      isFork: false,
      orderBy: {field: UPDATED_AT, direction: DESC}
    ) {
      nodes { ...RepoFrag }
    }
  }
}
fragment RepoFrag on Repository {
  id
  name
  nameWithOwner
  url
  homepageUrl
  description
  stargazerCount
  owner { login }
  primaryLanguage { name }
}
"#;

const CONTEST_QUERY: &str = r#"
query userContestRankingInfo($username: String!) {
  userContestRanking(username: $username) {
    rating
    globalRanking
    attendedContestsCount
    topPercentage
  }
  userContestRankingHistory(username: $username) {
    contest { title startTime }
    rating
    ranking
  }
}
"#;

/// A passthrough reply carries the upstream status and selected headers back
/// to the caller untouched; non-2xx is not an error here.
pub struct PassthroughReply {
    pub status: u16,
    pub forwarded: Vec<(&'static str, String)>,
    pub body: String,
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    api_base: String,
    graphql_url: String,
    raw_base: String,
    leetcode_url: String,
    token: Option<String>,
}

impl UpstreamClient {
    pub fn try_new(config: &AppConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("folio-edge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(anyhow!("failed to build upstream client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.github_api_base.clone(),
            graphql_url: config.github_graphql_url.clone(),
            raw_base: config.github_raw_base.clone(),
            leetcode_url: config.leetcode_graphql_url.clone(),
            token: config.github_token.clone(),
        })
    }

    fn bearer(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::config("GH_TOKEN not configured"))
    }

    /// Transparent REST GET against the GitHub API, forwarding the caller's
    /// conditional token upstream and the upstream's rate-limit headers back.
    pub async fn rest_get(
        &self,
        path: &str,
        if_none_match: Option<&str>,
    ) -> Result<PassthroughReply, AppError> {
        let token = self.bearer()?;
        let url = format!("{}{path}", self.api_base);

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .bearer_auth(token);
        if let Some(tag) = if_none_match {
            request = request.header(header::IF_NONE_MATCH, tag);
        }

        let response = request.send().await.map_err(send_error)?;
        let status = response.status();

        let forwarded = FORWARDED_HEADERS
            .iter()
            .filter_map(|name| {
                response
                    .headers()
                    .get(*name)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| (*name, value.to_string()))
            })
            .collect();

        let body = if status == StatusCode::NOT_MODIFIED {
            String::new()
        } else {
            response.text().await.map_err(send_error)?
        };

        Ok(PassthroughReply {
            status: status.as_u16(),
            forwarded,
            body,
        })
    }

    /// Contribution calendar GraphQL query; returns the raw response body.
    pub async fn contribution_calendar(
        &self,
        login: &str,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Value, AppError> {
        self.github_graphql(
            CALENDAR_QUERY,
            json!({
                "login": login,
                "from": from.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                "to": to.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            }),
        )
        .await
    }

    /// Repository catalog GraphQL query (pinned items + public non-forks,
    /// newest-updated-first).
    pub async fn repository_catalog(&self, login: &str, first: u32) -> Result<Value, AppError> {
        self.github_graphql(CATALOG_QUERY, json!({"login": login, "first": first}))
            .await
    }

    /// LeetCode contest ranking query.
    pub async fn contest_ranking(&self, username: &str) -> Result<Value, AppError> {
        let response = self
            .client
            .post(&self.leetcode_url)
            .header(header::CONTENT_TYPE, "application/json")
            // LeetCode rejects requests without a referer and browser agent.
            .header(header::REFERER, "https://leetcode.com")
            .header(header::USER_AGENT, "Mozilla/5.0")
            .json(&json!({"query": CONTEST_QUERY, "variables": {"username": username}}))
            .send()
            .await
            .map_err(send_error)?;

        graphql_body(response).await
    }

    /// README markdown for a repository. A 404 from the metadata endpoint
    /// falls back to probing the raw mirror; no README anywhere is an empty
    /// string, not an error.
    pub async fn readme_markdown(&self, owner: &str, repo: &str) -> Result<String, AppError> {
        let token = self.bearer()?;
        let url = format!("{}/repos/{owner}/{repo}/readme", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return self.probe_raw_readme(owner, repo).await;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_status(status.as_u16(), body));
        }

        let metadata: ReadmeMetadata = response
            .json()
            .await
            .map_err(|e| AppError::upstream_data(format!("malformed readme response: {e}")))?;

        mapper::decode_readme(metadata.content.as_deref().unwrap_or(""))
    }

    async fn probe_raw_readme(&self, owner: &str, repo: &str) -> Result<String, AppError> {
        for candidate in README_CANDIDATES {
            let url = format!("{}/{owner}/{repo}/HEAD/{candidate}", self.raw_base);
            let response = self.client.get(&url).send().await.map_err(send_error)?;
            if response.status().is_success() {
                return response.text().await.map_err(send_error);
            }
        }

        tracing::debug!(owner, repo, "no readme found at any candidate path");
        Ok(String::new())
    }

    /// Topics for one repository, used by the catalog fan-out. The caller
    /// decides what a failure means for the overall response.
    pub async fn repo_topics(&self, full_name: &str) -> Result<Vec<String>, AppError> {
        let token = self.bearer()?;
        let url = format!("{}/repos/{full_name}/topics", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream_status(
                status.as_u16(),
                format!("topics lookup failed for {full_name}"),
            ));
        }

        let topics: RepoTopics = response
            .json()
            .await
            .map_err(|e| AppError::upstream_data(format!("malformed topics response: {e}")))?;

        Ok(topics.names)
    }

    async fn github_graphql(&self, query: &str, variables: Value) -> Result<Value, AppError> {
        let token = self.bearer()?;

        let response = self
            .client
            .post(&self.graphql_url)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .bearer_auth(token)
            .json(&json!({"query": query, "variables": variables}))
            .send()
            .await
            .map_err(send_error)?;

        graphql_body(response).await
    }
}

/// A GraphQL call fails on a non-2xx status or a non-empty `errors` array in
/// a 2xx body; the latter must never be reported as success.
async fn graphql_body(response: reqwest::Response) -> Result<Value, AppError> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or_else(|_| json!({}));

    let errors = body
        .get("errors")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .cloned();

    if !status.is_success() || errors.is_some() {
        let message = errors
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("upstream returned status {status}"));

        let details = errors
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|error| error.get("extensions"))
            .cloned();

        return Err(AppError::UpstreamStatus {
            status: if status.is_success() {
                500
            } else {
                status.as_u16()
            },
            message,
            details,
        });
    }

    Ok(body)
}

fn send_error(error: reqwest::Error) -> AppError {
    AppError::Internal(anyhow!("upstream request failed: {error}"))
}
