// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Data models for the proxy layer.
//!
//! Inbound query shapes, the stable response payloads served to the
//! front-end, and the upstream GraphQL/REST shapes they are mapped from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound queries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PassthroughQuery {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub days: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub with_readmes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadmeQuery {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContestQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
}

/// Flag parameters arrive as strings; only a literal `"1"` enables them.
pub fn flag_enabled(value: Option<&str>) -> bool {
    value == Some("1")
}

// ---------------------------------------------------------------------------
// Stable response payloads
// ---------------------------------------------------------------------------

/// One calendar week as served to the front-end, shape-compatible with the
/// GraphQL contribution calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarWeek {
    #[serde(rename = "firstDay")]
    pub first_day: String,
    #[serde(rename = "contributionDays")]
    pub contribution_days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub weekday: u8,
    #[serde(rename = "contributionCount")]
    pub contribution_count: u64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarPayload {
    pub total: u64,
    pub weeks: Vec<CalendarWeek>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(rename = "rateLimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<serde_json::Value>,
}

/// A repository as served in the catalog, REST-style field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub homepage: String,
    pub description: String,
    pub language: String,
    pub stargazers_count: u64,
    pub owner: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPayload {
    pub user: String,
    pub fetched_at: String,
    pub asset_version: String,
    pub repos: Vec<RepositoryRecord>,
    /// Lower-cased `full_name`s of the pinned repositories, pin order.
    pub pinned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readmes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadmePayload {
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestStats {
    pub rating: f64,
    #[serde(rename = "globalRanking")]
    pub global_ranking: Option<i64>,
    pub attended: usize,
    #[serde(rename = "topPercentage")]
    pub top_percentage: Option<f64>,
    pub history: Vec<ContestPoint>,
}

/// One rated contest, millisecond timestamp, chronological in `history`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestPoint {
    pub ts: i64,
    pub rating: f64,
    pub ranking: Option<i64>,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Upstream shapes
// ---------------------------------------------------------------------------

/// `data` block of the contribution calendar GraphQL query.
#[derive(Debug, Deserialize)]
pub struct CalendarQueryData {
    pub user: Option<CalendarUser>,
    #[serde(rename = "rateLimit", default)]
    pub rate_limit: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarUser {
    #[serde(rename = "contributionsCollection")]
    pub contributions: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
pub struct ContributionsCollection {
    #[serde(rename = "contributionCalendar")]
    pub calendar: ContributionCalendar,
}

#[derive(Debug, Deserialize)]
pub struct ContributionCalendar {
    #[serde(rename = "totalContributions")]
    pub total_contributions: u64,
    #[serde(default)]
    pub weeks: Vec<CalendarWeek>,
}

/// `data` block of the repository catalog GraphQL query.
#[derive(Debug, Deserialize)]
pub struct CatalogQueryData {
    pub user: Option<CatalogUser>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogUser {
    #[serde(rename = "pinnedItems", default)]
    pub pinned_items: NodeList<RepoNode>,
    #[serde(default)]
    pub repositories: NodeList<RepoNode>,
}

#[derive(Debug, Deserialize)]
pub struct NodeList<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// Repository node from GraphQL. `id`, `name`, and `nameWithOwner` are
/// required; the rest default benignly per the output schema.
#[derive(Debug, Deserialize)]
pub struct RepoNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "nameWithOwner")]
    pub name_with_owner: String,
    pub url: String,
    #[serde(rename = "homepageUrl", default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "stargazerCount", default)]
    pub stargazer_count: u64,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(rename = "primaryLanguage", default)]
    pub primary_language: Option<NamedNode>,
}

#[derive(Debug, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedNode {
    pub name: String,
}

/// `data` block of the LeetCode contest ranking query.
#[derive(Debug, Deserialize)]
pub struct ContestQueryData {
    #[serde(rename = "userContestRanking", default)]
    pub ranking: Option<ContestRankingNode>,
    #[serde(rename = "userContestRankingHistory", default)]
    pub history: Vec<ContestHistoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct ContestRankingNode {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "globalRanking", default)]
    pub global_ranking: Option<i64>,
    #[serde(rename = "attendedContestsCount", default)]
    pub attended_contests_count: Option<usize>,
    #[serde(rename = "topPercentage", default)]
    pub top_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ContestHistoryNode {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub ranking: Option<i64>,
    #[serde(default)]
    pub contest: Option<ContestNode>,
}

#[derive(Debug, Deserialize)]
pub struct ContestNode {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<i64>,
}

/// Body of the REST `/repos/{owner}/{repo}/readme` endpoint; only the
/// base64 content matters here.
#[derive(Debug, Deserialize)]
pub struct ReadmeMetadata {
    #[serde(default)]
    pub content: Option<String>,
}

/// Body of the REST `/repos/{owner}/{repo}/topics` endpoint.
#[derive(Debug, Deserialize)]
pub struct RepoTopics {
    #[serde(default)]
    pub names: Vec<String>,
}
