// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! HTTP API handlers for the folio-edge proxy.
//!
//! This module implements the proxy endpoints:
//!
//! - `GET /healthz` - Service health check
//! - `GET /metrics` - Prometheus metrics export
//! - `GET /proxy` - Transparent GitHub REST passthrough
//! - `GET /calendar` - Contribution calendar
//! - `GET /catalog` - Repository catalog with pinned ordering and topics
//! - `GET /readme` - Repository README markdown
//! - `GET /contest` - LeetCode contest stats
//!
//! Shaped endpoints all run the same request pipeline: validate, consult the
//! warm memo, fetch and map on a miss, update the memo, then answer either a
//! bodyless 304 (matching `If-None-Match`) or a 200 with the CDN cache
//! directives for the endpoint's freshness class.

use std::collections::BTreeMap;
use std::future::Future;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::error::AppError;
use crate::fanout;
use crate::mapper;
use crate::memo::WarmMemo;
use crate::metrics::Metrics;
use crate::model::{
    flag_enabled, CalendarPayload, CalendarQuery, CalendarQueryData, CatalogPayload, CatalogQuery,
    CatalogQueryData, ContestQuery, ContestQueryData, PassthroughQuery, ReadmePayload, ReadmeQuery,
    RepositoryRecord,
};
use crate::policy::{self, EndpointClass};
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub memo: WarmMemo,
    pub metrics: Metrics,
    pub upstream: UpstreamClient,
    pub default_login: Option<String>,
    pub max_repos: u32,
    pub max_readmes: usize,
    pub topic_workers: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/proxy", get(handle_passthrough))
        .route("/calendar", get(handle_calendar))
        .route("/catalog", get(handle_catalog))
        .route("/readme", get(handle_readme))
        .route("/contest", get(handle_contest))
        .with_state(state)
}

/// Health check endpoint
pub async fn health() -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "folio-edge",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state.metrics.export()
}

/// Transparent REST passthrough. Conditional revalidation belongs to the
/// upstream: the caller's `If-None-Match` goes up, the upstream's `etag`,
/// rate-limit headers, and 304s come back untouched.
pub async fn handle_passthrough(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PassthroughQuery>,
) -> Result<Response, AppError> {
    let path = query.path.unwrap_or_else(|| "/rate_limit".to_string());
    if !path.starts_with('/') {
        return Err(AppError::bad_request("path must start with '/'"));
    }

    let if_none_match = header_value(&headers, header::IF_NONE_MATCH.as_str());
    let reply = timed_upstream(&state, state.upstream.rest_get(&path, if_none_match)).await?;

    let status =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = if status == StatusCode::NOT_MODIFIED {
        (status, Body::empty()).into_response()
    } else {
        (status, reply.body).into_response()
    };

    let response_headers = response.headers_mut();
    if status != StatusCode::NOT_MODIFIED {
        response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    for (name, value) in &reply.forwarded {
        if let Ok(value) = HeaderValue::from_str(value) {
            response_headers.insert(*name, value);
        }
    }
    let cache_control = EndpointClass::Passthrough.directive().header_value();
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(&cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache")),
    );

    Ok(response)
}

/// Contribution calendar for a login over a clamped day window.
pub async fn handle_calendar(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CalendarQuery>,
) -> Result<Response, AppError> {
    let Some(login) = non_empty(query.login) else {
        return Err(AppError::bad_request("login query parameter is required"));
    };
    let debug = flag_enabled(query.debug.as_deref());
    let days = mapper::clamp_days(query.days.as_deref());

    let memo_key = format!("calendar:{login}:{days}:{}", debug_suffix(debug));
    let if_none_match = header_value(&headers, header::IF_NONE_MATCH.as_str()).map(str::to_owned);

    let fetch_state = state.clone();
    serve_shaped(
        &state,
        EndpointClass::Signal,
        memo_key,
        false,
        if_none_match.as_deref(),
        move || async move {
            let now = fetch_state.memo.now();
            let (from, to) = mapper::calendar_window(now, days);

            let raw = timed_upstream(
                &fetch_state,
                fetch_state.upstream.contribution_calendar(&login, from, to),
            )
            .await?;

            let payload = match mapper::parse_graphql_data::<CalendarQueryData>(&raw, "calendar") {
                Ok(data) => calendar_payload(data, debug),
                // Soft failure: an unreadable body must not break the
                // dashboard, but it must stay visible as a warning.
                Err(error) if error.is_data_error() => CalendarPayload {
                    total: 0,
                    weeks: Vec::new(),
                    warning: Some(error.to_string()),
                    rate_limit: None,
                },
                Err(error) => return Err(error),
            };

            let mut value = serde_json::to_value(payload)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize calendar: {e}")))?;
            if debug {
                value["_debug"] = raw;
            }
            stamp_fetched_at(&mut value, now);
            Ok(value)
        },
    )
    .await
}

fn calendar_payload(data: CalendarQueryData, debug: bool) -> CalendarPayload {
    match data.user {
        Some(user) => {
            let calendar = user.contributions.calendar;
            let warning = (calendar.total_contributions == 0 && calendar.weeks.is_empty())
                .then(|| "calendar is empty; check the token's permissions".to_string());
            CalendarPayload {
                total: calendar.total_contributions,
                weeks: calendar.weeks,
                warning,
                rate_limit: debug.then_some(data.rate_limit).flatten(),
            }
        }
        // A null user node means "not found or the token lacks GraphQL
        // scope"; zeroing it without a warning would hide a real problem.
        None => CalendarPayload {
            total: 0,
            weeks: Vec::new(),
            warning: Some(
                "GitHub returned a null user; the login may not exist or the token may lack \
                 GraphQL access"
                    .to_string(),
            ),
            rate_limit: debug.then_some(data.rate_limit).flatten(),
        },
    }
}

/// Repository catalog: pinned-first ordering, per-repository topics via the
/// bounded fan-out, optional README sweep.
pub async fn handle_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CatalogQuery>,
) -> Result<Response, AppError> {
    let Some(user) = non_empty(query.user).or_else(|| state.default_login.clone()) else {
        return Err(AppError::bad_request("user query parameter is required"));
    };
    let refresh = flag_enabled(query.refresh.as_deref());
    let with_readmes = flag_enabled(query.with_readmes.as_deref());

    if refresh {
        let version = state.memo.advance_asset_version().await;
        tracing::info!(%user, %version, "forced refresh, asset version rotated");
    }

    let memo_key = format!(
        "catalog:{user}:{}:{}",
        state.max_repos,
        if with_readmes { "R" } else { "" }
    );
    let if_none_match = header_value(&headers, header::IF_NONE_MATCH.as_str()).map(str::to_owned);

    let fetch_state = state.clone();
    serve_shaped(
        &state,
        EndpointClass::Catalog,
        memo_key,
        refresh,
        if_none_match.as_deref(),
        move || async move {
            let now = fetch_state.memo.now();
            let raw = timed_upstream(
                &fetch_state,
                fetch_state
                    .upstream
                    .repository_catalog(&user, fetch_state.max_repos),
            )
            .await?;

            let data: CatalogQueryData = mapper::parse_graphql_data(&raw, "catalog")?;
            let Some(user_node) = data.user else {
                return Err(AppError::upstream_data(
                    "catalog query returned a null user",
                ));
            };

            let pinned: Vec<String> = user_node
                .pinned_items
                .nodes
                .iter()
                .map(|node| node.name_with_owner.to_lowercase())
                .collect();
            let repos: Vec<RepositoryRecord> = user_node
                .repositories
                .nodes
                .into_iter()
                .map(mapper::map_repo)
                .collect();

            let repos = attach_topics(&fetch_state, repos).await;
            let repos = mapper::order_catalog(repos, &pinned);

            let readmes = if with_readmes {
                Some(fetch_readmes(&fetch_state, &pinned, &repos).await)
            } else {
                None
            };

            let payload = CatalogPayload {
                user,
                fetched_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                asset_version: fetch_state.memo.asset_version().await,
                repos,
                pinned,
                readmes,
            };

            serde_json::to_value(payload)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize catalog: {e}")))
        },
    )
    .await
}

/// Topics fan-out: one bounded pool over every repository; a failed lookup
/// leaves that repository's topic set empty and the rest intact.
async fn attach_topics(
    state: &AppState,
    mut repos: Vec<RepositoryRecord>,
) -> Vec<RepositoryRecord> {
    let full_names: Vec<String> = repos.iter().map(|r| r.full_name.clone()).collect();
    let upstream = state.upstream.clone();

    let topics = fanout::map_bounded(full_names, state.topic_workers, move |full_name| {
        let upstream = upstream.clone();
        async move {
            match upstream.repo_topics(&full_name).await {
                Ok(names) => names,
                Err(error) => {
                    tracing::warn!(%full_name, %error, "topics lookup failed");
                    Vec::new()
                }
            }
        }
    })
    .await;

    for (repo, names) in repos.iter_mut().zip(topics) {
        repo.topics = names;
    }
    repos
}

/// README sweep for `with_readmes=1`: pinned repositories first, then the
/// top of the catalog, capped and deduplicated. Failures read as "".
async fn fetch_readmes(
    state: &AppState,
    pinned: &[String],
    repos: &[RepositoryRecord],
) -> BTreeMap<String, String> {
    let mut preferred: Vec<String> = Vec::new();
    for name in pinned
        .iter()
        .cloned()
        .chain(repos.iter().map(|r| r.full_name.to_lowercase()))
    {
        if preferred.len() >= state.max_readmes {
            break;
        }
        if !preferred.contains(&name) {
            preferred.push(name);
        }
    }

    let upstream = state.upstream.clone();
    let contents = fanout::map_bounded(preferred.clone(), state.topic_workers, move |full_name| {
        let upstream = upstream.clone();
        async move {
            let Some((owner, repo)) = full_name.split_once('/') else {
                return String::new();
            };
            match upstream.readme_markdown(owner, repo).await {
                Ok(markdown) => markdown,
                Err(error) => {
                    tracing::warn!(%full_name, %error, "readme fetch failed");
                    String::new()
                }
            }
        }
    })
    .await;

    preferred.into_iter().zip(contents).collect()
}

/// README markdown for one repository.
pub async fn handle_readme(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadmeQuery>,
) -> Result<Response, AppError> {
    let (Some(owner), Some(repo)) = (non_empty(query.owner), non_empty(query.repo)) else {
        return Err(AppError::bad_request(
            "owner and repo query parameters are required",
        ));
    };

    let memo_key = format!("readme:{owner}/{repo}");
    let if_none_match = header_value(&headers, header::IF_NONE_MATCH.as_str()).map(str::to_owned);

    let fetch_state = state.clone();
    serve_shaped(
        &state,
        EndpointClass::Readme,
        memo_key,
        false,
        if_none_match.as_deref(),
        move || async move {
            let markdown = timed_upstream(
                &fetch_state,
                fetch_state.upstream.readme_markdown(&owner, &repo),
            )
            .await?;

            serde_json::to_value(ReadmePayload { markdown })
                .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize readme: {e}")))
        },
    )
    .await
}

/// LeetCode contest stats for a handle.
pub async fn handle_contest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ContestQuery>,
) -> Result<Response, AppError> {
    let Some(user) = non_empty(query.user) else {
        return Err(AppError::bad_request("user query parameter is required"));
    };
    let debug = flag_enabled(query.debug.as_deref());

    let memo_key = format!("contest:{user}:{}", debug_suffix(debug));
    let if_none_match = header_value(&headers, header::IF_NONE_MATCH.as_str()).map(str::to_owned);

    let fetch_state = state.clone();
    serve_shaped(
        &state,
        EndpointClass::Signal,
        memo_key,
        false,
        if_none_match.as_deref(),
        move || async move {
            let now = fetch_state.memo.now();
            let raw = timed_upstream(&fetch_state, fetch_state.upstream.contest_ranking(&user))
                .await?;

            let mut value = match mapper::parse_graphql_data::<ContestQueryData>(&raw, "contest") {
                Ok(data) => {
                    let stats = mapper::map_contest(data, now);
                    serde_json::to_value(stats)
                        .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize contest: {e}")))?
                }
                Err(error) if error.is_data_error() => json!({
                    "rating": 0,
                    "globalRanking": null,
                    "attended": 0,
                    "topPercentage": null,
                    "history": [],
                    "warning": error.to_string(),
                }),
                Err(error) => return Err(error),
            };

            if debug {
                value["_debug"] = raw;
            }
            stamp_fetched_at(&mut value, now);
            Ok(value)
        },
    )
    .await
}

/// Shared pipeline for the shaped endpoints: memo check (skipped under a
/// forced refresh), fetch-and-store on miss, then conditional response.
async fn serve_shaped<F, Fut>(
    state: &AppState,
    class: EndpointClass,
    memo_key: String,
    refresh: bool,
    if_none_match: Option<&str>,
    fetch: F,
) -> Result<Response, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    let memoized = if refresh {
        None
    } else {
        state.memo.get(&memo_key).await
    };

    let payload = match memoized {
        Some(hit) => {
            state.metrics.record_memo_hit();
            tracing::debug!(key = %memo_key, "served from warm memo");
            hit
        }
        None => {
            state.metrics.record_memo_miss();
            let fresh = fetch().await?;
            state.memo.set(&memo_key, fresh.clone()).await;
            state.metrics.record_memo_store();
            fresh
        }
    };

    let etag = policy::response_etag(&payload);
    let cache_control = class.directive().header_value();

    if policy::if_none_match_matches(if_none_match, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [
                (header::CACHE_CONTROL, cache_control),
                (header::ETAG, etag),
            ],
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, cache_control),
            (header::ETAG, etag),
        ],
        Json(payload),
    )
        .into_response())
}

/// Record one upstream call: request count, latency, failure count.
async fn timed_upstream<T>(
    state: &AppState,
    call: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    state.metrics.record_upstream_request();
    let start = Instant::now();

    let result = call.await;

    state
        .metrics
        .record_upstream_latency(start.elapsed().as_secs_f64());
    if result.is_err() {
        state.metrics.record_upstream_failure();
    }
    result
}

fn stamp_fetched_at(value: &mut Value, now: DateTime<Utc>) {
    if let Value::Object(map) = value {
        map.insert("_fetched_at".to_string(), json!(now.timestamp_millis()));
    }
}

fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn debug_suffix(debug: bool) -> &'static str {
    if debug {
        "dbg"
    } else {
        ""
    }
}
