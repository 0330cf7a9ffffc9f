// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Pure mapping from upstream payloads to the stable output schema.
//!
//! Benignly-optional fields (homepage, description, language, topics) default
//! to empty values; absent required fields surface as upstream data errors
//! instead of being silently zeroed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{ContestPoint, ContestQueryData, ContestStats, RepoNode, RepositoryRecord};

const DAY_MS: i64 = 24 * 60 * 60 * 1_000;

/// Deserialize the `data` block of a GraphQL response into a typed shape.
/// Serde's error carries the offending field path.
pub fn parse_graphql_data<T: DeserializeOwned>(response: &Value, what: &str) -> Result<T, AppError> {
    let data = response.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data)
        .map_err(|e| AppError::upstream_data(format!("malformed {what} response: {e}")))
}

/// Clamp the requested window into [1, 365]; anything unparsable means the
/// default full year.
pub fn clamp_days(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(365)
        .clamp(1, 365)
}

/// Inclusive UTC window of exactly `days` calendar days ending at
/// 23:59:59.999 of the current day.
pub fn calendar_window(now: DateTime<Utc>, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let to = today
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("valid end of day")
        .and_utc();
    let from = (today - Duration::days(days - 1))
        .and_hms_opt(0, 0, 0)
        .expect("valid start of day")
        .and_utc();
    (from, to)
}

pub fn map_repo(node: RepoNode) -> RepositoryRecord {
    RepositoryRecord {
        id: node.id,
        name: node.name,
        full_name: node.name_with_owner,
        html_url: node.url,
        homepage: node.homepage_url.unwrap_or_default(),
        description: node.description.unwrap_or_default(),
        language: node.primary_language.map(|l| l.name).unwrap_or_default(),
        stargazers_count: node.stargazer_count,
        owner: node.owner.map(|o| o.login).unwrap_or_default(),
        topics: Vec::new(),
    }
}

/// Catalog output ordering: pinned repositories first, in the pinned list's
/// own order, then everything else by descending star count. Pinned names
/// that have no matching repository are skipped.
pub fn order_catalog(repos: Vec<RepositoryRecord>, pinned: &[String]) -> Vec<RepositoryRecord> {
    let mut slots: Vec<Option<RepositoryRecord>> = repos.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());

    for name in pinned {
        let taken = slots
            .iter_mut()
            .find(|slot| {
                slot.as_ref()
                    .is_some_and(|repo| repo.full_name.eq_ignore_ascii_case(name))
            })
            .and_then(Option::take);
        if let Some(repo) = taken {
            ordered.push(repo);
        }
    }

    let mut rest: Vec<RepositoryRecord> = slots.into_iter().flatten().collect();
    rest.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    ordered.extend(rest);
    ordered
}

/// Decode a base64 README body. The encoded form embeds newlines which must
/// be stripped before decoding; the decoded bytes are read as UTF-8.
pub fn decode_readme(content: &str) -> Result<String, AppError> {
    let compact: String = content.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| AppError::upstream_data(format!("readme content is not valid base64: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Shape the contest ranking response. `history` keeps the last 365 days in
/// chronological order; `attended` and the ranking fallback still consider
/// the full history.
pub fn map_contest(data: ContestQueryData, now: DateTime<Utc>) -> ContestStats {
    let mut all: Vec<ContestPoint> = data
        .history
        .into_iter()
        .filter_map(|entry| {
            let rating = entry.rating?;
            let contest = entry.contest?;
            let start_time = contest.start_time?;
            Some(ContestPoint {
                ts: start_time * 1_000,
                rating,
                ranking: entry.ranking,
                title: contest.title.unwrap_or_default(),
            })
        })
        .collect();
    all.sort_by_key(|point| point.ts);

    let cutoff = now.timestamp_millis() - 365 * DAY_MS;
    let history: Vec<ContestPoint> = all.iter().filter(|p| p.ts >= cutoff).cloned().collect();
    let latest_ranked = all.iter().rev().find_map(|p| p.ranking);

    match data.ranking {
        Some(ranking) => ContestStats {
            rating: ranking.rating.unwrap_or(0.0),
            global_ranking: ranking.global_ranking.or(latest_ranked),
            attended: ranking.attended_contests_count.unwrap_or(all.len()),
            top_percentage: ranking.top_percentage,
            history,
        },
        None => ContestStats {
            rating: 0.0,
            global_ranking: latest_ranked,
            attended: all.len(),
            top_percentage: None,
            history,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(full_name: &str, stars: u64) -> RepositoryRecord {
        RepositoryRecord {
            id: full_name.to_string(),
            name: full_name.split('/').next_back().unwrap_or_default().to_string(),
            full_name: full_name.to_string(),
            html_url: format!("https://github.com/{full_name}"),
            homepage: String::new(),
            description: String::new(),
            language: String::new(),
            stargazers_count: stars,
            owner: String::new(),
            topics: Vec::new(),
        }
    }

    #[test]
    fn window_spans_exactly_the_requested_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap();
        for days in [1, 2, 30, 364, 365] {
            let (from, to) = calendar_window(now, days);
            assert_eq!(to.date_naive(), now.date_naive());
            assert_eq!(to.time().to_string(), "23:59:59.999");
            assert_eq!(from.time().to_string(), "00:00:00");
            let span = (to.date_naive() - from.date_naive()).num_days() + 1;
            assert_eq!(span, days, "window for days={days}");
        }
    }

    #[test]
    fn days_parameter_clamps_and_defaults() {
        assert_eq!(clamp_days(None), 365);
        assert_eq!(clamp_days(Some("")), 365);
        assert_eq!(clamp_days(Some("not-a-number")), 365);
        assert_eq!(clamp_days(Some("0")), 1);
        assert_eq!(clamp_days(Some("-5")), 1);
        assert_eq!(clamp_days(Some("90")), 90);
        assert_eq!(clamp_days(Some("9999")), 365);
    }

    #[test]
    fn readme_round_trips_utf8_through_wrapped_base64() {
        let original = "# Héllo\n\nRust ❤ proxies — with unicode.\n";
        let encoded = BASE64.encode(original.as_bytes());
        // GitHub wraps encoded content in newlines.
        let wrapped: String = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned() + "\n")
            .collect();

        assert_eq!(decode_readme(&wrapped).unwrap(), original);
    }

    #[test]
    fn readme_rejects_garbage_base64() {
        assert!(decode_readme("!!not base64!!").is_err());
    }

    #[test]
    fn repo_mapping_defaults_benign_fields() {
        let node: RepoNode = serde_json::from_value(json!({
            "id": "R_1",
            "name": "proxy",
            "nameWithOwner": "acme/proxy",
            "url": "https://github.com/acme/proxy"
        }))
        .unwrap();

        let repo = map_repo(node);
        assert_eq!(repo.full_name, "acme/proxy");
        assert_eq!(repo.homepage, "");
        assert_eq!(repo.description, "");
        assert_eq!(repo.language, "");
        assert_eq!(repo.owner, "");
        assert_eq!(repo.stargazers_count, 0);
        assert!(repo.topics.is_empty());
    }

    #[test]
    fn missing_required_repo_fields_are_a_data_error() {
        let result: Result<crate::model::CatalogQueryData, _> = parse_graphql_data(
            &json!({"data": {"user": {"repositories": {"nodes": [{"name": "x"}]}}}}),
            "catalog",
        );
        assert!(result.is_err());
    }

    #[test]
    fn catalog_orders_pinned_first_then_stars_descending() {
        let repos = vec![
            record("acme/low", 1),
            record("acme/Pinned-B", 3),
            record("acme/high", 90),
            record("acme/pinned-a", 2),
            record("acme/mid", 40),
        ];
        let pinned = vec!["acme/pinned-a".to_string(), "acme/pinned-b".to_string()];

        let ordered = order_catalog(repos, &pinned);
        let names: Vec<&str> = ordered.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "acme/pinned-a",
                "acme/Pinned-B",
                "acme/high",
                "acme/mid",
                "acme/low"
            ]
        );
    }

    #[test]
    fn catalog_skips_pinned_names_without_a_repo() {
        let repos = vec![record("acme/only", 5)];
        let pinned = vec!["acme/ghost".to_string(), "acme/only".to_string()];

        let ordered = order_catalog(repos, &pinned);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].full_name, "acme/only");
    }

    fn contest_data(json: Value) -> ContestQueryData {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn contest_history_truncates_to_a_year_but_attended_counts_everything() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let recent = now.timestamp() - 10 * 24 * 3600;
        let ancient = now.timestamp() - 400 * 24 * 3600;

        let stats = map_contest(
            contest_data(json!({
                "userContestRanking": null,
                "userContestRankingHistory": [
                    {"rating": 1500.0, "ranking": 900, "contest": {"title": "Old", "startTime": ancient}},
                    {"rating": 1600.0, "ranking": 700, "contest": {"title": "New", "startTime": recent}}
                ]
            })),
            now,
        );

        assert_eq!(stats.attended, 2);
        assert_eq!(stats.history.len(), 1);
        assert_eq!(stats.history[0].title, "New");
        // Null ranking node falls back to the latest ranked entry.
        assert_eq!(stats.global_ranking, Some(700));
        assert_eq!(stats.rating, 0.0);
    }

    #[test]
    fn contest_history_is_chronological_and_skips_unrated_entries() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let t1 = now.timestamp() - 30 * 24 * 3600;
        let t2 = now.timestamp() - 5 * 24 * 3600;

        let stats = map_contest(
            contest_data(json!({
                "userContestRanking": {
                    "rating": 1710.5,
                    "globalRanking": 1234,
                    "attendedContestsCount": 9,
                    "topPercentage": 4.2
                },
                "userContestRankingHistory": [
                    {"rating": 1700.0, "ranking": 500, "contest": {"title": "Later", "startTime": t2}},
                    {"rating": null, "ranking": null, "contest": {"title": "Unrated", "startTime": t2}},
                    {"rating": 1650.0, "ranking": 800, "contest": {"title": "Earlier", "startTime": t1}}
                ]
            })),
            now,
        );

        assert_eq!(stats.rating, 1710.5);
        assert_eq!(stats.global_ranking, Some(1234));
        assert_eq!(stats.attended, 9);
        assert_eq!(stats.top_percentage, Some(4.2));
        let titles: Vec<&str> = stats.history.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Earlier", "Later"]);
    }
}
