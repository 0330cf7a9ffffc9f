use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub memo_ttl: Duration,
    pub topic_workers: usize,
    pub github_token: Option<String>,
    pub default_login: Option<String>,
    pub max_repos: u32,
    pub max_readmes: usize,
    pub github_api_base: String,
    pub github_graphql_url: String,
    pub github_raw_base: String,
    pub leetcode_graphql_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let listen_addr: SocketAddr = env::var("FOLIO_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("invalid FOLIO_ADDR")?;

        let memo_ttl = parse_duration("FOLIO_MEMO_TTL", 600)?;
        let topic_workers = parse_usize("FOLIO_TOPIC_WORKERS", 8)?;
        let max_repos = parse_usize("MAX_REPOS", 100)? as u32;
        let max_readmes = parse_usize("MAX_READMES", 30)?;

        let github_token = non_empty(env::var("GH_TOKEN").ok());
        let default_login = non_empty(env::var("GH_USER").ok());

        Ok(Self {
            listen_addr,
            memo_ttl,
            topic_workers,
            github_token,
            default_login,
            max_repos,
            max_readmes,
            github_api_base: base_url("FOLIO_GITHUB_API", "https://api.github.com"),
            github_graphql_url: base_url("FOLIO_GITHUB_GRAPHQL", "https://api.github.com/graphql"),
            github_raw_base: base_url("FOLIO_GITHUB_RAW", "https://raw.githubusercontent.com"),
            leetcode_graphql_url: base_url("FOLIO_LEETCODE_GRAPHQL", "https://leetcode.com/graphql"),
        })
    }
}

fn parse_duration(env_key: &str, default_secs: u64) -> Result<Duration> {
    let raw = env::var(env_key).unwrap_or_else(|_| default_secs.to_string());
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{env_key} must be an integer number of seconds"))?;

    Ok(Duration::from_secs(secs))
}

fn parse_usize(env_key: &str, default: usize) -> Result<usize> {
    let raw = env::var(env_key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .with_context(|| format!("{env_key} must be a non-negative integer"))
}

fn base_url(env_key: &str, default: &str) -> String {
    let raw = env::var(env_key).unwrap_or_else(|_| default.to_string());
    raw.trim_end_matches('/').to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
