// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Freshness policy: CDN cache directives and conditional-request tokens.
//!
//! Each endpoint class gets a three-part `Cache-Control` directive
//! (`s-maxage`, `stale-while-revalidate`, `stale-if-error`) and, for shaped
//! JSON responses, a content-derived ETag used to answer `If-None-Match`
//! revalidation with a bodyless 304.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Caching class of a logical endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Transparent REST passthrough; revalidation is the upstream's business.
    Passthrough,
    /// Contribution calendar and contest stats: nice to have fresh, fine to
    /// show old.
    Signal,
    /// Repository catalog: changes rarely, cached for hours.
    Catalog,
    /// README content: changes only on repository edits.
    Readme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDirective {
    pub cdn_max_age: u64,
    pub stale_while_revalidate: u64,
    pub stale_if_error: u64,
}

impl EndpointClass {
    pub fn directive(self) -> CacheDirective {
        match self {
            EndpointClass::Passthrough => CacheDirective {
                cdn_max_age: 60,
                stale_while_revalidate: 300,
                stale_if_error: 600,
            },
            EndpointClass::Signal => CacheDirective {
                cdn_max_age: 600,
                stale_while_revalidate: 3_600,
                stale_if_error: 86_400,
            },
            EndpointClass::Catalog | EndpointClass::Readme => CacheDirective {
                cdn_max_age: 21_600,
                stale_while_revalidate: 86_400,
                stale_if_error: 172_800,
            },
        }
    }
}

impl CacheDirective {
    pub fn header_value(&self) -> String {
        format!(
            "s-maxage={}, stale-while-revalidate={}, stale-if-error={}",
            self.cdn_max_age, self.stale_while_revalidate, self.stale_if_error
        )
    }
}

/// ETag for a shaped JSON response: sha-256 of the payload with volatile
/// top-level metadata (`_fetched_at`, `_debug`) removed, so refetching
/// unchanged data keeps the token stable across memo generations.
pub fn response_etag(payload: &Value) -> String {
    let canonical = match payload {
        Value::Object(map) => {
            let stable: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(stable)
        }
        other => other.clone(),
    };

    let serialized = canonical.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    format!("\"{}\"", hex::encode(digest))
}

/// RFC 7232 If-None-Match: a comma-separated list of entity tags, or `*`.
/// Weak comparison is enough for revalidating a cached body.
pub fn if_none_match_matches(header: Option<&str>, etag: &str) -> bool {
    let Some(header) = header else {
        return false;
    };

    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || candidate == etag
            || candidate.strip_prefix("W/") == Some(etag)
    })
}
