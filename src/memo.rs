use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;

/// Time source injected into the memo so TTL behavior is deterministic
/// under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Process-lifetime memo: one mutable slot per logical key, valid only while
/// this instance stays warm. No LRU, no cross-process coherence. Entries die
/// by TTL or by being overwritten; a forced refresh also rotates the
/// process-wide asset version so cache-derived assets can be busted.
#[derive(Clone)]
pub struct WarmMemo {
    inner: Arc<RwLock<HashMap<String, MemoEntry>>>,
    asset_version: Arc<RwLock<String>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

struct MemoEntry {
    payload: serde_json::Value,
    expires_at: DateTime<Utc>,
}

impl WarmMemo {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let initial_version = clock.now().timestamp_millis().to_string();
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            asset_version: Arc::new(RwLock::new(initial_version)),
            clock,
            ttl,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut guard = self.inner.write().await;
        let now = self.clock.now();

        if let Some(entry) = guard.get(key) {
            if entry.expires_at <= now {
                guard.remove(key);
                return None;
            }
            return Some(entry.payload.clone());
        }

        None
    }

    pub async fn set(&self, key: &str, payload: serde_json::Value) {
        let now = self.clock.now();
        let ttl = ChronoDuration::from_std(self.ttl)
            .unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 1_000));
        let entry = MemoEntry {
            payload,
            expires_at: now + ttl,
        };

        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), entry);
    }

    pub async fn asset_version(&self) -> String {
        self.asset_version.read().await.clone()
    }

    /// Rotate the asset version. Only explicit refresh requests call this;
    /// TTL expiry must not, so background revalidation never busts
    /// version-keyed client assets.
    pub async fn advance_asset_version(&self) -> String {
        let mut guard = self.asset_version.write().await;
        let current: i64 = guard.parse().unwrap_or(0);
        let next = self.clock.now().timestamp_millis().max(current + 1);
        *guard = next.to_string();
        guard.clone()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, by: ChronoDuration) {
            let mut guard = self.now.lock().unwrap();
            *guard += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn memo_with_clock(ttl_secs: u64) -> (WarmMemo, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(fixed_start()));
        let memo = WarmMemo::new(clock.clone(), Duration::from_secs(ttl_secs));
        (memo, clock)
    }

    #[tokio::test]
    async fn entry_is_served_within_ttl() {
        let (memo, clock) = memo_with_clock(600);
        memo.set("catalog:x", json!({"repos": []})).await;

        clock.advance(ChronoDuration::seconds(599));
        assert_eq!(memo.get("catalog:x").await, Some(json!({"repos": []})));
    }

    #[tokio::test]
    async fn entry_is_never_served_at_or_past_ttl() {
        let (memo, clock) = memo_with_clock(600);
        memo.set("catalog:x", json!({"repos": []})).await;

        clock.advance(ChronoDuration::seconds(600));
        assert_eq!(memo.get("catalog:x").await, None);
    }

    #[tokio::test]
    async fn overwrite_restarts_the_ttl_window() {
        let (memo, clock) = memo_with_clock(600);
        memo.set("k", json!(1)).await;

        clock.advance(ChronoDuration::seconds(500));
        memo.set("k", json!(2)).await;

        clock.advance(ChronoDuration::seconds(500));
        assert_eq!(memo.get("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn keys_hold_independent_slots() {
        let (memo, _clock) = memo_with_clock(600);
        memo.set("calendar:a", json!("a")).await;
        memo.set("calendar:b", json!("b")).await;

        assert_eq!(memo.get("calendar:a").await, Some(json!("a")));
        assert_eq!(memo.get("calendar:b").await, Some(json!("b")));
    }

    #[tokio::test]
    async fn asset_version_advances_monotonically_on_refresh() {
        let (memo, clock) = memo_with_clock(600);
        let v0 = memo.asset_version().await;

        // The clock has not moved, so the rotation must still advance.
        let v1 = memo.advance_asset_version().await;
        assert!(v1.parse::<i64>().unwrap() > v0.parse::<i64>().unwrap());

        clock.advance(ChronoDuration::seconds(30));
        let v2 = memo.advance_asset_version().await;
        assert!(v2.parse::<i64>().unwrap() > v1.parse::<i64>().unwrap());
    }

    #[tokio::test]
    async fn ttl_expiry_does_not_touch_asset_version() {
        let (memo, clock) = memo_with_clock(600);
        memo.set("k", json!(1)).await;
        let before = memo.asset_version().await;

        clock.advance(ChronoDuration::seconds(3600));
        assert_eq!(memo.get("k").await, None);
        assert_eq!(memo.asset_version().await, before);
    }
}
