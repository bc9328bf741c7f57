use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::Storage;

/// A persisted value together with its absolute expiry instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: String,
    #[serde(rename = "expiresAt")]
    pub expires_at_millis: i64,
}

impl CacheEntry {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at_millis: expires_at.timestamp_millis(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_millis)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.expires_at_millis
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// `now + ttl`, saturating at the latest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Key/value cache whose entries carry an absolute expiry.
///
/// Expired entries are never returned and are deleted the next time they are
/// read (or on an explicit [`remove_expired_keys`](Self::remove_expired_keys)).
/// Storage failures never escape: a broken medium behaves like an empty one.
pub struct ExpiringCache<S> {
    storage: S,
}

impl<S: Storage> ExpiringCache<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store `value` under `key` until `expires_at`, replacing any existing entry.
    pub fn set(&self, key: &str, value: &str, expires_at: DateTime<Utc>) {
        let entry = CacheEntry::new(value, expires_at);
        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.storage.set(key, &encoded) {
            warn!(key, error = %e, "Storage unavailable, cache write dropped");
        }
    }

    /// Store `value` under `key` for `ttl` from now. A `ttl` past the end of
    /// representable time stores the entry until the latest instant.
    pub fn set_for(&self, key: &str, value: &str, ttl: Duration) {
        self.set(key, value, expiry_after(Utc::now(), ttl));
    }

    /// Get the value for `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.load(key)?;
        if entry.is_expired() {
            debug!(key, "Cache entry expired, evicting");
            self.remove(key);
            return None;
        }
        Some(entry.value)
    }

    /// The expiry instant recorded for `key`, whether or not it has passed.
    pub fn expiration(&self, key: &str) -> Option<DateTime<Utc>> {
        self.load(key)?.expires_at()
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "Storage unavailable, cache remove dropped");
        }
    }

    /// Sweep the backend and evict every expired entry. Returns how many were removed.
    pub fn remove_expired_keys(&self) -> usize {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Storage unavailable, skipping expiry sweep");
                return 0;
            }
        };

        let now = Utc::now();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = self.load(&key) {
                if entry.is_expired_at(now) {
                    self.remove(&key);
                    removed += 1;
                }
            }
        }
        debug!(removed, "Expiry sweep finished");
        removed
    }

    /// Read and decode the raw entry. Undecodable entries are dropped.
    fn load(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key, error = %e, "Storage unavailable, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Discarding malformed cache entry");
                self.remove(key);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;

    fn cache() -> ExpiringCache<MemoryStorage> {
        ExpiringCache::new(MemoryStorage::new())
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let cache = cache();
        cache.set("k", "v", Utc::now() + Duration::minutes(5));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_set_overwrites_existing_entry() {
        let cache = cache();
        cache.set("k", "old", Utc::now() + Duration::minutes(5));
        cache.set("k", "new", Utc::now() + Duration::minutes(5));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache = cache();
        cache.set("k", "v", Utc::now() - Duration::seconds(1));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.storage().get("k").unwrap(), None);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let cache = cache();
        cache.remove("missing");
        cache.remove("missing");

        cache.set_for("k", "v", Duration::hours(1));
        cache.remove("k");
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_expiration_reports_stored_instant() {
        let cache = cache();
        let expires_at = Utc::now() + Duration::days(7);
        cache.set("k", "v", expires_at);

        let stored = cache.expiration("k").unwrap();
        assert_eq!(stored.timestamp_millis(), expires_at.timestamp_millis());
        assert_eq!(cache.expiration("missing"), None);
    }

    #[test]
    fn test_remove_expired_keys_only_evicts_stale() {
        let cache = cache();
        cache.set("fresh", "1", Utc::now() + Duration::hours(1));
        cache.set("stale_a", "2", Utc::now() - Duration::hours(1));
        cache.set("stale_b", "3", Utc::now() - Duration::minutes(1));

        assert_eq!(cache.remove_expired_keys(), 2);

        let keys = cache.storage().keys().unwrap();
        assert_eq!(keys, vec!["fresh".to_string()]);
        assert_eq!(cache.get("fresh").as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_entry_is_discarded() {
        let cache = cache();
        cache.storage().set("k", "not json").unwrap();

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.storage().get("k").unwrap(), None);
    }

    #[test]
    fn test_unavailable_storage_degrades_silently() {
        let cache = ExpiringCache::new(MemoryStorage::unavailable());
        cache.set_for("k", "v", Duration::hours(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.expiration("k"), None);
        cache.remove("k");
        assert_eq!(cache.remove_expired_keys(), 0);
    }

    #[test]
    fn test_set_for_huge_ttl_saturates() {
        let cache = cache();
        cache.set_for("k", "v", Duration::MAX);

        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(
            cache.expiration("k").unwrap().timestamp_millis(),
            DateTime::<Utc>::MAX_UTC.timestamp_millis()
        );
    }

    #[test]
    fn test_expiry_after_saturates_both_ways() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::days(7)), now + Duration::days(7));
        assert_eq!(expiry_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expiry_after(now, Duration::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_cache_entry_wire_format() {
        let entry = CacheEntry {
            value: "T1".to_string(),
            expires_at_millis: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["value"], "T1");
        assert_eq!(json["expiresAt"], 1_700_000_000_000_i64);
    }
}
