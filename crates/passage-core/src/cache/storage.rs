//! Plain key/value storage backends wrapped by the expiring cache.
//!
//! A backend only knows how to get, set and remove strings. Expiry is layered
//! on top by [`ExpiringCache`](super::ExpiringCache), so backends stay dumb.

use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use tracing::warn;

/// Storage file name in cache directory
const STORAGE_FILE: &str = "storage.json";

/// A synchronous string key/value medium.
///
/// Every method may fail when the medium is unavailable (disabled, locked,
/// unwritable). Callers decide how to degrade.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a key that does not exist is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently known to the backend.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-process storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    unavailable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose every operation fails, like a medium disabled by the host.
    pub fn unavailable() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        if self.unavailable {
            return Err(anyhow!("Memory storage is unavailable"));
        }
        self.entries
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }
}

// ============================================================================
// File
// ============================================================================

/// Storage persisted as a single JSON object on disk.
///
/// The whole file is read and rewritten on every mutation; it only ever holds
/// a handful of entries.
pub struct FileStorage {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            lock: Mutex::new(()),
        }
    }

    fn storage_path(&self) -> PathBuf {
        self.cache_dir.join(STORAGE_FILE)
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read storage file")?;
        serde_json::from_str(&contents).context("Failed to parse storage file")
    }

    /// Entries to rewrite on mutation. An unreadable file is replaced rather
    /// than blocking every later write.
    fn read_for_update(&self) -> HashMap<String, String> {
        self.read_all().unwrap_or_else(|e| {
            warn!(path = ?self.storage_path(), error = %e, "Discarding unreadable storage file");
            HashMap::new()
        })
    }

    /// Write via a temp file and rename so readers never see a partial file.
    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let path = self.storage_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents).context("Failed to write storage file")?;
        std::fs::rename(&tmp_path, &path).context("Failed to replace storage file")?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("File storage lock poisoned"))?;
        f()
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_lock(|| Ok(self.read_all()?.remove(key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_lock(|| {
            let mut entries = self.read_for_update();
            entries.insert(key.to_string(), value.to_string());
            self.write_all(&entries)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_lock(|| match self.read_all() {
            Ok(mut entries) => {
                if entries.remove(key).is_some() {
                    self.write_all(&entries)?;
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable storage file");
                self.write_all(&HashMap::new())
            }
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_lock(|| Ok(self.read_all()?.into_keys().collect()))
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// Storage backed by the OS keychain, one credential per key.
///
/// Entries are created once per key and reused, so every call for a key goes
/// through the same credential. The keychain cannot be enumerated: `keys`
/// only reports keys seen through this instance, which makes expiry sweeps
/// ineffective across restarts (lazy eviction on read still applies).
pub struct KeyringStorage {
    service: String,
    entries: Mutex<BTreeMap<String, Entry>>,
    present: Mutex<BTreeSet<String>>,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(BTreeMap::new()),
            present: Mutex::new(BTreeSet::new()),
        }
    }

    fn with_entry<T>(&self, key: &str, f: impl FnOnce(&Entry) -> Result<T>) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Keyring entry lock poisoned"))?;
        let entry = match entries.entry(key.to_string()) {
            btree_map::Entry::Occupied(slot) => slot.into_mut(),
            btree_map::Entry::Vacant(slot) => slot.insert(
                Entry::new(&self.service, key).context("Failed to create keyring entry")?,
            ),
        };
        f(entry)
    }

    fn track(&self, key: &str, present: bool) {
        if let Ok(mut keys) = self.present.lock() {
            if present {
                keys.insert(key.to_string());
            } else {
                keys.remove(key);
            }
        }
    }
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read value from keychain"),
        })?;
        self.track(key, value.is_some());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entry(key, |entry| {
            entry
                .set_password(value)
                .context("Failed to store value in keychain")
        })?;
        self.track(key, true);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        })?;
        self.track(key, false);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let keys = self
            .present
            .lock()
            .map_err(|_| anyhow!("Keyring key index lock poisoned"))?;
        Ok(keys.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "passage-storage-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
        // Removing again is fine
        storage.remove("a").unwrap();
    }

    #[test]
    fn test_memory_storage_unavailable_errors() {
        let storage = MemoryStorage::unavailable();
        assert!(storage.get("a").is_err());
        assert!(storage.set("a", "1").is_err());
        assert!(storage.remove("a").is_err());
        assert!(storage.keys().is_err());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = temp_dir("persist");
        {
            let storage = FileStorage::new(dir.clone());
            storage.set("token", "abc").unwrap();
            storage.set("other", "xyz").unwrap();
        }

        let storage = FileStorage::new(dir.clone());
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc"));

        let mut keys = storage.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["other".to_string(), "token".to_string()]);

        storage.remove("token").unwrap();
        assert_eq!(storage.get("token").unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let dir = temp_dir("missing");
        let storage = FileStorage::new(dir);
        assert_eq!(storage.get("anything").unwrap(), None);
        assert!(storage.keys().unwrap().is_empty());
        storage.remove("anything").unwrap();
    }

    #[test]
    fn test_file_storage_recovers_from_corrupt_file() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(STORAGE_FILE), "{ truncated").unwrap();

        let storage = FileStorage::new(dir.clone());
        assert!(storage.get("k").is_err());

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        assert!(!dir.join("storage.json.tmp").exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_storage_remove_clears_corrupt_file() {
        let dir = temp_dir("corrupt-remove");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(STORAGE_FILE), "not json").unwrap();

        let storage = FileStorage::new(dir.clone());
        storage.remove("k").unwrap();
        assert!(storage.keys().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_keyring_storage_round_trip() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

        let storage = KeyringStorage::new("passage-test");
        assert_eq!(storage.get("Access-Token").unwrap(), None);

        storage.set("Access-Token", "T1").unwrap();
        assert_eq!(storage.get("Access-Token").unwrap().as_deref(), Some("T1"));
        assert_eq!(storage.keys().unwrap(), vec!["Access-Token".to_string()]);

        storage.remove("Access-Token").unwrap();
        assert_eq!(storage.get("Access-Token").unwrap(), None);
        assert!(storage.keys().unwrap().is_empty());
        storage.remove("Access-Token").unwrap();
    }
}
