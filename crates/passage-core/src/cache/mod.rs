//! Local caching module for the persisted session token.
//!
//! This module provides:
//! - `Storage`: a plain string key/value medium (memory, file, OS keychain)
//! - `ExpiringCache`: wraps a `Storage` and attaches an absolute expiry to
//!   every entry, evicting expired entries lazily on read

pub mod expiring;
pub mod storage;

pub use expiring::{expiry_after, CacheEntry, ExpiringCache};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage};
