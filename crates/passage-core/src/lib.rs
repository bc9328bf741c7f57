//! Passage core library.
//!
//! Client-side session handling for token-authenticated admin APIs:
//!
//! - [`cache`]: an expiring key/value cache over pluggable storage, used to
//!   keep the session token across restarts
//! - [`api`]: the auth API seam and its HTTP implementation
//! - [`models`]: credentials, profiles, and the normalized role/permission set
//! - [`auth`]: the session manager driving Login -> GetInfo -> Logout
//! - [`config`]: on-disk configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiError, AuthApi, HttpAuthApi};
pub use auth::{
    Greeter, RandomGreeter, SessionError, SessionManager, SessionState, SessionStatus,
    ACCESS_TOKEN_KEY,
};
pub use cache::{ExpiringCache, FileStorage, KeyringStorage, MemoryStorage, Storage};
pub use config::{Config, StorageBackend};
pub use models::{Credentials, Permission, Profile, Role, UserInfo};
