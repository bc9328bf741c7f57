//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: the Login -> GetInfo -> Logout lifecycle
//! - `SessionState`: the in-memory session, published on every change
//! - `Greeter`: the welcome message generator used after GetInfo
//!
//! The session token is persisted through an
//! [`ExpiringCache`](crate::cache::ExpiringCache) and expires 7 days after login.

pub mod error;
pub mod greeting;
pub mod session;

pub use error::SessionError;
pub use greeting::{salutation, salutation_now, FixedGreeter, Greeter, RandomGreeter};
pub use session::{
    SessionManager, SessionState, SessionStatus, ACCESS_TOKEN_KEY, TOKEN_TTL_DAYS,
};
