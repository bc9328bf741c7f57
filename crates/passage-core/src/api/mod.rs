//! Auth API module.
//!
//! `AuthApi` is the seam between the session manager and the network. The
//! session manager never talks HTTP itself; `HttpAuthApi` is the reqwest
//! implementation used by the CLI.
//!
//! The API identifies a session by an opaque token sent in the
//! `Access-Token` header.

pub mod client;
pub mod error;

use std::future::Future;

use serde_json::Value;

use crate::models::{Credentials, LoginResult};

pub use client::HttpAuthApi;
pub use error::ApiError;

/// The remote authentication service.
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a session token.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResult, ApiError>> + Send;

    /// Fetch the raw profile (`result` object) for the session identified by `token`.
    fn get_info(&self, token: &str) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// End the session identified by `token` on the server.
    fn logout(&self, token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}
