//! Data models for the auth API.
//!
//! - `Credentials`, `LoginResult`, `Envelope`: login request and response
//! - `Profile`, `UserInfo`: the authenticated user's profile
//! - `Role`, `Permission`, `ActionEntity`: the normalized permission set

pub mod profile;
pub mod role;

pub use profile::{Credentials, Envelope, LoginResult, Profile, UserInfo};
pub use role::{ActionEntity, Permission, Role};
