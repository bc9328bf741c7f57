//! Authentication payloads: credentials, login result, and the user profile.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::role::Role;
use crate::auth::SessionError;

/// The normalized profile object as returned by the profile endpoint,
/// with its `role` replaced by the normalized [`Role`].
pub type UserInfo = Map<String, Value>;

/// Response envelope shared by the auth endpoints: `{ "result": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

/// Credentials posted to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me: false,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// The `result` of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user profile after role normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub avatar: String,
    pub role: Role,
    pub info: UserInfo,
}

impl Profile {
    /// Build a profile from the raw `result` of the profile endpoint.
    ///
    /// Nothing is partially applied: either the whole payload normalizes or an
    /// error is returned.
    pub fn from_raw(raw: Value) -> Result<Self, SessionError> {
        let mut info = match raw {
            Value::Object(map) => map,
            other => {
                return Err(SessionError::MalformedProfile(format!(
                    "expected profile object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let raw_role = info.remove("role").unwrap_or(Value::Null);
        let role = Role::normalize(raw_role)?;

        let name = string_field(&info, "name")?;
        let avatar = string_field(&info, "avatar")?;

        let role_value = serde_json::to_value(&role)
            .map_err(|e| SessionError::MalformedProfile(format!("invalid role: {}", e)))?;
        info.insert("role".to_string(), role_value);

        Ok(Self {
            name,
            avatar,
            role,
            info,
        })
    }
}

/// An optional string field; absent or null reads as empty.
fn string_field(info: &UserInfo, field: &str) -> Result<String, SessionError> {
    match info.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SessionError::MalformedProfile(format!(
            "expected string for `{}`, got {}",
            field,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
