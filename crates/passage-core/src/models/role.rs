//! Role and permission models.
//!
//! The profile endpoint returns a role with a nested permission list, each
//! permission carrying an `actionEntitySet`. These types keep every raw field
//! and add flat lookups: `permissionList` on the role and `actionList` on each
//! permission.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::auth::SessionError;

/// Message for roles that cannot back a session.
const INVALID_ROLE_MESSAGE: &str = "role must be a non-null, non-empty permission set";

/// Fields recomputed during normalization; stale copies in the raw payload are dropped.
const DERIVED_ROLE_FIELDS: &[&str] = &["permissionList"];
const DERIVED_PERMISSION_FIELDS: &[&str] = &["actionList"];

/// One entry of a permission's `actionEntitySet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntity {
    pub action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPermission {
    #[serde(deserialize_with = "permission_id")]
    permission_id: String,
    #[serde(default)]
    action_entity_set: Option<Vec<ActionEntity>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    #[serde(default)]
    permissions: Option<Vec<RawPermission>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Permission ids arrive as strings or numbers; both normalize to a string.
fn permission_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "permissionId must be a string or number, got {}",
            other
        ))),
    }
}

/// A normalized permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub permission_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_entity_set: Option<Vec<ActionEntity>>,
    /// `action` of each entry in `action_entity_set`, in order.
    #[serde(default)]
    pub action_list: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Permission {
    fn from_raw(raw: RawPermission) -> Self {
        let action_list = raw
            .action_entity_set
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|entity| entity.action.clone())
            .collect();

        Self {
            permission_id: raw.permission_id,
            action_entity_set: raw.action_entity_set,
            action_list,
            extra: strip(raw.extra, DERIVED_PERMISSION_FIELDS),
        }
    }

    /// Whether this permission grants `action`.
    pub fn allows(&self, action: &str) -> bool {
        self.action_list.iter().any(|a| a == action)
    }
}

/// A normalized role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub permissions: Vec<Permission>,
    /// `permission_id` of each permission, in order.
    pub permission_list: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Role {
    /// Normalize a raw role payload.
    ///
    /// A null role, or one without permissions, is rejected with
    /// [`SessionError::InvalidRole`].
    ///
    /// Every permission needs a `permissionId` (string or number) and every
    /// `actionEntitySet` entry needs an `action`, since `permissionList` and
    /// `actionList` are built from them. Payloads missing either, or of the
    /// wrong shape, are rejected with [`SessionError::MalformedProfile`].
    pub fn normalize(raw: Value) -> Result<Self, SessionError> {
        if raw.is_null() {
            return Err(SessionError::InvalidRole(INVALID_ROLE_MESSAGE.to_string()));
        }

        let raw: RawRole = serde_json::from_value(raw)
            .map_err(|e| SessionError::MalformedProfile(format!("invalid role: {}", e)))?;

        let raw_permissions = match raw.permissions {
            Some(permissions) if !permissions.is_empty() => permissions,
            _ => return Err(SessionError::InvalidRole(INVALID_ROLE_MESSAGE.to_string())),
        };

        let permissions: Vec<Permission> =
            raw_permissions.into_iter().map(Permission::from_raw).collect();
        let permission_list = permissions
            .iter()
            .map(|p| p.permission_id.clone())
            .collect();

        Ok(Self {
            permissions,
            permission_list,
            extra: strip(raw.extra, DERIVED_ROLE_FIELDS),
        })
    }

    /// Look up a permission by id.
    pub fn permission(&self, permission_id: &str) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.permission_id == permission_id)
    }

    pub fn has_permission(&self, permission_id: &str) -> bool {
        self.permission_list.iter().any(|id| id == permission_id)
    }

    /// Whether the role grants `action` on `permission_id`.
    pub fn allows(&self, permission_id: &str, action: &str) -> bool {
        self.permission(permission_id)
            .map(|p| p.allows(action))
            .unwrap_or(false)
    }

    /// Role id, if the raw payload carried one.
    pub fn id(&self) -> Option<&str> {
        self.extra.get("id").and_then(Value::as_str)
    }
}

fn strip(mut fields: Map<String, Value>, derived: &[&str]) -> Map<String, Value> {
    for name in derived {
        fields.remove(*name);
    }
    fields
}
