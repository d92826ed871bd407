//! Request scope: the tenant plus optional secondary scope fields.

use serde::{Deserialize, Serialize};

/// Scope a command runs under.
///
/// Commands against tenant-scoped tables are rejected unless
/// [`Scope::tenant_id`] resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
}

impl Scope {
    /// Scope for a single tenant.
    pub fn tenant(biz_id: impl Into<String>) -> Self {
        Self {
            biz_id: Some(biz_id.into()),
            ..Self::default()
        }
    }

    /// The tenant id, if present and non-blank.
    pub fn tenant_id(&self) -> Option<&str> {
        self.biz_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Field-wise overlay: every field set on `overlay` replaces ours.
    pub fn merged_with(&self, overlay: &Scope) -> Scope {
        Scope {
            biz_id: overlay.biz_id.clone().or_else(|| self.biz_id.clone()),
            location_id: overlay.location_id.clone().or_else(|| self.location_id.clone()),
            actor_user_id: overlay
                .actor_user_id
                .clone()
                .or_else(|| self.actor_user_id.clone()),
        }
    }
}
