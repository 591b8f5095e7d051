//! Organization and membership model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rbac::Role;

/// An organization, optionally nested one level under a parent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Ties one user to one organization with one role
///
/// At most one membership exists per (user, organization) pair; ids are
/// assigned monotonically by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: u64,
    pub user_id: u64,
    pub org_id: u64,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
