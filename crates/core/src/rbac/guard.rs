//! Policy evaluator
//!
//! Combines scope resolution, the two-level organization hierarchy and the
//! caller's membership into a single allow/deny decision. The guard owns no
//! state of its own; it is a pure decision function over the read-only
//! directories it is given at construction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::model::{Permission, Role};
use crate::{Error, Result};

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeniedReason {
    Unauthenticated,
    OrganizationScopeRequired,
    InsufficientPermission,
    OwnersCanOnlyDeleteOwnTasks,
}

impl DeniedReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Authentication required",
            Self::OrganizationScopeRequired => "Organization scope required",
            Self::InsufficientPermission => "Insufficient permission",
            Self::OwnersCanOnlyDeleteOwnTasks => "Owners can only delete their own tasks",
        }
    }
}

impl fmt::Display for DeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Organization record as seen by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgRef {
    pub id: u64,
    pub parent_id: Option<u64>,
}

/// Task record as seen by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub id: u64,
    pub org_id: u64,
    pub creator_id: Option<u64>,
}

/// Membership record as seen by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipRef {
    pub id: u64,
    pub user_id: u64,
    pub org_id: u64,
    pub role: Role,
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn find_org(&self, id: u64) -> Result<Option<OrgRef>>;
}

#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Memberships held by `user_id` in any of `org_ids`, ascending by
    /// membership id.
    async fn memberships_for_user_in(
        &self,
        user_id: u64,
        org_ids: &[u64],
    ) -> Result<Vec<MembershipRef>>;
}

#[async_trait]
pub trait TaskDirectory: Send + Sync {
    async fn find_task_ref(&self, id: u64) -> Result<Option<TaskRef>>;
}

/// Scope inputs extracted from the request: an optional route-bound task id
/// and an optional caller-supplied organization id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeParams {
    pub task_id: Option<u64>,
    pub explicit_org_id: Option<u64>,
}

impl ScopeParams {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_task(task_id: u64) -> Self {
        Self {
            task_id: Some(task_id),
            explicit_org_id: None,
        }
    }

    pub fn for_org(org_id: u64) -> Self {
        Self {
            task_id: None,
            explicit_org_id: Some(org_id),
        }
    }
}

/// Parse a caller-supplied organization id parameter.
///
/// Only well-formed positive integers resolve scope; anything else leaves
/// scope unresolved.
pub fn parse_org_param(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

/// The outcome of a successful authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    /// The operation declared no required permission.
    Public,
    /// The caller holds `role` in (or above) the governing organization.
    Scoped { org_id: u64, role: Role },
}

impl AccessGrant {
    pub fn org_id(&self) -> Option<u64> {
        match self {
            Self::Public => None,
            Self::Scoped { org_id, .. } => Some(*org_id),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Public => None,
            Self::Scoped { role, .. } => Some(*role),
        }
    }
}

/// RBAC guard evaluated before each guarded operation
pub struct RbacGuard {
    orgs: Arc<dyn OrganizationDirectory>,
    memberships: Arc<dyn MembershipDirectory>,
    tasks: Arc<dyn TaskDirectory>,
}

impl RbacGuard {
    pub fn new(
        orgs: Arc<dyn OrganizationDirectory>,
        memberships: Arc<dyn MembershipDirectory>,
        tasks: Arc<dyn TaskDirectory>,
    ) -> Self {
        Self {
            orgs,
            memberships,
            tasks,
        }
    }

    /// Evaluate whether `caller_id` may perform an operation requiring
    /// `required` against the scope described by `scope`.
    ///
    /// Evaluation is single-pass and idempotent: repeated calls with
    /// unchanged backing data yield the same decision. Denials are returned
    /// as [`Error::Denied`]; other error variants indicate a storage fault,
    /// never a policy outcome.
    pub async fn authorize(
        &self,
        caller_id: Option<u64>,
        required: Option<Permission>,
        scope: ScopeParams,
    ) -> Result<AccessGrant> {
        let Some(required) = required else {
            return Ok(AccessGrant::Public);
        };
        let Some(caller_id) = caller_id else {
            // Reported before any scope resolution is attempted.
            return Err(Error::Denied(DeniedReason::Unauthenticated));
        };

        // Fetch the target task up front: it both resolves scope and carries
        // the creator needed for the deletion ownership rule.
        let target_task = match scope.task_id {
            Some(task_id) => self.tasks.find_task_ref(task_id).await?,
            None => None,
        };

        // The task's organization wins over a caller-supplied org id.
        let governing_org_id = match (target_task, scope.explicit_org_id) {
            (Some(task), _) => task.org_id,
            (None, Some(org_id)) if org_id > 0 => org_id,
            _ => return Err(Error::Denied(DeniedReason::OrganizationScopeRequired)),
        };

        let candidates = self.candidate_org_ids(governing_org_id).await?;
        let Some(role) = self.resolve_role(caller_id, &candidates).await? else {
            tracing::debug!(
                caller_id,
                governing_org_id,
                "no membership in candidate organizations"
            );
            return Err(Error::Denied(DeniedReason::InsufficientPermission));
        };
        if !role.grants(required) {
            return Err(Error::Denied(DeniedReason::InsufficientPermission));
        }

        // Ownership rule: Owners may only delete tasks they created. Admins
        // delete unconditionally.
        if required == Permission::TaskDelete && role == Role::Owner {
            let creator_id = target_task.and_then(|task| task.creator_id);
            if creator_id != Some(caller_id) {
                return Err(Error::Denied(DeniedReason::OwnersCanOnlyDeleteOwnTasks));
            }
        }

        Ok(AccessGrant::Scoped {
            org_id: governing_org_id,
            role,
        })
    }

    /// The governing organization plus its immediate parent, governing
    /// organization first. Deeper ancestors are never consulted.
    async fn candidate_org_ids(&self, org_id: u64) -> Result<Vec<u64>> {
        let Some(org) = self.orgs.find_org(org_id).await? else {
            return Ok(Vec::new());
        };
        let mut candidates = vec![org.id];
        if let Some(parent_id) = org.parent_id {
            candidates.push(parent_id);
        }
        Ok(candidates)
    }

    /// Closest organization wins: a membership in the governing organization
    /// itself beats one in its parent.
    async fn resolve_role(&self, user_id: u64, candidates: &[u64]) -> Result<Option<Role>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let memberships = self
            .memberships
            .memberships_for_user_in(user_id, candidates)
            .await?;
        for org_id in candidates {
            if let Some(membership) = memberships.iter().find(|m| m.org_id == *org_id) {
                return Ok(Some(membership.role));
            }
        }
        Ok(None)
    }
}
