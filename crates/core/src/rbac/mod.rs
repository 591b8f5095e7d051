//! Role-based access control
//!
//! This module contains the policy evaluator that gates every guarded
//! API operation, together with the role/permission model and the
//! read-only directory traits it consumes.

mod guard;
mod model;

pub use guard::{
    parse_org_param, AccessGrant, DeniedReason, MembershipDirectory, MembershipRef, OrgRef,
    OrganizationDirectory, RbacGuard, ScopeParams, TaskDirectory, TaskRef,
};
pub use model::{Permission, Role};
