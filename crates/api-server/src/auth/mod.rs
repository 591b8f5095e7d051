//! Authentication for the task board API
//!
//! Users, password hashing and bearer tokens. Authorization is handled
//! separately by the RBAC guard in `tb-core`; this module only produces a
//! verified caller identity.

mod jwt;
mod store;

pub use jwt::{caller_id_from_headers, issue_user_jwt, verify_user_jwt, UserJwtClaims};
pub use store::{AuthError, UserStore, UserSummary};
