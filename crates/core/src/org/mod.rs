//! Organizations and memberships
//!
//! A two-level organization hierarchy plus the memberships that tie users to
//! organizations with a role.

mod model;
mod store;

pub use model::{Membership, Organization};
pub use store::FileOrgStore;
