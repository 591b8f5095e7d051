pub mod store;
pub mod types;

pub use store::AuditStore;
pub use types::{AuditEvent, AuditListQuery, AuditListResponse};
