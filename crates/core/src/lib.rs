//! Core library for Taskboard
//!
//! This crate contains the core business logic, including:
//! - Task management
//! - Organizations and memberships
//! - Role-based access control

pub mod error;
pub mod org;
pub mod rbac;
pub mod task;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
