//! Route handlers

pub mod audit;
pub mod auth;
pub mod health;
pub mod orgs;
pub mod task;
