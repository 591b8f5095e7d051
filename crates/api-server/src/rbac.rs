//! RBAC guard adapter for the HTTP layer
//!
//! Each guarded operation declares its required permission in a static table
//! resolved at startup; handlers run the core policy evaluator through
//! [`authorize`] before touching any store.

use std::collections::HashMap;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use tb_core::rbac::{AccessGrant, DeniedReason, Permission, ScopeParams};
use tb_core::Error;

use crate::auth::caller_id_from_headers;
use crate::state::AppState;

/// Guarded operations and the permission each one requires.
///
/// Operations absent from this table are public: the evaluator allows them
/// unconditionally.
const GUARDED_OPERATIONS: &[(&str, Permission)] = &[
    ("tasks.list", Permission::TaskRead),
    ("tasks.create", Permission::TaskCreate),
    ("tasks.update", Permission::TaskUpdate),
    ("tasks.delete", Permission::TaskDelete),
    ("audit.list", Permission::AuditRead),
];

/// Operation-to-permission table, resolved once at startup
pub struct OperationPermissions {
    map: HashMap<&'static str, Permission>,
}

impl OperationPermissions {
    pub fn new() -> Self {
        Self {
            map: GUARDED_OPERATIONS.iter().copied().collect(),
        }
    }

    pub fn required_for(&self, operation: &str) -> Option<Permission> {
        self.map.get(operation).copied()
    }
}

impl Default for OperationPermissions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

pub fn route_error(status: StatusCode, error: impl Into<String>) -> RouteError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn unauthorized(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::UNAUTHORIZED, error)
}

pub fn forbidden(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::FORBIDDEN, error)
}

pub fn bad_request(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::BAD_REQUEST, error)
}

pub fn not_found(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::NOT_FOUND, error)
}

pub fn conflict(error: impl Into<String>) -> RouteError {
    route_error(StatusCode::CONFLICT, error)
}

pub fn internal_error(error: impl std::fmt::Display) -> RouteError {
    route_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
}

fn map_guard_error(err: Error) -> RouteError {
    match err {
        Error::Denied(DeniedReason::Unauthenticated) => {
            unauthorized(DeniedReason::Unauthenticated.message())
        }
        Error::Denied(reason) => forbidden(reason.message()),
        other => internal_error(other),
    }
}

/// Run the policy evaluator for `operation` and return the verified caller id
/// together with the resulting grant. Denials map to 401/403 responses.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    operation: &str,
    scope: ScopeParams,
) -> Result<(Option<u64>, AccessGrant), RouteError> {
    let caller_id = caller_id_from_headers(headers);
    let required = state.permissions().required_for(operation);
    let grant = state
        .guard()
        .authorize(caller_id, required, scope)
        .await
        .map_err(|err| {
            debug!(operation, ?caller_id, "authorization denied: {}", err);
            map_guard_error(err)
        })?;
    Ok((caller_id, grant))
}
