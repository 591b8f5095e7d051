//! Register, login and current-user endpoints

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tb_core::rbac::Role;

use crate::auth::{caller_id_from_headers, issue_user_jwt, AuthError};
use crate::rbac::{bad_request, conflict, internal_error, unauthorized, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    /// When present, a new organization is created with the registering user
    /// as its owner.
    #[serde(default)]
    org_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    expires_at: String,
    user_id: u64,
    email: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: u64,
    email: String,
    name: String,
    organizations: Vec<OrgMembershipSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrgMembershipSummary {
    id: u64,
    name: String,
    parent_id: Option<u64>,
    role: Role,
}

fn map_auth_error(err: AuthError) -> RouteError {
    match err {
        AuthError::InvalidInput(message) => bad_request(message),
        AuthError::Conflict(message) => conflict(message),
        AuthError::Storage(message) => internal_error(message),
    }
}

fn format_expiry(exp: usize) -> String {
    DateTime::<Utc>::from_timestamp(exp as i64, 0)
        .map(|value| value.to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), RouteError> {
    let user = state
        .user_store()
        .register(&req.email, &req.password, &req.name)
        .await
        .map_err(map_auth_error)?;

    let org_id = if let Some(org_name) = req.org_name.as_deref() {
        let org = state
            .org_store()
            .create_org(org_name, None)
            .await
            .map_err(|err| bad_request(err.to_string()))?;
        state
            .org_store()
            .upsert_member(user.id, org.id, Role::Owner)
            .await
            .map_err(|err| internal_error(err.to_string()))?;
        Some(org.id)
    } else {
        None
    };

    let (token, exp) = issue_user_jwt(user.id).map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_at: format_expiry(exp),
            user_id: user.id,
            email: user.email,
            name: user.name,
            org_id,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, RouteError> {
    let user = state
        .user_store()
        .authenticate(&req.email, &req.password)
        .await
        .ok_or_else(|| unauthorized("Invalid email or password"))?;

    let (token, exp) = issue_user_jwt(user.id).map_err(internal_error)?;

    Ok(Json(AuthResponse {
        token,
        expires_at: format_expiry(exp),
        user_id: user.id,
        email: user.email,
        name: user.name,
        org_id: None,
    }))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, RouteError> {
    let caller_id =
        caller_id_from_headers(&headers).ok_or_else(|| unauthorized("Missing identity"))?;
    let user = state
        .user_store()
        .get(caller_id)
        .await
        .ok_or_else(|| unauthorized("User not found"))?;

    let organizations = state
        .org_store()
        .orgs_for_user(user.id)
        .await
        .map_err(|err| internal_error(err.to_string()))?
        .into_iter()
        .map(|(org, role)| OrgMembershipSummary {
            id: org.id,
            name: org.name,
            parent_id: org.parent_id,
            role,
        })
        .collect();

    Ok(Json(MeResponse {
        user_id: user.id,
        email: user.email,
        name: user.name,
        organizations,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/me", get(me))
}
