//! Organization and membership administration
//!
//! These endpoints create the records the policy evaluator later reads. They
//! are role-checked directly (owner/admin of the affected organization)
//! rather than going through the permission table, which covers task and
//! audit operations only.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use tb_core::org::Organization;
use tb_core::rbac::Role;
use tb_core::Error;

use crate::auth::caller_id_from_headers;
use crate::rbac::{bad_request, forbidden, internal_error, not_found, unauthorized, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrgRequest {
    name: String,
    #[serde(default)]
    parent_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertMemberRequest {
    user_id: u64,
    role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrgResponse {
    id: u64,
    name: String,
    parent_id: Option<u64>,
    created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserOrgSummary {
    org: OrgResponse,
    role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberResponse {
    membership_id: u64,
    user_id: u64,
    org_id: u64,
    role: Role,
}

impl From<Organization> for OrgResponse {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            parent_id: org.parent_id,
            created_at: org.created_at.to_rfc3339(),
        }
    }
}

fn can_manage_members(role: Role) -> bool {
    matches!(role, Role::Owner | Role::Admin)
}

fn map_store_error(err: Error) -> RouteError {
    match err {
        Error::OrganizationNotFound(id) => not_found(format!("Organization not found: {}", id)),
        Error::InvalidInput(message) => bad_request(message),
        other => internal_error(other),
    }
}

async fn require_caller(headers: &HeaderMap) -> Result<u64, RouteError> {
    caller_id_from_headers(headers).ok_or_else(|| unauthorized("Authentication required"))
}

async fn create_org(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOrgRequest>,
) -> Result<(StatusCode, Json<OrgResponse>), RouteError> {
    let caller_id = require_caller(&headers).await?;

    // Nesting under a parent requires owner/admin standing in that parent.
    if let Some(parent_id) = req.parent_id {
        let membership = state
            .org_store()
            .membership_for(caller_id, parent_id)
            .await
            .map_err(map_store_error)?;
        match membership {
            Some(membership) if can_manage_members(membership.role) => {}
            _ => {
                return Err(forbidden(
                    "Only owners or admins of the parent organization can create sub-organizations",
                ))
            }
        }
    }

    let org = state
        .org_store()
        .create_org(&req.name, req.parent_id)
        .await
        .map_err(map_store_error)?;
    state
        .org_store()
        .upsert_member(caller_id, org.id, Role::Owner)
        .await
        .map_err(map_store_error)?;

    Ok((StatusCode::CREATED, Json(org.into())))
}

async fn list_orgs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserOrgSummary>>, RouteError> {
    let caller_id = require_caller(&headers).await?;
    let entries = state
        .org_store()
        .orgs_for_user(caller_id)
        .await
        .map_err(map_store_error)?;

    Ok(Json(
        entries
            .into_iter()
            .map(|(org, role)| UserOrgSummary {
                org: org.into(),
                role,
            })
            .collect(),
    ))
}

async fn upsert_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<u64>,
    Json(req): Json<UpsertMemberRequest>,
) -> Result<Json<MemberResponse>, RouteError> {
    let caller_id = require_caller(&headers).await?;

    let caller_membership = state
        .org_store()
        .membership_for(caller_id, org_id)
        .await
        .map_err(map_store_error)?;
    match caller_membership {
        Some(membership) if can_manage_members(membership.role) => {}
        _ => return Err(forbidden("Only owner/admin can manage members")),
    }

    if state.user_store().get(req.user_id).await.is_none() {
        return Err(not_found(format!("User not found: {}", req.user_id)));
    }

    let membership = state
        .org_store()
        .upsert_member(req.user_id, org_id, req.role)
        .await
        .map_err(map_store_error)?;

    Ok(Json(MemberResponse {
        membership_id: membership.id,
        user_id: membership.user_id,
        org_id: membership.org_id,
        role: membership.role,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/orgs", get(list_orgs).post(create_org))
        .route("/api/v1/orgs/{org_id}/members", post(upsert_member))
}
