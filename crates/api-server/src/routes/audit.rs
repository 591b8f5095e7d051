//! Audit log read endpoint
//!
//! Reading the audit trail is itself a guarded operation: only owner/admin
//! roles carry the required permission, and the listing is always scoped to
//! one organization.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use tb_core::rbac::{parse_org_param, ScopeParams};

use crate::audit::{AuditListQuery, AuditListResponse};
use crate::rbac::{self, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditQuery {
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    task_id: Option<u64>,
}

/// GET /api/v1/audit?orgId= - List audit events for an organization
async fn list_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditListResponse>, RouteError> {
    let scope = ScopeParams {
        task_id: None,
        explicit_org_id: query.org_id.as_deref().and_then(parse_org_param),
    };
    let (_, grant) = rbac::authorize(&state, &headers, "audit.list", scope).await?;
    let org_id = grant
        .org_id()
        .ok_or_else(|| rbac::internal_error("Guarded operation produced an unscoped grant"))?;

    let list_query = AuditListQuery {
        offset: query.offset,
        limit: query.limit,
        action: query.action,
        task_id: query.task_id,
    };
    let offset = list_query.offset.unwrap_or(0);
    let (items, has_more) = state.audit_store().list_paginated(org_id, &list_query).await;
    let next_offset = has_more.then(|| offset + items.len());

    Ok(Json(AuditListResponse {
        items,
        has_more,
        next_offset,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/audit", get(list_audit))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use tb_core::rbac::Role;

    use crate::audit::AuditEvent;
    use crate::auth::issue_user_jwt;
    use crate::state::AppState;

    async fn build_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).await.unwrap();
        (state, temp_dir)
    }

    async fn seed_member(state: &AppState, email: &str, org_id: u64, role: Role) -> String {
        let user = state
            .user_store()
            .register(email, "verysecurepw", "Test User")
            .await
            .unwrap();
        state
            .org_store()
            .upsert_member(user.id, org_id, role)
            .await
            .unwrap();
        let (token, _) = issue_user_jwt(user.id).unwrap();
        token
    }

    #[tokio::test]
    async fn viewer_cannot_read_the_audit_trail() {
        let (state, _temp_dir) = build_state().await;
        let org = state.org_store().create_org("Acme", None).await.unwrap();
        let token = seed_member(&state, "viewer@example.com", org.id, Role::Viewer).await;

        let app = super::router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/audit?orgId={}", org.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["error"], "Insufficient permission");
    }

    #[tokio::test]
    async fn admin_reads_events_scoped_to_their_org() {
        let (state, _temp_dir) = build_state().await;
        let org = state.org_store().create_org("Acme", None).await.unwrap();
        let other = state.org_store().create_org("Other", None).await.unwrap();
        let token = seed_member(&state, "admin@example.com", org.id, Role::Admin).await;

        state
            .audit_store()
            .append(AuditEvent::new(
                org.id,
                None,
                "task.created",
                Some(7),
                Value::Null,
            ))
            .await
            .unwrap();
        state
            .audit_store()
            .append(AuditEvent::new(
                other.id,
                None,
                "task.created",
                Some(8),
                Value::Null,
            ))
            .await
            .unwrap();

        let app = super::router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/audit?orgId={}", org.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        let items = payload["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["taskId"], 7);
        assert_eq!(payload["hasMore"], false);
    }

    #[tokio::test]
    async fn missing_org_scope_is_forbidden() {
        let (state, _temp_dir) = build_state().await;
        let org = state.org_store().create_org("Acme", None).await.unwrap();
        let token = seed_member(&state, "admin@example.com", org.id, Role::Admin).await;

        let app = super::router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/audit")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["error"], "Organization scope required");
    }
}
