//! Task API endpoints
//!
//! RESTful API for task CRUD operations. Every handler runs the RBAC guard
//! before touching the store; scope comes from the route-bound task id or
//! from the caller-supplied `orgId` parameter.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use tb_core::rbac::{parse_org_param, ScopeParams};
use tb_core::task::{Task, TaskRepository, TaskStatus};

use crate::audit::AuditEvent;
use crate::rbac::{self, bad_request, internal_error, not_found, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    #[serde(default)]
    pub org_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub org_id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: u64,
    pub org_id: u64,
    pub creator_id: Option<u64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub category: String,
    pub position: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            org_id: task.org_id,
            creator_id: task.creator_id,
            title: task.title,
            description: task.description,
            status: task.status,
            category: task.category,
            position: task.position,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

fn scoped_org_id(grant: tb_core::rbac::AccessGrant) -> Result<u64, RouteError> {
    grant
        .org_id()
        .ok_or_else(|| internal_error("Guarded operation produced an unscoped grant"))
}

async fn record_audit(state: &AppState, event: AuditEvent) {
    if let Err(err) = state.audit_store().append(event).await {
        warn!("Failed to append audit event: {}", err);
    }
}

/// GET /api/v1/tasks?orgId= - List tasks in an organization
async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    let scope = ScopeParams {
        task_id: None,
        explicit_org_id: query.org_id.as_deref().and_then(parse_org_param),
    };
    let (_, grant) = rbac::authorize(&state, &headers, "tasks.list", scope).await?;
    let org_id = scoped_org_id(grant)?;

    let tasks = state
        .task_store()
        .list_by_org(org_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// POST /api/v1/tasks - Create a new task
async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    let scope = ScopeParams {
        task_id: None,
        explicit_org_id: req.org_id.filter(|id| *id > 0),
    };
    let (caller_id, grant) = rbac::authorize(&state, &headers, "tasks.create", scope).await?;
    let org_id = scoped_org_id(grant)?;

    let mut task = Task::new(org_id, req.title);
    if let Some(caller_id) = caller_id {
        task = task.with_creator(caller_id);
    }
    if let Some(description) = req.description {
        task = task.with_description(description);
    }
    if let Some(category) = req.category {
        task = task.with_category(category);
    }

    let task = state.task_store().create(task).await.map_err(|err| match err {
        tb_core::Error::InvalidInput(message) => bad_request(message),
        other => internal_error(other),
    })?;

    record_audit(
        &state,
        AuditEvent::new(
            org_id,
            caller_id,
            "task.created",
            Some(task.id),
            json!({ "title": task.title }),
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// PUT /api/v1/tasks/{id} - Update an existing task
async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, RouteError> {
    let (caller_id, _) =
        rbac::authorize(&state, &headers, "tasks.update", ScopeParams::for_task(id)).await?;

    let mut task = state
        .task_store()
        .get(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found(format!("Task not found: {}", id)))?;

    if let Some(title) = req.title {
        if title.trim().is_empty() {
            return Err(bad_request("Title cannot be empty"));
        }
        task.title = title;
    }
    if let Some(description) = req.description {
        task.description = Some(description);
    }
    if let Some(status) = req.status {
        task.status = status;
    }
    if let Some(category) = req.category {
        task.category = category;
    }
    if let Some(position) = req.position {
        task.position = position;
    }

    let task = state
        .task_store()
        .update(task)
        .await
        .map_err(internal_error)?;

    record_audit(
        &state,
        AuditEvent::new(
            task.org_id,
            caller_id,
            "task.updated",
            Some(task.id),
            json!({ "status": task.status }),
        ),
    )
    .await;

    Ok(Json(task.into()))
}

/// DELETE /api/v1/tasks/{id} - Delete a task
async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<StatusCode, RouteError> {
    let (caller_id, grant) =
        rbac::authorize(&state, &headers, "tasks.delete", ScopeParams::for_task(id)).await?;
    let org_id = scoped_org_id(grant)?;

    let removed = state
        .task_store()
        .delete(id)
        .await
        .map_err(internal_error)?;
    if !removed {
        return Err(not_found(format!("Task not found: {}", id)));
    }

    record_audit(
        &state,
        AuditEvent::new(org_id, caller_id, "task.deleted", Some(id), json!({})),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/v1/tasks/{id}",
            axum::routing::put(update_task).delete(delete_task),
        )
}
