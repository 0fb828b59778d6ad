use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use tasker_db::{TaskQuery, TaskSort, TaskSortField};
use tasker_types::api::TaskListQuery;
use tasker_types::models::Task;

use crate::allowlist::{Allowed, TaskResource};
use crate::auth::{AppState, run_blocking};
use crate::convert::task_model;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::validation;

const NOT_FOUND: ApiError = ApiError::NotFound("Task");

/// Lenient parse of the list query: absent or malformed values mean "no
/// filter", "unsorted", "unbounded" and "no skip".
pub fn parse_list_query(raw: TaskListQuery) -> TaskQuery {
    let completed = raw
        .completed
        .filter(|value| !value.is_empty())
        .map(|value| value == "true");

    let sort = raw.sort_by.and_then(|raw_sort| {
        let mut parts = raw_sort.split(':');
        let field = TaskSortField::from_name(parts.next()?)?;
        let descending = parts.next() == Some("desc");
        Some(TaskSort { field, descending })
    });

    TaskQuery {
        completed,
        sort,
        limit: raw.limit.as_deref().and_then(leading_count),
        skip: raw.skip.as_deref().and_then(leading_count),
    }
}

/// Reads the leading run of digits, so `"5abc"` is 5 and `"1.5"` is 1.
fn leading_count(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    value[..end].parse().ok()
}

/// POST /tasks. The owner is always the caller.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Allowed { body, .. }: Allowed<TaskResource>,
) -> ApiResult<impl IntoResponse> {
    let input = validation::task_create_input(body).map_err(ApiError::Validation)?;

    let task_id = Uuid::new_v4().to_string();
    let owner_id = session.user.id;
    let task = run_blocking(&state, move |s| {
        s.db.create_task(&task_id, &owner_id, &input.description, input.completed)
    })
    .await?
    .map_err(|e| {
        warn!("Task insert failed: {}", e);
        ApiError::BadRequest("Unable to save task".into())
    })?;

    Ok((StatusCode::CREATED, Json(task_model(&task))))
}

/// GET /tasks?completed=&sortBy=field:asc|desc&limit=&skip=
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(raw): Query<TaskListQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let query = parse_list_query(raw);
    let owner_id = session.user.id;

    let rows = run_blocking(&state, move |s| s.db.tasks_of(&owner_id, &query))
        .await?
        .map_err(ApiError::internal)?;

    Ok(Json(rows.iter().map(task_model).collect()))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    let owner_id = session.user.id;
    let task = run_blocking(&state, move |s| s.db.get_task(&task_id, &owner_id))
        .await?
        .map_err(ApiError::internal)?
        .ok_or(NOT_FOUND)?;

    Ok(Json(task_model(&task)))
}

/// PATCH /tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
    Allowed { fields, body }: Allowed<TaskResource>,
) -> ApiResult<Json<Task>> {
    let owner_id = session.user.id;

    let updated = run_blocking(&state, move |s| -> Result<_, ApiError> {
        let current = s
            .db
            .get_task(&task_id, &owner_id)
            .map_err(|e| {
                warn!("Task lookup failed: {}", e);
                ApiError::BadRequest("Unable to update task".into())
            })?
            .ok_or(NOT_FOUND)?;

        let input = validation::task_update_input(&current, &fields, body).map_err(ApiError::Validation)?;

        s.db.update_task(&task_id, &owner_id, &input.description, input.completed)
            .map_err(|e| {
                warn!("Task update failed: {}", e);
                ApiError::BadRequest("Unable to update task".into())
            })?
            .ok_or(NOT_FOUND)
    })
    .await??;

    Ok(Json(task_model(&updated)))
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    let owner_id = session.user.id;
    let task = run_blocking(&state, move |s| s.db.delete_task(&task_id, &owner_id))
        .await?
        .map_err(ApiError::internal)?
        .ok_or(NOT_FOUND)?;

    Ok(Json(task_model(&task)))
}
