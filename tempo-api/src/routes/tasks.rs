/// Task CRUD endpoints
///
/// Direct create/read/update/delete mappings onto the task store, with one
/// twist: create and update hand the task to the reminder scheduler, and
/// delete cancels any pending reminder. The scheduler call is best-effort
/// and cannot fail the request.
///
/// # Endpoints
///
/// - `POST   /api/tasks`     - Create a task (201, scheduler armed)
/// - `GET    /api/tasks`     - List all tasks
/// - `PUT    /api/tasks/:id` - Update a task (reminder re-armed)
/// - `DELETE /api/tasks/:id` - Delete a task; returns the refreshed full list

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tempo_shared::models::task::{CreateTask, Task, UpdateTask};

/// Creates a new task and arms its reminder
///
/// # Errors
///
/// - `400 Bad Request`: malformed body
/// - `500 Internal Server Error`: store failure
pub async fn create_task(
    State(state): State<AppState>,
    Json(data): Json<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    if data.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Task title is required".to_string()));
    }

    let task = Task::create(&state.db, data).await?;

    tracing::info!(task_id = task.id, title = %task.title, "Task created");

    state.scheduler.schedule(task.clone());

    Ok((StatusCode::CREATED, Json(task)))
}

/// Lists every task
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    let tasks = Task::list_all(&state.db).await?;
    Ok(Json(tasks))
}

/// Updates a task and re-arms its reminder
///
/// The scheduler cancels the previous timer and arms one for the updated
/// times, so an edited task never fires twice.
///
/// # Errors
///
/// - `404 Not Found`: no task with this id
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    let task = Task::update(&state.db, id, data)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(task_id = task.id, "Task updated");

    state.scheduler.schedule(task.clone());

    Ok(Json(task))
}

/// Deletes a task, cancels its reminder, and returns the refreshed list
///
/// # Errors
///
/// - `404 Not Found`: no task with this id
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Task>>> {
    let deleted = Task::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    state.scheduler.cancel(id);
    tracing::info!(task_id = id, "Task deleted");

    let tasks = Task::list_all(&state.db).await?;
    Ok(Json(tasks))
}
