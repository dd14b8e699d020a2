use axum::Json;
use axum::extract::State;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{QueryParams, finish, id_from_query};
use crate::audit::{Audited, AuditedResult};
use crate::db::query::{ListQuery, Pagination, SortField, SortOrder, TodoFilter};
use crate::db::{query::UpdateSet, repository};
use crate::error::AppError;
use crate::models::todo::parse_date;
use crate::models::{Action, NewTodoRequest, Todo, UpdateTodoRequest};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct TodoListResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    todos: Option<Vec<Todo>>,
    total_todos: usize,
    server_status: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct TodoPageResponse {
    status: u16,
    todos: Vec<Todo>,
    current_page: i64,
    total_pages: i64,
    total_todos: i64,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    status: &'static str,
    message: &'static str,
    previous: Todo,
    updated: Todo,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    status: &'static str,
    message: &'static str,
    todo: Todo,
}

/// All non-deleted todos. An empty table is reported as 404.
pub(super) async fn list_todos(State(state): State<AppState>) -> Result<Response, AppError> {
    let todos = repository::fetch_todos(&state.db).await?;

    if todos.is_empty() {
        let body = TodoListResponse {
            status: "404 Not Found",
            message: Some("No todos found"),
            todos: None,
            total_todos: 0,
            server_status: "OK",
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    }

    let body = TodoListResponse {
        status: "200 OK",
        message: None,
        total_todos: todos.len(),
        todos: Some(todos),
        server_status: "OK",
    };
    Ok(Json(body).into_response())
}

pub(super) async fn list_todo_page(
    State(state): State<AppState>,
    query: Result<QueryParams, QueryRejection>,
) -> Result<Json<TodoPageResponse>, AppError> {
    let params = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let due_date = match params.get("due_date") {
        None | Some("") => None,
        Some(raw) => Some(parse_date(raw).map_err(|_| {
            AppError::BadRequest(format!("Invalid due_date {:?}: expected YYYY-MM-DD", raw))
        })?),
    };
    let filter = TodoFilter {
        status: params.get("status").map(str::to_string),
        due_date,
    };
    let list = ListQuery::new(
        &filter,
        SortField::parse(params.get("sort_by").unwrap_or_default()),
        SortOrder::parse(params.get("sort_order").unwrap_or_default()),
        Pagination::parse(params.get("page"), params.get("limit")),
    );

    let (todos, total) = repository::fetch_todo_page(&state.db, &list).await?;
    let pagination = list.pagination();

    Ok(Json(TodoPageResponse {
        status: StatusCode::OK.as_u16(),
        todos,
        current_page: pagination.page,
        total_pages: pagination.total_pages(total),
        total_todos: total,
    }))
}

pub(super) async fn fetch_todo(
    State(state): State<AppState>,
    query: Result<QueryParams, QueryRejection>,
) -> Response {
    let result = fetch(&state, query).await;
    finish(&state, Action::Fetch, result).await
}

async fn fetch(
    state: &AppState,
    query: Result<QueryParams, QueryRejection>,
) -> AuditedResult<Json<Todo>> {
    let id = id_from_query(query)?;

    match repository::find_active_todo(&state.db, id).await {
        Ok(Some(todo)) => {
            let details = format!("Todo: {}", todo.title);
            Ok(Audited::new(Json(todo), Some(id), "Todo fetched successfully", details))
        }
        Ok(None) => Err(Audited::not_found(
            id,
            "Todo not found",
            "Todo with the given ID does not exist",
        )),
        Err(e) => Err(Audited::database(Some(id), "Failed to fetch todo", e)),
    }
}

pub(super) async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<NewTodoRequest>, JsonRejection>,
) -> Response {
    let result = create(&state, payload).await;
    finish(&state, Action::Create, result).await
}

async fn create(
    state: &AppState,
    payload: Result<Json<NewTodoRequest>, JsonRejection>,
) -> AuditedResult<(StatusCode, Json<Todo>)> {
    let Json(req) = payload.map_err(|rejection| {
        Audited::bad_request(
            None,
            "Invalid request payload",
            format!("Failed to decode JSON request body: {}", rejection.body_text()),
        )
    })?;

    let id = Uuid::new_v4();
    debug!("generated id for new todo: {}", id);

    let todo = repository::insert_todo(&state.db, id, req)
        .await
        .map_err(|e| Audited::database(Some(id), "Failed to create todo", e))?;

    Ok(Audited::new(
        (StatusCode::CREATED, Json(todo)),
        Some(id),
        "Todo created",
        "Creation of new todo item",
    ))
}

pub(super) async fn update_todo(
    State(state): State<AppState>,
    query: Result<QueryParams, QueryRejection>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Response {
    let result = update(&state, query, payload).await;
    finish(&state, Action::Update, result).await
}

async fn update(
    state: &AppState,
    query: Result<QueryParams, QueryRejection>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> AuditedResult<Json<UpdateResponse>> {
    let id = id_from_query(query)?;

    let Json(req) = payload.map_err(|rejection| {
        Audited::bad_request(
            Some(id),
            "Invalid request payload",
            format!("Failed to decode JSON request body: {}", rejection.body_text()),
        )
    })?;

    let set = UpdateSet::from_request(req).map_err(|e| {
        Audited::new(e, Some(id), "No fields to update", "Update request had no non-empty fields")
    })?;

    // Not transactional with the write below; a concurrent delete in between
    // is not detected.
    let previous = match repository::find_active_todo(&state.db, id).await {
        Ok(Some(todo)) => todo,
        Ok(None) => {
            return Err(Audited::not_found(
                id,
                "Todo not found",
                "Failed to update todo: Already deleted or does not exist",
            ));
        }
        Err(e) => return Err(Audited::database(Some(id), "Failed to fetch todo", e)),
    };

    let updated = match repository::apply_update(&state.db, id, &set).await {
        Ok(Some(todo)) => todo,
        Ok(None) => {
            return Err(Audited::not_found(
                id,
                "Todo not found",
                "Failed to update todo: Row disappeared before the write",
            ));
        }
        Err(e) => return Err(Audited::database(Some(id), "Failed to update todo", e)),
    };

    let details = format!("Updated fields: {}", set.columns().join(", "));
    Ok(Audited::new(
        Json(UpdateResponse {
            status: "success",
            message: "Todo updated successfully",
            previous,
            updated,
        }),
        Some(id),
        "Todo updated",
        details,
    ))
}

pub(super) async fn delete_todo(
    State(state): State<AppState>,
    query: Result<QueryParams, QueryRejection>,
) -> Response {
    let result = delete(&state, query).await;
    finish(&state, Action::Delete, result).await
}

async fn delete(
    state: &AppState,
    query: Result<QueryParams, QueryRejection>,
) -> AuditedResult<Json<DeleteResponse>> {
    let id = id_from_query(query)?;

    let mut todo = match repository::find_active_todo(&state.db, id).await {
        Ok(Some(todo)) => todo,
        Ok(None) => {
            return Err(Audited::not_found(
                id,
                "Todo not found or already deleted",
                "Failed to delete todo: Already deleted or does not exist",
            ));
        }
        Err(e) => return Err(Audited::database(Some(id), "Failed to fetch todo", e)),
    };

    match repository::soft_delete_todo(&state.db, id).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(Audited::not_found(
                id,
                "Todo not found or already deleted",
                "Failed to delete todo: Row disappeared before the write",
            ));
        }
        Err(e) => return Err(Audited::database(Some(id), "Failed to delete todo", e)),
    }
    todo.is_deleted = true;

    Ok(Audited::new(
        Json(DeleteResponse {
            status: "success",
            message: "Todo deleted successfully",
            todo,
        }),
        Some(id),
        "Todo deleted",
        "Successfully marked todo as deleted",
    ))
}
