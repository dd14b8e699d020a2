mod todos;

use std::collections::HashMap;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{Audited, AuditedResult, Outcome};
use crate::error::AppError;
use crate::models::Action;
use crate::state::AppState;

/// Query string parameters where only the first occurrence of a key counts,
/// so `?id=a&id=b` reads as `id=a` instead of failing extraction.
#[derive(Debug, Default)]
pub(super) struct QueryParams(HashMap<String, String>);

impl QueryParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut map = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            map.entry(key).or_insert(value);
        }
        Self(map)
    }

    pub(super) fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = QueryRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state).await?;
        Ok(Self::from_pairs(pairs))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/todos", get(todos::list_todos))
        .route("/todoss", get(todos::list_todo_page))
        .route("/todo", get(todos::fetch_todo))
        .route("/todo/create", post(todos::create_todo))
        .route("/todo/update", put(todos::update_todo))
        .route("/todo/update/", put(todos::update_todo))
        .route("/update-todo", put(todos::update_todo))
        .route("/todo/delete", put(todos::delete_todo))
        .route("/todo/delete/", put(todos::delete_todo))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

/// Records the audit event for `result` and converts it into the response.
/// A failing audit sink is logged and otherwise ignored.
async fn finish<T: IntoResponse>(
    state: &AppState,
    action: Action,
    result: AuditedResult<T>,
) -> Response {
    let (response, event) = match result {
        Ok(ok) => {
            let (value, event) = ok.into_event(action, Outcome::Success);
            (value.into_response(), event)
        }
        Err(err) => {
            let (value, event) = err.into_event(action, Outcome::Failure);
            (value.into_response(), event)
        }
    };

    debug!(
        action = action.as_str(),
        outcome = event.outcome.as_str(),
        status = response.status().as_u16(),
        "{}",
        event.message
    );
    if let Err(e) = state.audit.record(&event).await {
        warn!("failed to log {} action: {}", action.as_str(), e);
    }

    response
}

/// Reads the `id` parameter, funnelling every failure into an audited 400.
fn id_from_query(query: Result<QueryParams, QueryRejection>) -> Result<Uuid, Audited<AppError>> {
    let params = query.map_err(|rejection| {
        Audited::bad_request(
            None,
            "Invalid ID format",
            format!("Malformed query string: {}", rejection.body_text()),
        )
    })?;
    parse_id(params.get("id"))
}

fn parse_id(raw: Option<&str>) -> Result<Uuid, Audited<AppError>> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return Err(Audited::bad_request(
                None,
                "Missing ID parameter",
                "Missing ID in the request",
            ));
        }
    };

    Uuid::parse_str(raw).map_err(|e| {
        Audited::bad_request(None, "Invalid ID format", format!("Invalid UUID {:?}: {}", raw, e))
    })
}
