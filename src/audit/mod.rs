//! Audit trail for todo actions.
//!
//! Handlers describe what happened with an [`Audited`] value; the API layer
//! turns it into an [`AuditEvent`] and hands it to the configured
//! [`AuditSink`] once the response is ready.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Action, LogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: Action,
    pub outcome: Outcome,
    pub todo_id: Option<Uuid>,
    pub message: String,
    pub details: String,
}

impl AuditEvent {
    pub fn to_log_entry(&self) -> LogEntry {
        LogEntry {
            action: self.action,
            todo_id: self.todo_id.unwrap_or_else(Uuid::nil),
            message: self.message.clone(),
            details: self.details.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AppError>;
}

/// Appends events to the `logs` table.
pub struct SqliteAuditLog {
    db: SqlitePool,
}

impl SqliteAuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), AppError> {
        repository::insert_log(&self.db, &event.to_log_entry()).await?;
        Ok(())
    }
}

/// A handler result annotated with what should go into the audit trail.
#[derive(Debug)]
pub struct Audited<T> {
    pub value: T,
    pub todo_id: Option<Uuid>,
    pub message: String,
    pub details: String,
}

pub type AuditedResult<T> = Result<Audited<T>, Audited<AppError>>;

impl<T> Audited<T> {
    pub fn new(
        value: T,
        todo_id: Option<Uuid>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            value,
            todo_id,
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn into_event(self, action: Action, outcome: Outcome) -> (T, AuditEvent) {
        let event = AuditEvent {
            action,
            outcome,
            todo_id: self.todo_id,
            message: self.message,
            details: self.details,
        };
        (self.value, event)
    }
}

impl Audited<AppError> {
    pub fn bad_request(todo_id: Option<Uuid>, message: &str, details: impl Into<String>) -> Self {
        Self::new(AppError::BadRequest(message.to_string()), todo_id, message, details)
    }

    pub fn not_found(todo_id: Uuid, message: &str, details: impl Into<String>) -> Self {
        Self::new(AppError::NotFound(message.to_string()), Some(todo_id), message, details)
    }

    /// Storage failure; the error text goes into the audit details.
    pub fn database(todo_id: Option<Uuid>, message: &str, err: sqlx::Error) -> Self {
        let details = format!("Error: {}", err);
        Self::new(AppError::Database(err), todo_id, message, details)
    }
}
