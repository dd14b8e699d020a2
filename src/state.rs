use std::sync::Arc;

use sqlx::SqlitePool;

use crate::audit::{AuditSink, SqliteAuditLog};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// State that writes its audit trail to the same database.
    pub fn new(db: SqlitePool) -> Self {
        let audit = Arc::new(SqliteAuditLog::new(db.clone()));
        Self { db, audit }
    }
}
