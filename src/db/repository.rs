use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::query::{ListQuery, UpdateSet};
use crate::models::{LogEntry, NewTodoRequest, Todo};

pub async fn fetch_todos(db: &SqlitePool) -> Result<Vec<Todo>, sqlx::Error> {
    sqlx::query_as::<_, Todo>(
        "SELECT id, title, description, status, due_date, created_at, is_deleted FROM todos WHERE is_deleted = 0 ORDER BY created_at DESC"
    )
    .fetch_all(db)
    .await
}

/// Returns one page of matching todos together with the total match count.
pub async fn fetch_todo_page(
    db: &SqlitePool,
    query: &ListQuery,
) -> Result<(Vec<Todo>, i64), sqlx::Error> {
    let mut select = query.select();
    debug!("listing todos: {}", select.sql());
    let todos = select.build_query_as::<Todo>().fetch_all(db).await?;

    let mut count = query.count();
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    Ok((todos, total))
}

pub async fn find_active_todo(db: &SqlitePool, id: Uuid) -> Result<Option<Todo>, sqlx::Error> {
    sqlx::query_as::<_, Todo>(
        "SELECT id, title, description, status, due_date, created_at, is_deleted FROM todos WHERE id = ? AND is_deleted = 0"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_todo(
    db: &SqlitePool,
    id: Uuid,
    req: NewTodoRequest,
) -> Result<Todo, sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO todos
            (id, title, description, status, due_date, created_at, is_deleted)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.status)
    .bind(req.due_date)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Todo {
        id,
        title: req.title,
        description: req.description,
        status: req.status,
        due_date: req.due_date,
        created_at: now,
        is_deleted: false,
    })
}

/// Writes the assignments in `set` and returns the row as stored afterwards,
/// or `None` when no row has this id.
pub async fn apply_update(
    db: &SqlitePool,
    id: Uuid,
    set: &UpdateSet,
) -> Result<Option<Todo>, sqlx::Error> {
    let mut statement = set.statement(id);
    debug!("updating todo {}: {}", id, statement.sql());
    statement.build_query_as::<Todo>().fetch_optional(db).await
}

pub async fn soft_delete_todo(db: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE todos SET is_deleted = 1 WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn insert_log(db: &SqlitePool, entry: &LogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO logs (action, todo_id, message, details, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)"
    )
    .bind(entry.action.as_str())
    .bind(entry.todo_id)
    .bind(&entry.message)
    .bind(&entry.details)
    .bind(entry.timestamp)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::query::{Pagination, SortField, SortOrder, TodoFilter};
    use crate::models::{Action, UpdateTodoRequest};

    async fn setup_test_db() -> SqlitePool {
        let pool = crate::db::connect("sqlite::memory:", 1)
            .await
            .expect("Failed to create test db");

        crate::db::migrate(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn new_todo(title: &str, status: &str, due_date: Option<NaiveDate>) -> NewTodoRequest {
        NewTodoRequest {
            title: title.to_string(),
            description: format!("{} description", title),
            status: status.to_string(),
            due_date,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_todo() {
        let pool = setup_test_db().await;
        let id = Uuid::new_v4();
        let due = NaiveDate::from_ymd_opt(2024, 3, 15);

        let todo = insert_todo(&pool, id, new_todo("write report", "open", due))
            .await
            .expect("Failed to insert todo");
        assert_eq!(todo.id, id);
        assert!(!todo.is_deleted);

        let found = find_active_todo(&pool, id)
            .await
            .expect("Failed to fetch todo")
            .expect("Todo not found");
        assert_eq!(found.title, "write report");
        assert_eq!(found.due_date, due);
        assert_eq!(found.created_at, todo.created_at);

        let missing = find_active_todo(&pool, Uuid::new_v4()).await.expect("Failed to fetch todo");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_without_due_date() {
        let pool = setup_test_db().await;
        let id = Uuid::new_v4();
        insert_todo(&pool, id, new_todo("no date", "open", None))
            .await
            .expect("Failed to insert todo");

        let found = find_active_todo(&pool, id).await.unwrap().unwrap();
        assert_eq!(found.due_date, None);
    }

    #[tokio::test]
    async fn test_soft_deleted_todo_is_hidden() {
        let pool = setup_test_db().await;
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        insert_todo(&pool, keep, new_todo("keep", "open", None)).await.unwrap();
        insert_todo(&pool, gone, new_todo("gone", "open", None)).await.unwrap();

        assert!(soft_delete_todo(&pool, gone).await.expect("Failed to delete todo"));

        let todos = fetch_todos(&pool).await.expect("Failed to fetch todos");
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].id, keep);
        assert!(find_active_todo(&pool, gone).await.unwrap().is_none());

        let (page, total) = fetch_todo_page(&pool, &ListQuery::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_todo_page_filters_sorts_and_paginates() {
        let pool = setup_test_db().await;
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1);
        for (title, status, due) in [
            ("c", "open", jan),
            ("a", "open", jan),
            ("b", "open", None),
            ("d", "done", jan),
        ] {
            insert_todo(&pool, Uuid::new_v4(), new_todo(title, status, due)).await.unwrap();
        }

        let filter = TodoFilter { status: Some("open".to_string()), due_date: jan };
        let query = ListQuery::new(
            &filter,
            SortField::Title,
            SortOrder::Asc,
            Pagination { page: 1, limit: 1 },
        );
        let (todos, total) = fetch_todo_page(&pool, &query).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "a");

        let query = ListQuery::new(
            &filter,
            SortField::Title,
            SortOrder::Asc,
            Pagination { page: 2, limit: 1 },
        );
        let (todos, _) = fetch_todo_page(&pool, &query).await.unwrap();
        assert_eq!(todos[0].title, "c");

        let query = ListQuery::new(
            &TodoFilter::default(),
            SortField::Title,
            SortOrder::Desc,
            Pagination::default(),
        );
        let (todos, total) = fetch_todo_page(&pool, &query).await.unwrap();
        assert_eq!(total, 4);
        let titles: Vec<_> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_apply_update_only_touches_supplied_fields() {
        let pool = setup_test_db().await;
        let id = Uuid::new_v4();
        let original = insert_todo(&pool, id, new_todo("draft", "open", None)).await.unwrap();

        let set = UpdateSet::from_request(UpdateTodoRequest {
            status: Some("done".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        })
        .unwrap();

        let updated = apply_update(&pool, id, &set)
            .await
            .expect("Failed to update todo")
            .expect("Todo not found");
        assert_eq!(updated.title, original.title);
        assert_eq!(updated.description, original.description);
        assert_eq!(updated.status, "done");
        assert_eq!(updated.due_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(updated.created_at, original.created_at);

        let missing = apply_update(&pool, Uuid::new_v4(), &set).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_log() {
        let pool = setup_test_db().await;
        let entry = LogEntry {
            action: Action::Create,
            todo_id: Uuid::nil(),
            message: "Invalid request payload".to_string(),
            details: "Failed to decode JSON request body".to_string(),
            timestamp: Utc::now(),
        };
        insert_log(&pool, &entry).await.expect("Failed to insert log");

        let (action, todo_id): (String, Uuid) =
            sqlx::query_as("SELECT action, todo_id FROM logs")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(action, "create");
        assert_eq!(todo_id, Uuid::nil());
    }
}
