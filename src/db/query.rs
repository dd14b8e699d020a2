//! Typed query specifications for the `todos` table.
//!
//! Column names only ever come from the enums and constants in this module;
//! every caller-supplied value is pushed as a bound parameter.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UpdateTodoRequest;

pub const TODO_COLUMNS: &str = "id, title, description, status, due_date, created_at, is_deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Date(NaiveDate),
}

impl SqlParam {
    fn bind_to(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        match self {
            SqlParam::Text(v) => qb.push_bind(v.clone()),
            SqlParam::Date(v) => qb.push_bind(*v),
        };
    }
}

/// A `column = ?` pair, used both for WHERE predicates and SET assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub column: &'static str,
    pub value: SqlParam,
}

impl Binding {
    fn text(column: &'static str, value: String) -> Self {
        Self { column, value: SqlParam::Text(value) }
    }

    fn date(column: &'static str, value: NaiveDate) -> Self {
        Self { column, value: SqlParam::Date(value) }
    }

    fn push(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        qb.push(self.column).push(" = ");
        self.value.bind_to(qb);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Title,
    Status,
    DueDate,
    #[default]
    CreatedAt,
}

impl SortField {
    /// Anything outside the allow-list, including the empty string, sorts by `created_at`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "id" => SortField::Id,
            "title" => SortField::Title,
            "status" => SortField::Status,
            "due_date" => SortField::DueDate,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Status => "status",
            SortField::DueDate => "due_date",
            SortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Only the exact literal `ASC` is ascending.
    pub fn parse(raw: &str) -> Self {
        if raw == "ASC" { SortOrder::Asc } else { SortOrder::Desc }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: Self::DEFAULT_PAGE, limit: Self::DEFAULT_LIMIT }
    }
}

impl Pagination {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_LIMIT: i64 = 10;

    /// Missing, non-numeric, or non-positive values fall back to the defaults
    /// independently of each other.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive_or(page, Self::DEFAULT_PAGE),
            limit: positive_or(limit, Self::DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 { 0 } else { (total - 1) / self.limit + 1 }
    }
}

fn positive_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TodoFilter {
    /// Predicates in their fixed order: status, then due date.
    pub fn predicates(&self) -> Vec<Binding> {
        let mut predicates = Vec::new();
        if let Some(status) = self.status.as_ref().filter(|s| !s.is_empty()) {
            predicates.push(Binding::text("status", status.clone()));
        }
        if let Some(due_date) = self.due_date {
            predicates.push(Binding::date("due_date", due_date));
        }
        predicates
    }
}

/// Filtered, sorted, paginated listing over non-deleted todos.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    predicates: Vec<Binding>,
    sort_field: SortField,
    sort_order: SortOrder,
    pagination: Pagination,
}

impl ListQuery {
    pub fn new(filter: &TodoFilter, sort_field: SortField, sort_order: SortOrder, pagination: Pagination) -> Self {
        Self {
            predicates: filter.predicates(),
            sort_field,
            sort_order,
            pagination,
        }
    }

    pub fn predicates(&self) -> &[Binding] {
        &self.predicates
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn select(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT {TODO_COLUMNS} FROM todos"));
        self.push_where(&mut qb);
        qb.push(" ORDER BY ")
            .push(self.sort_field.column())
            .push(" ")
            .push(self.sort_order.keyword());
        qb.push(" LIMIT ").push_bind(self.pagination.limit);
        qb.push(" OFFSET ").push_bind(self.pagination.offset());
        qb
    }

    /// Same predicates as [`ListQuery::select`], without ordering or paging.
    pub fn count(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM todos");
        self.push_where(&mut qb);
        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        qb.push(" WHERE is_deleted = 0");
        for predicate in &self.predicates {
            qb.push(" AND ");
            predicate.push(qb);
        }
    }
}

/// SET clause of a partial update, in the fixed order
/// title, description, status, due_date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSet {
    assignments: Vec<Binding>,
}

impl UpdateSet {
    /// Empty strings and missing values are skipped. Fails with a bad request
    /// when nothing is left to write.
    pub fn from_request(req: UpdateTodoRequest) -> Result<Self, AppError> {
        let mut assignments = Vec::new();
        let text_fields = [
            ("title", req.title),
            ("description", req.description),
            ("status", req.status),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                assignments.push(Binding::text(column, value));
            }
        }
        if let Some(due_date) = req.due_date {
            assignments.push(Binding::date("due_date", due_date));
        }

        if assignments.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        Ok(Self { assignments })
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|a| a.column).collect()
    }

    pub fn statement(&self, id: Uuid) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("UPDATE todos SET ");
        for (i, assignment) in self.assignments.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            assignment.push(&mut qb);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(TODO_COLUMNS);
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sort_field_allow_list() {
        assert_eq!(SortField::parse("title"), SortField::Title);
        assert_eq!(SortField::parse("due_date"), SortField::DueDate);
        assert_eq!(SortField::parse("id"), SortField::Id);
        assert_eq!(SortField::parse(""), SortField::CreatedAt);
        assert_eq!(SortField::parse("description"), SortField::CreatedAt);
        assert_eq!(SortField::parse("title; DROP TABLE todos"), SortField::CreatedAt);
    }

    #[test]
    fn test_sort_order_only_exact_asc() {
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("asc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse(""), SortOrder::Desc);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
    }

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(Pagination::parse(None, None), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::parse(Some("0"), Some("-5")), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::parse(Some("abc"), Some("")), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::parse(Some("3"), Some("abc")), Pagination { page: 3, limit: 10 });
        assert_eq!(Pagination::parse(Some("2"), Some("25")), Pagination { page: 2, limit: 25 });
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination { page: 3, limit: 10 };
        assert_eq!(p.offset(), 20);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(1), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn test_list_query_without_filters() {
        let query = ListQuery::default();
        assert_eq!(
            query.select().sql(),
            "SELECT id, title, description, status, due_date, created_at, is_deleted FROM todos \
             WHERE is_deleted = 0 ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(query.count().sql(), "SELECT COUNT(*) FROM todos WHERE is_deleted = 0");
    }

    #[test]
    fn test_list_query_filters_in_fixed_order() {
        let filter = TodoFilter {
            status: Some("open".to_string()),
            due_date: Some(date(2024, 1, 1)),
        };
        let query = ListQuery::new(&filter, SortField::Title, SortOrder::Asc, Pagination::default());

        assert_eq!(
            query.predicates(),
            &[
                Binding::text("status", "open".to_string()),
                Binding::date("due_date", date(2024, 1, 1)),
            ]
        );
        assert!(query.select().sql().ends_with(
            "WHERE is_deleted = 0 AND status = ? AND due_date = ? ORDER BY title ASC LIMIT ? OFFSET ?"
        ));
        assert_eq!(
            query.count().sql(),
            "SELECT COUNT(*) FROM todos WHERE is_deleted = 0 AND status = ? AND due_date = ?"
        );
    }

    #[test]
    fn test_empty_status_filter_is_ignored() {
        let filter = TodoFilter { status: Some(String::new()), due_date: None };
        assert!(filter.predicates().is_empty());
    }

    #[test]
    fn test_update_set_order_and_skips_empty() {
        let req = UpdateTodoRequest {
            title: Some("new".to_string()),
            description: Some(String::new()),
            status: Some("done".to_string()),
            due_date: Some(date(2024, 3, 15)),
        };
        let set = UpdateSet::from_request(req).unwrap();
        assert_eq!(set.columns(), vec!["title", "status", "due_date"]);
        assert_eq!(
            set.statement(Uuid::nil()).sql(),
            "UPDATE todos SET title = ?, status = ?, due_date = ? WHERE id = ? \
             RETURNING id, title, description, status, due_date, created_at, is_deleted"
        );
    }

    #[test]
    fn test_update_set_nothing_to_update() {
        let req = UpdateTodoRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        match UpdateSet::from_request(req) {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "No fields to update"),
            other => panic!("expected bad request, got {:?}", other),
        }
    }
}
