use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Wire format for calendar dates (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(default, deserialize_with = "optional_date::deserialize")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTodoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "optional_date::deserialize")]
    pub due_date: Option<NaiveDate>,
}

/// Partial update body. A field that is absent, `null`, or an empty string
/// is treated as "leave unchanged"; clearing a field is not expressible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "optional_date::deserialize")]
    pub due_date: Option<NaiveDate>,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
}

mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, de::Error};

    // `null`, `""` and `"null"` all decode to no date.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") | Some("null") => Ok(None),
            Some(s) => super::parse_date(s).map(Some).map_err(D::Error::custom),
        }
    }
}
