use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// --- Core Records (Mapped to Database) ---

/// Snippet
///
/// A short piece of text stored in the `snippets` table. A snippet stops being visible
/// once `expires` has passed; the repository filters expired rows on every read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Snippet {
    pub fn created_display(&self) -> String {
        human_date(Some(self.created))
    }

    pub fn expires_display(&self) -> String {
        human_date(Some(self.expires))
    }
}

/// User
///
/// A registered account from the `users` table. The password hash never leaves the
/// repository layer, so it is not part of this struct.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn joined_display(&self) -> String {
        human_date(Some(self.created))
    }
}

/// human_date
///
/// Formats a timestamp for display, always in UTC (e.g. `17 Mar 2022 at 10:15`).
/// An absent time renders as an empty string.
pub fn human_date<Tz: chrono::TimeZone>(t: Option<DateTime<Tz>>) -> String {
    match t {
        Some(t) => t.with_timezone(&Utc).format("%d %b %Y at %H:%M").to_string(),
        None => String::new(),
    }
}
