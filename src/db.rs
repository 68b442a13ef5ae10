mod schema;

pub use schema::Database;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Catalog record for a stored book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Identifier assigned by the store on insert.
    pub id: i64,
    /// Book name.
    pub name: String,
    /// Author name.
    pub author: String,
    /// Publication date.
    pub date_published: NaiveDate,
    /// Genre.
    pub genre: String,
    /// Path of the stored file (unique across records).
    #[serde(skip)]
    pub file_path: String,
    /// Whether the book is on the denylist.
    pub is_denied: bool,
}

/// Fields needed to insert a new record.
#[derive(Debug, Clone)]
pub struct NewBook {
    /// Book name.
    pub name: String,
    /// Author name.
    pub author: String,
    /// Publication date.
    pub date_published: NaiveDate,
    /// Genre.
    pub genre: String,
    /// Path of the stored file.
    pub file_path: String,
}

/// Optional search filters, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the author.
    pub author: Option<String>,
    /// Exact publication date.
    pub date_published: Option<NaiveDate>,
    /// Case-insensitive substring of the genre.
    pub genre: Option<String>,
}

impl BookFilter {
    /// Filter matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict by name substring.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict by author substring.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Restrict by exact publication date.
    pub fn date_published(mut self, date: NaiveDate) -> Self {
        self.date_published = Some(date);
        self
    }

    /// Restrict by genre substring.
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }
}
