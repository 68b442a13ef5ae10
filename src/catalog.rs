//! Catalog operations: registering, listing, serving and moderating books.

use crate::db::{Book, BookFilter, Database, NewBook};
use crate::denylist::Denylist;
use crate::error::{AppError, Result};
use crate::storage::FileRepository;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;

/// Metadata supplied with an upload.
#[derive(Debug, Clone)]
pub struct BookUpload {
    /// Book name.
    pub name: String,
    /// Author name.
    pub author: String,
    /// Publication date.
    pub date_published: NaiveDate,
    /// Genre.
    pub genre: String,
}

/// Longest accepted book name or author, in characters.
pub const MAX_NAME_CHARS: usize = 255;
/// Longest accepted genre, in characters.
pub const MAX_GENRE_CHARS: usize = 100;

impl BookUpload {
    /// Check field lengths. Runs before anything is written to disk.
    pub fn validate(&self) -> Result<()> {
        check_length("name", &self.name, MAX_NAME_CHARS)?;
        check_length("author", &self.author, MAX_NAME_CHARS)?;
        check_length("genre", &self.genre, MAX_GENRE_CHARS)
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters, got {}",
            field, max, len
        )));
    }
    Ok(())
}

/// An opened book file ready to be sent to a client.
#[derive(Debug)]
pub struct Download {
    /// Open handle on the stored file.
    pub file: File,
    /// File name to suggest to the client.
    pub file_name: String,
    /// File size in bytes.
    pub size: u64,
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        AppError::InvalidInput(format!(
            "date_published must be YYYY-MM-DD, got {:?}: {}",
            value, e
        ))
    })
}

/// Catalog service tying the store, the upload directory and denylists together.
#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    files: FileRepository,
}

impl CatalogService {
    /// Create a new catalog service.
    pub fn new(db: Database, files: FileRepository) -> Self {
        Self { db, files }
    }

    /// Underlying database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Validate the metadata, store the uploaded file, then record the book.
    ///
    /// If the record cannot be inserted the file stays on disk.
    pub fn register_book(
        &self,
        upload: BookUpload,
        content: impl Read,
        original_file_name: &str,
    ) -> Result<Book> {
        upload.validate()?;
        let path = self.files.store(original_file_name, content)?;
        let file_path = path.to_string_lossy().to_string();

        let new_book = NewBook {
            name: upload.name,
            author: upload.author,
            date_published: upload.date_published,
            genre: upload.genre,
            file_path,
        };

        match self.db.insert_book(&new_book) {
            Ok(book) => {
                tracing::info!(id = book.id, name = %book.name, path = %book.file_path, "Registered book");
                Ok(book)
            }
            Err(e) => {
                tracing::warn!(
                    path = %new_book.file_path,
                    error = %e,
                    "Book file written but record not created"
                );
                Err(e)
            }
        }
    }

    /// List books matching `filter`. Denied books are included.
    pub fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        self.db.search_books(filter)
    }

    /// Fetch a book record.
    pub fn get_book(&self, id: i64) -> Result<Book> {
        self.db
            .get_book(id)?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Open a book for download. Denied books are refused before the file is touched.
    pub fn download_book(&self, id: i64) -> Result<Download> {
        let book = self.get_book(id)?;
        if book.is_denied {
            return Err(AppError::Forbidden(book.name));
        }

        let file = self.files.open(&book.file_path)?;
        let size = file.metadata()?.len();

        Ok(Download {
            file,
            file_name: format!("{}.txt", book.name),
            size,
        })
    }

    /// Render a book as a minimal HTML page.
    ///
    /// Viewing ignores the denylist; only downloads are refused.
    pub fn view_book(&self, id: i64) -> Result<String> {
        let book = self.get_book(id)?;
        let content = self.files.read_to_string(&book.file_path)?;
        Ok(render_book(&book, &content))
    }

    /// Parse a denylist workbook and mark matching books as denied.
    pub fn process_denylist_upload(&self, workbook: &[u8]) -> Result<usize> {
        let denylist = Denylist::from_workbook(workbook)?;
        denylist.apply(&self.db)
    }
}

fn render_book(book: &Book, content: &str) -> String {
    let name = html_escape::encode_text(&book.name);
    let author = html_escape::encode_text(&book.author);
    let content = html_escape::encode_text(content);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{name}</title>
</head>
<body>
    <h1>{name}</h1>
    <h2>{author}</h2>
    <hr>
    <pre>{content}</pre>
</body>
</html>"#
    )
}
