use crate::db::{Book, BookFilter, NewBook};
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ToSql;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::Arc;

const BOOK_COLUMNS: &str = "id, name, author, date_published, genre, file_path, is_denied";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(AppError::db("open"))?;
        Self::from_connection(conn)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::db("open"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // SQLite's lower() only folds ASCII.
        conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|v| v.to_lowercase()))
            },
        )
        .map_err(AppError::db("register casefold"))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                author TEXT NOT NULL,
                date_published TEXT NOT NULL,
                genre TEXT NOT NULL,
                file_path TEXT NOT NULL UNIQUE,
                is_denied INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_books_name ON books(name);
            CREATE INDEX IF NOT EXISTS idx_books_author ON books(author);
            "#,
        )
        .map_err(AppError::db("initialize schema"))?;

        Ok(())
    }

    /// Insert a new book. Fails if another record already uses the same file path.
    pub fn insert_book(&self, book: &NewBook) -> Result<Book> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books (name, author, date_published, genre, file_path, is_denied)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                book.name,
                book.author,
                book.date_published,
                book.genre,
                book.file_path,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                AppError::DuplicateFileReference(book.file_path.clone())
            }
            other => AppError::db("insert book")(other),
        })?;

        Ok(Book {
            id: conn.last_insert_rowid(),
            name: book.name.clone(),
            author: book.author.clone(),
            date_published: book.date_published,
            genre: book.genre.clone(),
            file_path: book.file_path.clone(),
            is_denied: false,
        })
    }

    /// Get book by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            params![id],
            Self::row_to_book,
        )
        .optional()
        .map_err(AppError::db("get book"))
    }

    /// Search books. Empty filter values are ignored.
    pub fn search_books(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let query = SearchQuery::from_filter(filter);
        let sql = query.sql();

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(AppError::db("prepare search"))?;

        let books = stmt
            .query_map(params_from_iter(query.params()), Self::row_to_book)
            .map_err(AppError::db("search books"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(AppError::db("read search results"))?;

        Ok(books)
    }

    /// Flag every book whose name is in `names` or whose author is in `authors`.
    ///
    /// Returns the number of matched rows, including rows that were already
    /// denied, so repeating the same call reports the same count.
    pub fn mark_denied(&self, names: &[String], authors: &[String]) -> Result<usize> {
        if names.is_empty() && authors.is_empty() {
            return Ok(0);
        }

        // Each list is bound as one JSON array, so its length is not bounded
        // by SQLite's host parameter limit.
        let names_json = serde_json::to_string(names)
            .map_err(|e| AppError::Internal(format!("encode denylist names: {}", e)))?;
        let authors_json = serde_json::to_string(authors)
            .map_err(|e| AppError::Internal(format!("encode denylist authors: {}", e)))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(AppError::db("begin denylist"))?;
        let updated = tx
            .execute(
                "UPDATE books SET is_denied = 1
                 WHERE name IN (SELECT value FROM json_each(?1))
                    OR author IN (SELECT value FROM json_each(?2))",
                params![names_json, authors_json],
            )
            .map_err(AppError::db("mark denied"))?;
        tx.commit().map_err(AppError::db("commit denylist"))?;

        Ok(updated)
    }

    /// Number of books in the catalog.
    pub fn count_books(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(AppError::db("count books"))?;
        Ok(count as usize)
    }

    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            name: row.get(1)?,
            author: row.get(2)?,
            date_published: row.get(3)?,
            genre: row.get(4)?,
            file_path: row.get(5)?,
            is_denied: row.get(6)?,
        })
    }
}

/// A single search predicate.
#[derive(Debug)]
enum Predicate {
    /// Column contains the (already case-folded) needle.
    Contains(&'static str, String),
    /// Column equals the value.
    Equals(&'static str, String),
}

/// Parameterised search query built from a [`BookFilter`].
#[derive(Debug, Default)]
struct SearchQuery {
    predicates: Vec<Predicate>,
}

impl SearchQuery {
    fn from_filter(filter: &BookFilter) -> Self {
        let mut query = Self::default();
        query.contains("name", filter.name.as_deref());
        query.contains("author", filter.author.as_deref());
        if let Some(date) = filter.date_published {
            query
                .predicates
                .push(Predicate::Equals("date_published", date.format("%F").to_string()));
        }
        query.contains("genre", filter.genre.as_deref());
        query
    }

    fn contains(&mut self, column: &'static str, needle: Option<&str>) {
        if let Some(needle) = needle.filter(|n| !n.is_empty()) {
            self.predicates
                .push(Predicate::Contains(column, needle.to_lowercase()));
        }
    }

    fn sql(&self) -> String {
        let mut sql = format!("SELECT {BOOK_COLUMNS} FROM books");
        for (i, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Contains(column, _) => {
                    sql.push_str(&format!("instr(casefold({column}), ?{}) > 0", i + 1))
                }
                Predicate::Equals(column, _) => sql.push_str(&format!("{column} = ?{}", i + 1)),
            }
        }
        sql.push_str(" ORDER BY id");
        sql
    }

    fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.predicates.iter().map(|p| match p {
            Predicate::Contains(_, value) | Predicate::Equals(_, value) => value as &dyn ToSql,
        })
    }
}
