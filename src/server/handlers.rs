//! HTTP request handlers.

use crate::catalog::{self, BookUpload};
use crate::db::{Book, BookFilter};
use crate::error::{AppError, Result};
use crate::server::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

// ============================================================================
// ROOT
// ============================================================================

/// Landing response.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    message: &'static str,
    books: usize,
}

/// Root endpoint.
pub async fn index(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the Book Service API.",
        books: state.book_count(),
    })
}

// ============================================================================
// CATALOG
// ============================================================================

fn multipart_error(e: MultipartError) -> AppError {
    AppError::InvalidFormat(format!("Failed to read multipart body: {}", e))
}

/// Run catalog work that touches the filesystem off the async workers.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field.ok_or_else(|| AppError::InvalidInput(format!("missing form field '{}'", name)))
}

/// Create a book from a multipart form: `name`, `author`, `date_published`,
/// `genre` and the `file` itself.
pub async fn create_book(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Book>)> {
    let mut name = None;
    let mut author = None;
    let mut date_published = None;
    let mut genre = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await.map_err(multipart_error)?),
            "author" => author = Some(field.text().await.map_err(multipart_error)?),
            "date_published" => {
                date_published = Some(field.text().await.map_err(multipart_error)?)
            }
            "genre" => genre = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, data));
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    // Validate everything before anything touches the disk.
    let upload = BookUpload {
        name: required(name, "name")?,
        author: required(author, "author")?,
        date_published: catalog::parse_date(&required(date_published, "date_published")?)?,
        genre: required(genre, "genre")?,
    };
    upload.validate()?;
    let (file_name, data) =
        file.ok_or_else(|| AppError::InvalidInput("missing form field 'file'".into()))?;

    let catalog = state.catalog.clone();
    let book =
        blocking(move || catalog.register_book(upload, data.as_ref(), &file_name)).await?;

    Ok((StatusCode::CREATED, Json(book)))
}

/// List filters from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    name: Option<String>,
    author: Option<String>,
    date_published: Option<String>,
    genre: Option<String>,
}

impl ListParams {
    fn into_filter(self) -> Result<BookFilter> {
        let date_published = match self.date_published.as_deref() {
            Some(d) if !d.is_empty() => Some(catalog::parse_date(d)?),
            _ => None,
        };

        Ok(BookFilter {
            name: self.name,
            author: self.author,
            date_published,
            genre: self.genre,
        })
    }
}

/// List books with optional filters.
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Book>>> {
    let filter = params.into_filter()?;
    Ok(Json(state.catalog.list_books(&filter)?))
}

/// `Content-Disposition` for an attachment, with an ASCII fallback and an
/// RFC 5987 UTF-8 name.
fn attachment_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Book download.
pub async fn download_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response<Body>> {
    let catalog = state.catalog.clone();
    let download = blocking(move || catalog.download_book(id)).await?;

    let file = tokio::fs::File::from_std(download.file);
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&download.file_name),
        )
        .header(header::CONTENT_LENGTH, download.size)
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

// ============================================================================
// DENYLIST
// ============================================================================

/// Result of a denylist upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct DenylistResponse {
    /// Human readable status.
    pub message: String,
    /// Number of books matched by the denylist.
    pub books_denied_count: usize,
}

/// Receive an XLSX denylist: first sheet book names, second sheet authors.
pub async fn upload_denylist(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DenylistResponse>> {
    let mut workbook = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_lowercase().ends_with(".xlsx") {
            return Err(AppError::InvalidFormat(
                "incorrect file type. Please upload an XLSX file.".into(),
            ));
        }

        workbook = Some(field.bytes().await.map_err(multipart_error)?);
    }

    let workbook =
        workbook.ok_or_else(|| AppError::InvalidInput("missing form field 'file'".into()))?;
    let catalog = state.catalog.clone();
    let count = blocking(move || catalog.process_denylist_upload(&workbook)).await?;

    Ok(Json(DenylistResponse {
        message: "Black list was updated.".to_string(),
        books_denied_count: count,
    }))
}

// ============================================================================
// VIEWER
// ============================================================================

/// Online viewer. Denied books remain viewable.
pub async fn view_book(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Html<String>> {
    let catalog = state.catalog.clone();
    Ok(Html(blocking(move || catalog.view_book(id)).await?))
}
