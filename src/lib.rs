//! textshelf: a catalog server for plain-text books.
//!
//! Books are uploaded with their metadata, stored under an upload directory
//! and recorded in a SQLite catalog. The catalog can be searched, books can
//! be downloaded or read in a minimal online viewer, and an XLSX denylist
//! bans books by name or by author from being downloaded.
//!
//! # Features
//!
//! - Upload and register books (multipart form)
//! - Filtered listing by name, author, genre and publication date
//! - Download with denylist enforcement
//! - Online viewer
//! - Denylist workbooks (sheet 1: book names, sheet 2: authors)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Catalog operations.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Denylist workbooks.
pub mod denylist;
/// Error types.
pub mod error;
/// HTTP server.
pub mod server;
/// Upload storage.
pub mod storage;


pub use catalog::{BookUpload, CatalogService};
pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
