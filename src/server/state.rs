//! Application state shared across handlers.

use crate::catalog::CatalogService;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::storage::FileRepository;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Catalog operations.
    pub catalog: Arc<CatalogService>,
}

impl AppState {
    /// Create application state around an open database.
    pub fn new_with_db(config: Config, db: Database) -> Self {
        let files = FileRepository::new(
            config.storage.upload_dir.clone(),
            config.storage.disambiguate_names,
        );

        Self {
            config: Arc::new(config),
            catalog: Arc::new(CatalogService::new(db, files)),
        }
    }

    /// Open the configured database and build the state.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.database.path)?;
        Ok(Self::new_with_db(config, db))
    }

    /// Number of books in the catalog, or 0 if the store cannot be read.
    pub fn book_count(&self) -> usize {
        self.catalog.db().count_books().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to count books");
            0
        })
    }
}
