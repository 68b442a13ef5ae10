//! Upload directory holding book payloads.

use crate::error::{AppError, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Reads and writes book files below a fixed root directory.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
    disambiguate: bool,
}

impl FileRepository {
    /// Create a repository rooted at `root`.
    ///
    /// With `disambiguate` off, the stored path is derived from the upload
    /// name alone, so a second upload with the same name overwrites the first.
    pub fn new(root: impl Into<PathBuf>, disambiguate: bool) -> Self {
        Self {
            root: root.into(),
            disambiguate,
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a file uploaded as `original_name` is written to.
    pub fn path_for(&self, original_name: &str) -> Result<PathBuf> {
        // Only the final component is kept, so "../x.txt" lands in the root.
        let file_name = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Invalid upload file name: {:?}", original_name))
            })?;

        let file_name = if self.disambiguate {
            format!("{}-{}", uuid::Uuid::new_v4(), file_name)
        } else {
            file_name.to_string()
        };

        Ok(self.root.join(file_name))
    }

    /// Write `reader` to the path derived from `original_name` and return that path.
    pub fn store(&self, original_name: &str, mut reader: impl Read) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;

        let path = self.path_for(original_name)?;
        let mut file = File::create(&path)?;
        let written = io::copy(&mut reader, &mut file)?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), bytes = written, "Stored book file");
        Ok(path)
    }

    /// Open a stored file for reading.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<File> {
        let path = path.as_ref();
        File::open(path).map_err(|e| missing_or_io(path, e))
    }

    /// Read a stored file as text, replacing invalid UTF-8.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| missing_or_io(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn missing_or_io(path: &Path, e: io::Error) -> AppError {
    if e.kind() == io::ErrorKind::NotFound {
        AppError::FileMissing(path.display().to_string())
    } else {
        AppError::Io(e)
    }
}
