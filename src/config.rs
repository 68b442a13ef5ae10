use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Catalog server for plain-text books with denylist moderation.
#[derive(Parser, Debug, Clone)]
#[command(name = "textshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "TEXTSHELF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long, env = "TEXTSHELF_BIND")]
        bind: Option<SocketAddr>,

        /// Directory where uploaded book files are written.
        #[arg(short, long, env = "TEXTSHELF_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,
    },

    /// Catalog commands.
    Book {
        /// Book subcommand action.
        #[command(subcommand)]
        action: BookCommand,
    },

    /// Denylist commands.
    Denylist {
        /// Denylist subcommand action.
        #[command(subcommand)]
        action: DenylistCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Catalog subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum BookCommand {
    /// Register a book from a local text file.
    Add {
        /// Book name.
        #[arg(long)]
        name: String,
        /// Book author.
        #[arg(long)]
        author: String,
        /// Publication date (YYYY-MM-DD).
        #[arg(long)]
        date_published: String,
        /// Genre.
        #[arg(long)]
        genre: String,
        /// Path to the text file.
        file: PathBuf,
    },

    /// List books, optionally filtered.
    List {
        /// Name substring (case-insensitive).
        #[arg(long)]
        name: Option<String>,
        /// Author substring (case-insensitive).
        #[arg(long)]
        author: Option<String>,
        /// Exact publication date (YYYY-MM-DD).
        #[arg(long)]
        date_published: Option<String>,
        /// Genre substring (case-insensitive).
        #[arg(long)]
        genre: Option<String>,
    },
}

/// Denylist subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum DenylistCommand {
    /// Apply an XLSX denylist (sheet 1: book names, sheet 2: authors).
    Apply {
        /// Path to the workbook.
        file: PathBuf,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Upload storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Largest accepted request body (book or workbook upload), in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    /// Body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn default_max_upload_mb() -> usize {
    64
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8000,
    )
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/catalog.db")
}

/// Upload storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded book files.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Prefix stored file names with a random id so uploads sharing a
    /// name never overwrite each other. Off by default: a second upload
    /// with the same name replaces the first file on disk.
    #[serde(default)]
    pub disambiguate_names: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            disambiguate_names: false,
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("textshelf.toml"),
            dirs::config_dir()
                .map(|p| p.join("textshelf").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/textshelf/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# textshelf configuration

[server]
bind = "0.0.0.0:8000"
# Largest accepted upload in megabytes
max_upload_mb = 64

[database]
# path = "/var/lib/textshelf/catalog.db"

[storage]
# upload_dir = "/var/lib/textshelf/uploads"
# Store uploads as "<random id>-<name>" instead of "<name>"
disambiguate_names = false
"#
        .to_string()
    }
}
