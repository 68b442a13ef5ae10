//! textshelf server entry point.

use clap::Parser;
use std::path::PathBuf;
use textshelf::{
    AppState,
    catalog::{self, BookUpload},
    config::{BookCommand, Cli, Command, Config, DenylistCommand},
    db::{BookFilter, Database},
    server,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textshelf=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::Book { action }) => cmd_book(action, config).await,
        Some(Command::Denylist { action }) => cmd_denylist(action, config).await,
        Some(Command::Serve { bind, upload_dir }) => cmd_serve(config, bind, upload_dir).await,
        None => {
            // Default: start server
            cmd_serve(config, None, None).await
        }
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    // Initialize database and upload directory
    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    std::fs::create_dir_all(&config.storage.upload_dir)?;
    println!(
        "Created upload directory: {}",
        config.storage.upload_dir.display()
    );

    println!("\nEdit config.toml to configure your server, then run: textshelf serve");

    Ok(())
}

/// Catalog commands.
async fn cmd_book(action: BookCommand, config: Config) -> anyhow::Result<()> {
    let state = AppState::open(config)?;

    match action {
        BookCommand::Add {
            name,
            author,
            date_published,
            genre,
            file,
        } => {
            let upload = BookUpload {
                name,
                author,
                date_published: catalog::parse_date(&date_published)?,
                genre,
            };

            let original_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let content = std::fs::File::open(&file)?;

            let book = state
                .catalog
                .register_book(upload, content, &original_name)?;
            println!("Registered book: {} (id: {})", book.name, book.id);
        }

        BookCommand::List {
            name,
            author,
            date_published,
            genre,
        } => {
            let filter = BookFilter {
                name,
                author,
                date_published: date_published
                    .as_deref()
                    .map(catalog::parse_date)
                    .transpose()?,
                genre,
            };

            let books = state.catalog.list_books(&filter)?;
            if books.is_empty() {
                println!("No books found.");
            } else {
                println!(
                    "{:<6} {:<30} {:<24} {:<12} {:<12} DENIED",
                    "ID", "NAME", "AUTHOR", "PUBLISHED", "GENRE"
                );
                println!("{}", "-".repeat(95));
                for book in books {
                    println!(
                        "{:<6} {:<30} {:<24} {:<12} {:<12} {}",
                        book.id,
                        book.name,
                        book.author,
                        book.date_published.to_string(),
                        book.genre,
                        if book.is_denied { "yes" } else { "no" }
                    );
                }
            }
        }
    }

    Ok(())
}

/// Denylist commands.
async fn cmd_denylist(action: DenylistCommand, config: Config) -> anyhow::Result<()> {
    let state = AppState::open(config)?;

    match action {
        DenylistCommand::Apply { file } => {
            let bytes = std::fs::read(&file)?;
            let count = state.catalog.process_denylist_upload(&bytes)?;
            println!("Denylist applied: {} book(s) denied", count);
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(
    mut config: Config,
    bind: Option<std::net::SocketAddr>,
    upload_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Override settings if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }
    if let Some(dir) = upload_dir {
        config.storage.upload_dir = dir;
    }

    std::fs::create_dir_all(&config.storage.upload_dir)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        uploads = %config.storage.upload_dir.display(),
        disambiguate_names = config.storage.disambiguate_names,
        "Starting textshelf server"
    );

    let bind_addr = config.server.bind;
    let state = AppState::open(config)?;
    tracing::info!(books = state.book_count(), "Catalog opened");

    // Create router
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
