use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pictbook_core::{Config, ServeFile, Storage, ThumbnailCache};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pictbookctl", about = "Picture book maintenance tool", version)]
struct Cli {
    /// Data directory (overrides PICTBOOK_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the visible top level books
    Books,
    /// List the pictures and sub-albums of a book directory
    List {
        /// Book path like `holiday` or `holiday/day1`
        path: String,
    },
    /// Build the thumbnails for a book directory ahead of time
    Warm {
        /// Book path like `holiday` or `holiday/day1`
        path: String,
        /// Thumbnail width in pixels (default size when omitted)
        #[arg(long)]
        size: Option<u32>,
        /// Also warm every visible sub-album
        #[arg(long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pictbookctl=info,pictbook_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.data_dir {
        Some(dir) => Config::with_data_dir(dir.clone()),
        None => Config::from_env().context("cannot load configuration")?,
    };

    match cli.command {
        Command::Books => {
            let storage = Storage::new(config);
            for book in storage.visible_top_level_books()? {
                println!("{book}");
            }
        }
        Command::List { path } => {
            let storage = Storage::new(config);
            let book = storage.book_dir(&path)?;
            println!("{}", book.title());
            for sub in book.visible_subdirs()? {
                println!("  {sub}/");
            }
            for picture in book.pictures()? {
                let marker = if picture.hidden() { " (hidden)" } else { "" };
                println!("  {} - {}{marker}", picture.name(), picture.description());
            }
        }
        Command::Warm {
            path,
            size,
            recursive,
        } => {
            let size = config.clamp_thumbnail_size(size);
            let storage = Storage::new(config.clone());
            let cache = ThumbnailCache::new(config)?;
            warm(&storage, &cache, &path, size, recursive).await?;
        }
    }

    Ok(())
}

/// Build every thumbnail of one book directory, then recurse into its
/// visible sub-albums when asked to.
async fn warm(
    storage: &Storage,
    cache: &ThumbnailCache,
    path: &str,
    size: u32,
    recursive: bool,
) -> anyhow::Result<()> {
    let book = storage.book_dir(path)?;
    let mut built = 0usize;
    let mut degraded = 0usize;

    for picture in book.pictures()? {
        match cache.get_or_build(picture.path(), book.data_dir(), size).await {
            Ok(ServeFile::Cached(_)) => built += 1,
            Ok(ServeFile::Original(_)) => degraded += 1,
            Err(e) => warn!("Skipping {}: {e}", picture.name()),
        }
    }
    info!("{path}: {built} thumbnails ready, {degraded} served unscaled");

    if recursive {
        for sub in book.visible_subdirs()? {
            Box::pin(warm(storage, cache, &format!("{path}/{sub}"), size, recursive))
                .await?;
        }
    }
    Ok(())
}
