//! One complete archive run: capture, assemble, package.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::assembly::{build_options, output_path};
use crate::cache::ResourceCache;
use crate::config::Config;
use crate::error::ArchiveError;
use crate::fs_utils::{clear_files, ensure_dir};
use crate::packaging::write_epub;
use crate::pipeline::Archiver;
use crate::reader::ReaderSession;

/// Archive the configured publication through `session` and return the
/// path of the written e-book.
///
/// The session is closed whether or not the capture succeeds.
///
/// # Errors
///
/// Returns the first error raised by any stage.
pub async fn archive_book<S: ReaderSession>(
    config: &Config,
    session: S,
) -> Result<PathBuf, ArchiveError> {
    let cache = ResourceCache::open(&config.temp_dir).await?;
    let books_dir = ensure_dir(&config.books_dir).await?;

    let mut archiver = Archiver::new(session, cache, config)?;
    let captured = archiver.capture().await;
    let cache = archiver.cache().clone();
    if let Err(e) = archiver.close().await {
        warn!("Failed to close reader session: {e}");
    }
    let book = captured?;

    info!(chapters = book.content.len(), "Book created");
    info!(
        images = ?book.images,
        stylesheets = book.stylesheets.len(),
        "Captured resources"
    );

    let options = build_options(&book, &cache, &config.locale).await?;
    let output = output_path(&books_dir, &options.title);
    let written = write_epub(options, &output).await?;

    if config.clear_temp_on_success {
        let removed = clear_files(cache.root()).await?;
        info!(removed, dir = %cache.root().display(), "Cleared resource cache");
    }

    Ok(written)
}
