//! Conversion of the captured [`Book`] into packaging options.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::book::{Book, CoverImage};
use crate::cache::ResourceCache;
use crate::constants::UNTITLED_CHAPTER;
use crate::error::ArchiveError;

/// Runs of characters that may not appear in an output file name.
static DISALLOWED_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[^A-ZÕÄÖÜõäöü0-9]+").unwrap());

/// One content document handed to the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub title: String,
    pub data: String,
    pub exclude_from_toc: bool,
    pub before_toc: bool,
}

/// Everything the packager needs to write the e-book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpubOptions {
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub lang: String,
    pub cover: Option<PathBuf>,
    /// Concatenated stylesheets, if any were captured.
    pub css: Option<String>,
    /// Cached image files referenced by the content, in registration order.
    pub images: Vec<PathBuf>,
    pub content: Vec<ContentRecord>,
}

/// Concatenate the registered stylesheets in registration order.
///
/// Each stylesheet is preceded by a newline.
///
/// # Errors
///
/// Returns an error if a registered stylesheet is missing from the cache.
pub async fn concat_stylesheets(
    cache: &ResourceCache,
    stylesheets: &[String],
) -> Result<String, ArchiveError> {
    info!(count = stylesheets.len(), "Processing stylesheets");
    let mut css = String::new();
    for name in stylesheets {
        css.push('\n');
        css.push_str(&cache.read_to_string(name).await?);
    }
    Ok(css)
}

/// Map captured chapters to content records.
///
/// Every record is placed in the table of contents; the front matter flags
/// on [`crate::book::Chapter`] do not carry over.
#[must_use]
pub fn content_records(book: &Book) -> Vec<ContentRecord> {
    book.content
        .iter()
        .map(|chapter| ContentRecord {
            title: chapter
                .title
                .clone()
                .unwrap_or_else(|| UNTITLED_CHAPTER.to_string()),
            data: chapter.content.clone(),
            exclude_from_toc: false,
            before_toc: false,
        })
        .collect()
}

/// Collapse every run of characters outside letters (including Estonian
/// vowels with diacritics) and digits into a single underscore.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    DISALLOWED_FILENAME_CHARS.replace_all(title, "_").into_owned()
}

/// Output path of the e-book for `title` inside `books_dir`.
#[must_use]
pub fn output_path(books_dir: &Path, title: &str) -> PathBuf {
    books_dir.join(format!("{}.epub", sanitize_title(title)))
}

/// Build the packaging options for a captured book.
///
/// Missing title or author are left empty here; the packager rejects them.
///
/// # Errors
///
/// Returns an error if a registered stylesheet cannot be read.
pub async fn build_options(
    book: &Book,
    cache: &ResourceCache,
    lang: &str,
) -> Result<EpubOptions, ArchiveError> {
    let css = if book.stylesheets.is_empty() {
        None
    } else {
        Some(concat_stylesheets(cache, &book.stylesheets).await?)
    };

    let cover = match &book.cover {
        Some(CoverImage::Local(path)) => Some(path.clone()),
        Some(CoverImage::Remote(_)) | None => None,
    };

    Ok(EpubOptions {
        title: book.title.clone().unwrap_or_default(),
        author: book.author.clone().unwrap_or_default(),
        publisher: book.publisher.clone(),
        lang: lang.to_string(),
        cover,
        css,
        images: book.images.iter().map(|name| cache.path(name)).collect(),
        content: content_records(book),
    })
}
