//! EPUB packaging of the assembled book.
//!
//! Resource files are read asynchronously, then the archive is built in a
//! blocking task since `epub-builder` writes synchronously into memory.

pub mod xhtml;

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use tracing::{debug, info};

use crate::assembly::EpubOptions;
use crate::error::ArchiveError;

/// Fallback MIME type for resources that are neither raster images nor SVG.
const OCTET_STREAM: &str = "application/octet-stream";

/// A resource file loaded for packaging.
#[derive(Debug, Clone)]
struct Resource {
    name: String,
    bytes: Vec<u8>,
}

/// Sniff the MIME type of an image from its leading bytes.
#[must_use]
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) if looks_like_svg(bytes) => "image/svg+xml",
        Err(_) => OCTET_STREAM,
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    String::from_utf8_lossy(head).contains("<svg")
}

/// File name the cover is stored under inside the package.
fn cover_name(bytes: &[u8]) -> String {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png");
    format!("cover.{ext}")
}

/// Write the e-book described by `options` to `output`.
///
/// # Errors
///
/// Returns [`ArchiveError::Packaging`] if the title or author is empty or
/// the archive cannot be generated, and [`ArchiveError::Io`] if a resource
/// cannot be read or the output cannot be written.
pub async fn write_epub(options: EpubOptions, output: &Path) -> Result<PathBuf, ArchiveError> {
    if options.title.trim().is_empty() {
        return Err(ArchiveError::Packaging("book has no title".to_string()));
    }
    if options.author.trim().is_empty() {
        return Err(ArchiveError::Packaging("book has no author".to_string()));
    }
    if let Some(ref publisher) = options.publisher {
        debug!(publisher = %publisher, "Publisher is not recorded in the package metadata");
    }

    let cover = match options.cover {
        Some(ref path) => Some(read_resource(path).await?),
        None => None,
    };
    let mut images = Vec::with_capacity(options.images.len());
    for path in &options.images {
        images.push((path.to_string_lossy().into_owned(), read_resource(path).await?));
    }

    info!(
        title = %options.title,
        chapters = options.content.len(),
        images = images.len(),
        "Building EPUB"
    );

    let bytes = tokio::task::spawn_blocking(move || build_epub(&options, cover, images))
        .await
        .map_err(|e| ArchiveError::Packaging(format!("packaging task failed: {e}")))??;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArchiveError::io(parent, e))?;
    }
    tokio::fs::write(output, &bytes)
        .await
        .map_err(|e| ArchiveError::io(output, e))?;

    info!(path = %output.display(), size = bytes.len(), "EPUB written");
    Ok(output.to_path_buf())
}

async fn read_resource(path: &Path) -> Result<Resource, ArchiveError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ArchiveError::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Resource { name, bytes })
}

fn packaging_error(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Packaging(e.to_string())
}

/// Build the EPUB archive in memory.
///
/// `images` pairs the path each image is referenced by in chapter content
/// with its loaded bytes.
fn build_epub(
    options: &EpubOptions,
    cover: Option<Resource>,
    images: Vec<(String, Resource)>,
) -> Result<Vec<u8>, ArchiveError> {
    let zip = ZipLibrary::new().map_err(packaging_error)?;
    let mut builder = EpubBuilder::new(zip).map_err(packaging_error)?;
    builder.epub_version(EpubVersion::V30);
    builder
        .metadata("title", options.title.as_str())
        .map_err(packaging_error)?;
    builder
        .metadata("author", options.author.as_str())
        .map_err(packaging_error)?;
    builder
        .metadata("lang", options.lang.as_str())
        .map_err(packaging_error)?;

    if let Some(ref css) = options.css {
        builder
            .stylesheet(css.as_bytes())
            .map_err(packaging_error)?;
    }

    if let Some(cover) = cover {
        let mime = sniff_mime(&cover.bytes);
        builder
            .add_cover_image(cover_name(&cover.bytes), Cursor::new(cover.bytes), mime)
            .map_err(packaging_error)?;
    }

    let mut references = HashMap::with_capacity(images.len());
    for (referenced_as, image) in images {
        let target = format!("images/{}", image.name);
        let mime = sniff_mime(&image.bytes);
        builder
            .add_resource(&target, Cursor::new(image.bytes), mime)
            .map_err(packaging_error)?;
        references.insert(referenced_as, target);
    }

    let link_stylesheet = options.css.is_some();
    for (i, record) in options.content.iter().enumerate() {
        let document = xhtml::chapter_document(
            &record.data,
            &record.title,
            &options.lang,
            link_stylesheet,
            &references,
        );
        let mut content = EpubContent::new(format!("chapter_{i:03}.xhtml"), document.as_bytes())
            .title(record.title.as_str());
        if i == 0 {
            content = content.reftype(ReferenceType::Text);
        }
        builder.add_content(content).map_err(packaging_error)?;
    }

    let mut out = Vec::new();
    builder.generate(&mut out).map_err(packaging_error)?;
    Ok(out)
}
