//! Reconciliation of captured chapter HTML with the local resource cache.

use std::path::Path;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::book::Chapter;

static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("static selector"));

/// Replace every occurrence of the blob origin prefix with the cache directory.
///
/// `blob:https://host/uuid` becomes `<cache>/uuid`, so the packaged document
/// points at files that exist on disk.
#[must_use]
pub fn rewrite_blob_origin(content: &str, blob_origin: &str, cache_root: &Path) -> String {
    if blob_origin.is_empty() {
        return content.to_string();
    }
    content.replace(blob_origin, &cache_root.to_string_lossy())
}

/// Href of the first `<base>` element in the document, if any.
#[must_use]
pub fn extract_base_href(content: &str) -> Option<String> {
    let document = Html::parse_document(content);
    document
        .select(&BASE_SELECTOR)
        .filter_map(|base| base.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

/// Rewrite the chapter's blob references and resolve its href identity.
pub fn reconcile(chapter: &mut Chapter, blob_origin: &str, cache_root: &Path) {
    chapter.content = rewrite_blob_origin(&chapter.content, blob_origin, cache_root);
    chapter.href = extract_base_href(&chapter.content);
}
