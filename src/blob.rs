//! Classification of in-browser `blob:` resource references.
//!
//! The reader script lists every frame element whose `src` or `href` holds a
//! blob URL. Stylesheet links come back with a `-stylesheet` suffix and image
//! elements with an `-image` suffix; everything else is passed through as is.

const STYLESHEET_MARKER: &str = "-stylesheet";
const IMAGE_MARKER: &str = "-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Stylesheet,
    Image,
    Other,
}

/// A blob reference resolved to the URL to fetch and the cache file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// URL with the classification suffix removed.
    pub url: String,
    pub file_name: String,
    pub kind: BlobKind,
}

impl BlobRef {
    /// Resolve a raw reference as reported by the frame script.
    ///
    /// Returns `None` when the reference has no trailing path segment to name
    /// the cached file after.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (url, kind) = if let Some(url) = raw.strip_suffix(STYLESHEET_MARKER) {
            (url, BlobKind::Stylesheet)
        } else if let Some(url) = raw.strip_suffix(IMAGE_MARKER) {
            (url, BlobKind::Image)
        } else {
            (raw, BlobKind::Other)
        };

        let segment = url.rsplit('/').next().unwrap_or_default();
        if segment.is_empty() {
            return None;
        }

        let file_name = match kind {
            BlobKind::Stylesheet => format!("{segment}.css"),
            BlobKind::Image | BlobKind::Other => segment.to_string(),
        };

        Some(Self {
            url: url.to_string(),
            file_name,
            kind,
        })
    }
}
