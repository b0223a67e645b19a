//! Site adapter for the web reader.
//!
//! Everything tied to the reader's markup lives behind [`ReaderSession`]:
//! selectors, element ordering, how many launchers make up a chapter list.
//! The traversal in [`crate::pipeline`] only talks to this trait.

use async_trait::async_trait;

use crate::error::ArchiveError;

pub mod chromium;
mod scripts;

pub use chromium::ChromiumSession;

/// Operations the traversal needs from a live reader page.
#[async_trait]
pub trait ReaderSession: Send + Sync {
    /// HTML of the publication's metadata page.
    async fn publication_html(&mut self) -> Result<String, ArchiveError>;

    /// Navigate to the reader and wait until it has loaded.
    async fn open_reader(&mut self) -> Result<(), ArchiveError>;

    /// URL of the reader page, for diagnostics.
    fn reader_url(&self) -> String;

    /// Number of chapter launcher elements currently in the DOM.
    async fn launcher_count(&self) -> Result<usize, ArchiveError>;

    /// Click the launcher at `index`.
    async fn click_launcher(&mut self, index: usize) -> Result<(), ArchiveError>;

    /// Visible text of the launcher at `index`.
    async fn launcher_title(&self, index: usize) -> Result<String, ArchiveError>;

    /// Click the control that pages one step back.
    async fn click_back(&mut self) -> Result<(), ArchiveError>;

    /// Raw text of the page indicator, `None` while it is not rendered.
    async fn page_indicator(&self) -> Result<Option<String>, ArchiveError>;

    /// HTML currently rendered inside the content frame.
    async fn frame_content(&self) -> Result<Option<String>, ArchiveError>;

    /// Blob references in the content frame, classified with the suffixes
    /// understood by [`crate::blob::BlobRef::parse`].
    async fn frame_blob_refs(&self) -> Result<Vec<String>, ArchiveError>;

    /// Fetch a URL through the browser's own network stack.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ArchiveError>;

    /// Prefix shared by every blob URL the reader creates, e.g.
    /// `blob:https://host`.
    fn blob_origin(&self) -> String;

    /// Number of chapters to visit given the launcher count.
    ///
    /// Every chapter appears twice in the launcher list.
    fn chapter_count(&self, launchers: usize) -> usize {
        launchers / 2
    }

    /// Release the page and browser.
    async fn close(&mut self) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// URLs and selectors of one reader deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    /// Origin without trailing slash, e.g. `https://elaenutus.mirko.ee`.
    pub site_url: String,
    pub locale: String,
    pub chapter_button_selector: String,
    pub page_number_selector: String,
    pub back_button_selector: String,
    /// Which match of `back_button_selector` pages backwards.
    pub back_button_index: usize,
    /// Chapter launcher pairs at the end of the list that are not chapters.
    pub trailing_launcher_pairs: usize,
}

impl SiteProfile {
    /// Profile for the live reader at `site_url`.
    #[must_use]
    pub fn live(site_url: &str, locale: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            locale: locale.to_string(),
            chapter_button_selector: ".reader-page-container>div>div>div>div>div button"
                .to_string(),
            page_number_selector: ".reader-page-footer>div>div>span".to_string(),
            back_button_selector: ".reader-page-container>div>div>button".to_string(),
            back_button_index: 1,
            trailing_launcher_pairs: 1,
        }
    }

    #[must_use]
    pub fn publication_url(&self, book_id: &str) -> String {
        format!("{}/{}/publication/{book_id}", self.site_url, self.locale)
    }

    #[must_use]
    pub fn reading_url(&self, book_id: &str) -> String {
        format!("{}/{}/reading/{book_id}", self.site_url, self.locale)
    }

    #[must_use]
    pub fn blob_origin(&self) -> String {
        format!("blob:{}", self.site_url)
    }

    /// Cookie domain: the host of the site URL.
    #[must_use]
    pub fn host(&self) -> String {
        url::Url::parse(&self.site_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Parent domain the consent cookie is scoped to, e.g. `.mirko.ee`.
    #[must_use]
    pub fn parent_domain(&self) -> String {
        let host = self.host();
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= 2 {
            return format!(".{host}");
        }
        format!(".{}", labels[labels.len() - 2..].join("."))
    }

    /// Chapters to visit: half the launchers, minus the trailing pairs.
    #[must_use]
    pub fn chapter_count(&self, launchers: usize) -> usize {
        (launchers / 2).saturating_sub(self.trailing_launcher_pairs)
    }
}

/// Parse the numerator of a `<n>/<total>` page indicator.
///
/// # Errors
///
/// Returns [`ArchiveError::PageIndicator`] when the text has no numeric
/// numerator.
pub fn parse_page_number(text: &str) -> Result<u32, ArchiveError> {
    text.split('/')
        .next()
        .map(str::trim)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| ArchiveError::PageIndicator {
            text: text.to_string(),
        })
}
