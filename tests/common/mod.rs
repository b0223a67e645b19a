//! Scripted in-memory reader used by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reader_epub_archiver::config::Config;
use reader_epub_archiver::reader::ReaderSession;
use reader_epub_archiver::ArchiveError;

pub const ORIGIN: &str = "blob:https://reader.test";

/// Minimal PNG signature, enough for format sniffing.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Test configuration rooted in a scratch directory.
pub fn create_test_config(work_dir: &Path) -> Config {
    Config {
        temp_dir: work_dir.join("temp"),
        books_dir: work_dir.join("books"),
        ..Config::for_testing()
    }
}

pub fn publication_html(title: &str, author: &str, cover: Option<&str>) -> String {
    let cover = cover
        .map(|url| format!(r#"<meta property="og:image" content="{url}">"#))
        .unwrap_or_default();
    format!(
        r#"<html><head>
            <meta name="author" content="{author}">
            <meta name="DC.title" content="{title}">
            <meta name="DC.publisher" content="Eesti Raamat">
            <meta name="DC.identifier" content="9789985000000">
            {cover}
        </head><body></body></html>"#
    )
}

/// Rendered content of one reader page.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub content: String,
    /// Raw blob references as classified by the page scripts.
    pub blob_refs: Vec<String>,
}

impl MockPage {
    /// A page whose frame carries a `<base>` href derived from `id`.
    pub fn with_base(id: &str, body: &str) -> Self {
        Self {
            content: format!(
                r#"<html><head><base href="https://reader.test/book/{id}.xhtml"></head><body>{body}</body></html>"#
            ),
            blob_refs: Vec::new(),
        }
    }

    /// A page without a `<base>` element.
    pub fn interstitial(body: &str) -> Self {
        Self {
            content: format!("<html><head></head><body>{body}</body></html>"),
            blob_refs: Vec::new(),
        }
    }

    pub fn stylesheet(mut self, name: &str) -> Self {
        self.blob_refs.push(format!("{ORIGIN}/{name}-stylesheet"));
        self
    }

    pub fn image(mut self, name: &str) -> Self {
        self.content = self.content.replace(
            "</body>",
            &format!(r#"<img src="{ORIGIN}/{name}"></body>"#),
        );
        self.blob_refs.push(format!("{ORIGIN}/{name}-image"));
        self
    }
}

/// Counters shared with the test after the session moves into the archiver.
#[derive(Debug, Default)]
pub struct Recorder {
    pub fetches: Mutex<Vec<String>>,
    pub closed: Mutex<bool>,
}

impl Recorder {
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

/// A reader whose pages, launchers and failures are scripted up front.
///
/// Page numbers start at 1. Each launcher jumps to a page; the back control
/// moves one page down unless `stuck_at` pins the indicator.
pub struct MockReader {
    pub publication: String,
    pub pages: BTreeMap<u32, MockPage>,
    /// Target page of each launcher, in DOM order.
    pub launchers: Vec<u32>,
    pub titles: Vec<String>,
    pub current: Option<u32>,
    pub stuck_at: Option<u32>,
    /// The page indicator never renders.
    pub indicator_hidden: bool,
    pub failing: HashSet<String>,
    pub recorder: Arc<Recorder>,
}

impl MockReader {
    pub fn new(publication: String) -> Self {
        Self {
            publication,
            pages: BTreeMap::new(),
            launchers: Vec::new(),
            titles: Vec::new(),
            current: None,
            stuck_at: None,
            indicator_hidden: false,
            failing: HashSet::new(),
            recorder: Arc::new(Recorder::default()),
        }
    }

    pub fn page(mut self, number: u32, page: MockPage) -> Self {
        self.pages.insert(number, page);
        self
    }

    /// Add a launcher pair (the reader lists every chapter twice).
    pub fn chapters(mut self, targets: &[(u32, &str)]) -> Self {
        for _ in 0..2 {
            for (page, title) in targets {
                self.launchers.push(*page);
                self.titles.push(format!("  {title}\n"));
            }
        }
        self
    }

    fn current_page(&self) -> Option<&MockPage> {
        self.current.and_then(|n| self.pages.get(&n))
    }

    fn total(&self) -> u32 {
        self.pages.keys().next_back().copied().unwrap_or(0)
    }
}

#[async_trait]
impl ReaderSession for MockReader {
    async fn publication_html(&mut self) -> Result<String, ArchiveError> {
        Ok(self.publication.clone())
    }

    async fn open_reader(&mut self) -> Result<(), ArchiveError> {
        Ok(())
    }

    fn reader_url(&self) -> String {
        "https://reader.test/et/reading/test-book".to_string()
    }

    async fn launcher_count(&self) -> Result<usize, ArchiveError> {
        Ok(self.launchers.len())
    }

    async fn click_launcher(&mut self, index: usize) -> Result<(), ArchiveError> {
        self.current = self.launchers.get(index).copied();
        Ok(())
    }

    async fn launcher_title(&self, index: usize) -> Result<String, ArchiveError> {
        Ok(self.titles.get(index).cloned().unwrap_or_default())
    }

    async fn click_back(&mut self) -> Result<(), ArchiveError> {
        if let Some(stuck) = self.stuck_at {
            self.current = Some(stuck);
        } else {
            self.current = self.current.map(|n| n.saturating_sub(1).max(1));
        }
        Ok(())
    }

    async fn page_indicator(&self) -> Result<Option<String>, ArchiveError> {
        if self.indicator_hidden {
            return Ok(None);
        }
        Ok(self.current.map(|n| format!("{n}/{}", self.total())))
    }

    async fn frame_content(&self) -> Result<Option<String>, ArchiveError> {
        Ok(self.current_page().map(|page| page.content.clone()))
    }

    async fn frame_blob_refs(&self) -> Result<Vec<String>, ArchiveError> {
        Ok(self
            .current_page()
            .map(|page| page.blob_refs.clone())
            .unwrap_or_default())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        self.recorder.fetches.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(ArchiveError::Script {
                context: format!("fetching {url}"),
                source: "Failed to fetch".into(),
            });
        }
        // Resources named img* are images; everything else is a stylesheet.
        if url.starts_with(&format!("{ORIGIN}/img")) {
            return Ok(PNG_BYTES.to_vec());
        }
        Ok(format!("/* {url} */ p {{ margin: 0 }}").into_bytes())
    }

    fn blob_origin(&self) -> String {
        ORIGIN.to_string()
    }

    async fn close(&mut self) -> Result<(), ArchiveError> {
        *self.recorder.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Blob URL for a resource name, as `fetch_bytes` receives it.
pub fn blob_url(name: &str) -> String {
    format!("{ORIGIN}/{name}")
}

/// Entry names of a zip archive, sorted.
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Contents of the first zip entry whose name ends with `suffix`.
pub fn zip_entry(path: &Path, suffix: &str) -> String {
    use std::io::Read;

    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let name = archive
        .file_names()
        .find(|n| n.ends_with(suffix))
        .unwrap()
        .to_string();
    let mut out = String::new();
    archive.by_name(&name).unwrap().read_to_string(&mut out).unwrap();
    out
}
