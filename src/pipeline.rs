//! The archive pipeline: metadata, front matter, chapters, resources.
//!
//! Each stage takes the [`Book`] built so far and returns the extended book.
//! Chapter captures pull their blob resources into the cache before the
//! browser state moves on, since blob URLs only resolve while their page is
//! alive.

use tracing::{debug, info, warn};

use crate::blob::{BlobKind, BlobRef};
use crate::book::{Acceptance, Book, Chapter, CoverImage, Placement};
use crate::cache::ResourceCache;
use crate::config::{Config, SettleConfig};
use crate::constants::{COVER_FILE_NAME, READER_USER_AGENT};
use crate::content::reconcile;
use crate::error::{ArchiveError, Step};
use crate::metadata::extract_metadata;
use crate::reader::{parse_page_number, ReaderSession};
use crate::readiness::Backoff;

/// Drives a [`ReaderSession`] through the whole publication.
pub struct Archiver<S> {
    session: S,
    cache: ResourceCache,
    http: reqwest::Client,
    settle: SettleConfig,
    load_wait: SettleConfig,
    max_front_matter_pages: u32,
}

impl<S: ReaderSession> Archiver<S> {
    /// Create an archiver over an opened session and cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(session: S, cache: ResourceCache, config: &Config) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .user_agent(READER_USER_AGENT)
            .build()
            .map_err(ArchiveError::HttpClient)?;

        Ok(Self {
            session,
            cache,
            http,
            settle: config.settle,
            load_wait: SettleConfig {
                timeout: config.page_timeout,
                ..config.settle
            },
            max_front_matter_pages: config.max_front_matter_pages,
        })
    }

    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Run every traversal stage and return the populated book.
    ///
    /// # Errors
    ///
    /// Any failed navigation, script, or download aborts the run.
    pub async fn capture(&mut self) -> Result<Book, ArchiveError> {
        info!("Fetching metadata");
        let book = self.fetch_metadata(Book::default()).await?;

        info!("Connecting to reader...");
        self.session.open_reader().await?;
        let launchers = self.session.launcher_count().await?;
        if launchers == 0 {
            warn!("Failed to get chapters, try updating the session token");
            return Err(ArchiveError::Authentication {
                url: self.session.reader_url(),
            });
        }

        let book = self.traverse_front_matter(book).await?;
        self.traverse_chapters(book, launchers).await
    }

    /// Read the publication page into the book and download the cover.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be loaded or the cover cannot be
    /// downloaded.
    pub async fn fetch_metadata(&mut self, book: Book) -> Result<Book, ArchiveError> {
        let html = self.session.publication_html().await?;
        let mut book = extract_metadata(&html).apply(book);

        if let Some(CoverImage::Remote(url)) = book.cover.take() {
            let path = self.download_cover(&url).await?;
            book.cover = Some(CoverImage::Local(path));
        }

        info!(
            title = ?book.title,
            author = ?book.author,
            publisher = ?book.publisher,
            isbn = ?book.isbn,
            cover = ?book.cover,
            "Metadata"
        );
        Ok(book)
    }

    async fn download_cover(&self, url: &str) -> Result<std::path::PathBuf, ArchiveError> {
        let fetch_error = |source: reqwest::Error| ArchiveError::ResourceFetch {
            url: url.to_string(),
            step: Step::Metadata,
            source: source.into(),
        };

        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;

        debug!(url = %url, size = bytes.len(), "Cover downloaded");
        self.cache.store(COVER_FILE_NAME, &bytes).await
    }

    /// Page backward from the entry chapter to page 1, prepending each page.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::TraversalLimit`] if page 1 is not reached
    /// within the configured number of back steps.
    pub async fn traverse_front_matter(&mut self, mut book: Book) -> Result<Book, ArchiveError> {
        self.session.click_launcher(0).await?;

        debug!("Waiting for page number");
        let mut current = self.wait_for_page_number().await?;

        info!(start_page = current, "Fetching front matter");
        let mut steps = 0;
        while current != 1 {
            if steps >= self.max_front_matter_pages {
                return Err(ArchiveError::TraversalLimit {
                    limit: self.max_front_matter_pages,
                    last_page: current,
                });
            }
            steps += 1;

            self.session.click_back().await?;
            current = self.settle_page_change(current).await?;

            let step = Step::FrontMatter { page: current };
            let content = self.frame_content().await?;
            let chapter = Chapter::front_matter(current, content);
            let chapter = self.resolve_chapter(&mut book, chapter, step).await?;

            match book.accept(chapter, Placement::Prepend) {
                Acceptance::Inserted => debug!(page = current, "Front matter page captured"),
                skipped => debug!(page = current, ?skipped, "Front matter page skipped"),
            }
        }

        Ok(book)
    }

    /// Click every chapter launcher in order, appending each new chapter.
    ///
    /// # Errors
    ///
    /// Returns an error if a launcher cannot be clicked or a resource fails
    /// to download.
    pub async fn traverse_chapters(
        &mut self,
        mut book: Book,
        launchers: usize,
    ) -> Result<Book, ArchiveError> {
        let total = self.session.chapter_count(launchers);

        for index in 0..total {
            info!("Fetching Chapter {}/{total}", index + 1);
            let before = self.session.frame_content().await?;
            self.session.click_launcher(index).await?;
            self.settle_frame_change(before.as_deref()).await?;

            let step = Step::Chapter { index };
            let content = self.frame_content().await?;
            let chapter = self
                .resolve_chapter(&mut book, Chapter::untitled(content), step)
                .await?;

            let verdict = book.admission(&chapter);
            if verdict != Acceptance::Inserted {
                debug!(chapter = index + 1, ?verdict, "Chapter skipped");
                continue;
            }

            let title = self.session.launcher_title(index).await?;
            let chapter = Chapter {
                title: Some(title.trim().to_string()),
                ..chapter
            };
            book.accept(chapter, Placement::Append);
        }

        Ok(book)
    }

    /// Pull the frame's resources into the cache and reconcile the content.
    async fn resolve_chapter(
        &self,
        book: &mut Book,
        mut chapter: Chapter,
        step: Step,
    ) -> Result<Chapter, ArchiveError> {
        self.download_blobs(book, step).await?;
        reconcile(&mut chapter, &self.session.blob_origin(), self.cache.root());
        Ok(chapter)
    }

    /// Ensure every blob referenced by the current frame exists in the cache.
    ///
    /// Stylesheets and images already registered on the book are skipped, as
    /// are names already present on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::ResourceFetch`] on the first failed download.
    pub async fn download_blobs(&self, book: &mut Book, step: Step) -> Result<usize, ArchiveError> {
        debug!(%step, "Downloading blobs");
        let mut downloaded = 0;

        for raw in self.session.frame_blob_refs().await? {
            let Some(blob) = BlobRef::parse(&raw) else {
                debug!(reference = %raw, "Ignoring blob reference without a name");
                continue;
            };

            let newly_registered = match blob.kind {
                BlobKind::Stylesheet => book.register_stylesheet(&blob.file_name),
                BlobKind::Image => book.register_image(&blob.file_name),
                BlobKind::Other => true,
            };
            if !newly_registered || self.cache.contains(&blob.file_name).await? {
                continue;
            }

            let bytes = self
                .session
                .fetch_bytes(&blob.url)
                .await
                .map_err(|e| ArchiveError::ResourceFetch {
                    url: blob.url.clone(),
                    step,
                    source: Box::new(e),
                })?;
            self.cache.store(&blob.file_name, &bytes).await?;
            debug!(name = %blob.file_name, size = bytes.len(), "Blob cached");
            downloaded += 1;
        }

        Ok(downloaded)
    }

    async fn frame_content(&self) -> Result<String, ArchiveError> {
        Ok(self.session.frame_content().await?.unwrap_or_default())
    }

    async fn read_page_number(&self) -> Result<Option<u32>, ArchiveError> {
        self.session
            .page_indicator()
            .await?
            .map(|text| parse_page_number(&text))
            .transpose()
    }

    async fn wait_for_page_number(&self) -> Result<u32, ArchiveError> {
        let mut backoff = Backoff::new(&self.load_wait);
        loop {
            if let Some(page) = self.read_page_number().await? {
                return Ok(page);
            }
            if !backoff.wait().await {
                return Err(ArchiveError::MissingElement {
                    selector: "page indicator".to_string(),
                    step: Step::FrontMatterEntry,
                });
            }
        }
    }

    /// Wait until the page indicator moves off `previous`, then return it.
    async fn settle_page_change(&self, previous: u32) -> Result<u32, ArchiveError> {
        let mut backoff = Backoff::new(&self.settle);
        loop {
            let current = self.read_page_number().await?;
            if let Some(page) = current.filter(|page| *page != previous) {
                return Ok(page);
            }
            if backoff.wait().await {
                continue;
            }
            return match current {
                Some(page) => {
                    debug!(page, attempts = backoff.attempts(), "Page indicator did not change");
                    Ok(page)
                }
                None => Err(ArchiveError::MissingElement {
                    selector: "page indicator".to_string(),
                    step: Step::FrontMatter { page: previous },
                }),
            };
        }
    }

    /// Wait until the frame content differs from `before`.
    async fn settle_frame_change(&self, before: Option<&str>) -> Result<(), ArchiveError> {
        let mut backoff = Backoff::new(&self.settle);
        loop {
            let now = self.session.frame_content().await?;
            if now.is_some() && now.as_deref() != before {
                return Ok(());
            }
            if !backoff.wait().await {
                debug!(attempts = backoff.attempts(), "Frame content did not change");
                return Ok(());
            }
        }
    }

    /// Close the browser session.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser fails to shut down.
    pub async fn close(mut self) -> Result<(), ArchiveError> {
        self.session.close().await
    }
}
