//! Integration tests for the capture pipeline against a scripted reader.

mod common;

use common::{
    blob_url, create_test_config, publication_html, zip_entries, zip_entry, MockPage, MockReader,
};
use reader_epub_archiver::archive_book;
use reader_epub_archiver::book::{Book, CoverImage};
use reader_epub_archiver::cache::ResourceCache;
use reader_epub_archiver::config::Config;
use reader_epub_archiver::error::{ArchiveError, Step};
use reader_epub_archiver::pipeline::Archiver;
use std::time::Duration;
use tempfile::TempDir;

/// Pages 1-3 are front matter, 4-7 are the chapters behind the launchers.
fn seven_page_reader() -> MockReader {
    MockReader::new(publication_html("Keisri hull", "Jaan Kross, autor", None))
        .page(1, MockPage::with_base("cover", "<p>Kaas</p>").stylesheet("main"))
        .page(2, MockPage::with_base("title", "<p>Tiitelleht</p>").stylesheet("main"))
        .page(3, MockPage::with_base("toc", "<p>Sisukord</p>"))
        .page(
            4,
            MockPage::with_base("ch1", "<p>Esimene peatükk</p>")
                .stylesheet("main")
                .image("img1"),
        )
        .page(5, MockPage::with_base("ch2", "<p>Teine peatükk</p>").image("img1"))
        .page(6, MockPage::with_base("ch3", "<p>Kolmas peatükk</p>"))
        .page(7, MockPage::with_base("ch4", "<p>Neljas peatükk</p>").stylesheet("extra"))
        .chapters(&[(4, "Esimene"), (5, "Teine"), (6, "Kolmas"), (7, "Neljas")])
}

async fn archiver(reader: MockReader, config: &Config) -> Archiver<MockReader> {
    let cache = ResourceCache::open(&config.temp_dir).await.unwrap();
    Archiver::new(reader, cache, config).unwrap()
}

fn titles(book: &Book) -> Vec<&str> {
    book.content
        .iter()
        .map(|chapter| chapter.title.as_deref().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_capture_orders_front_matter_before_chapters() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let mut archiver = archiver(seven_page_reader(), &config).await;

    let book = archiver.capture().await.unwrap();

    assert_eq!(
        titles(&book),
        ["1", "2", "3", "Esimene", "Teine", "Kolmas", "Neljas"]
    );
    assert_eq!(book.title.as_deref(), Some("Keisri hull"));
    assert_eq!(book.author.as_deref(), Some("Jaan Kross"));
    assert_eq!(book.isbn.as_deref(), Some("9789985000000"));
    assert!(book.content[0].content.contains("Kaas"));
    assert!(book.content[6].content.contains("Neljas peatükk"));

    let hrefs: Vec<_> = book
        .content
        .iter()
        .map(|c| c.href.clone().unwrap())
        .collect();
    assert_eq!(hrefs[0], "https://reader.test/book/cover.xhtml");
    assert_eq!(hrefs[3], "https://reader.test/book/ch1.xhtml");
}

#[tokio::test]
async fn test_capture_rewrites_blob_urls_to_cache() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let mut archiver = archiver(seven_page_reader(), &config).await;

    let book = archiver.capture().await.unwrap();
    let cached = archiver.cache().path("img1");

    let chapter = &book.content[3];
    assert!(!chapter.content.contains("blob:"));
    assert!(chapter
        .content
        .contains(&format!(r#"src="{}""#, cached.display())));
    assert_eq!(book.images, ["img1"]);
    assert_eq!(book.stylesheets, ["main.css", "extra.css"]);
}

#[tokio::test]
async fn test_resources_are_fetched_once() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let reader = seven_page_reader();
    let recorder = reader.recorder.clone();
    let mut archiver = archiver(reader, &config).await;

    archiver.capture().await.unwrap();

    assert_eq!(recorder.fetch_count(&blob_url("main")), 1);
    assert_eq!(recorder.fetch_count(&blob_url("img1")), 1);
    assert_eq!(recorder.fetch_count(&blob_url("extra")), 1);
    assert_eq!(recorder.total_fetches(), 3);
    assert!(archiver.cache().contains("main.css").await.unwrap());
}

#[tokio::test]
async fn test_cached_files_are_not_refetched() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let cache = ResourceCache::open(&config.temp_dir).await.unwrap();
    cache.store("img1", b"from an earlier run").await.unwrap();

    let reader = seven_page_reader();
    let recorder = reader.recorder.clone();
    let mut archiver = Archiver::new(reader, cache, &config).unwrap();

    let book = archiver.capture().await.unwrap();

    assert_eq!(recorder.fetch_count(&blob_url("img1")), 0);
    assert_eq!(book.images, ["img1"]);
}

#[tokio::test]
async fn test_duplicate_and_missing_hrefs_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let reader = MockReader::new(publication_html("T", "A", None))
        .page(1, MockPage::with_base("title", "<p>Tiitelleht</p>"))
        .page(2, MockPage::with_base("ch1", "<p>One</p>"))
        .page(3, MockPage::interstitial("<p>Loading</p>"))
        .page(4, MockPage::with_base("ch3", "<p>Three</p>"))
        .chapters(&[(2, "One"), (2, "One again"), (3, "Loading"), (4, "Three")]);
    let mut archiver = archiver(reader, &config).await;

    let book = archiver.capture().await.unwrap();

    assert_eq!(titles(&book), ["1", "One", "Three"]);
}

#[tokio::test]
async fn test_entry_on_first_page_has_no_front_matter() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let reader = MockReader::new(publication_html("T", "A", None))
        .page(1, MockPage::with_base("ch1", "<p>One</p>"))
        .page(2, MockPage::with_base("ch2", "<p>Two</p>"))
        .chapters(&[(1, "One"), (2, "Two")]);
    let mut archiver = archiver(reader, &config).await;

    let book = archiver.capture().await.unwrap();

    assert_eq!(titles(&book), ["One", "Two"]);
}

#[tokio::test]
async fn test_front_matter_stops_at_traversal_limit() {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        max_front_matter_pages: 5,
        ..create_test_config(tmp.path())
    };
    let mut reader = seven_page_reader();
    reader.stuck_at = Some(3);
    let mut archiver = archiver(reader, &config).await;

    let err = archiver.capture().await.unwrap_err();

    assert!(matches!(
        err,
        ArchiveError::TraversalLimit {
            limit: 5,
            last_page: 3
        }
    ));
}

#[tokio::test]
async fn test_missing_page_indicator_fails_at_front_matter_entry() {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        page_timeout: Duration::from_millis(50),
        ..create_test_config(tmp.path())
    };
    let mut reader = seven_page_reader();
    reader.indicator_hidden = true;
    let mut archiver = archiver(reader, &config).await;

    let err = archiver.capture().await.unwrap_err();

    match err {
        ArchiveError::MissingElement { selector, step } => {
            assert_eq!(selector, "page indicator");
            assert_eq!(step, Step::FrontMatterEntry);
        }
        other => panic!("expected MissingElement, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_launchers_is_an_authentication_failure() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let reader = MockReader::new(publication_html("T", "A", None))
        .page(1, MockPage::with_base("ch1", "<p>One</p>"));
    let recorder = reader.recorder.clone();

    let err = archive_book(&config, reader).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Authentication { .. }));
    assert!(*recorder.closed.lock().unwrap());
    assert!(!config.books_dir.join("T.epub").exists());
}

#[tokio::test]
async fn test_failed_resource_aborts_with_step() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let mut reader = seven_page_reader();
    reader.pages.insert(
        6,
        MockPage::with_base("ch3", "<p>Kolmas</p>").image("img9"),
    );
    reader.failing.insert(blob_url("img9"));
    let mut archiver = archiver(reader, &config).await;

    let err = archiver.capture().await.unwrap_err();

    match err {
        ArchiveError::ResourceFetch { url, step, .. } => {
            assert_eq!(url, blob_url("img9"));
            assert_eq!(step, Step::Chapter { index: 2 });
        }
        other => panic!("expected ResourceFetch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_archive_book_writes_epub() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let reader = seven_page_reader();
    let recorder = reader.recorder.clone();

    let output = archive_book(&config, reader).await.unwrap();

    assert!(output.ends_with("Keisri_hull.epub"));
    assert!(output.is_file());
    assert!(*recorder.closed.lock().unwrap());

    let entries = zip_entries(&output);
    let chapters: Vec<_> = entries
        .iter()
        .filter(|name| name.contains("chapter_") && name.ends_with(".xhtml"))
        .collect();
    assert_eq!(chapters.len(), 7);
    assert!(entries.iter().any(|name| name.ends_with("images/img1")));
    assert!(entries.iter().any(|name| name.ends_with("stylesheet.css")));

    let first = zip_entry(&output, "chapter_000.xhtml");
    assert!(first.contains("Kaas"));
    let fourth = zip_entry(&output, "chapter_003.xhtml");
    assert!(fourth.contains("Esimene peatükk"));
    assert!(fourth.contains(r#"src="images/img1""#));

    let css = zip_entry(&output, "stylesheet.css");
    let main = css.find(&blob_url("main")).unwrap();
    let extra = css.find(&blob_url("extra")).unwrap();
    assert!(main < extra);

    // The cache is kept unless clearing is configured.
    assert!(config.temp_dir.join("main.css").exists());
}

#[tokio::test]
async fn test_archive_book_clears_cache_when_configured() {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        clear_temp_on_success: true,
        ..create_test_config(tmp.path())
    };

    archive_book(&config, seven_page_reader()).await.unwrap();

    let remaining = std::fs::read_dir(&config.temp_dir).unwrap().count();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_archive_book_requires_author() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let mut reader = seven_page_reader();
    reader.publication = "<html><head><meta name=\"DC.title\" content=\"T\"></head></html>".to_string();

    let err = archive_book(&config, reader).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Packaging(_)));
}

#[tokio::test]
async fn test_metadata_without_cover_leaves_cover_unset() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(tmp.path());
    let mut archiver = archiver(seven_page_reader(), &config).await;

    let book = archiver.fetch_metadata(Book::default()).await.unwrap();

    assert_eq!(book.cover, None::<CoverImage>);
    assert_eq!(book.publisher.as_deref(), Some("Eesti Raamat"));
}
