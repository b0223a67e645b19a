//! Publication metadata extraction from the reader's publication page.
//!
//! The page carries Dublin Core and Open Graph `<meta>` tags in its head.
//! Each known field maps to one selector; fields whose tag is absent are
//! simply left unset.

use scraper::{Html, Selector};

use crate::book::{Book, CoverImage};

/// Contributor-role suffixes the site appends to author names.
const AUTHOR_ROLE_SUFFIXES: [&str; 2] = [", pseudonüüm", ", autor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Author,
    Isbn,
    Title,
    Publisher,
    Cover,
}

/// Field to selector table; the value is read from the `content` attribute.
pub const METADATA_SELECTORS: [(MetadataField, &str); 5] = [
    (MetadataField::Author, "head > meta[name='author']"),
    (MetadataField::Isbn, "head > meta[name='DC.identifier']"),
    (MetadataField::Title, "head > meta[name='DC.title']"),
    (MetadataField::Publisher, "head > meta[name='DC.publisher']"),
    (MetadataField::Cover, "head > meta[property='og:image']"),
];

/// Metadata read from a publication page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationMetadata {
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
    /// Remote cover image URL.
    pub cover: Option<String>,
}

impl PublicationMetadata {
    fn set(&mut self, field: MetadataField, value: String) {
        let slot = match field {
            MetadataField::Author => &mut self.author,
            MetadataField::Isbn => &mut self.isbn,
            MetadataField::Title => &mut self.title,
            MetadataField::Publisher => &mut self.publisher,
            MetadataField::Cover => &mut self.cover,
        };
        *slot = Some(value);
    }

    /// Copy every extracted field onto the book, leaving the others untouched.
    #[must_use]
    pub fn apply(self, mut book: Book) -> Book {
        if self.author.is_some() {
            book.author = self.author;
        }
        if self.isbn.is_some() {
            book.isbn = self.isbn;
        }
        if self.title.is_some() {
            book.title = self.title;
        }
        if self.publisher.is_some() {
            book.publisher = self.publisher;
        }
        if let Some(cover) = self.cover {
            book.cover = Some(CoverImage::Remote(cover));
        }
        book
    }
}

/// Extract the publication metadata from the page HTML.
#[must_use]
pub fn extract_metadata(html: &str) -> PublicationMetadata {
    let document = Html::parse_document(html);
    let mut metadata = PublicationMetadata::default();

    for (field, selector) in METADATA_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(content) = document
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr("content"))
        {
            metadata.set(field, content.to_string());
        }
    }

    if let Some(author) = metadata.author.take() {
        metadata.author = Some(strip_author_roles(&author));
    }

    metadata
}

/// Remove the site's contributor-role phrases from an author string.
///
/// Only the exact phrases are recognised; each is removed at most once.
#[must_use]
pub fn strip_author_roles(author: &str) -> String {
    AUTHOR_ROLE_SUFFIXES
        .iter()
        .fold(author.to_string(), |acc, suffix| acc.replacen(suffix, "", 1))
}
