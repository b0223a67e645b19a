//! The book being assembled and the chapters captured for it.

use std::path::PathBuf;

/// Aggregate result of a run, threaded through every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    pub author: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    /// Remote cover URL until downloaded, then the local cache path.
    pub cover: Option<CoverImage>,
    /// Cache file names of stylesheets in the order they were first seen.
    pub stylesheets: Vec<String>,
    /// Cache file names of images in the order they were first seen.
    pub images: Vec<String>,
    pub content: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverImage {
    Remote(String),
    Local(PathBuf),
}

/// One traversal unit: a front matter page or a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    pub title: Option<String>,
    pub content: String,
    /// Identity taken from the `<base>` element of the captured content.
    pub href: Option<String>,
    pub exclude_from_toc: bool,
    pub before_toc: bool,
}

impl Chapter {
    /// A front matter page titled with its page number.
    #[must_use]
    pub fn front_matter(page: u32, content: String) -> Self {
        Self {
            title: Some(page.to_string()),
            content,
            href: None,
            exclude_from_toc: true,
            before_toc: true,
        }
    }

    /// A chapter captured by forward traversal; its title is set once accepted.
    #[must_use]
    pub fn untitled(content: String) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }
}

/// Where an accepted chapter goes in [`Book::content`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Backward traversal: each page precedes everything captured so far.
    Prepend,
    Append,
}

/// Outcome of offering a chapter to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Inserted,
    /// No href could be resolved; an interstitial page.
    MissingHref,
    /// Same href as a chapter already in the book.
    Duplicate,
}

impl Book {
    /// Whether a chapter with this href is already part of the book.
    #[must_use]
    pub fn contains_href(&self, href: &str) -> bool {
        self.content
            .iter()
            .any(|chapter| chapter.href.as_deref() == Some(href))
    }

    /// Check whether [`Book::accept`] would insert the chapter, without inserting it.
    #[must_use]
    pub fn admission(&self, chapter: &Chapter) -> Acceptance {
        match chapter.href.as_deref() {
            None => Acceptance::MissingHref,
            Some(href) if self.contains_href(href) => Acceptance::Duplicate,
            Some(_) => Acceptance::Inserted,
        }
    }

    /// Insert the chapter unless it lacks an href or duplicates one already present.
    pub fn accept(&mut self, chapter: Chapter, placement: Placement) -> Acceptance {
        let verdict = self.admission(&chapter);
        if verdict == Acceptance::Inserted {
            match placement {
                Placement::Prepend => self.content.insert(0, chapter),
                Placement::Append => self.content.push(chapter),
            }
        }
        verdict
    }

    /// Register a stylesheet name; returns false when it was already registered.
    pub fn register_stylesheet(&mut self, name: &str) -> bool {
        register(&mut self.stylesheets, name)
    }

    /// Register an image name; returns false when it was already registered.
    pub fn register_image(&mut self, name: &str) -> bool {
        register(&mut self.images, name)
    }
}

fn register(names: &mut Vec<String>, name: &str) -> bool {
    if names.iter().any(|existing| existing == name) {
        return false;
    }
    names.push(name.to_string());
    true
}
