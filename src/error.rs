//! Error type shared by every stage of the archive pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error carried as the source of browser and HTTP failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where in the pipeline an operation was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Metadata,
    /// Entering the book from the first launcher, before any back step.
    FrontMatterEntry,
    /// Backward paging; carries the page number read after the back click.
    FrontMatter { page: u32 },
    /// Forward traversal; carries the zero-based launcher index.
    Chapter { index: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::FrontMatterEntry => write!(f, "front matter entry"),
            Self::FrontMatter { page } => write!(f, "front matter page {page}"),
            Self::Chapter { index } => write!(f, "chapter {}", index + 1),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("reader at {url} exposed no chapter launchers; try updating the session token")]
    Authentication { url: String },

    #[error("failed to launch or configure the browser")]
    Browser(#[source] BoxError),

    #[error("failed to build the HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("navigation to {url} failed")]
    Navigation {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("page script failed while {context}")]
    Script {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("selector {selector:?} matched nothing during {step}")]
    MissingElement { selector: String, step: Step },

    #[error("page indicator {text:?} is not of the form <n>/<total>")]
    PageIndicator { text: String },

    #[error("front matter did not reach page 1 within {limit} back steps (last page {last_page})")]
    TraversalLimit { limit: u32, last_page: u32 },

    #[error("failed to fetch resource {url} during {step}")]
    ResourceFetch {
        url: String,
        step: Step,
        #[source]
        source: BoxError,
    },

    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
