//! Reader EPUB archiver library.
//!
//! Drives an authenticated headless browser through a web e-reader,
//! captures the front matter and every chapter with their resources, and
//! packages the result as an EPUB.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod archive;
pub mod assembly;
pub mod blob;
pub mod book;
pub mod cache;
pub mod config;
pub mod constants;
pub mod content;
pub mod error;
pub mod fs_utils;
pub mod metadata;
pub mod packaging;
pub mod pipeline;
pub mod reader;
pub mod readiness;

pub use archive::archive_book;
pub use error::ArchiveError;
