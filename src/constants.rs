//! Shared constants used across the application.

/// User agent string used for the browser session and plain HTTP downloads.
///
/// Matches a current desktop Chrome so the reader serves the same markup it
/// serves to a regular visitor.
pub const READER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// File name the cover image is stored under inside the resource cache.
pub const COVER_FILE_NAME: &str = "book-cover.png";

/// Title used for chapters that never received one (front matter pages).
pub const UNTITLED_CHAPTER: &str = "frontmatter";

/// Name of the cookie-consent cookie the reader expects on its parent domain.
pub const COOKIE_CONSENT_NAME: &str = "CookieConsent";

/// Cookie-consent value accepted by the reader.
pub const COOKIE_CONSENT_VALUE: &str =
    "{necessary:true%252Cstatistics:true%252Cutc:1697526633027%252Cregion:%2527us%2527}";
