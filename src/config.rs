use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Publication
    pub book_id: String,
    pub site_url: String,
    pub locale: String,

    // Session cookies
    pub csrf_token: String,
    pub session_token: String,
    pub callback_url: String,

    // Local storage
    pub temp_dir: PathBuf,
    pub books_dir: PathBuf,
    pub clear_temp_on_success: bool,

    // Browser
    pub chrome_path: Option<String>,
    pub page_timeout: Duration,

    // Traversal
    pub settle: SettleConfig,
    pub max_front_matter_pages: u32,
}

/// Readiness polling applied after every UI interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleConfig {
    /// Delay before the second check; doubles after every failed check.
    pub poll_interval: Duration,
    /// Upper bound for a single sleep between checks.
    pub max_interval: Duration,
    /// Total time a condition may take before the step proceeds anyway.
    pub timeout: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(25),
            max_interval: Duration::from_millis(400),
            timeout: Duration::from_millis(3000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let site_url = env_or_default("READER_SITE_URL", "https://elaenutus.mirko.ee");
        let site_url = site_url.trim_end_matches('/').to_string();
        let locale = env_or_default("READER_LOCALE", "et");
        let callback_url = optional_env("READER_CALLBACK_URL")
            .unwrap_or_else(|| default_callback_url(&site_url, &locale));
        let poll_ms = parse_env_u64("SETTLE_POLL_MS", 25)?;

        Ok(Self {
            // Publication
            book_id: required_env("READER_BOOK_ID")?,
            site_url,
            locale,

            // Session cookies
            csrf_token: required_env("READER_CSRF_TOKEN")?,
            session_token: required_env("READER_SESSION_TOKEN")?,
            callback_url,

            // Local storage
            temp_dir: PathBuf::from(env_or_default("TEMP_DIR", "./temp")),
            books_dir: PathBuf::from(env_or_default("BOOKS_DIR", "./books")),
            clear_temp_on_success: parse_env_bool("CLEAR_TEMP_ON_SUCCESS", false)?,

            // Browser
            chrome_path: optional_env("CHROME_PATH"),
            page_timeout: Duration::from_secs(parse_env_u64("PAGE_TIMEOUT_SECS", 60)?),

            // Traversal
            settle: SettleConfig {
                poll_interval: Duration::from_millis(poll_ms),
                max_interval: Duration::from_millis(poll_ms.saturating_mul(16)),
                timeout: Duration::from_millis(parse_env_u64("SETTLE_TIMEOUT_MS", 3000)?),
            },
            max_front_matter_pages: parse_env_u32("MAX_FRONT_MATTER_PAGES", 1000)?,
        })
    }

    /// Configuration with placeholder credentials and short settle timings.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            book_id: "test-book".to_string(),
            site_url: "https://reader.test".to_string(),
            locale: "et".to_string(),
            csrf_token: "csrf".to_string(),
            session_token: "session".to_string(),
            callback_url: default_callback_url("https://reader.test", "et"),
            temp_dir: PathBuf::from("./temp"),
            books_dir: PathBuf::from("./books"),
            clear_temp_on_success: false,
            chrome_path: None,
            page_timeout: Duration::from_secs(5),
            settle: SettleConfig {
                poll_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(4),
                timeout: Duration::from_millis(20),
            },
            max_front_matter_pages: 50,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("READER_BOOK_ID", &self.book_id),
            ("READER_CSRF_TOKEN", &self.csrf_token),
            ("READER_SESSION_TOKEN", &self.session_token),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        match Url::parse(&self.site_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(_) => {
                return Err(ConfigError::InvalidValue {
                    name: "READER_SITE_URL".to_string(),
                    message: format!("must be an absolute http(s) URL, got '{}'", self.site_url),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "READER_SITE_URL".to_string(),
                    message: e.to_string(),
                });
            }
        }
        if self.max_front_matter_pages == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_FRONT_MATTER_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.settle.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SETTLE_POLL_MS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_callback_url(site_url: &str, locale: &str) -> String {
    urlencoding::encode(&format!("{site_url}/{locale}")).into_owned()
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
