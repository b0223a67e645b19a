//! [`ReaderSession`] backed by a headless Chromium driven over CDP.

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{scripts, ReaderSession, SiteProfile};
use crate::config::{Config, SettleConfig};
use crate::constants::{COOKIE_CONSENT_NAME, COOKIE_CONSENT_VALUE, READER_USER_AGENT};
use crate::error::{ArchiveError, BoxError, Step};
use crate::readiness::Backoff;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1600;

#[derive(Debug, Deserialize)]
struct FetchOutcome {
    data: Option<String>,
    error: Option<String>,
}

/// One browser with one page, authenticated with the configured cookies.
pub struct ChromiumSession {
    profile: SiteProfile,
    book_id: String,
    load_wait: SettleConfig,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Launch the browser, open a page and install the session cookies.
    pub async fn launch(config: &Config, profile: SiteProfile) -> Result<Self, ArchiveError> {
        info!("Launching headless browser");

        let mut config_builder = BrowserConfig::builder()
            .window_size(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
            .request_timeout(config.page_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg(format!("--user-agent={READER_USER_AGENT}"));

        if let Some(ref chrome_path) = config.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| ArchiveError::Browser(e.into()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ArchiveError::Browser(e.into()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ArchiveError::Browser(e.into()))?;

        // Installed browser-wide: the page is still on about:blank, which
        // page-scoped cookie validation rejects.
        browser
            .set_cookies(session_cookies(config, &profile)?)
            .await
            .map_err(|e| ArchiveError::Browser(e.into()))?;

        Ok(Self {
            profile,
            book_id: config.book_id.clone(),
            load_wait: SettleConfig {
                timeout: config.page_timeout,
                ..config.settle
            },
            browser,
            page,
            handler,
        })
    }

    async fn navigate(&self, url: &str) -> Result<(), ArchiveError> {
        debug!(url = %url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| ArchiveError::Navigation {
                url: url.to_string(),
                source: e.into(),
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ArchiveError::Navigation {
                url: url.to_string(),
                source: e.into(),
            })?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String, context: &str) -> Result<T, ArchiveError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| ArchiveError::Script {
                context: context.to_string(),
                source: e.into(),
            })?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| ArchiveError::Script {
                context: context.to_string(),
                source: e.into(),
            })?;

        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|e| ArchiveError::Script {
            context: context.to_string(),
            source: e.into(),
        })
    }
}

fn session_cookies(config: &Config, profile: &SiteProfile) -> Result<Vec<CookieParam>, ArchiveError> {
    let host = profile.host();
    let secure = [
        ("__Host-next-auth.csrf-token", config.csrf_token.as_str()),
        ("__Secure-next-auth.session-token", config.session_token.as_str()),
        ("__Secure-next-auth.callback-url", config.callback_url.as_str()),
    ];

    let mut cookies = Vec::with_capacity(secure.len() + 1);
    for (name, value) in secure {
        let cookie = CookieParam::builder()
            .name(name)
            .value(value)
            .domain(host.clone())
            .path("/")
            .secure(true)
            .build()
            .map_err(|e| ArchiveError::Browser(e.into()))?;
        cookies.push(cookie);
    }

    let consent = CookieParam::builder()
        .name(COOKIE_CONSENT_NAME)
        .value(COOKIE_CONSENT_VALUE)
        .domain(profile.parent_domain())
        .path("/")
        .build()
        .map_err(|e| ArchiveError::Browser(e.into()))?;
    cookies.push(consent);

    Ok(cookies)
}

#[async_trait]
impl ReaderSession for ChromiumSession {
    async fn publication_html(&mut self) -> Result<String, ArchiveError> {
        let url = self.profile.publication_url(&self.book_id);
        self.navigate(&url).await?;
        self.page
            .content()
            .await
            .map_err(|e| ArchiveError::Navigation {
                url,
                source: e.into(),
            })
    }

    async fn open_reader(&mut self) -> Result<(), ArchiveError> {
        let url = self.reader_url();
        self.navigate(&url).await?;

        // The launcher list renders client-side after the load event.
        let list_ready = scripts::exists(&self.profile.chapter_button_selector);
        let mut backoff = Backoff::new(&self.load_wait);
        loop {
            if self.eval::<bool>(list_ready.clone(), "waiting for chapter list").await? {
                break;
            }
            if !backoff.wait().await {
                warn!(url = %url, "Chapter list did not render before the load deadline");
                break;
            }
        }
        Ok(())
    }

    fn reader_url(&self) -> String {
        self.profile.reading_url(&self.book_id)
    }

    async fn launcher_count(&self) -> Result<usize, ArchiveError> {
        self.eval(
            scripts::count(&self.profile.chapter_button_selector),
            "counting chapter launchers",
        )
        .await
    }

    async fn click_launcher(&mut self, index: usize) -> Result<(), ArchiveError> {
        let clicked: bool = self
            .eval(
                scripts::click_nth(&self.profile.chapter_button_selector, index),
                "clicking a chapter launcher",
            )
            .await?;
        if !clicked {
            return Err(ArchiveError::MissingElement {
                selector: self.profile.chapter_button_selector.clone(),
                step: Step::Chapter { index },
            });
        }
        Ok(())
    }

    async fn launcher_title(&self, index: usize) -> Result<String, ArchiveError> {
        let title: Option<String> = self
            .eval(
                scripts::text_of_nth(&self.profile.chapter_button_selector, index),
                "reading a chapter title",
            )
            .await?;
        Ok(title.unwrap_or_default())
    }

    async fn click_back(&mut self) -> Result<(), ArchiveError> {
        let clicked: bool = self
            .eval(
                scripts::click_nth(
                    &self.profile.back_button_selector,
                    self.profile.back_button_index,
                ),
                "clicking the back control",
            )
            .await?;
        if !clicked {
            return Err(ArchiveError::Script {
                context: "clicking the back control".to_string(),
                source: format!(
                    "no match #{} for {}",
                    self.profile.back_button_index, self.profile.back_button_selector
                )
                .into(),
            });
        }
        Ok(())
    }

    async fn page_indicator(&self) -> Result<Option<String>, ArchiveError> {
        self.eval(
            scripts::text_of(&self.profile.page_number_selector),
            "reading the page indicator",
        )
        .await
    }

    async fn frame_content(&self) -> Result<Option<String>, ArchiveError> {
        self.eval(scripts::FRAME_CONTENT.to_string(), "reading frame content")
            .await
    }

    async fn frame_blob_refs(&self) -> Result<Vec<String>, ArchiveError> {
        self.eval(scripts::FRAME_BLOB_REFS.to_string(), "listing frame resources")
            .await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        let outcome: FetchOutcome = self
            .eval(scripts::fetch_base64(url), "fetching a resource")
            .await?;

        if let Some(error) = outcome.error {
            return Err(ArchiveError::Script {
                context: format!("fetching {url}"),
                source: error.into(),
            });
        }

        let data = outcome.data.unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| ArchiveError::Script {
                context: format!("decoding {url}"),
                source: Box::new(e) as BoxError,
            })
    }

    fn blob_origin(&self) -> String {
        self.profile.blob_origin()
    }

    fn chapter_count(&self, launchers: usize) -> usize {
        self.profile.chapter_count(launchers)
    }

    async fn close(&mut self) -> Result<(), ArchiveError> {
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page: {e}");
        }
        self.browser
            .close()
            .await
            .map_err(|e| ArchiveError::Browser(e.into()))?;
        self.handler.abort();
        info!("Browser shutdown complete");
        Ok(())
    }
}
