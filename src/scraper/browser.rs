//! The browsing capability the extractor drives.
//!
//! Extraction logic only talks to [`BrowserSession`]; the HTTP snapshot backend lives in
//! [`super::http_client`], the Playwright backend below is compiled with the `browser` feature.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::profiles::FieldLookup;
use crate::config::{ScrapingConfig, SessionBackend};
use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::Source;

/// Opaque reference to the `index`-th element matching `selector` on the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    selector: String,
    index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// One open browsing session. Not shared: each extractor owns exactly one.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` as the current page
    async fn navigate(&mut self, url: &Url) -> LeadScrapeResult<()>;

    /// Wait until `selector` matches something; `Ok(false)` on timeout
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> LeadScrapeResult<bool>;

    async fn find_all(&mut self, selector: &str) -> LeadScrapeResult<Vec<ElementHandle>>;

    /// Select a listing so its detail view is shown
    async fn select(&mut self, handle: &ElementHandle) -> LeadScrapeResult<()>;

    /// First non-empty value produced by `lookup`, relative to `handle` for listing-scoped lookups
    async fn read_field(&mut self, handle: &ElementHandle, lookup: &FieldLookup) -> LeadScrapeResult<Option<String>>;

    async fn scroll_height(&mut self) -> LeadScrapeResult<u64>;

    async fn scroll_to_bottom(&mut self) -> LeadScrapeResult<()>;

    async fn close(&mut self) -> LeadScrapeResult<()>;
}

/// Opens a fresh session per extractor
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, source: Source) -> LeadScrapeResult<Box<dyn BrowserSession>>;
}

/// Build the session factory selected by `config.backend`
pub async fn session_factory(config: &ScrapingConfig) -> LeadScrapeResult<Arc<dyn SessionFactory>> {
    match config.backend {
        SessionBackend::Http => Ok(Arc::new(super::http_client::HttpSessionFactory::new(config))),
        #[cfg(feature = "browser")]
        SessionBackend::Browser => Ok(Arc::new(playwright_backend::PlaywrightSessionFactory::new(config).await?)),
        #[cfg(not(feature = "browser"))]
        SessionBackend::Browser => Err(LeadScrapeError::browser_init(
            "browser backend requested but leadscrape was built without the `browser` feature",
        )),
    }
}

#[cfg(feature = "browser")]
pub mod playwright_backend {
    use async_trait::async_trait;
    use playwright::api::{Browser, BrowserContext, Page, Viewport};
    use playwright::Playwright;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing::{debug, info, warn};
    use url::Url;

    use super::{BrowserSession, ElementHandle, SessionFactory};
    use crate::config::ScrapingConfig;
    use crate::error::{LeadScrapeError, LeadScrapeResult};
    use crate::model::Source;
    use crate::scraper::profiles::{FieldLookup, LookupScope, ValueSource};
    use crate::scraper::user_agent::UserAgentRotator;

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Launches one headless Chromium per session
    pub struct PlaywrightSessionFactory {
        config: ScrapingConfig,
        playwright: Arc<Playwright>,
        user_agents: UserAgentRotator,
    }

    // Playwright handles are only driven from the task that owns the session.
    unsafe impl Send for PlaywrightSessionFactory {}
    unsafe impl Sync for PlaywrightSessionFactory {}

    impl PlaywrightSessionFactory {
        pub async fn new(config: &ScrapingConfig) -> LeadScrapeResult<Self> {
            debug!("Initializing Playwright");
            let playwright = Playwright::initialize()
                .await
                .map_err(|e| LeadScrapeError::browser_init(e.to_string()))?;

            Ok(Self {
                config: config.clone(),
                playwright: Arc::new(playwright),
                user_agents: UserAgentRotator::new(&config.user_agents),
            })
        }
    }

    #[async_trait]
    impl SessionFactory for PlaywrightSessionFactory {
        async fn open(&self, source: Source) -> LeadScrapeResult<Box<dyn BrowserSession>> {
            let browser = self
                .playwright
                .chromium()
                .launcher()
                .headless(self.config.headless)
                .launch()
                .await
                .map_err(|e| LeadScrapeError::browser_init(e.to_string()))?;

            let context = browser
                .context_builder()
                .user_agent(self.user_agents.random())
                .viewport(Some(Viewport {
                    width: self.config.window_width as i32,
                    height: self.config.window_height as i32,
                }))
                .build()
                .await
                .map_err(|e| LeadScrapeError::browser_init(e.to_string()))?;

            let page = context
                .new_page()
                .await
                .map_err(|e| LeadScrapeError::browser_init(e.to_string()))?;

            info!("Chromium session opened for {}", source);
            Ok(Box::new(PlaywrightSession {
                browser,
                _context: context,
                page,
                page_load_timeout: self.config.page_load_timeout(),
            }))
        }
    }

    pub struct PlaywrightSession {
        browser: Browser,
        _context: BrowserContext,
        page: Page,
        page_load_timeout: Duration,
    }

    unsafe impl Send for PlaywrightSession {}

    /// Quote a Rust string as a JS string literal
    fn js(value: &str) -> String {
        Value::from(value).to_string()
    }

    impl PlaywrightSession {
        async fn eval(&self, script: &str) -> LeadScrapeResult<Value> {
            self.page
                .evaluate::<(), Value>(script, ())
                .await
                .map_err(|e| LeadScrapeError::session(e.to_string()))
        }
    }

    #[async_trait]
    impl BrowserSession for PlaywrightSession {
        async fn navigate(&mut self, url: &Url) -> LeadScrapeResult<()> {
            debug!("Browser navigating to {}", url);
            let goto = self.page.goto_builder(url.as_str()).goto();
            match tokio::time::timeout(self.page_load_timeout, goto).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(LeadScrapeError::navigation(url.as_str(), e.to_string())),
                Err(_) => Err(LeadScrapeError::navigation(url.as_str(), "page load timed out")),
            }
        }

        async fn wait_for(&mut self, selector: &str, timeout: Duration) -> LeadScrapeResult<bool> {
            let deadline = Instant::now() + timeout;
            loop {
                let found = self
                    .page
                    .query_selector(selector)
                    .await
                    .map_err(|e| LeadScrapeError::session(e.to_string()))?;
                if found.is_some() {
                    return Ok(true);
                }
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        async fn find_all(&mut self, selector: &str) -> LeadScrapeResult<Vec<ElementHandle>> {
            let script = format!("document.querySelectorAll({}).length", js(selector));
            let count = self.eval(&script).await?.as_u64().unwrap_or(0) as usize;
            Ok((0..count).map(|index| ElementHandle::new(selector, index)).collect())
        }

        async fn select(&mut self, handle: &ElementHandle) -> LeadScrapeResult<()> {
            let script = format!(
                "(() => {{ const el = document.querySelectorAll({})[{}]; if (!el) return false; el.click(); return true; }})()",
                js(handle.selector()),
                handle.index()
            );
            match self.eval(&script).await?.as_bool() {
                Some(true) => Ok(()),
                _ => Err(LeadScrapeError::session(format!(
                    "listing {} is no longer on the page",
                    handle.index() + 1
                ))),
            }
        }

        async fn read_field(&mut self, handle: &ElementHandle, lookup: &FieldLookup) -> LeadScrapeResult<Option<String>> {
            let root = match lookup.scope {
                LookupScope::Listing => format!("document.querySelectorAll({})[{}]", js(handle.selector()), handle.index()),
                LookupScope::Page => "document".to_string(),
            };
            let read = match &lookup.value {
                ValueSource::Text => "(el.innerText || el.textContent || '')".to_string(),
                ValueSource::Attribute(name) => format!("(el.getAttribute({}) || '')", js(name)),
            };
            let skip = lookup.skip_text.as_deref().map(js).unwrap_or_else(|| "null".to_string());

            let script = format!(
                "(() => {{
                    const root = {root};
                    if (!root) return null;
                    for (const el of root.querySelectorAll({selector})) {{
                        const value = {read}.trim();
                        if (value && value !== {skip}) return value;
                    }}
                    return null;
                }})()",
                root = root,
                selector = js(&lookup.selector),
                read = read,
                skip = skip,
            );

            Ok(self.eval(&script).await?.as_str().map(str::to_string))
        }

        async fn scroll_height(&mut self) -> LeadScrapeResult<u64> {
            Ok(self.eval("document.body.scrollHeight").await?.as_u64().unwrap_or(0))
        }

        async fn scroll_to_bottom(&mut self) -> LeadScrapeResult<()> {
            self.page
                .evaluate::<(), ()>("window.scrollTo(0, document.body.scrollHeight)", ())
                .await
                .map_err(|e| LeadScrapeError::session(e.to_string()))
        }

        async fn close(&mut self) -> LeadScrapeResult<()> {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
                return Err(LeadScrapeError::session(e.to_string()));
            }
            Ok(())
        }
    }
}
