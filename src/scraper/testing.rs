//! Scripted in-memory browsing sessions for extractor and orchestrator tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use super::browser::{BrowserSession, ElementHandle, SessionFactory};
use super::profiles::FieldLookup;
use crate::config::{RateLimitConfig, ScrapingConfig};
use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::{LeadField, Source};

/// Scraping and rate limit settings without pauses
pub fn fast_configs() -> (ScrapingConfig, RateLimitConfig) {
    let scraping = ScrapingConfig {
        scroll_pause_ms: 0,
        click_delay_ms: 0,
        wait_timeout_secs: 1,
        ..ScrapingConfig::default()
    };
    let rate_limit = RateLimitConfig {
        min_delay_secs: 0.0,
        max_delay_secs: 0.0,
    };
    (scraping, rate_limit)
}

#[derive(Debug, Default)]
struct LogInner {
    attempts: usize,
    opened: usize,
    closed: usize,
    selects: usize,
    scrolls: usize,
    navigations: Vec<String>,
}

/// Shared record of what sessions were asked to do
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    inner: Arc<Mutex<LogInner>>,
}

impl SessionLog {
    fn with<R>(&self, f: impl FnOnce(&mut LogInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub fn opened(&self) -> usize {
        self.with(|l| l.opened)
    }

    pub fn closed(&self) -> usize {
        self.with(|l| l.closed)
    }

    pub fn selects(&self) -> usize {
        self.with(|l| l.selects)
    }

    pub fn scrolls(&self) -> usize {
        self.with(|l| l.scrolls)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.with(|l| l.navigations.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeListing {
    fields: HashMap<LeadField, String>,
    failing: HashSet<LeadField>,
    fail_select: bool,
}

impl FakeListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: LeadField, value: &str) -> Self {
        self.fields.insert(field, value.to_string());
        self
    }

    pub fn failing(mut self, field: LeadField) -> Self {
        self.failing.insert(field);
        self
    }

    pub fn failing_select(mut self) -> Self {
        self.fail_select = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    listings: Vec<FakeListing>,
    never_loads: bool,
    heights: Vec<u64>,
}

impl FakePage {
    pub fn new(listings: Vec<FakeListing>) -> Self {
        Self {
            listings,
            ..Self::default()
        }
    }

    pub fn never_loads(mut self) -> Self {
        self.never_loads = true;
        self
    }

    /// Page height after 0, 1, 2... scrolls; the last value repeats
    pub fn with_heights(mut self, heights: Vec<u64>) -> Self {
        self.heights = heights;
        self
    }
}

/// Serves the first page whose key occurs in the navigated URL (spaces encoded as `+`)
pub struct FakeSession {
    source: Source,
    pages: Vec<(String, FakePage)>,
    current: Option<FakePage>,
    scrolled: usize,
    log: SessionLog,
}

impl FakeSession {
    pub fn new(source: Source, pages: Vec<(&str, FakePage)>, log: SessionLog) -> Self {
        Self {
            source,
            pages: pages.into_iter().map(|(k, p)| (k.replace(' ', "+"), p)).collect(),
            current: None,
            scrolled: 0,
            log,
        }
    }

    fn listing(&self, handle: &ElementHandle) -> LeadScrapeResult<&FakeListing> {
        self.current
            .as_ref()
            .and_then(|page| page.listings.get(handle.index()))
            .ok_or_else(|| LeadScrapeError::session("stale listing"))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &Url) -> LeadScrapeResult<()> {
        self.log.with(|l| l.navigations.push(url.to_string()));
        self.scrolled = 0;
        self.current = self
            .pages
            .iter()
            .find(|(key, _)| url.as_str().contains(key.as_str()))
            .map(|(_, page)| page.clone());
        match self.current {
            Some(_) => Ok(()),
            None => Err(LeadScrapeError::navigation(url.as_str(), format!("no {} page scripted", self.source))),
        }
    }

    async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> LeadScrapeResult<bool> {
        Ok(matches!(&self.current, Some(page) if !page.never_loads && !page.listings.is_empty()))
    }

    async fn find_all(&mut self, selector: &str) -> LeadScrapeResult<Vec<ElementHandle>> {
        let count = self.current.as_ref().map(|p| p.listings.len()).unwrap_or(0);
        Ok((0..count).map(|i| ElementHandle::new(selector, i)).collect())
    }

    async fn select(&mut self, handle: &ElementHandle) -> LeadScrapeResult<()> {
        self.log.with(|l| l.selects += 1);
        if self.listing(handle)?.fail_select {
            return Err(LeadScrapeError::session("listing detached"));
        }
        Ok(())
    }

    async fn read_field(&mut self, handle: &ElementHandle, lookup: &FieldLookup) -> LeadScrapeResult<Option<String>> {
        let listing = self.listing(handle)?;
        if listing.failing.contains(&lookup.field) {
            return Err(LeadScrapeError::session(format!("{} lookup failed", lookup.field)));
        }
        Ok(listing.fields.get(&lookup.field).cloned())
    }

    async fn scroll_height(&mut self) -> LeadScrapeResult<u64> {
        let heights = self.current.as_ref().map(|p| p.heights.as_slice()).unwrap_or(&[]);
        Ok(heights
            .get(self.scrolled)
            .or_else(|| heights.last())
            .copied()
            .unwrap_or(0))
    }

    async fn scroll_to_bottom(&mut self) -> LeadScrapeResult<()> {
        self.scrolled += 1;
        self.log.with(|l| l.scrolls += 1);
        Ok(())
    }

    async fn close(&mut self) -> LeadScrapeResult<()> {
        self.log.with(|l| l.closed += 1);
        Ok(())
    }
}

/// Opens [`FakeSession`]s scripted per source
#[derive(Default)]
pub struct FakeSessionFactory {
    pages: HashMap<Source, Vec<(String, FakePage)>>,
    failing_opens: HashSet<usize>,
    log: SessionLog,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, source: Source, key: &str, page: FakePage) -> Self {
        self.pages.entry(source).or_default().push((key.to_string(), page));
        self
    }

    /// Make the `n`-th open call (zero-based) fail
    pub fn failing_open(mut self, n: usize) -> Self {
        self.failing_opens.insert(n);
        self
    }

    pub fn log(&self) -> SessionLog {
        self.log.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, source: Source) -> LeadScrapeResult<Box<dyn BrowserSession>> {
        let attempt = self.log.with(|l| {
            l.attempts += 1;
            l.attempts - 1
        });
        if self.failing_opens.contains(&attempt) {
            return Err(LeadScrapeError::browser_init("scripted open failure"));
        }
        self.log.with(|l| l.opened += 1);

        let pages = self
            .pages
            .get(&source)
            .map(|pages| pages.iter().map(|(k, p)| (k.as_str(), p.clone())).collect())
            .unwrap_or_default();
        Ok(Box::new(FakeSession::new(source, pages, self.log.clone())))
    }
}
