use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::browser::{BrowserSession, ElementHandle, SessionFactory};
use super::profiles::{FieldLookup, ValueSource};
use super::user_agent::UserAgentRotator;
use crate::config::ScrapingConfig;
use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::Source;

/// Opens sessions that fetch the results page once and query the static HTML
pub struct HttpSessionFactory {
    config: ScrapingConfig,
    user_agents: UserAgentRotator,
}

impl HttpSessionFactory {
    pub fn new(config: &ScrapingConfig) -> Self {
        Self {
            config: config.clone(),
            user_agents: UserAgentRotator::new(&config.user_agents),
        }
    }

    fn build_client(&self) -> LeadScrapeResult<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let user_agent = HeaderValue::from_str(self.user_agents.random())
            .map_err(|e| LeadScrapeError::browser_init(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        Client::builder()
            .timeout(self.config.page_load_timeout())
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| LeadScrapeError::browser_init(e.to_string()))
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, source: Source) -> LeadScrapeResult<Box<dyn BrowserSession>> {
        let client = self.build_client()?;
        debug!("HTTP session opened for {}", source);
        Ok(Box::new(HttpSession::new(client)))
    }
}

/// Session over a fetched page snapshot.
///
/// A snapshot has no detail panel to open, so selecting a listing does nothing and every
/// lookup is resolved inside the listing element. Scrolling cannot render more results.
///
/// The page is parsed once per listing selector; the outer HTML of each match is kept and
/// field lookups only parse that fragment. `scraper::Html` is not `Send`, so it cannot be
/// held across awaits itself.
pub struct HttpSession {
    client: Client,
    page: Option<String>,
    listings: Option<ListingCache>,
}

struct ListingCache {
    selector: String,
    fragments: Vec<String>,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page: None,
            listings: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_page(html: &str) -> Self {
        Self {
            client: Client::new(),
            page: Some(html.to_string()),
            listings: None,
        }
    }

    fn page(&self) -> LeadScrapeResult<&str> {
        self.page
            .as_deref()
            .ok_or_else(|| LeadScrapeError::session("no page loaded"))
    }

    fn set_page(&mut self, page: Option<String>) {
        self.page = page;
        self.listings = None;
    }

    /// Outer HTML of every element matching `selector`, parsed from the page at most once
    fn listings(&mut self, selector: &str) -> LeadScrapeResult<&[String]> {
        let cached = matches!(&self.listings, Some(cache) if cache.selector == selector);
        if !cached {
            let fragments = split_listings(self.page()?, selector)?;
            debug!("Parsed {} listings for {}", fragments.len(), selector);
            self.listings = Some(ListingCache {
                selector: selector.to_string(),
                fragments,
            });
        }
        Ok(self.listings.as_ref().map(|cache| cache.fragments.as_slice()).unwrap_or_default())
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> LeadScrapeResult<()> {
        debug!("Fetching {}", url);
        self.set_page(None);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LeadScrapeError::navigation(url.as_str(), e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!("Blocked at {}: {}", url, status);
        }
        if !status.is_success() {
            return Err(LeadScrapeError::navigation(url.as_str(), format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LeadScrapeError::navigation(url.as_str(), e.to_string()))?;
        info!("Fetched {} ({} bytes)", url, body.len());
        self.set_page(Some(body));
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> LeadScrapeResult<bool> {
        if self.page.is_none() {
            return Ok(false);
        }
        Ok(!self.listings(selector)?.is_empty())
    }

    async fn find_all(&mut self, selector: &str) -> LeadScrapeResult<Vec<ElementHandle>> {
        let count = self.listings(selector)?.len();
        Ok((0..count).map(|index| ElementHandle::new(selector, index)).collect())
    }

    async fn select(&mut self, _handle: &ElementHandle) -> LeadScrapeResult<()> {
        Ok(())
    }

    async fn read_field(&mut self, handle: &ElementHandle, lookup: &FieldLookup) -> LeadScrapeResult<Option<String>> {
        let fragment = self
            .listings(handle.selector())?
            .get(handle.index())
            .ok_or_else(|| LeadScrapeError::session(format!("listing {} is no longer on the page", handle.index() + 1)))?;
        lookup_in_listing(fragment, lookup)
    }

    async fn scroll_height(&mut self) -> LeadScrapeResult<u64> {
        Ok(self.page()?.len() as u64)
    }

    async fn scroll_to_bottom(&mut self) -> LeadScrapeResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> LeadScrapeResult<()> {
        self.set_page(None);
        Ok(())
    }
}

fn parse_selector(selector: &str) -> LeadScrapeResult<Selector> {
    Selector::parse(selector).map_err(|_| LeadScrapeError::InvalidSelector {
        selector: selector.to_string(),
    })
}

fn split_listings(html: &str, selector: &str) -> LeadScrapeResult<Vec<String>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).map(|listing| listing.html()).collect())
}

fn lookup_in_listing(fragment: &str, lookup: &FieldLookup) -> LeadScrapeResult<Option<String>> {
    let target = parse_selector(&lookup.selector)?;
    let listing = Html::parse_fragment(fragment);

    for element in listing.root_element().select(&target) {
        let raw = match &lookup.value {
            ValueSource::Text => element.text().collect::<Vec<_>>().join(" "),
            ValueSource::Attribute(name) => element.value().attr(name).unwrap_or_default().to_string(),
        };
        let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if value.is_empty() || lookup.skip_text.as_deref() == Some(value.as_str()) {
            continue;
        }
        return Ok(Some(value));
    }

    Ok(None)
}
