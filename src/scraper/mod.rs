use tracing::{debug, error, info, warn};

pub mod browser;
pub mod http_client;
pub mod profiles;
pub mod rate_limiter;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::ScrapingConfig;
use crate::core::shutdown::ShutdownSignal;
use crate::model::Lead;
use browser::{BrowserSession, ElementHandle};
use profiles::SourceProfile;
use rate_limiter::RateLimiter;

/// Generic listing extractor.
///
/// Interprets a [`SourceProfile`] against the one [`BrowserSession`] it owns. Searching never
/// fails: navigation problems and timeouts yield an empty or partial lead list and are logged.
pub struct Extractor {
    profile: SourceProfile,
    session: Box<dyn BrowserSession>,
    rate_limiter: RateLimiter,
    config: ScrapingConfig,
    shutdown: ShutdownSignal,
}

impl Extractor {
    pub fn new(
        profile: SourceProfile,
        session: Box<dyn BrowserSession>,
        rate_limiter: RateLimiter,
        config: &ScrapingConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            profile,
            session,
            rate_limiter,
            config: config.clone(),
            shutdown,
        }
    }

    /// Search the source and return at most `max_results` valid leads
    pub async fn search(&mut self, keyword: &str, location: &str, max_results: usize) -> Vec<Lead> {
        let source = self.profile.source;
        let mut leads = Vec::new();

        let url = match self.profile.search_url(keyword, location) {
            Ok(url) => url,
            Err(e) => {
                error!("Could not build {} search URL: {}", source, e);
                return leads;
            }
        };

        info!("Searching {} for '{}' in '{}'", source, keyword, location);
        if let Err(e) = self.session.navigate(&url).await {
            error!("Error searching {}: {}", source, e);
            return leads;
        }
        self.rate_limiter.wait().await;

        match self
            .session
            .wait_for(&self.profile.listing_selector, self.config.wait_timeout())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                error!("Timed out waiting for {} results", source);
                return leads;
            }
            Err(e) => {
                error!("Error waiting for {} results: {}", source, e);
                return leads;
            }
        }

        if self.profile.scrolls {
            self.scroll_results().await;
        }

        let handles = match self.session.find_all(&self.profile.listing_selector).await {
            Ok(handles) => handles,
            Err(e) => {
                error!("Could not enumerate {} listings: {}", source, e);
                return leads;
            }
        };
        debug!("{} listings found on {}", handles.len(), source);

        for handle in handles.iter().take(max_results) {
            if self.shutdown.is_requested() {
                warn!("Shutdown requested, stopping {} extraction after {} leads", source, leads.len());
                break;
            }

            if let Some(lead) = self.extract_listing(handle).await {
                leads.push(lead);
            }

            self.rate_limiter.wait().await;
        }

        info!("Found {} leads from {}", leads.len(), source);
        leads
    }

    /// Scroll the results feed until its height stops growing or attempts run out
    async fn scroll_results(&mut self) {
        for attempt in 0..self.config.max_scroll_attempts {
            let before = match self.session.scroll_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!("Scroll failed: {}", e);
                    return;
                }
            };

            if let Err(e) = self.session.scroll_to_bottom().await {
                warn!("Scroll failed: {}", e);
                return;
            }
            tokio::time::sleep(self.config.scroll_pause()).await;

            match self.session.scroll_height().await {
                Ok(after) if after == before => {
                    debug!("Results feed stopped growing after {} scrolls", attempt + 1);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Scroll failed: {}", e);
                    return;
                }
            }
        }
    }

    async fn extract_listing(&mut self, handle: &ElementHandle) -> Option<Lead> {
        let position = handle.index() + 1;

        if self.profile.opens_listings {
            if let Err(e) = self.session.select(handle).await {
                warn!("Error extracting listing {}: {}", position, e);
                return None;
            }
            tokio::time::sleep(self.config.click_delay()).await;
        }

        let mut lead = Lead::default();
        for lookup in &self.profile.fields {
            match self.session.read_field(handle, lookup).await {
                Ok(Some(raw)) => lead.set_field(lookup.field, lookup.finish(&raw)),
                Ok(None) => debug!("No {} on listing {}", lookup.field, position),
                Err(e) => warn!("Could not read {} on listing {}: {}", lookup.field, position, e),
            }
        }
        lead.source = self.profile.source.label().to_string();

        if lead.is_valid() {
            Some(lead)
        } else {
            debug!("Listing {} has no name, skipped", position);
            None
        }
    }

    /// Release the session. Consumes the extractor so it happens exactly once.
    pub async fn close(mut self) {
        if let Err(e) = self.session.close().await {
            warn!("Failed to close {} session: {}", self.profile.source, e);
        }
    }
}
