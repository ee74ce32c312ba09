use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::pipeline;
use super::shutdown::ShutdownSignal;
use crate::config::{RateLimitConfig, ScrapingConfig};
use crate::error::LeadScrapeResult;
use crate::model::{Lead, Query, Source};
use crate::scraper::browser::SessionFactory;
use crate::scraper::profiles::SourceProfile;
use crate::scraper::rate_limiter::RateLimiter;
use crate::scraper::Extractor;

/// Lifecycle of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Idle,
    Extracting(Source),
    Deduplicating,
    Exporting,
    Done,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStage::Idle => write!(f, "idle"),
            QueryStage::Extracting(source) => write!(f, "extracting from {}", source),
            QueryStage::Deduplicating => write!(f, "deduplicating"),
            QueryStage::Exporting => write!(f, "exporting"),
            QueryStage::Done => write!(f, "done"),
        }
    }
}

/// Stage tracker for a single query
#[derive(Debug, Clone)]
pub struct QueryExecution {
    query_id: String,
    stage: QueryStage,
}

impl QueryExecution {
    pub fn new(query: &Query) -> Self {
        Self {
            query_id: query.id(),
            stage: QueryStage::Idle,
        }
    }

    pub fn stage(&self) -> QueryStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: QueryStage) {
        debug!("Query {}: {} -> {}", self.query_id, self.stage, stage);
        self.stage = stage;
    }
}

/// Deduplicated leads of one query plus how many each source contributed before dedup
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub leads: Vec<Lead>,
    pub per_source: Vec<(Source, usize)>,
}

/// Runs a query against its selected sources, one fresh session per source
pub struct QueryRunner {
    factory: Arc<dyn SessionFactory>,
    scraping: ScrapingConfig,
    rate_limit: RateLimitConfig,
    shutdown: ShutdownSignal,
}

impl QueryRunner {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        scraping: &ScrapingConfig,
        rate_limit: &RateLimitConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            factory,
            scraping: scraping.clone(),
            rate_limit: rate_limit.clone(),
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Extract and deduplicate. Only a failure to open a session is an error.
    pub async fn run_query(&self, query: &Query, execution: &mut QueryExecution) -> LeadScrapeResult<QueryOutcome> {
        info!("Processing query: {} (sources: {}, max {})", query, query.source, query.max_results);

        let mut per_source_leads = Vec::new();
        let mut per_source = Vec::new();

        for &source in query.source.sources() {
            if self.shutdown.is_requested() {
                warn!("Shutdown requested, skipping {} for {}", source, query);
                break;
            }
            execution.set_stage(QueryStage::Extracting(source));

            let rate_limiter = RateLimiter::from_config(&self.rate_limit)?;
            let session = self.factory.open(source).await?;
            let profile = SourceProfile::for_source(source, &self.scraping.locale, self.scraping.extract_emails);
            let mut extractor = Extractor::new(
                profile,
                session,
                rate_limiter,
                &self.scraping,
                self.shutdown.clone(),
            );

            let leads = extractor.search(&query.keyword, &query.location, query.max_results).await;
            extractor.close().await;

            per_source.push((source, leads.len()));
            per_source_leads.push(leads);
        }

        execution.set_stage(QueryStage::Deduplicating);
        let leads = pipeline::merge_sources(per_source_leads);
        info!("Query {} yielded {} unique leads", query, leads.len());

        Ok(QueryOutcome { leads, per_source })
    }
}
