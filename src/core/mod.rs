use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub mod batch;
pub mod orchestrator;
pub mod pipeline;
pub mod queries;
pub mod shutdown;

use crate::config::AppConfig;
use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::export::{file_base, ExportFormat, ExportManager, ExportStats};
use crate::model::{Lead, Query, Source};
use crate::scraper::browser::{self, SessionFactory};
use crate::utils;
use batch::{BatchExport, BatchReport, BatchRunner};
use orchestrator::{QueryExecution, QueryRunner, QueryStage};
use shutdown::ShutdownSignal;

/// Result of a single-query run
#[derive(Debug, Clone)]
pub struct SingleRunReport {
    pub query: Query,
    pub leads: Vec<Lead>,
    pub per_source: Vec<(Source, usize)>,
    pub files: Vec<ExportStats>,
}

/// Application entry point wiring configuration, sessions and exports together
pub struct LeadScraper {
    config: AppConfig,
    runner: Arc<QueryRunner>,
    shutdown: ShutdownSignal,
}

impl LeadScraper {
    /// Initialize with the session backend selected in the configuration
    pub async fn new(config: AppConfig, shutdown: ShutdownSignal) -> LeadScrapeResult<Self> {
        info!("Initializing lead scraper ({:?} backend)", config.scraping.backend);
        let factory = browser::session_factory(&config.scraping).await?;
        Ok(Self::with_factory(config, factory, shutdown))
    }

    pub fn with_factory(config: AppConfig, factory: Arc<dyn SessionFactory>, shutdown: ShutdownSignal) -> Self {
        let runner = QueryRunner::new(factory, &config.scraping, &config.rate_limit, shutdown.clone());
        Self {
            config,
            runner: Arc::new(runner),
            shutdown,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one query and export its leads as `{keyword}_{location}_{timestamp}`.
    ///
    /// Every requested format is attempted; the first export failure is returned afterwards.
    pub async fn run_single(
        &self,
        query: &Query,
        format: ExportFormat,
        output_dir: &Path,
    ) -> LeadScrapeResult<SingleRunReport> {
        let started = Instant::now();
        let mut execution = QueryExecution::new(query);

        let outcome = match self.runner.run_query(query, &mut execution).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Query {} failed ({} error): {}", query, e.category(), e);
                log_run_summary(0, 0, 1, started);
                return Err(e);
            }
        };

        execution.set_stage(QueryStage::Exporting);
        let exporter = ExportManager::new(output_dir);
        let timestamp = utils::file_timestamp();
        let base = file_base(&[query.keyword.as_str(), query.location.as_str(), timestamp.as_str()]);

        let mut files = Vec::new();
        let mut first_error: Option<LeadScrapeError> = None;
        for result in exporter.export_leads(&outcome.leads, &base, format).await {
            match result {
                Ok(stats) => files.push(stats),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        execution.set_stage(QueryStage::Done);

        log_run_summary(outcome.leads.len(), 1, 1, started);
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(SingleRunReport {
            query: query.clone(),
            leads: outcome.leads,
            per_source: outcome.per_source,
            files,
        })
    }

    /// Load a batch file, run every query and write per-query, summary and combined exports.
    ///
    /// Only loading the batch file can fail; per-query and export failures are reported.
    pub async fn run_batch(
        &self,
        queries_file: &Path,
        format: ExportFormat,
        output_dir: &Path,
        default_max_results: usize,
        workers: Option<usize>,
    ) -> LeadScrapeResult<(BatchReport, BatchExport)> {
        let started = Instant::now();
        let queries = queries::load_queries(queries_file, default_max_results)?;

        let runner = BatchRunner::new(self.runner.clone(), workers.unwrap_or(self.config.batch.workers));
        let mut report = runner.run(queries).await;

        let exporter = ExportManager::new(output_dir);
        let written = BatchRunner::export(&mut report, &exporter, format).await;
        if written.failures > 0 {
            error!("{} batch export(s) failed", written.failures);
        }

        info!("Batch {} finished", report.run_id);
        log_run_summary(report.total_leads(), report.successful(), report.results.len(), started);
        Ok((report, written))
    }

    /// Prompt for queries on `input` and run each one until an empty keyword, end of input
    /// or shutdown. Returns how many queries completed.
    ///
    /// Recoverable errors are reported on `output` and the loop continues; anything else,
    /// such as a session backend that cannot open, ends it.
    pub async fn run_interactive<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
        format: ExportFormat,
        output_dir: &Path,
    ) -> LeadScrapeResult<usize> {
        let default_max = self.config.scraping.max_results;
        let mut completed = 0;

        while !self.shutdown.is_requested() {
            let query = match queries::prompt_query(input, output, default_max) {
                Ok(Some(query)) => query,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    writeln!(output, "{}", e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Ctrl-C while waiting on the prompt
            if self.shutdown.is_requested() {
                warn!("Shutdown requested, not running {}", query);
                break;
            }

            match self.run_single(&query, format, output_dir).await {
                Ok(report) => {
                    completed += 1;
                    writeln!(output, "Found {} unique leads for {}", report.leads.len(), report.query)?;
                    for file in &report.files {
                        writeln!(output, "Saved {} ({})", file.path.display(), utils::format_file_size(file.file_size_bytes))?;
                    }
                }
                Err(e) if e.is_recoverable() => writeln!(output, "Query {} failed: {}", query, e)?,
                Err(e) => return Err(e),
            }
        }

        Ok(completed)
    }
}

fn log_run_summary(total_leads: usize, successful: usize, total_queries: usize, started: Instant) {
    info!(
        "Run complete in {}: {} leads, {}/{} queries successful",
        utils::format_duration(started.elapsed()),
        total_leads,
        successful,
        total_queries
    );
}
