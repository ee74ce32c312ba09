use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::orchestrator::{QueryExecution, QueryRunner, QueryStage};
use super::pipeline;
use crate::error::LeadScrapeResult;
use crate::export::{file_base, ExportFormat, ExportManager, ExportStats, SummaryRow};
use crate::model::{Lead, Query};
use crate::utils;

/// Outcome of one batch query
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// 1-based position of the query in the batch file
    pub position: usize,
    pub query: Query,
    pub leads: Vec<Lead>,
    pub count: usize,
    pub error: Option<String>,
    pub execution: QueryExecution,
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn status(&self) -> &'static str {
        if self.is_success() {
            "Success"
        } else {
            "Error"
        }
    }

    /// Base name of the per-query export. The position keeps queries with the same id apart.
    pub fn file_base(&self, timestamp: &str) -> String {
        let query_id = self.query.id();
        let position = self.position.to_string();
        file_base(&[query_id.as_str(), position.as_str(), timestamp])
    }

    pub fn summary_row(&self) -> SummaryRow {
        SummaryRow {
            query_id: self.query.id(),
            keyword: self.query.keyword.clone(),
            location: self.query.location.clone(),
            source: self.query.source.to_string(),
            leads_found: self.count,
            status: self.status().to_string(),
        }
    }
}

/// Results of every processed query, in processing order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: String,
    pub results: Vec<QueryResult>,
    pub queries_total: usize,
}

impl BatchReport {
    pub fn total_leads(&self) -> usize {
        self.results.iter().map(|r| r.count).sum()
    }

    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// All leads deduplicated across queries, first seen wins
    pub fn combined_leads(&self) -> Vec<Lead> {
        pipeline::deduplicate(self.results.iter().flat_map(|r| r.leads.iter().cloned()))
    }
}

/// Files written for a batch, and how many writes failed
#[derive(Debug, Default)]
pub struct BatchExport {
    pub files: Vec<ExportStats>,
    pub failures: usize,
}

impl BatchExport {
    fn record(&mut self, result: LeadScrapeResult<ExportStats>) {
        match result {
            Ok(stats) => self.files.push(stats),
            Err(e) => {
                error!("Batch export failed ({} error): {}", e.category(), e);
                self.failures += 1;
            }
        }
    }
}

/// Processes a list of queries, sequentially or with a bounded worker pool
pub struct BatchRunner {
    runner: Arc<QueryRunner>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(runner: Arc<QueryRunner>, workers: usize) -> Self {
        Self {
            runner,
            workers: workers.max(1),
        }
    }

    pub async fn run(&self, queries: Vec<Query>) -> BatchReport {
        let run_id = utils::generate_id();
        let queries_total = queries.len();
        info!("Starting batch {} with {} queries ({} workers)", run_id, queries_total, self.workers);

        let results: Vec<QueryResult> = if self.workers == 1 {
            let mut results = Vec::with_capacity(queries_total);
            for (index, query) in queries.into_iter().enumerate() {
                info!("Processing query {}/{}: {}", index + 1, queries_total, query);
                match self.process(index + 1, query).await {
                    Some(result) => results.push(result),
                    None => break,
                }
            }
            results
        } else {
            stream::iter(queries.into_iter().enumerate())
                .map(|(index, query)| self.process(index + 1, query))
                .buffer_unordered(self.workers)
                .filter_map(|result| async move { result })
                .collect()
                .await
        };

        if results.len() < queries_total {
            warn!("Batch stopped early: {} of {} queries processed", results.len(), queries_total);
        }

        BatchReport {
            run_id,
            results,
            queries_total,
        }
    }

    /// Run one query; `None` when shutdown was requested before it started
    async fn process(&self, position: usize, query: Query) -> Option<QueryResult> {
        if self.runner.shutdown().is_requested() {
            return None;
        }

        let mut execution = QueryExecution::new(&query);
        let result = match self.runner.run_query(&query, &mut execution).await {
            Ok(outcome) => QueryResult {
                position,
                count: outcome.leads.len(),
                leads: outcome.leads,
                query,
                error: None,
                execution,
            },
            Err(e) => {
                error!("Error processing query {} ({} error): {}", query, e.category(), e);
                QueryResult {
                    position,
                    query,
                    leads: Vec::new(),
                    count: 0,
                    error: Some(e.to_string()),
                    execution,
                }
            }
        };
        Some(result)
    }

    /// Write per-query exports, the summary report and the combined export.
    ///
    /// Failures are logged and counted; they never stop the remaining writes. Every query
    /// ends in [`QueryStage::Done`].
    pub async fn export(report: &mut BatchReport, exporter: &ExportManager, format: ExportFormat) -> BatchExport {
        let timestamp = utils::file_timestamp();
        let mut written = BatchExport::default();

        for result in report.results.iter_mut() {
            if !result.leads.is_empty() {
                result.execution.set_stage(QueryStage::Exporting);
                let base = result.file_base(&timestamp);
                for outcome in exporter.export_leads(&result.leads, &base, format).await {
                    written.record(outcome);
                }
            }
            result.execution.set_stage(QueryStage::Done);
        }

        let rows: Vec<SummaryRow> = report.results.iter().map(QueryResult::summary_row).collect();
        let summary = exporter.export_summary(&rows, &format!("batch_summary_{}", timestamp)).await;
        written.record(summary);

        let combined = report.combined_leads();
        for outcome in exporter
            .export_leads(&combined, &format!("batch_combined_{}", timestamp), format)
            .await
        {
            written.record(outcome);
        }
        info!("Combined export: {} unique leads across {} queries", combined.len(), report.results.len());

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shutdown::ShutdownSignal;
    use crate::model::{LeadField, Source, SourceSelection};
    use crate::scraper::testing::{fast_configs, FakeListing, FakePage, FakeSessionFactory, SessionLog};
    use tempfile::TempDir;

    fn listing(name: &str, address: &str) -> FakeListing {
        FakeListing::new().with(LeadField::Name, name).with(LeadField::Address, address)
    }

    fn query(keyword: &str, source: SourceSelection) -> Query {
        Query::new(keyword, "Springfield", source, 10).unwrap()
    }

    fn batch(factory: FakeSessionFactory, workers: usize, shutdown: ShutdownSignal) -> (BatchRunner, SessionLog) {
        let log = factory.log();
        let (scraping, rate_limit) = fast_configs();
        let runner = QueryRunner::new(Arc::new(factory), &scraping, &rate_limit, shutdown);
        (BatchRunner::new(Arc::new(runner), workers), log)
    }

    fn sample_factory() -> FakeSessionFactory {
        FakeSessionFactory::new()
            .page(Source::GoogleMaps, "bakery", FakePage::new(vec![listing("Crumbs", "1 Oak St"), listing("Loaf", "2 Oak St")]))
            .page(Source::Yelp, "bakery", FakePage::new(vec![listing("Crumbs", "1 Oak St")]))
            .page(Source::GoogleMaps, "florist", FakePage::new(vec![listing("Petals", "9 Elm St"), listing("Loaf", "2 Oak St")]))
    }

    #[tokio::test]
    async fn test_sequential_batch_preserves_order() {
        let (runner, log) = batch(sample_factory(), 1, ShutdownSignal::new());
        let queries = vec![query("bakery", SourceSelection::Both), query("florist", SourceSelection::Google)];

        let report = runner.run(queries).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].query.keyword, "bakery");
        assert_eq!(report.results[0].count, 2);
        assert_eq!(report.results[1].count, 2);
        assert_eq!(report.total_leads(), 4);
        assert_eq!(report.successful(), 2);
        assert_eq!(log.opened(), log.closed());

        let combined: Vec<String> = report.combined_leads().into_iter().map(|l| l.name).collect();
        assert_eq!(combined, vec!["Crumbs", "Loaf", "Petals"]);
    }

    #[tokio::test]
    async fn test_failing_query_does_not_stop_batch() {
        // First open call belongs to the first query
        let factory = sample_factory().failing_open(0);
        let (runner, _log) = batch(factory, 1, ShutdownSignal::new());
        let queries = vec![query("bakery", SourceSelection::Google), query("florist", SourceSelection::Google)];

        let report = runner.run(queries).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].status(), "Error");
        assert_eq!(report.results[0].count, 0);
        assert!(report.results[0].error.is_some());
        assert_eq!(report.results[1].status(), "Success");
        assert_eq!(report.successful(), 1);

        let row = report.results[0].summary_row();
        assert_eq!(row.query_id, "bakery_Springfield");
        assert_eq!(row.leads_found, 0);
        assert_eq!(row.source, "google");
    }

    #[tokio::test]
    async fn test_worker_pool_processes_every_query() {
        let (runner, log) = batch(sample_factory(), 3, ShutdownSignal::new());
        let queries = vec![
            query("bakery", SourceSelection::Both),
            query("florist", SourceSelection::Google),
            query("plumber", SourceSelection::Yelp),
        ];

        let report = runner.run(queries).await;

        assert_eq!(report.results.len(), 3);
        let mut keywords: Vec<&str> = report.results.iter().map(|r| r.query.keyword.as_str()).collect();
        keywords.sort();
        assert_eq!(keywords, vec!["bakery", "florist", "plumber"]);
        assert_eq!(report.total_leads(), 4);
        assert_eq!(log.opened(), 4);
        assert_eq!(log.closed(), 4);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_processes_nothing() {
        let shutdown = ShutdownSignal::new();
        shutdown.request();
        let (runner, log) = batch(sample_factory(), 1, shutdown);

        let report = runner.run(vec![query("bakery", SourceSelection::Both)]).await;

        assert!(report.results.is_empty());
        assert_eq!(report.queries_total, 1);
        assert_eq!(log.opened(), 0);
    }

    #[tokio::test]
    async fn test_export_writes_per_query_summary_and_combined() {
        let dir = TempDir::new().unwrap();
        let (runner, _log) = batch(sample_factory(), 1, ShutdownSignal::new());
        let queries = vec![query("bakery", SourceSelection::Both), query("dentist", SourceSelection::Google)];
        let mut report = runner.run(queries).await;

        let exporter = ExportManager::new(dir.path());
        let written = BatchRunner::export(&mut report, &exporter, ExportFormat::Csv).await;

        assert_eq!(written.failures, 0);
        let names: Vec<String> = written
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // dentist found nothing, so it has no per-query file
        assert_eq!(names.len(), 3);
        assert!(names[0].starts_with("bakery_Springfield_1_"));
        assert!(names[1].starts_with("batch_summary_"));
        assert!(names[2].starts_with("batch_combined_"));

        let summary = std::fs::read_to_string(&written.files[1].path).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "query_id,keyword,location,source,leads_found,status");
        assert_eq!(lines[1], "bakery_Springfield,bakery,Springfield,both,2,Success");
        assert_eq!(lines[2], "dentist_Springfield,dentist,Springfield,google,0,Success");
    }

    #[tokio::test]
    async fn test_combined_export_written_when_empty() {
        let dir = TempDir::new().unwrap();
        let (runner, _log) = batch(FakeSessionFactory::new(), 1, ShutdownSignal::new());
        let mut report = runner.run(vec![query("nothing", SourceSelection::Yelp)]).await;

        let written = BatchRunner::export(&mut report, &ExportManager::new(dir.path()), ExportFormat::Json).await;

        assert_eq!(written.files.len(), 2);
        let combined = &written.files[1];
        assert_eq!(combined.record_count, 0);
        assert_eq!(std::fs::read_to_string(&combined.path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_queries_sharing_an_id_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let factory = FakeSessionFactory::new()
            .page(Source::GoogleMaps, "pizza", FakePage::new(vec![listing("Giordano's", "1 Rush St")]))
            .page(Source::Yelp, "pizza", FakePage::new(vec![listing("Lou Malnati's", "2 Wells St")]));
        let (runner, _log) = batch(factory, 1, ShutdownSignal::new());
        let queries = vec![query("pizza", SourceSelection::Google), query("pizza", SourceSelection::Yelp)];
        let mut report = runner.run(queries).await;

        let written = BatchRunner::export(&mut report, &ExportManager::new(dir.path()), ExportFormat::Csv).await;

        assert_eq!(written.failures, 0);
        let google = &written.files[0].path;
        let yelp = &written.files[1].path;
        assert_ne!(google, yelp);
        assert!(std::fs::read_to_string(google).unwrap().contains("Giordano's"));
        assert!(std::fs::read_to_string(yelp).unwrap().contains("Lou Malnati's"));
    }

    #[tokio::test]
    async fn test_export_moves_every_query_to_done() {
        let dir = TempDir::new().unwrap();
        let (runner, _log) = batch(sample_factory().failing_open(1), 1, ShutdownSignal::new());
        let queries = vec![query("bakery", SourceSelection::Google), query("florist", SourceSelection::Google)];
        let mut report = runner.run(queries).await;

        assert_eq!(report.results[0].execution.stage(), QueryStage::Deduplicating);
        assert_eq!(report.results[1].execution.stage(), QueryStage::Extracting(Source::GoogleMaps));

        BatchRunner::export(&mut report, &ExportManager::new(dir.path()), ExportFormat::Csv).await;

        assert!(report.results.iter().all(|r| r.execution.stage() == QueryStage::Done));
    }
}
