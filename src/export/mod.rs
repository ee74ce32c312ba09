use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

pub mod csv_exporter;
pub mod json_exporter;

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::Lead;
use crate::utils;

pub use csv_exporter::{export_leads_csv, export_summary_csv, SummaryRow};
pub use json_exporter::export_leads_json;

/// Export format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    #[default]
    Both,
}

impl ExportFormat {
    /// File extensions written for this format, in write order
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ExportFormat::Csv => &["csv"],
            ExportFormat::Json => &["json"],
            ExportFormat::Both => &["csv", "json"],
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LeadScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "both" => Ok(ExportFormat::Both),
            other => Err(LeadScrapeError::config(format!("Invalid export format: {}", other))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Both => write!(f, "both"),
        }
    }
}

/// One written file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub path: PathBuf,
    pub record_count: usize,
    pub file_size_bytes: u64,
}

/// Writes lead and summary files into one output directory
#[derive(Debug, Clone)]
pub struct ExportManager {
    output_dir: PathBuf,
}

impl ExportManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn prepare(&self) -> LeadScrapeResult<()> {
        utils::ensure_dir(&self.output_dir)
            .await
            .map_err(|e| LeadScrapeError::export(&self.output_dir, e))
    }

    /// Export `leads` as `{base_name}.csv` and/or `{base_name}.json`.
    ///
    /// Returns one result per file so the caller decides whether a failed format is fatal.
    pub async fn export_leads(
        &self,
        leads: &[Lead],
        base_name: &str,
        format: ExportFormat,
    ) -> Vec<LeadScrapeResult<ExportStats>> {
        if let Err(e) = self.prepare().await {
            error!("{}", e);
            return vec![Err(e)];
        }

        let mut results = Vec::new();
        for extension in format.extensions() {
            let path = self.output_dir.join(format!("{}.{}", base_name, extension));
            let written = match *extension {
                "csv" => export_leads_csv(leads, &path).await,
                _ => export_leads_json(leads, &path).await,
            };

            let result = written.map(|file_size_bytes| ExportStats {
                path: path.clone(),
                record_count: leads.len(),
                file_size_bytes,
            });
            match &result {
                Ok(stats) => info!("Exported {} leads to {}", stats.record_count, stats.path.display()),
                Err(e) => error!("{}", e),
            }
            results.push(result);
        }

        results
    }

    /// Write the batch summary report as `{base_name}.csv`
    pub async fn export_summary(&self, rows: &[SummaryRow], base_name: &str) -> LeadScrapeResult<ExportStats> {
        self.prepare().await?;
        let path = self.output_dir.join(format!("{}.csv", base_name));
        let file_size_bytes = export_summary_csv(rows, &path).await?;
        info!("Batch summary saved to {}", path.display());
        Ok(ExportStats {
            path,
            record_count: rows.len(),
            file_size_bytes,
        })
    }
}

/// Join sanitized name parts with `_` into a file base name
pub fn file_base(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| utils::sanitize_file_component(part))
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("both".parse::<ExportFormat>().unwrap(), ExportFormat::Both);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Both.extensions(), &["csv", "json"]);
    }

    #[test]
    fn test_file_base_sanitizes_parts() {
        assert_eq!(file_base(&["coffee shop", "New York/NY", "20240101_120000"]), "coffee shop_New York-NY_20240101_120000");
    }

    #[tokio::test]
    async fn test_export_both_creates_directory_and_files() {
        let dir = TempDir::new().unwrap();
        let manager = ExportManager::new(dir.path().join("nested").join("out"));
        let leads = vec![Lead::new("Cafe", "1 Main St", "555").with_source("Yelp")];

        let results = manager.export_leads(&leads, "cafe_Austin_20240101_000000", ExportFormat::Both).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            let stats = result.as_ref().unwrap();
            assert!(stats.path.exists());
            assert_eq!(stats.record_count, 1);
            assert!(stats.file_size_bytes > 0);
        }
        assert!(manager.output_dir().join("cafe_Austin_20240101_000000.csv").exists());
        assert!(manager.output_dir().join("cafe_Austin_20240101_000000.json").exists());
    }

    #[tokio::test]
    async fn test_single_format_writes_one_file() {
        let dir = TempDir::new().unwrap();
        let manager = ExportManager::new(dir.path());

        let results = manager.export_leads(&[], "empty", ExportFormat::Json).await;

        assert_eq!(results.len(), 1);
        assert!(dir.path().join("empty.json").exists());
        assert!(!dir.path().join("empty.csv").exists());
    }

    #[tokio::test]
    async fn test_unwritable_directory_reports_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let manager = ExportManager::new(blocker.join("out"));

        let results = manager.export_leads(&[], "x", ExportFormat::Both).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LeadScrapeError::Export { .. })));
    }
}
