use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::{Lead, LEAD_COLUMNS};

/// Columns of the batch summary report
pub const SUMMARY_COLUMNS: [&str; 6] = ["query_id", "keyword", "location", "source", "leads_found", "status"];

/// One row of the batch summary report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub query_id: String,
    pub keyword: String,
    pub location: String,
    pub source: String,
    pub leads_found: usize,
    pub status: String,
}

/// Export leads to CSV. An empty slice still produces the header row.
pub async fn export_leads_csv(leads: &[Lead], output_path: &Path) -> LeadScrapeResult<u64> {
    debug!("Exporting {} leads to CSV: {}", leads.len(), output_path.display());
    write_rows(output_path, &LEAD_COLUMNS, leads).await
}

pub async fn export_summary_csv(rows: &[SummaryRow], output_path: &Path) -> LeadScrapeResult<u64> {
    debug!("Writing {} summary rows to {}", rows.len(), output_path.display());
    write_rows(output_path, &SUMMARY_COLUMNS, rows).await
}

async fn write_rows<T: Serialize>(output_path: &Path, header: &[&str], rows: &[T]) -> LeadScrapeResult<u64> {
    let fail = |e: &dyn std::fmt::Display| LeadScrapeError::export(output_path, e);

    // Header is written by hand so an empty export still carries it
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(output_path)
        .map_err(|e| fail(&e))?;
    writer.write_record(header).map_err(|e| fail(&e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| fail(&e))?;
    }
    writer.flush().map_err(|e| fail(&e))?;
    drop(writer);

    let file_size = tokio::fs::metadata(output_path).await.map_err(|e| fail(&e))?.len();
    Ok(file_size)
}
