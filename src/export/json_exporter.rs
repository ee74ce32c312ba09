use serde_json::to_writer_pretty;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::Lead;

/// Export leads as a pretty-printed JSON array. Non-ASCII text is written as-is.
pub async fn export_leads_json(leads: &[Lead], output_path: &Path) -> LeadScrapeResult<u64> {
    debug!("Exporting {} leads to JSON: {}", leads.len(), output_path.display());

    let file = File::create(output_path).map_err(|e| LeadScrapeError::export(output_path, e))?;
    let mut writer = BufWriter::new(file);
    to_writer_pretty(&mut writer, leads).map_err(|e| LeadScrapeError::export(output_path, e))?;
    writer.flush().map_err(|e| LeadScrapeError::export(output_path, e))?;
    drop(writer);

    let file_size = tokio::fs::metadata(output_path)
        .await
        .map_err(|e| LeadScrapeError::export(output_path, e))?
        .len();
    Ok(file_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_export_is_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");

        export_leads_json(&[], &path).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_parse_back_equals_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.json");
        let leads = vec![
            Lead::new("Café Olé", "12 Rue de Rivoli", "+33 1 23 45 67 89").with_source("Yelp").with_rating("4.0"),
            Lead::new("Bäckerei Müller", "", "").with_source("Google Maps"),
        ];

        export_leads_json(&leads, &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Café Olé"));
        assert!(content.contains("\n  {\n    \"name\""));
        let parsed: Vec<Lead> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, leads);
    }

    #[tokio::test]
    async fn test_keys_follow_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.json");

        export_leads_json(&[Lead::new("A", "B", "C")], &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let positions: Vec<usize> = crate::model::LEAD_COLUMNS
            .iter()
            .map(|key| content.find(&format!("\"{}\"", key)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
