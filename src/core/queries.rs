//! Batch query files: loading, validation and sample generation.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Deserialize;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::{Query, SourceSelection};

const REQUIRED_COLUMNS: [&str; 2] = ["keyword", "location"];

const SAMPLE_QUERIES: [(&str, &str, &str, usize); 5] = [
    ("restaurant", "New York", "both", 20),
    ("pizza", "Chicago", "google", 15),
    ("coffee shop", "San Francisco", "yelp", 25),
    ("plumber", "Los Angeles", "both", 30),
    ("dentist", "Miami", "google", 10),
];

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    max_results: Option<String>,
}

/// Load the queries of a batch file.
///
/// A missing file or missing `keyword`/`location` column fails before anything runs. Rows with
/// a blank keyword or location are skipped quietly; rows with an unknown source or a bad
/// `max_results` are skipped with a warning. At least one valid query is required.
pub fn load_queries<P: AsRef<Path>>(path: P, default_max_results: usize) -> LeadScrapeResult<Vec<Query>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(LeadScrapeError::InputNotFound {
            path: path.display().to_string(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| LeadScrapeError::invalid_input(format!("{}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| LeadScrapeError::invalid_input(format!("{}: {}", path.display(), e)))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h.eq_ignore_ascii_case(column)))
        .collect();
    if !missing.is_empty() {
        return Err(LeadScrapeError::invalid_input(format!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    // Header names are matched case-insensitively
    reader.set_headers(headers.iter().map(|h| h.to_lowercase()).collect());

    let mut queries = Vec::new();
    for (index, row) in reader.deserialize::<QueryRow>().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", line, e);
                continue;
            }
        };

        match parse_row(row, default_max_results) {
            Ok(Some(query)) => queries.push(query),
            Ok(None) => debug!("Skipping row {}: empty keyword or location", line),
            Err(e) => warn!("Skipping row {}: {}", line, e),
        }
    }

    if queries.is_empty() {
        return Err(LeadScrapeError::invalid_input(format!(
            "{} contains no valid queries",
            path.display()
        )));
    }

    info!("Loaded {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

fn parse_row(row: QueryRow, default_max_results: usize) -> LeadScrapeResult<Option<Query>> {
    let keyword = row.keyword.unwrap_or_default();
    let location = row.location.unwrap_or_default();
    if keyword.trim().is_empty() || location.trim().is_empty() {
        return Ok(None);
    }

    let source = match row.source.as_deref().map(str::trim) {
        None | Some("") => SourceSelection::default(),
        Some(value) => value.parse()?,
    };

    let max_results = match row.max_results.as_deref().map(str::trim) {
        None | Some("") => default_max_results,
        Some(value) => value
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| LeadScrapeError::invalid_query(format!("max_results must be a positive integer, got '{}'", value)))?,
    };

    Query::new(keyword, location, source, max_results).map(Some)
}

/// Write an example batch file
pub fn write_sample_queries<P: AsRef<Path>>(path: P) -> LeadScrapeResult<usize> {
    let path = path.as_ref();
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| LeadScrapeError::export(path, e))?;

    writer
        .write_record(["keyword", "location", "source", "max_results"])
        .map_err(|e| LeadScrapeError::export(path, e))?;
    for (keyword, location, source, max_results) in SAMPLE_QUERIES {
        let max_results = max_results.to_string();
        writer
            .write_record([keyword, location, source, max_results.as_str()])
            .map_err(|e| LeadScrapeError::export(path, e))?;
    }
    writer.flush().map_err(|e| LeadScrapeError::export(path, e))?;

    info!("Sample queries file created: {}", path.display());
    Ok(SAMPLE_QUERIES.len())
}

/// Ask for one query on an interactive terminal.
///
/// Returns `Ok(None)` on an empty keyword or end of input. Blank source and max results
/// fall back to `both` and `default_max_results`.
pub fn prompt_query<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    default_max_results: usize,
) -> LeadScrapeResult<Option<Query>> {
    let keyword = match ask(input, output, "Keyword (empty to quit): ")? {
        Some(keyword) if !keyword.is_empty() => keyword,
        _ => return Ok(None),
    };
    let location = ask(input, output, "Location: ")?.unwrap_or_default();
    let source = ask(input, output, "Source [google/yelp/both] (both): ")?.unwrap_or_default();
    let max_results = ask(
        input,
        output,
        &format!("Max results per source ({}): ", default_max_results),
    )?
    .unwrap_or_default();

    let row = QueryRow {
        keyword: Some(keyword),
        location: Some(location),
        source: Some(source),
        max_results: Some(max_results),
    };
    match parse_row(row, default_max_results)? {
        Some(query) => Ok(Some(query)),
        None => Err(LeadScrapeError::invalid_query("location must not be empty")),
    }
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> LeadScrapeResult<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
