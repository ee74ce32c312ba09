//! leadscrape - business lead extraction from Maps-style and review-site listings
//!
//! This library provides:
//! - A source-agnostic lead model and per-source selector profiles
//! - A generic extractor driving a pluggable browsing session (HTTP snapshot or headless Chromium)
//! - First-seen deduplication on name and address
//! - CSV/JSON export, single-query and batch orchestration

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod scraper;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::core::LeadScraper;
pub use crate::error::{LeadScrapeError, LeadScrapeResult};
pub use crate::model::{Lead, Query, SourceSelection};
