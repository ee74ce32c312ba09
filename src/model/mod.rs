//! Source-agnostic data model: leads, sources and queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LeadScrapeError, LeadScrapeResult};

/// Column order shared by every lead export
pub const LEAD_COLUMNS: [&str; 8] = [
    "name",
    "address",
    "phone",
    "website",
    "email",
    "source",
    "rating",
    "review_count",
];

/// One extracted business listing.
///
/// Every field is free text; a missing value is the empty string so that CSV and JSON
/// exports stay uniform. Field declaration order is the export column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub review_count: String,
}

impl Lead {
    pub fn new(name: impl Into<String>, address: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
            ..Self::default()
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = rating.into();
        self
    }

    pub fn with_review_count(mut self, review_count: impl Into<String>) -> Self {
        self.review_count = review_count.into();
        self
    }

    /// A lead is only kept when it carries a non-blank name
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Uniqueness key: two leads with the same name and address are the same business
    pub fn identity_key(&self) -> (&str, &str) {
        (&self.name, &self.address)
    }

    pub fn set_field(&mut self, field: LeadField, value: String) {
        match field {
            LeadField::Name => self.name = value,
            LeadField::Address => self.address = value,
            LeadField::Phone => self.phone = value,
            LeadField::Website => self.website = value,
            LeadField::Email => self.email = value,
            LeadField::Rating => self.rating = value,
            LeadField::ReviewCount => self.review_count = value,
        }
    }
}

/// Fields an extractor looks up on a listing. `source` is not looked up, it is tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Name,
    Address,
    Phone,
    Website,
    Email,
    Rating,
    ReviewCount,
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeadField::Name => "name",
            LeadField::Address => "address",
            LeadField::Phone => "phone",
            LeadField::Website => "website",
            LeadField::Email => "email",
            LeadField::Rating => "rating",
            LeadField::ReviewCount => "review_count",
        };
        f.write_str(name)
    }
}

/// Origin website of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    GoogleMaps,
    Yelp,
}

impl Source {
    /// Tag written into `Lead::source`
    pub fn label(&self) -> &'static str {
        match self {
            Source::GoogleMaps => "Google Maps",
            Source::Yelp => "Yelp",
        }
    }

    /// Short identifier used on the command line and in batch files
    pub fn key(&self) -> &'static str {
        match self {
            Source::GoogleMaps => "google",
            Source::Yelp => "yelp",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which sources a query should be run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    Google,
    Yelp,
    #[default]
    Both,
}

impl SourceSelection {
    /// Sources in extraction order
    pub fn sources(&self) -> &'static [Source] {
        match self {
            SourceSelection::Google => &[Source::GoogleMaps],
            SourceSelection::Yelp => &[Source::Yelp],
            SourceSelection::Both => &[Source::GoogleMaps, Source::Yelp],
        }
    }
}

impl FromStr for SourceSelection {
    type Err = LeadScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(SourceSelection::Google),
            "yelp" => Ok(SourceSelection::Yelp),
            "both" => Ok(SourceSelection::Both),
            other => Err(LeadScrapeError::invalid_query(format!(
                "unknown source '{}', expected google, yelp or both",
                other
            ))),
        }
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSelection::Google => write!(f, "google"),
            SourceSelection::Yelp => write!(f, "yelp"),
            SourceSelection::Both => write!(f, "both"),
        }
    }
}

/// One search request: what to look for, where, and from which sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub keyword: String,
    pub location: String,
    pub source: SourceSelection,
    pub max_results: usize,
}

impl Query {
    /// Build a validated query. Keyword and location are trimmed and must not be empty.
    pub fn new(
        keyword: impl AsRef<str>,
        location: impl AsRef<str>,
        source: SourceSelection,
        max_results: usize,
    ) -> LeadScrapeResult<Self> {
        let keyword = keyword.as_ref().trim();
        let location = location.as_ref().trim();

        if keyword.is_empty() {
            return Err(LeadScrapeError::invalid_query("keyword must not be empty"));
        }
        if location.is_empty() {
            return Err(LeadScrapeError::invalid_query("location must not be empty"));
        }
        if max_results == 0 {
            return Err(LeadScrapeError::invalid_query("max_results must be positive"));
        }

        Ok(Self {
            keyword: keyword.to_string(),
            location: location.to_string(),
            source,
            max_results,
        })
    }

    /// Identifier used in batch summaries and per-query file names
    pub fn id(&self) -> String {
        format!("{}_{}", self.keyword, self.location)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.keyword, self.location)
    }
}
