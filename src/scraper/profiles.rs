//! Per-source selector tables.
//!
//! Source differences are expressed as data: a URL template, the listing selector, the
//! interaction flags and one [`FieldLookup`] per lead field. The generic extractor in
//! [`crate::scraper`] interprets them.

use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::model::{LeadField, Source};

/// Where a field lookup is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    /// Inside the listing element
    Listing,
    /// Anywhere on the page, typically the detail panel opened by selecting the listing
    Page,
}

/// What to read from a matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Text,
    Attribute(String),
}

/// Post-processing applied to a raw looked-up value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Keep the first whitespace-separated word ("4.5 stars" -> "4.5")
    FirstWord,
    /// Drop a leading prefix if present ("mailto:a@b.c" -> "a@b.c")
    StripPrefix(String),
}

impl Transform {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Transform::FirstWord => value.split_whitespace().next().unwrap_or_default().to_string(),
            Transform::StripPrefix(prefix) => value.strip_prefix(prefix.as_str()).unwrap_or(value).to_string(),
        }
    }
}

/// One named lookup: how to find a single lead field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    pub field: LeadField,
    pub selector: String,
    pub scope: LookupScope,
    pub value: ValueSource,
    /// Matches whose value equals this text are skipped (aria-labelled buttons echoing their label)
    pub skip_text: Option<String>,
    pub transform: Option<Transform>,
}

impl FieldLookup {
    pub fn text(field: LeadField, selector: &str, scope: LookupScope) -> Self {
        Self {
            field,
            selector: selector.to_string(),
            scope,
            value: ValueSource::Text,
            skip_text: None,
            transform: None,
        }
    }

    pub fn attribute(field: LeadField, selector: &str, attribute: &str, scope: LookupScope) -> Self {
        Self {
            value: ValueSource::Attribute(attribute.to_string()),
            ..Self::text(field, selector, scope)
        }
    }

    pub fn skipping(mut self, text: &str) -> Self {
        self.skip_text = Some(text.to_string());
        self
    }

    pub fn transformed(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Normalize a raw value: trim, apply the transform, trim again
    pub fn finish(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match &self.transform {
            Some(transform) => transform.apply(trimmed).trim().to_string(),
            None => trimmed.to_string(),
        }
    }
}

/// Everything the extractor needs to know about one source
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub source: Source,
    pub listing_selector: String,
    /// Select (click) each listing before reading fields
    pub opens_listings: bool,
    /// Scroll the results feed to render more listings
    pub scrolls: bool,
    pub fields: Vec<FieldLookup>,
    search_url: fn(&str, &str) -> LeadScrapeResult<Url>,
}

impl SourceProfile {
    pub fn for_source(source: Source, locale: &str, extract_emails: bool) -> Self {
        let mut profile = match source {
            Source::GoogleMaps => Self::google_maps(locale),
            Source::Yelp => Self::yelp(),
        };
        if extract_emails {
            profile.fields.push(
                FieldLookup::attribute(LeadField::Email, "a[href^='mailto:']", "href", profile_email_scope(source))
                    .transformed(Transform::StripPrefix("mailto:".to_string())),
            );
        }
        profile
    }

    /// Maps-style source: listings are opened one by one and read from the detail panel
    pub fn google_maps(locale: &str) -> Self {
        let labels = MapsLabels::for_locale(locale);
        Self {
            source: Source::GoogleMaps,
            listing_selector: "[data-result-index]".to_string(),
            opens_listings: true,
            scrolls: true,
            fields: vec![
                FieldLookup::text(LeadField::Name, "h1", LookupScope::Page),
                FieldLookup::text(LeadField::Address, &format!("[aria-label*='{}']", labels.address), LookupScope::Page)
                    .skipping(labels.address),
                FieldLookup::text(LeadField::Phone, &format!("[aria-label*='{}']", labels.phone), LookupScope::Page)
                    .skipping(labels.phone),
                FieldLookup::text(LeadField::Website, "[data-item-id='authority']", LookupScope::Page),
                FieldLookup::attribute(LeadField::Rating, "span[role='img']", "aria-label", LookupScope::Page)
                    .transformed(Transform::FirstWord),
                FieldLookup::text(LeadField::ReviewCount, "button[aria-label*='review']", LookupScope::Page),
            ],
            search_url: maps_search_url,
        }
    }

    /// Reviews-site source: every field is read from the result card itself
    pub fn yelp() -> Self {
        Self {
            source: Source::Yelp,
            listing_selector: "[data-testid='serp-ia-card']".to_string(),
            opens_listings: false,
            scrolls: false,
            fields: vec![
                FieldLookup::text(LeadField::Name, "[data-testid='business-name']", LookupScope::Listing),
                FieldLookup::text(LeadField::Address, "[data-testid='business-address']", LookupScope::Listing),
                FieldLookup::text(LeadField::Phone, "[data-testid='business-phone-number']", LookupScope::Listing),
                FieldLookup::attribute(LeadField::Website, "[aria-label='Business website']", "href", LookupScope::Listing),
                FieldLookup::attribute(LeadField::Rating, "[role='img']", "aria-label", LookupScope::Listing)
                    .transformed(Transform::FirstWord),
                FieldLookup::text(LeadField::ReviewCount, "[data-testid='review-count']", LookupScope::Listing),
            ],
            search_url: yelp_search_url,
        }
    }

    pub fn search_url(&self, keyword: &str, location: &str) -> LeadScrapeResult<Url> {
        (self.search_url)(keyword, location)
    }
}

fn profile_email_scope(source: Source) -> LookupScope {
    match source {
        Source::GoogleMaps => LookupScope::Page,
        Source::Yelp => LookupScope::Listing,
    }
}

fn maps_search_url(keyword: &str, location: &str) -> LeadScrapeResult<Url> {
    let query = format!("{} in {}", keyword, location);
    let encoded: String = byte_serialize(query.as_bytes()).collect();
    let raw = format!("https://www.google.com/maps/search/{}", encoded);
    Url::parse(&raw).map_err(|e| LeadScrapeError::navigation(raw, e.to_string()))
}

fn yelp_search_url(keyword: &str, location: &str) -> LeadScrapeResult<Url> {
    Url::parse_with_params(
        "https://www.yelp.com/search",
        &[("find_desc", keyword), ("find_loc", location)],
    )
    .map_err(|e| LeadScrapeError::navigation("https://www.yelp.com/search", e.to_string()))
}

/// Localized aria labels of the Maps detail panel
struct MapsLabels {
    address: &'static str,
    phone: &'static str,
}

impl MapsLabels {
    fn for_locale(locale: &str) -> Self {
        match locale.to_lowercase().as_str() {
            "es" => Self { address: "Dirección", phone: "Teléfono" },
            "fr" => Self { address: "Adresse", phone: "Téléphone" },
            "de" => Self { address: "Adresse", phone: "Telefon" },
            _ => Self { address: "Address", phone: "Phone" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_url_uses_plus_for_spaces() {
        let profile = SourceProfile::google_maps("default");
        let url = profile.search_url("coffee shop", "San Francisco").unwrap();
        assert_eq!(url.as_str(), "https://www.google.com/maps/search/coffee+shop+in+San+Francisco");
    }

    #[test]
    fn test_yelp_url_carries_both_params() {
        let url = SourceProfile::yelp().search_url("pizza", "New York").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("find_desc".to_string(), "pizza".to_string()),
                ("find_loc".to_string(), "New York".to_string()),
            ]
        );
    }

    #[test]
    fn test_locale_relabels_maps_lookups() {
        let profile = SourceProfile::google_maps("de");
        let phone = profile.fields.iter().find(|f| f.field == LeadField::Phone).unwrap();
        assert_eq!(phone.selector, "[aria-label*='Telefon']");
        assert_eq!(phone.skip_text.as_deref(), Some("Telefon"));
    }

    #[test]
    fn test_email_lookup_only_when_enabled() {
        let without = SourceProfile::for_source(Source::Yelp, "default", false);
        assert!(without.fields.iter().all(|f| f.field != LeadField::Email));

        let with = SourceProfile::for_source(Source::Yelp, "default", true);
        let email = with.fields.iter().find(|f| f.field == LeadField::Email).unwrap();
        assert_eq!(email.finish(" mailto:owner@example.com "), "owner@example.com");
    }

    #[test]
    fn test_rating_first_word() {
        let lookup = FieldLookup::attribute(LeadField::Rating, "span", "aria-label", LookupScope::Page)
            .transformed(Transform::FirstWord);
        assert_eq!(lookup.finish("4.5 stars "), "4.5");
        assert_eq!(lookup.finish("   "), "");
    }
}
