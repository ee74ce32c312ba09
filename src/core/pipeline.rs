use std::collections::HashSet;
use tracing::{debug, info};

use crate::model::Lead;

/// Keep the first occurrence of every `(name, address)` pair, preserving input order
pub fn deduplicate<I>(leads: I) -> Vec<Lead>
where
    I: IntoIterator<Item = Lead>,
{
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut unique = Vec::new();
    let mut total = 0usize;

    for lead in leads {
        total += 1;
        let (name, address) = lead.identity_key();
        if seen.insert((name.to_string(), address.to_string())) {
            unique.push(lead);
        } else {
            debug!("Dropping duplicate lead: {} ({})", lead.name, lead.address);
        }
    }

    let duplicate_count = total - unique.len();
    if duplicate_count > 0 {
        info!("Deduplication removed {} duplicate leads", duplicate_count);
    }

    unique
}

/// Concatenate per-source lists in order, then deduplicate
pub fn merge_sources(per_source: Vec<Vec<Lead>>) -> Vec<Lead> {
    deduplicate(per_source.into_iter().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins() {
        let leads = vec![
            Lead::new("A", "addr1", "111"),
            Lead::new("B", "addr2", "222"),
            Lead::new("A", "addr1", "999"),
        ];

        let unique = deduplicate(leads);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].phone, "111");
        assert_eq!(unique[1].name, "B");
    }

    #[test]
    fn test_same_name_different_address_is_kept() {
        let leads = vec![Lead::new("Starbucks", "1 Main St", ""), Lead::new("Starbucks", "9 Elm St", "")];
        assert_eq!(deduplicate(leads).len(), 2);
    }

    #[test]
    fn test_merge_prefers_earlier_source() {
        let google = vec![
            Lead::new("A", "addr1", "").with_source("Google Maps"),
            Lead::new("B", "addr2", "").with_source("Google Maps"),
        ];
        let yelp = vec![
            Lead::new("A", "addr1", "").with_source("Yelp"),
            Lead::new("C", "addr3", "").with_source("Yelp"),
        ];

        let merged = merge_sources(vec![google, yelp]);

        let names: Vec<&str> = merged.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(merged[0].source, "Google Maps");
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(Vec::new()).is_empty());
        assert!(merge_sources(vec![Vec::new(), Vec::new()]).is_empty());
    }
}
