//! Deduplication, keyword filtering, ordering and name disambiguation.

use std::collections::{HashMap, HashSet};

use crate::models::{Proxy, RawLink};
use crate::parser::explodes::explode;

/// Reorders links so that everything from the primary (first configured)
/// feed comes before all other sources, preserving order within each group.
pub fn order_primary_first(links: Vec<RawLink>) -> Vec<RawLink> {
    let (primary, rest): (Vec<_>, Vec<_>) = links.into_iter().partition(|l| l.primary);
    let mut ordered = primary;
    ordered.extend(rest);
    ordered
}

/// Case-sensitive substring match against the configured keyword blocklist.
pub fn matches_keyword(name: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && name.contains(k))
}

/// Outcome of building the deduplicated node set for the Clash artifact.
#[derive(Debug, Default)]
pub struct NodeSet {
    pub proxies: Vec<Proxy>,
    /// Final display names, in the same order as `proxies`.
    pub names: Vec<String>,
    pub filtered: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// The first few links no decoder understood, for log reporting.
    pub failed_samples: Vec<String>,
    pub type_counts: HashMap<&'static str, usize>,
}

/// How many undecodable links are reported individually before the run log
/// falls back to a plain count.
pub const FAILED_SAMPLE_LIMIT: usize = 5;

/// Decodes, filters, deduplicates and renames a list of links.
///
/// Keyword filtering happens before dedup accounting so the two counts stay
/// independent. First occurrence of an identity key wins; survivors sharing
/// a display name get a `-{n}` suffix, n counted per original name, bumped
/// until the result is unique.
pub fn build_node_set(links: &[RawLink], keywords: &[String]) -> NodeSet {
    let mut set = NodeSet::default();
    let mut seen_keys = HashSet::new();
    let mut name_counter: HashMap<String, usize> = HashMap::new();
    let mut used_names = HashSet::new();

    for link in links {
        let mut node = match explode(&link.uri) {
            Some(node) => node,
            None => {
                set.failed += 1;
                if set.failed_samples.len() < FAILED_SAMPLE_LIMIT {
                    set.failed_samples.push(link.uri.clone());
                }
                continue;
            }
        };

        let name = node.display_name();
        if matches_keyword(&name, keywords) {
            set.filtered += 1;
            continue;
        }
        if !seen_keys.insert(node.identity_key()) {
            set.duplicates += 1;
            continue;
        }

        let final_name = if used_names.contains(&name) {
            let counter = name_counter.entry(name.clone()).or_insert(0);
            let mut candidate;
            loop {
                *counter += 1;
                candidate = format!("{}-{}", name, counter);
                if !used_names.contains(&candidate) {
                    break;
                }
            }
            candidate
        } else {
            name
        };
        used_names.insert(final_name.clone());
        node.name = Some(final_name.clone());

        *set.type_counts.entry(node.kind.display_tag()).or_insert(0) += 1;
        set.proxies.push(node);
        set.names.push(final_name);
    }
    set
}

/// Keyword-filters the original link strings without deduplicating them.
///
/// The raw-link artifact is a textual transform of the extracted links, so
/// parsing here is only used to recover a name for the keyword check; links
/// that no decoder understands are passed through untouched.
pub fn filter_links(links: &[RawLink], keywords: &[String]) -> (Vec<String>, usize) {
    let mut kept = Vec::new();
    let mut filtered = 0;
    for link in links {
        if !keywords.is_empty() {
            if let Some(node) = explode(&link.uri) {
                if matches_keyword(&node.display_name(), keywords) {
                    filtered += 1;
                    continue;
                }
            }
        }
        kept.push(link.uri.clone());
    }
    (kept, filtered)
}
