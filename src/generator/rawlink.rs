//! Legacy raw-link subscription artifact.

use crate::models::RawLink;
use crate::parser::node_manip::filter_links;
use crate::utils::base64_encode;

/// Renders the raw-link artifact: keyword-filtered original link strings,
/// newline-joined and Base64-encoded as one blob.
///
/// This is deliberately a textual transform of the extracted links, not a
/// re-serialization of parsed nodes, so the list stays deduplicated-free and
/// can diverge from the Clash artifact's node set.
pub fn render_raw_links(links: &[RawLink], keywords: &[String]) -> (String, usize) {
    let (kept, filtered) = filter_links(links, keywords);
    (base64_encode(&kept.join("\n")), filtered)
}
