pub mod explodes;
pub mod extract;
pub mod node_manip;

pub use explodes::explode;
pub use extract::{decode_subscription_body, extract_links};
pub use node_manip::{build_node_set, filter_links, matches_keyword, order_primary_first, NodeSet};
