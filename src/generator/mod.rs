pub mod clash;
pub mod rawlink;

pub use clash::{load_template, render_clash, ClashProxy, PROXIES_PLACEHOLDER};
pub use rawlink::render_raw_links;
