pub mod link;
pub mod proxy;

pub use link::RawLink;
pub use proxy::{Proxy, ProxyKind, Transport};
