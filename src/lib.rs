pub mod fetch;
pub mod generator;
pub mod models;
pub mod parser;
pub mod settings;
pub mod store;
pub mod updater;
pub mod utils;

// Re-export the main node types for easier access
pub use models::{Proxy, ProxyKind, RawLink, Transport};

// Re-export the orchestrator
pub use updater::{UpdateService, UpdateError};
