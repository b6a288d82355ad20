//! URL harvesting and normalization pipeline.
//!
//! urlharvest drives operator-curated URL queues through a five-stage
//! pipeline: a safety check that keeps fetches on the public internet, a
//! redirect-aware fetch, HTML content extraction, a mechanical payload
//! gate, and normalization through a local model. Results land in flat
//! files that operators can read and edit directly.

pub mod cli;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod oracle;
pub mod payload;
pub mod presentation;
pub mod runner;
pub mod safety;
pub mod store;
