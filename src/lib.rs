//! Loads gzip-compressed app-installation logs into memcached shards keyed by
//! device type.
//!
//! ```text
//! glob -> scanner -> pipeline (worker pool)
//!                      file -> reader -> parser -> writer -> codec -> store router -> memcached
//!                      report -> completion marker (dot-rename)
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod scanner;
pub mod store;
pub mod writer;
