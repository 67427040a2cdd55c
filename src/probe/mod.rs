//! Probe module: descriptor parsing and concurrent connectivity probing
//!
//! This module provides functionality for:
//! - Parsing proxy descriptors from the common list formats
//! - Probing proxies concurrently with per-attempt timeouts
//! - Aggregating results into an input-ordered report

pub mod models;
pub mod parser;
pub mod prober;

pub use models::{
    ErrorKind, ProbeReport, ProbeRequest, ProbeResult, ProxyAuth, ProxyDescriptor, ProxyProtocol,
    DEFAULT_CONCURRENCY, DEFAULT_TARGET_URL, DEFAULT_TIMEOUT_SECS,
};
pub use parser::{parse_descriptor, parse_file, parse_string, ParseError};
pub use prober::Prober;
