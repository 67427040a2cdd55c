//! Proxy Pulse - Concurrent Proxy Connectivity Prober
//!
//! Given a list of proxy descriptors and a target URL, proxy-pulse issues one
//! HTTP GET through each proxy concurrently, bounded by a per-attempt timeout,
//! and aggregates per-proxy success, HTTP status and latency into an
//! input-ordered report.

pub mod probe;
pub mod report;

pub use probe::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
