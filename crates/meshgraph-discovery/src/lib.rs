//! MeshGraph discovery
//!
//! Provides:
//! - `MetricsQueryClient`, the backend seam, and a Prometheus HTTP implementation
//! - Traffic query and deep-link construction for a root signal
//! - Aggregation of labelled samples into per-destination, status-bucketed counters
//! - The recursive, cycle-safe discovery engine producing dependency trees

pub mod aggregator;
pub mod client;
pub mod engine;
pub mod prometheus;
pub mod query;
pub mod report;

pub use aggregator::*;
pub use client::*;
pub use engine::*;
pub use prometheus::*;
pub use query::*;
pub use report::*;
