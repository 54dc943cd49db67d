//! Core types for MeshGraph: service identities, bucketed edge counters, the
//! dependency tree produced by a discovery pass, and layered settings.

pub mod config;
pub mod error;
pub mod tree;
pub mod types;

pub use config::{
    parse_duration, BranchFailurePolicy, DiscoveryConfig, ExportConfig, ExportFormat, IdScheme,
    LoggingConfig, PrometheusConfig, ScheduleConfig, Settings,
};
pub use error::*;
pub use tree::*;
pub use types::*;
