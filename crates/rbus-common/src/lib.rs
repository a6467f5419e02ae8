//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Shared primitives and utilities for the node runtime."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Core shared primitives for the R-BUS workspace.
//! This crate exposes node identity and role types, configuration loading,
//! tracing setup and monotonic time helpers consumed across the workspace.

pub mod config;
pub mod identity;
pub mod logging;
pub mod time;

pub use config::{
    BusConfig, HostConfig, LoadedNodeConfig, LoggingConfig, MetricsConfig, NodeConfig, PairConfig,
    SimulationConfig, TelemetryConfig,
};
pub use identity::{NodeId, Role};
pub use logging::{init_tracing, LogFormat, LogStream};
