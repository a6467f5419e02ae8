//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Bus-sharing protocol for one R-BUS node.
//!
//! A node is generic over its peripherals (see [`hal`]) and is driven by
//! repeatedly calling [`Node::poll`] with the current device time.

pub mod arbiter;
pub mod hal;
pub mod metrics;
pub mod node;
pub mod router;
pub mod telemetry;
pub mod transceiver;

pub use arbiter::{DirectiveSource, RoleArbiter, RoleTransition};
pub use hal::{
    Actuators, Clock, Delay, DirectionControl, FixedDirection, LinkError, LinkResult, NoDelay,
    SensorSource, SerialLink, SystemClock, ThreadDelay,
};
pub use metrics::{LinkCounters, LinkMetrics};
pub use node::{Node, NodeIo};
pub use router::{CommandRouter, Route};
pub use telemetry::{CycleOutput, PendingRequest, ReplyOutcome, SensorSnapshot, TelemetryExchange};
pub use transceiver::{BusDirection, BusTransceiver};
