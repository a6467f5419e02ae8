//! ---
//! rbus_section: "06-simulation"
//! rbus_subsection: "01-bootstrap"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Simulation runtime module exports and shared types."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! In-process stand-ins for the bus, host links and peripherals of an
//! R-BUS pair. Everything is deterministic: time only moves when the
//! harness advances the [`SimClock`], and sensor noise comes from a seeded
//! generator.

pub mod bus;
pub mod pair;
pub mod peripherals;

pub use bus::{BusStats, SimBus, SimBusPort, SimDirection};
pub use pair::{default_reading, NodeHandles, SimNode, SimulatedPair, POLL_INTERVAL_MS};
pub use peripherals::{
    HostHandle, LedHandle, SensorHandle, SimClock, SimDelay, SimHostPort, SimLeds, SimSensors,
};
