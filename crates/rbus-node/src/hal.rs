//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Hardware seams. The node logic only talks to peripherals through these
//! traits, so the same state machine drives a real serial port or the
//! in-process simulation.

use std::time::{Duration, Instant};

use rbus_common::time::elapsed_millis;
use rbus_proto::{Led, SensorReading};
use thiserror::Error;

/// Faults reported by peripherals.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("i/o error on {link}: {source}")]
    Io {
        link: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{link} link is closed")]
    Closed { link: &'static str },
    #[error("direction control failed: {0}")]
    Direction(String),
    #[error("actuator {led} failed: {reason}")]
    Actuator { led: Led, reason: String },
}

impl LinkError {
    pub fn io(link: &'static str, source: std::io::Error) -> Self {
        LinkError::Io { link, source }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Monotonic device clock in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Blocking delay used for the transceiver settle time.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Driver-enable / receiver-enable lines of the RS485 transceiver.
pub trait DirectionControl {
    fn set_driver_enabled(&mut self, enabled: bool) -> LinkResult<()>;
    fn set_receiver_enabled(&mut self, enabled: bool) -> LinkResult<()>;
}

/// Byte-oriented serial port. Reads never block.
pub trait SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()>;

    /// Block until every written byte has left the port.
    fn flush(&mut self) -> LinkResult<()>;

    /// Append whatever bytes are currently available to `buf`, returning how
    /// many were read.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize>;
}

/// Local analog inputs.
pub trait SensorSource {
    fn sample(&mut self) -> SensorReading;
}

/// Local indicator LEDs.
pub trait Actuators {
    fn set_led(&mut self, led: Led, on: bool) -> LinkResult<()>;
}

/// Wall clock measured from process start.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        elapsed_millis(self.origin)
    }
}

/// Delay that returns immediately, for links without turnaround constraints.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay(&mut self, _duration: Duration) {}
}

/// Delay backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Direction control for transceivers whose enable lines are wired to
/// automatic direction circuitry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedDirection;

impl DirectionControl for FixedDirection {
    fn set_driver_enabled(&mut self, _enabled: bool) -> LinkResult<()> {
        Ok(())
    }

    fn set_receiver_enabled(&mut self, _enabled: bool) -> LinkResult<()> {
        Ok(())
    }
}
