//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Frame codecs for R-BUS.
//!
//! Both links carry one frame per `\n`-terminated text line. Every frame is
//! self-typed by a leading token (`GET_SENSORS`, `SENS:`, `ROLE:`, `LED:`,
//! `CMD:`) or, on the host link, by being a JSON object. Decoding never
//! fails loudly: anything unrecognised decodes to `None` and is dropped by
//! the caller.

pub mod bus;
pub mod host;
pub mod led;
pub mod line;
pub mod numeric;
pub mod reading;

/// Capacity of a receive line buffer, excluding the delimiter. Every encoded
/// bus frame must fit.
pub const LINE_CAPACITY: usize = 128;

/// Shared result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Reasons an outbound frame cannot be encoded.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoded line does not fit the receiver's line buffer.
    #[error("{kind} frame of {len} bytes exceeds line capacity {capacity}")]
    Oversize {
        /// Frame kind, for diagnostics.
        kind: &'static str,
        /// Encoded length in bytes.
        len: usize,
        /// Line buffer capacity.
        capacity: usize,
    },
    /// A sensor reply with no readable field; it would decode as garbage.
    #[error("sensor reading has no readable field")]
    EmptyReading,
    /// Wrapper for JSON serialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use bus::{BusFrame, RoleDirective};
pub use host::{HostCommand, HostLine, HostReport};
pub use led::{Led, LedCommand};
pub use line::{FrameLineBuffer, LineBuffer, LineEvent};
pub use reading::{counts_to_volts, SensorReading, SensorVolts};
