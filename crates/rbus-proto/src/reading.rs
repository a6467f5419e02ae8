//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Full-scale count of the 12-bit ADC.
pub const ADC_FULL_SCALE: f32 = 4095.0;
/// ADC reference voltage.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Convert a raw ADC count to volts.
pub fn counts_to_volts(raw: u16) -> f32 {
    f32::from(raw) / ADC_FULL_SCALE * ADC_REFERENCE_VOLTS
}

/// Raw sensor counts as carried by `SENS:` frames.
///
/// A field is `None` when it could not be read or parsed; only that field is
/// affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    /// Potentiometer.
    pub pot: Option<u16>,
    /// Light dependent resistor.
    pub ldr: Option<u16>,
    /// Encoder input.
    pub enc: Option<u16>,
}

impl SensorReading {
    /// Reading with all three channels present.
    pub fn new(pot: u16, ldr: u16, enc: u16) -> Self {
        Self {
            pot: Some(pot),
            ldr: Some(ldr),
            enc: Some(enc),
        }
    }

    /// True when no channel carries a value.
    pub fn is_empty(&self) -> bool {
        self.pot.is_none() && self.ldr.is_none() && self.enc.is_none()
    }

    /// Scale to volts; missing channels read as zero.
    pub fn volts(&self) -> SensorVolts {
        let scale = |field: Option<u16>| field.map(counts_to_volts).unwrap_or(0.0);
        SensorVolts {
            pot: scale(self.pot),
            ldr: scale(self.ldr),
            enc: scale(self.enc),
            ax: 0.0,
        }
    }
}

/// Scaled sensor values as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorVolts {
    /// Potentiometer, volts.
    pub pot: f32,
    /// Light dependent resistor, volts.
    pub ldr: f32,
    /// Encoder input, volts.
    pub enc: f32,
    /// Accelerometer X placeholder; always zero on these boards.
    #[serde(default)]
    pub ax: f32,
}

impl SensorVolts {
    /// All-zero placeholder reported in place of stale data.
    pub const ZERO: SensorVolts = SensorVolts {
        pot: 0.0,
        ldr: 0.0,
        enc: 0.0,
        ax: 0.0,
    };
}
