//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Half-duplex direction control around every bus write.

use std::time::Duration;

use crate::hal::{Delay, DirectionControl, LinkResult, SerialLink};

/// Current direction of the local transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    Receive,
    Transmit,
}

/// Owns the bus port and its direction lines.
///
/// Receive is the resting state: every transmission leaves the transceiver
/// in receive mode again, including when the write itself fails.
pub struct BusTransceiver<P, D> {
    port: P,
    direction: D,
    settle: Duration,
    mode: BusDirection,
}

impl<P, D> BusTransceiver<P, D>
where
    P: SerialLink,
    D: DirectionControl,
{
    /// Wrap the port and put the transceiver into receive mode.
    pub fn new(port: P, direction: D, settle: Duration) -> LinkResult<Self> {
        let mut transceiver = Self {
            port,
            direction,
            settle,
            mode: BusDirection::Transmit,
        };
        transceiver.enter_receive()?;
        Ok(transceiver)
    }

    pub fn mode(&self) -> BusDirection {
        self.mode
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Assert driver-enable, release the receiver and wait for the line to
    /// settle before the caller writes.
    pub fn enter_transmit<Y: Delay>(&mut self, delay: &mut Y) -> LinkResult<()> {
        self.direction.set_receiver_enabled(false)?;
        self.direction.set_driver_enabled(true)?;
        self.mode = BusDirection::Transmit;
        delay.delay(self.settle);
        Ok(())
    }

    /// Release the driver and listen again.
    pub fn enter_receive(&mut self) -> LinkResult<()> {
        let driver = self.direction.set_driver_enabled(false);
        let receiver = self.direction.set_receiver_enabled(true);
        driver.and(receiver)?;
        self.mode = BusDirection::Receive;
        Ok(())
    }

    /// Send one encoded line: transmit mode, write, flush, receive mode.
    pub fn transmit<Y: Delay>(&mut self, bytes: &[u8], delay: &mut Y) -> LinkResult<()> {
        if let Err(err) = self.enter_transmit(delay) {
            self.enter_receive()?;
            return Err(err);
        }
        let written = self
            .port
            .write_all(bytes)
            .and_then(|()| self.port.flush());
        let restored = self.enter_receive();
        written.and(restored)
    }

    /// Drain received bytes. Nothing is read while transmitting.
    pub fn receive(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        match self.mode {
            BusDirection::Receive => self.port.read_available(buf),
            BusDirection::Transmit => Ok(0),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }
}
