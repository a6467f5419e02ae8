//! ---
//! rbus_section: "06-simulation"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Simulated bus medium and node peripherals."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Shared half-duplex medium.
//!
//! Each node owns one tap: a [`SimBusPort`] for data and a [`SimDirection`]
//! for its driver/receiver enables. Bytes only reach the other node when the
//! writer's driver is on, the reader's receiver is on and the link is up. If
//! both drivers are on at once the bytes arrive garbled.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rbus_common::NodeId;
use rbus_node::{DirectionControl, LinkResult, SerialLink};

const GARBLED: u8 = 0xFF;

#[derive(Debug, Default)]
struct Tap {
    driver: bool,
    receiver: bool,
    inbox: VecDeque<u8>,
}

#[derive(Debug)]
struct Medium {
    taps: [Tap; 2],
    link_up: bool,
    stats: BusStats,
}

/// Byte counters for the medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub delivered: u64,
    /// Written with the driver off, to a deaf receiver or over a cut link.
    pub lost: u64,
    /// Written while the other driver was also on, whether or not the
    /// other side was listening.
    pub garbled: u64,
}

fn tap_index(node: NodeId) -> usize {
    match node {
        NodeId::A => 0,
        NodeId::B => 1,
    }
}

/// Handle to the shared medium. Clones refer to the same bus.
#[derive(Debug, Clone)]
pub struct SimBus {
    medium: Arc<Mutex<Medium>>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            medium: Arc::new(Mutex::new(Medium {
                taps: [Tap::default(), Tap::default()],
                link_up: true,
                stats: BusStats::default(),
            })),
        }
    }

    /// Data port and direction lines for `node`.
    pub fn attach(&self, node: NodeId) -> (SimBusPort, SimDirection) {
        let index = tap_index(node);
        (
            SimBusPort {
                medium: self.medium.clone(),
                index,
            },
            SimDirection {
                medium: self.medium.clone(),
                index,
            },
        )
    }

    /// Cut or restore the cable.
    pub fn set_link_up(&self, up: bool) {
        self.medium.lock().link_up = up;
    }

    /// Put raw bytes straight into `node`'s receive FIFO.
    pub fn inject(&self, node: NodeId, bytes: &[u8]) {
        self.medium.lock().taps[tap_index(node)]
            .inbox
            .extend(bytes.iter().copied());
    }

    pub fn stats(&self) -> BusStats {
        self.medium.lock().stats
    }

    pub fn driver_enabled(&self, node: NodeId) -> bool {
        self.medium.lock().taps[tap_index(node)].driver
    }

    pub fn receiver_enabled(&self, node: NodeId) -> bool {
        self.medium.lock().taps[tap_index(node)].receiver
    }
}

/// Data side of a node's tap.
#[derive(Debug)]
pub struct SimBusPort {
    medium: Arc<Mutex<Medium>>,
    index: usize,
}

impl SerialLink for SimBusPort {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let mut medium = self.medium.lock();
        let len = bytes.len() as u64;
        let other = 1 - self.index;
        if !medium.taps[self.index].driver || !medium.link_up {
            medium.stats.lost += len;
            return Ok(());
        }
        if medium.taps[other].driver {
            // Contention is counted even when the other tap is not listening:
            // a transmitting node has its own receiver off.
            medium.stats.garbled += len;
            if medium.taps[other].receiver {
                // Delimiters survive so the receiver resynchronises on the next line.
                let garbled: Vec<u8> = bytes
                    .iter()
                    .map(|byte| if *byte == b'\n' { b'\n' } else { GARBLED })
                    .collect();
                medium.taps[other].inbox.extend(garbled);
            }
            return Ok(());
        }
        if !medium.taps[other].receiver {
            medium.stats.lost += len;
            return Ok(());
        }
        medium.stats.delivered += len;
        medium.taps[other].inbox.extend(bytes.iter().copied());
        Ok(())
    }

    fn flush(&mut self) -> LinkResult<()> {
        Ok(())
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        let mut medium = self.medium.lock();
        let inbox = &mut medium.taps[self.index].inbox;
        let count = inbox.len();
        buf.extend(inbox.drain(..));
        Ok(count)
    }
}

/// Enable lines of a node's tap.
#[derive(Debug)]
pub struct SimDirection {
    medium: Arc<Mutex<Medium>>,
    index: usize,
}

impl DirectionControl for SimDirection {
    fn set_driver_enabled(&mut self, enabled: bool) -> LinkResult<()> {
        self.medium.lock().taps[self.index].driver = enabled;
        Ok(())
    }

    fn set_receiver_enabled(&mut self, enabled: bool) -> LinkResult<()> {
        self.medium.lock().taps[self.index].receiver = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(port: &mut SimBusPort) -> Vec<u8> {
        let mut buf = Vec::new();
        port.read_available(&mut buf).expect("read");
        buf
    }

    #[test]
    fn bytes_need_driver_and_receiver() {
        let bus = SimBus::new();
        let (mut a, mut a_dir) = bus.attach(NodeId::A);
        let (mut b, mut b_dir) = bus.attach(NodeId::B);

        a.write_all(b"lost\n").expect("write");
        assert!(read(&mut b).is_empty());
        assert_eq!(bus.stats().lost, 5);

        a_dir.set_driver_enabled(true).expect("de");
        a.write_all(b"deaf\n").expect("write");
        assert!(read(&mut b).is_empty());

        b_dir.set_receiver_enabled(true).expect("re");
        a.write_all(b"GET_SENSORS\n").expect("write");
        assert_eq!(read(&mut b), b"GET_SENSORS\n");
        assert_eq!(bus.stats().delivered, 12);
    }

    #[test]
    fn simultaneous_drivers_garble_the_line() {
        let bus = SimBus::new();
        let (mut a, mut a_dir) = bus.attach(NodeId::A);
        let (mut b, mut b_dir) = bus.attach(NodeId::B);
        a_dir.set_driver_enabled(true).expect("de");
        b_dir.set_driver_enabled(true).expect("de");
        b_dir.set_receiver_enabled(true).expect("re");

        a.write_all(b"SENS:1,2,3\n").expect("write");
        let received = read(&mut b);
        assert_eq!(received.len(), 11);
        assert!(received[..10].iter().all(|byte| *byte == GARBLED));
        assert_eq!(received[10], b'\n');
        assert_eq!(bus.stats().garbled, 11);
    }

    #[test]
    fn contention_counts_even_with_both_receivers_off() {
        let bus = SimBus::new();
        let (mut a, mut a_dir) = bus.attach(NodeId::A);
        let (mut b, mut b_dir) = bus.attach(NodeId::B);
        // Both nodes mid-transmission: DE on, RE off on each side.
        for dir in [&mut a_dir, &mut b_dir] {
            dir.set_receiver_enabled(false).expect("re");
            dir.set_driver_enabled(true).expect("de");
        }

        a.write_all(b"GET_SENSORS\n").expect("write");
        b.write_all(b"SENS:1,2,3\n").expect("write");
        assert!(read(&mut a).is_empty());
        assert!(read(&mut b).is_empty());
        let stats = bus.stats();
        assert_eq!(stats.garbled, 23);
        assert_eq!(stats.lost, 0);
    }

    #[test]
    fn cut_link_loses_everything() {
        let bus = SimBus::new();
        let (mut a, mut a_dir) = bus.attach(NodeId::A);
        let (mut b, mut b_dir) = bus.attach(NodeId::B);
        a_dir.set_driver_enabled(true).expect("de");
        b_dir.set_receiver_enabled(true).expect("re");
        bus.set_link_up(false);
        a.write_all(b"ROLE:SET_MASTER\n").expect("write");
        assert!(read(&mut b).is_empty());
        bus.set_link_up(true);
        bus.inject(NodeId::B, b"noise\n");
        assert_eq!(read(&mut b), b"noise\n");
    }
}
