//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "binary"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Serial port adapters for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Serial adapters for the bus and host links.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rbus_common::{BusConfig, HostConfig};
use rbus_node::{Actuators, DirectionControl, LinkError, LinkResult, SerialLink};
use rbus_proto::Led;
use serialport::SerialPort;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::info;

const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Data side of a serial port: the RS485 adapter or a host UART.
pub struct PortLink {
    link: &'static str,
    port: Box<dyn SerialPort>,
}

/// Transceiver enables driven from the adapter's RTS line. `/RE` is wired
/// to the inverse of `DE` on these adapters, so only the driver is switched.
pub struct RtsDirection {
    port: Box<dyn SerialPort>,
}

/// Open the bus adapter named in `config`, or `port_override` when given.
pub fn open_bus(config: &BusConfig, port_override: Option<&str>) -> Result<(PortLink, RtsDirection)> {
    let name = port_override
        .map(str::to_owned)
        .or_else(|| config.port.clone())
        .ok_or_else(|| anyhow!("no bus port configured; set bus.port or pass --port"))?;
    let port = serialport::new(&name, config.baud)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("failed to open bus port {name} @ {} baud", config.baud))?;
    let control = port
        .try_clone()
        .with_context(|| format!("failed to clone handle for {name}"))?;
    info!(port = %name, baud = config.baud, "bus port opened");
    Ok((
        PortLink { link: "bus", port },
        RtsDirection { port: control },
    ))
}

/// Host link named in `config`; stdin/stdout when no port is set.
pub fn open_host(config: &HostConfig) -> Result<HostLink> {
    let Some(name) = &config.port else {
        return Ok(HostLink::Stdio(StdioHost::spawn()));
    };
    let port = serialport::new(name, config.baud)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("failed to open host port {name} @ {} baud", config.baud))?;
    info!(port = %name, baud = config.baud, "host port opened");
    Ok(HostLink::Serial(PortLink { link: "host", port }))
}

impl SerialLink for PortLink {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let link = self.link;
        self.port
            .write_all(bytes)
            .map_err(|err| LinkError::io(link, err))
    }

    fn flush(&mut self) -> LinkResult<()> {
        let link = self.link;
        self.port.flush().map_err(|err| LinkError::io(link, err))
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        let link = self.link;
        let available = self
            .port
            .bytes_to_read()
            .map_err(|err| LinkError::io(link, err.into()))?;
        if available == 0 {
            return Ok(0);
        }
        let mut chunk = vec![0u8; available as usize];
        let count = self
            .port
            .read(&mut chunk)
            .map_err(|err| LinkError::io(link, err))?;
        buf.extend_from_slice(&chunk[..count]);
        Ok(count)
    }
}

impl DirectionControl for RtsDirection {
    fn set_driver_enabled(&mut self, enabled: bool) -> LinkResult<()> {
        self.port
            .write_request_to_send(enabled)
            .map_err(|err| LinkError::Direction(err.to_string()))
    }

    fn set_receiver_enabled(&mut self, _enabled: bool) -> LinkResult<()> {
        Ok(())
    }
}

/// Host link over the daemon's stdin/stdout.
pub struct StdioHost {
    lines: UnboundedReceiver<Vec<u8>>,
    closed: bool,
}

impl StdioHost {
    /// Start a reader thread feeding stdin into the node.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.as_bytes().to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            lines: rx,
            closed: false,
        }
    }
}

impl SerialLink for StdioHost {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(bytes)
            .and_then(|()| stdout.flush())
            .map_err(|err| LinkError::io("host", err))
    }

    fn flush(&mut self) -> LinkResult<()> {
        std::io::stdout()
            .flush()
            .map_err(|err| LinkError::io("host", err))
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        let mut count = 0;
        loop {
            match self.lines.try_recv() {
                Ok(bytes) => {
                    count += bytes.len();
                    buf.extend_from_slice(&bytes);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        self.closed = true;
                        info!("host input closed; continuing without host commands");
                    }
                    break;
                }
            }
        }
        Ok(count)
    }
}

/// Host side of a node: the daemon's stdio or a dedicated serial port.
pub enum HostLink {
    Stdio(StdioHost),
    Serial(PortLink),
}

impl SerialLink for HostLink {
    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        match self {
            HostLink::Stdio(link) => link.write_all(bytes),
            HostLink::Serial(link) => link.write_all(bytes),
        }
    }

    fn flush(&mut self) -> LinkResult<()> {
        match self {
            HostLink::Stdio(link) => link.flush(),
            HostLink::Serial(link) => link.flush(),
        }
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> LinkResult<usize> {
        match self {
            HostLink::Stdio(link) => link.read_available(buf),
            HostLink::Serial(link) => link.read_available(buf),
        }
    }
}

/// LEDs of a PC-hosted node: actuations are logged.
#[derive(Debug, Default)]
pub struct LoggedLeds;

impl Actuators for LoggedLeds {
    fn set_led(&mut self, led: Led, on: bool) -> LinkResult<()> {
        info!(led = %led, on, "led actuated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_opens_at_the_configured_baud() {
        let config = HostConfig {
            port: Some("/nonexistent/rbus-host".into()),
            baud: 57_600,
        };
        let err = match open_host(&config) {
            Ok(_) => panic!("a missing device cannot open"),
            Err(err) => err,
        };
        let message = format!("{err:#}");
        assert!(message.contains("/nonexistent/rbus-host @ 57600 baud"), "{message}");
    }
}
