//! ---
//! rbus_section: "05-host-interfaces"
//! rbus_subsection: "binary"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Host-side control utility for R-BUS nodes."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rbus_common::{HostConfig, NodeConfig, NodeId};
use rbus_logging as logging;
use rbus_proto::numeric::parse_bool;
use rbus_proto::{HostCommand, Led, LedCommand, RoleDirective};
use serialport::SerialPort;
use tracing::info;

mod monitor;

const DEFAULT_CONFIG: &str = "configs/node.toml";

#[derive(Debug, Parser)]
#[command(author, version, about = "R-BUS host control utility", long_about = None)]
struct Cli {
    #[arg(long, env = "RBUS_HOST_PORT", value_name = "DEVICE", help = "Serial device of the node's host link")]
    port: String,

    #[arg(long, help = "Host link baud rate [default: host.baud from the node config]")]
    baud: Option<u32>,

    #[arg(long, value_name = "FILE", help = "Node configuration file to take the host baud rate from")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CommandForm {
    /// `{"led_rojo":true}` / `{"target":"B","led_rojo":true}`
    Json,
    /// `led_rojo:true` / `b_led_rojo:true`
    Text,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print telemetry reports and acknowledgments from the node")]
    Monitor {
        #[arg(long, help = "Print raw JSON report lines")]
        json: bool,

        #[arg(long, help = "Stop after this many reports")]
        count: Option<u64>,
    },
    #[command(about = "Make the node active (the peer is told to go passive)")]
    SetMaster,
    #[command(about = "Make the node passive (the peer is told to go active)")]
    SetSlave,
    #[command(about = "Switch an LED on the node or its peer")]
    Led {
        #[arg(value_parser = parse_led, help = "verde | rojo | amarillo")]
        led: Led,

        #[arg(value_parser = parse_state, action = clap::ArgAction::Set, help = "on/off, true/false or 1/0")]
        state: bool,

        #[arg(long, value_parser = parse_node, help = "Node that should switch the LED (A/B, ESP1/ESP2)")]
        target: Option<NodeId>,

        #[arg(long, value_enum, default_value_t = CommandForm::Json)]
        form: CommandForm,
    },
}

fn parse_led(value: &str) -> Result<Led, String> {
    value
        .parse::<Led>()
        .map_err(|_| format!("unknown LED {value:?}"))
}

fn parse_state(value: &str) -> Result<bool, String> {
    parse_bool(value).ok_or_else(|| format!("invalid LED state {value:?}"))
}

fn parse_node(value: &str) -> Result<NodeId, String> {
    value
        .parse::<NodeId>()
        .map_err(|_| format!("unknown node {value:?}"))
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let baud = host_baud(cli.baud, cli.config.as_deref())?;
    let mut port = open(&cli.port, baud)?;
    match cli.command {
        Commands::Monitor { json, count } => monitor::run(port.as_mut(), json, count)?,
        Commands::SetMaster => send(port.as_mut(), &HostCommand::Role(RoleDirective::SetMaster))?,
        Commands::SetSlave => send(port.as_mut(), &HostCommand::Role(RoleDirective::SetSlave))?,
        Commands::Led {
            led,
            state,
            target,
            form,
        } => {
            let command = led_command(LedCommand::new(led, state), target, form)?;
            send(port.as_mut(), &command)?;
        }
    }
    Ok(())
}

fn led_command(command: LedCommand, target: Option<NodeId>, form: CommandForm) -> Result<HostCommand> {
    match form {
        CommandForm::Json => Ok(HostCommand::json(target, &[command])?),
        CommandForm::Text => Ok(HostCommand::Led { target, command }),
    }
}

/// Both ends of the host link share `host.baud`. An explicit `--baud` wins;
/// without any configuration file the node default applies.
fn host_baud(baud: Option<u32>, config: Option<&Path>) -> Result<u32> {
    if let Some(baud) = baud {
        return Ok(baud);
    }
    let explicit = config.is_some() || std::env::var_os(NodeConfig::ENV_CONFIG_PATH).is_some();
    let mut candidates = Vec::new();
    if let Some(path) = config {
        candidates.push(path.to_path_buf());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG));
    if !explicit && !candidates.iter().any(|path| path.exists()) {
        return Ok(HostConfig::default().baud);
    }
    Ok(NodeConfig::load(&candidates)?.host.baud)
}

fn open(name: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .with_context(|| format!("failed to open host port {name} @ {baud} baud"))
}

fn send(port: &mut dyn SerialPort, command: &HostCommand) -> Result<()> {
    let line = command.encode();
    if line.contains('\n') {
        return Err(anyhow!("command must fit on one line"));
    }
    port.write_all(line.as_bytes())?;
    port.write_all(b"\n")?;
    port.flush()?;
    info!(line = %line, "command sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_commands_use_the_requested_form() {
        let command = LedCommand::new(Led::Rojo, true);
        assert_eq!(
            led_command(command, Some(NodeId::B), CommandForm::Json)
                .expect("json")
                .encode(),
            r#"{"led_rojo":true,"target":"B"}"#
        );
        assert_eq!(
            led_command(command, None, CommandForm::Text)
                .expect("text")
                .encode(),
            "led_rojo:true"
        );
        assert_eq!(
            led_command(command, Some(NodeId::B), CommandForm::Text)
                .expect("text")
                .encode(),
            "b_led_rojo:true"
        );
    }

    #[test]
    fn host_baud_follows_the_node_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "[host]\nbaud = 57600\n").expect("write");

        assert_eq!(host_baud(None, Some(&path)).expect("baud"), 57_600);
        assert_eq!(host_baud(Some(9_600), Some(&path)).expect("baud"), 9_600);

        std::fs::write(&path, "[host]\nbaud = \"fast\"\n").expect("write");
        assert!(host_baud(None, Some(&path)).is_err());
    }

    #[test]
    fn cli_parses_led_arguments() {
        let cli = Cli::try_parse_from([
            "rbusctl", "--port", "/dev/null", "led", "amarillo", "on", "--target", "esp2",
        ])
        .expect("parses");
        match cli.command {
            Commands::Led {
                led, state, target, ..
            } => {
                assert_eq!(led, Led::Amarillo);
                assert!(state);
                assert_eq!(target, Some(NodeId::B));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
