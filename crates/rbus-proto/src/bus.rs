//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Frames exchanged between the two nodes over the RS485 bus.

use rbus_common::Role;

use crate::led::LedCommand;
use crate::numeric::parse_adc;
use crate::reading::SensorReading;
use crate::{CodecError, Result, LINE_CAPACITY};

const DATA_REQUEST: &str = "GET_SENSORS";
const SENSOR_PREFIX: &str = "SENS:";
const ROLE_PREFIX: &str = "ROLE:";
const LED_PREFIX: &str = "LED:";
const COMMAND_PREFIX: &str = "CMD:";

/// Role directive, shared by the host link and the `ROLE:` bus frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDirective {
    /// `SET_MASTER`: the receiver becomes active.
    SetMaster,
    /// `SET_SLAVE`: the receiver becomes passive.
    SetSlave,
}

impl RoleDirective {
    /// Directive that puts its receiver into `role`.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Active => RoleDirective::SetMaster,
            Role::Passive => RoleDirective::SetSlave,
        }
    }

    /// Role the receiver of this directive takes.
    pub fn target_role(self) -> Role {
        match self {
            RoleDirective::SetMaster => Role::Active,
            RoleDirective::SetSlave => Role::Passive,
        }
    }

    /// Wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            RoleDirective::SetMaster => "SET_MASTER",
            RoleDirective::SetSlave => "SET_SLAVE",
        }
    }

    /// Parse the wire token.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "SET_MASTER" => Some(RoleDirective::SetMaster),
            "SET_SLAVE" => Some(RoleDirective::SetSlave),
            _ => None,
        }
    }
}

/// A single bus frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusFrame {
    /// `GET_SENSORS`: the active node asks for the passive node's sensors.
    DataRequest,
    /// `SENS:<pot>,<ldr>,<enc>`: reply carrying raw ADC counts.
    SensorData(SensorReading),
    /// `ROLE:<directive>`: role change pushed to the peer.
    Role(RoleDirective),
    /// `LED:<name>:<bool>`: actuation forwarded to the peer.
    Led(LedCommand),
    /// `CMD:<json>`: host JSON command forwarded verbatim to the peer.
    Command(String),
}

impl BusFrame {
    /// Short frame kind used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            BusFrame::DataRequest => "data_request",
            BusFrame::SensorData(_) => "sensor_data",
            BusFrame::Role(_) => "role",
            BusFrame::Led(_) => "led",
            BusFrame::Command(_) => "command",
        }
    }

    /// Encode to a line without its delimiter. Frames that would not fit
    /// the receiver's line buffer are rejected, as are sensor replies with
    /// every field missing, since `decode` drops those.
    pub fn encode(&self) -> Result<String> {
        let line = match self {
            BusFrame::DataRequest => DATA_REQUEST.to_owned(),
            BusFrame::SensorData(reading) if reading.is_empty() => {
                return Err(CodecError::EmptyReading)
            }
            BusFrame::SensorData(reading) => format!(
                "{}{},{},{}",
                SENSOR_PREFIX,
                field(reading.pot),
                field(reading.ldr),
                field(reading.enc)
            ),
            BusFrame::Role(directive) => format!("{}{}", ROLE_PREFIX, directive.as_str()),
            BusFrame::Led(command) => format!("{}{}", LED_PREFIX, command.encode_body()),
            BusFrame::Command(json) => format!("{}{}", COMMAND_PREFIX, json),
        };
        if line.len() > LINE_CAPACITY {
            return Err(CodecError::Oversize {
                kind: self.kind(),
                len: line.len(),
                capacity: LINE_CAPACITY,
            });
        }
        Ok(line)
    }

    /// Encode including the trailing `\n`.
    pub fn encode_line(&self) -> Result<String> {
        let mut line = self.encode()?;
        line.push('\n');
        Ok(line)
    }

    /// Classify a received line. Unknown or malformed lines yield `None`.
    pub fn decode(line: &str) -> Option<BusFrame> {
        let line = line.trim();
        if line == DATA_REQUEST {
            return Some(BusFrame::DataRequest);
        }
        if let Some(body) = line.strip_prefix(SENSOR_PREFIX) {
            return decode_reading(body).map(BusFrame::SensorData);
        }
        if let Some(body) = line.strip_prefix(ROLE_PREFIX) {
            return RoleDirective::parse(body).map(BusFrame::Role);
        }
        if let Some(body) = line.strip_prefix(LED_PREFIX) {
            return LedCommand::decode_body(body).map(BusFrame::Led);
        }
        if let Some(body) = line.strip_prefix(COMMAND_PREFIX) {
            let body = body.trim();
            let is_object = serde_json::from_str::<serde_json::Value>(body)
                .map(|value| value.is_object())
                .unwrap_or(false);
            return is_object.then(|| BusFrame::Command(body.to_owned()));
        }
        None
    }
}

fn field(value: Option<u16>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn decode_reading(body: &str) -> Option<SensorReading> {
    let mut parts = body.split(',');
    let pot = parts.next()?;
    let ldr = parts.next()?;
    let enc = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let reading = SensorReading {
        pot: parse_adc(pot),
        ldr: parse_adc(ldr),
        enc: parse_adc(enc),
    };
    (!reading.is_empty()).then_some(reading)
}
