//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Lines exchanged between a node and its host.

use rbus_common::{NodeId, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bus::RoleDirective;
use crate::led::{Led, LedCommand};
use crate::numeric::parse_bool;
use crate::reading::SensorVolts;
use crate::Result;

const ACK_PREFIX: &str = "ACK:LED:";
const TARGET_KEY: &str = "target";
const LED_KEY_PREFIX: &str = "led_";
const ADDRESSED_LED_INFIX: &str = "_led_";

/// Command received from the host, classified once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `SET_MASTER` / `SET_SLAVE` addressed to this node.
    Role(RoleDirective),
    /// Textual LED form: `led_<name>:<bool>` (no target) or
    /// `<node>_led_<name>:<bool>`.
    Led {
        /// Addressed node, if any.
        target: Option<NodeId>,
        /// Requested LED state.
        command: LedCommand,
    },
    /// JSON object form, e.g. `{"led_rojo":true}` or
    /// `{"target":"B","led_rojo":true}`.
    Json {
        /// Value of the `target` field, if present.
        target: Option<NodeId>,
        /// LED keys found in the object.
        leds: Vec<LedCommand>,
        /// The line as received, forwarded verbatim when addressed to the peer.
        raw: String,
    },
}

impl HostCommand {
    /// Classify a host line. Unrecognised input yields `None`.
    pub fn parse(line: &str) -> Option<HostCommand> {
        let line = line.trim();
        if let Some(directive) = RoleDirective::parse(line) {
            return Some(HostCommand::Role(directive));
        }
        if line.starts_with('{') {
            return parse_json(line);
        }
        parse_textual_led(line)
    }

    /// Encode for transmission to a node (used by host-side tools).
    pub fn encode(&self) -> String {
        match self {
            HostCommand::Role(directive) => directive.as_str().to_owned(),
            HostCommand::Led {
                target: None,
                command,
            } => format!("{}{}", LED_KEY_PREFIX, command.encode_body()),
            HostCommand::Led {
                target: Some(node),
                command,
            } => format!(
                "{}{}{}",
                node.as_str().to_ascii_lowercase(),
                ADDRESSED_LED_INFIX,
                command.encode_body()
            ),
            HostCommand::Json { raw, .. } => raw.clone(),
        }
    }

    /// Build a JSON command for `target` switching the given LEDs.
    pub fn json(target: Option<NodeId>, leds: &[LedCommand]) -> Result<HostCommand> {
        let mut object = Map::new();
        if let Some(node) = target {
            object.insert(TARGET_KEY.to_owned(), Value::from(node.to_string()));
        }
        for command in leds {
            object.insert(command.led.json_key(), Value::from(command.on));
        }
        let raw = serde_json::to_string(&object)?;
        Ok(HostCommand::Json {
            target,
            leds: leds.to_vec(),
            raw,
        })
    }
}

fn parse_json(line: &str) -> Option<HostCommand> {
    let object: Map<String, Value> = serde_json::from_str(line).ok()?;
    let target = match object.get(TARGET_KEY) {
        None => None,
        Some(value) => Some(value.as_str()?.parse::<NodeId>().ok()?),
    };
    let leds: Vec<LedCommand> = object
        .iter()
        .filter_map(|(key, value)| {
            let led = key.strip_prefix(LED_KEY_PREFIX)?.parse::<Led>().ok()?;
            let on = match value {
                Value::Bool(flag) => *flag,
                Value::Number(number) => number.as_i64()? != 0,
                Value::String(text) => parse_bool(text)?,
                _ => return None,
            };
            Some(LedCommand::new(led, on))
        })
        .collect();
    if target.is_none() && leds.is_empty() {
        return None;
    }
    Some(HostCommand::Json {
        target,
        leds,
        raw: line.to_owned(),
    })
}

fn parse_textual_led(line: &str) -> Option<HostCommand> {
    let (selector, state) = line.split_once(':')?;
    let selector = selector.trim();
    let (target, name) = match selector.strip_prefix(LED_KEY_PREFIX) {
        Some(name) => (None, name),
        None => {
            let (node, name) = selector.split_once(ADDRESSED_LED_INFIX)?;
            (Some(node.parse::<NodeId>().ok()?), name)
        }
    };
    let led = name.parse::<Led>().ok()?;
    let on = parse_bool(state)?;
    Some(HostCommand::Led {
        target,
        command: LedCommand::new(led, on),
    })
}

/// Telemetry report emitted by the active node once per cycle.
///
/// Serialises to exactly
/// `{"device":..,"role":"MAESTRO","timestamp":..,"local":{..},"remote":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    /// Reporting node.
    pub device: NodeId,
    /// Reporting node's role, in host spelling.
    #[serde(with = "wire_role")]
    pub role: Role,
    /// Device clock in milliseconds.
    pub timestamp: u64,
    /// This node's sensors.
    pub local: SensorVolts,
    /// Peer sensors, or zeros when the peer snapshot is stale.
    pub remote: SensorVolts,
}

impl HostReport {
    /// Serialise to one JSON line without delimiter.
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a report line; anything else yields `None`.
    pub fn parse(line: &str) -> Option<HostReport> {
        let line = line.trim();
        if !(line.starts_with('{') && line.ends_with('}')) {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

mod wire_role {
    use rbus_common::Role;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(role: &Role, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(role.wire_name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Role, D::Error> {
        let name = String::deserialize(deserializer)?;
        Role::from_wire_name(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown role {name}")))
    }
}

/// Acknowledgment line sent to the host after a local actuation.
pub fn encode_ack(command: &LedCommand) -> String {
    format!("{}{}", ACK_PREFIX, command.encode_body())
}

/// A line as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostLine {
    /// Telemetry report.
    Report(HostReport),
    /// Actuation acknowledgment.
    Ack(LedCommand),
    /// Anything else the node printed.
    Diagnostic(String),
}

impl HostLine {
    /// Classify a line read from a node.
    pub fn classify(line: &str) -> HostLine {
        if let Some(report) = HostReport::parse(line) {
            return HostLine::Report(report);
        }
        if let Some(command) = line
            .trim()
            .strip_prefix(ACK_PREFIX)
            .and_then(LedCommand::decode_body)
        {
            return HostLine::Ack(command);
        }
        HostLine::Diagnostic(line.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_commands_parse() {
        assert_eq!(
            HostCommand::parse("SET_MASTER"),
            Some(HostCommand::Role(RoleDirective::SetMaster))
        );
        assert_eq!(
            HostCommand::parse(" SET_SLAVE "),
            Some(HostCommand::Role(RoleDirective::SetSlave))
        );
    }

    #[test]
    fn json_led_command_without_target_is_local() {
        let command = HostCommand::parse(r#"{"led_rojo":true}"#).expect("parses");
        assert_eq!(
            command,
            HostCommand::Json {
                target: None,
                leds: vec![LedCommand::new(Led::Rojo, true)],
                raw: r#"{"led_rojo":true}"#.to_owned(),
            }
        );
    }

    #[test]
    fn json_command_keeps_raw_text_and_target() {
        let raw = r#"{"target":"B","led_rojo":true}"#;
        match HostCommand::parse(raw) {
            Some(HostCommand::Json {
                target,
                leds,
                raw: kept,
            }) => {
                assert_eq!(target, Some(NodeId::B));
                assert_eq!(leds, vec![LedCommand::new(Led::Rojo, true)]);
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unusable_json_is_ignored() {
        assert_eq!(HostCommand::parse(r#"{"foo":1}"#), None);
        assert_eq!(HostCommand::parse(r#"{"target":"Z","led_rojo":true}"#), None);
        assert_eq!(HostCommand::parse(r#"{"led_rojo":true"#), None);
        assert_eq!(HostCommand::parse("[1,2,3]"), None);
    }

    #[test]
    fn textual_led_forms_parse() {
        assert_eq!(
            HostCommand::parse("led_verde:true"),
            Some(HostCommand::Led {
                target: None,
                command: LedCommand::new(Led::Verde, true),
            })
        );
        assert_eq!(
            HostCommand::parse("esp2_led_amarillo:false"),
            Some(HostCommand::Led {
                target: Some(NodeId::B),
                command: LedCommand::new(Led::Amarillo, false),
            })
        );
        assert_eq!(HostCommand::parse("esp3_led_rojo:true"), None);
        assert_eq!(HostCommand::parse("led_rojo:perhaps"), None);
        assert_eq!(HostCommand::parse("garbage"), None);
    }

    #[test]
    fn encoded_commands_parse_back() {
        let commands = [
            HostCommand::Role(RoleDirective::SetSlave),
            HostCommand::Led {
                target: None,
                command: LedCommand::new(Led::Rojo, false),
            },
            HostCommand::Led {
                target: Some(NodeId::A),
                command: LedCommand::new(Led::Verde, true),
            },
            HostCommand::json(Some(NodeId::B), &[LedCommand::new(Led::Amarillo, true)])
                .expect("json command"),
        ];
        for command in commands {
            assert_eq!(HostCommand::parse(&command.encode()), Some(command));
        }
    }

    #[test]
    fn report_serialises_in_host_field_order() {
        let report = HostReport {
            device: NodeId::A,
            role: Role::Active,
            timestamp: 1234,
            local: SensorVolts {
                pot: 2.5,
                ldr: 1.0,
                enc: 0.5,
                ax: 0.0,
            },
            remote: SensorVolts::ZERO,
        };
        let line = report.to_line().expect("serialises");
        assert_eq!(
            line,
            r#"{"device":"A","role":"MAESTRO","timestamp":1234,"local":{"pot":2.5,"ldr":1.0,"enc":0.5,"ax":0.0},"remote":{"pot":0.0,"ldr":0.0,"enc":0.0,"ax":0.0}}"#
        );
        assert_eq!(HostReport::parse(&line), Some(report));
    }

    #[test]
    fn host_lines_are_classified() {
        assert_eq!(
            HostLine::classify("ACK:LED:rojo:true"),
            HostLine::Ack(LedCommand::new(Led::Rojo, true))
        );
        assert_eq!(
            HostLine::classify("booting"),
            HostLine::Diagnostic("booting".to_owned())
        );
        assert!(matches!(
            HostLine::classify(
                r#"{"device":"B","role":"MAESTRO","timestamp":1,"local":{"pot":0.0,"ldr":0.0,"enc":0.0,"ax":0.0},"remote":{"pot":0.0,"ldr":0.0,"enc":0.0,"ax":0.0}}"#
            ),
            HostLine::Report(_)
        ));
        assert_eq!(encode_ack(&LedCommand::new(Led::Verde, false)), "ACK:LED:verde:false");
    }
}
