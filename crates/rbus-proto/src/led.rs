//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::numeric::parse_bool;

/// The three indicator LEDs fitted to each node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Led {
    /// Green.
    Verde,
    /// Red.
    Rojo,
    /// Yellow.
    Amarillo,
}

impl Led {
    /// Host JSON key controlling this LED, e.g. `led_rojo`.
    pub fn json_key(self) -> String {
        format!("led_{}", self)
    }
}

/// Request to switch one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    /// Target LED.
    pub led: Led,
    /// Desired state.
    pub on: bool,
}

impl LedCommand {
    /// Construct a command.
    pub fn new(led: Led, on: bool) -> Self {
        Self { led, on }
    }

    /// `<name>:<true|false>`, the body shared by the `LED:` and `ACK:LED:` lines.
    pub fn encode_body(&self) -> String {
        format!("{}:{}", self.led, self.on)
    }

    /// Parse `<name>:<bool>`.
    pub fn decode_body(body: &str) -> Option<Self> {
        let (name, state) = body.split_once(':')?;
        let led = name.trim().parse::<Led>().ok()?;
        let on = parse_bool(state)?;
        Some(Self { led, on })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_names_are_lowercase_on_the_wire() {
        assert_eq!(Led::Amarillo.to_string(), "amarillo");
        assert_eq!("ROJO".parse::<Led>().unwrap(), Led::Rojo);
        assert_eq!(Led::Verde.json_key(), "led_verde");
    }

    #[test]
    fn body_parsing_rejects_unknown_leds_and_states() {
        assert_eq!(
            LedCommand::decode_body("rojo:true"),
            Some(LedCommand::new(Led::Rojo, true))
        );
        assert_eq!(LedCommand::decode_body("azul:true"), None);
        assert_eq!(LedCommand::decode_body("rojo:maybe"), None);
        assert_eq!(LedCommand::decode_body("rojo"), None);
    }
}
