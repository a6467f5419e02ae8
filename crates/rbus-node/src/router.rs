//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use rbus_common::NodeId;
use rbus_proto::{BusFrame, HostCommand, LedCommand, RoleDirective};

/// Where a classified command goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Role directive for the arbiter.
    Role(RoleDirective),
    /// Apply on this node's LEDs and acknowledge to the host.
    Local(Vec<LedCommand>),
    /// Send to the peer, fire-and-forget.
    Forward(BusFrame),
    /// Addressed elsewhere or carrying nothing actionable.
    Ignore,
}

/// Decides whether a command is executed here or on the peer.
#[derive(Debug, Clone, Copy)]
pub struct CommandRouter {
    local: NodeId,
}

impl CommandRouter {
    pub fn new(local: NodeId) -> Self {
        Self { local }
    }

    fn is_local(&self, target: Option<NodeId>) -> bool {
        target.map_or(true, |node| node == self.local)
    }

    /// Route a command received from the host.
    pub fn route_host(&self, command: HostCommand) -> Route {
        match command {
            HostCommand::Role(directive) => Route::Role(directive),
            HostCommand::Led { target, command } if self.is_local(target) => {
                Route::Local(vec![command])
            }
            HostCommand::Led { command, .. } => Route::Forward(BusFrame::Led(command)),
            HostCommand::Json { target, leds, .. } if self.is_local(target) => local(leds),
            HostCommand::Json { raw, .. } => Route::Forward(BusFrame::Command(raw)),
        }
    }

    /// Route an actuation frame received from the peer. Nothing received from
    /// the bus is ever forwarded back onto it.
    pub fn route_peer(&self, frame: &BusFrame) -> Route {
        match frame {
            BusFrame::Led(command) => Route::Local(vec![*command]),
            BusFrame::Command(json) => match HostCommand::parse(json) {
                Some(HostCommand::Json { target, leds, .. }) if self.is_local(target) => {
                    local(leds)
                }
                _ => Route::Ignore,
            },
            _ => Route::Ignore,
        }
    }
}

fn local(leds: Vec<LedCommand>) -> Route {
    if leds.is_empty() {
        Route::Ignore
    } else {
        Route::Local(leds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbus_proto::Led;

    fn route(line: &str) -> Route {
        let command = HostCommand::parse(line).expect("command parses");
        CommandRouter::new(NodeId::A).route_host(command)
    }

    #[test]
    fn untargeted_json_is_local() {
        assert_eq!(
            route(r#"{"led_rojo":true}"#),
            Route::Local(vec![LedCommand::new(Led::Rojo, true)])
        );
    }

    #[test]
    fn json_for_the_peer_is_forwarded_verbatim() {
        let raw = r#"{"target":"B","led_rojo":true}"#;
        assert_eq!(route(raw), Route::Forward(BusFrame::Command(raw.to_owned())));
    }

    #[test]
    fn json_addressed_to_self_is_local() {
        assert_eq!(
            route(r#"{"target":"A","led_verde":false}"#),
            Route::Local(vec![LedCommand::new(Led::Verde, false)])
        );
        assert_eq!(route(r#"{"target":"A"}"#), Route::Ignore);
    }

    #[test]
    fn textual_led_commands_route_by_id() {
        assert_eq!(
            route("esp1_led_amarillo:true"),
            Route::Local(vec![LedCommand::new(Led::Amarillo, true)])
        );
        assert_eq!(
            route("b_led_rojo:false"),
            Route::Forward(BusFrame::Led(LedCommand::new(Led::Rojo, false)))
        );
    }

    #[test]
    fn role_commands_go_to_the_arbiter() {
        assert_eq!(route("SET_SLAVE"), Route::Role(RoleDirective::SetSlave));
    }

    #[test]
    fn peer_frames_apply_locally_or_are_ignored() {
        let router = CommandRouter::new(NodeId::B);
        assert_eq!(
            router.route_peer(&BusFrame::Command(r#"{"target":"B","led_rojo":true}"#.into())),
            Route::Local(vec![LedCommand::new(Led::Rojo, true)])
        );
        assert_eq!(
            router.route_peer(&BusFrame::Command(r#"{"target":"A","led_rojo":true}"#.into())),
            Route::Ignore
        );
        assert_eq!(
            router.route_peer(&BusFrame::Led(LedCommand::new(Led::Verde, true))),
            Route::Local(vec![LedCommand::new(Led::Verde, true)])
        );
        assert_eq!(router.route_peer(&BusFrame::DataRequest), Route::Ignore);
    }
}
