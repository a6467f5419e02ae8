//! ---
//! rbus_section: "01-core-functionality"
//! rbus_subsection: "binary"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "In-process simulation of a node pair with scheduled host input."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rbus_common::{NodeId, PairConfig};
use rbus_sim::{SimulatedPair, POLL_INTERVAL_MS};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Host line typed into one node at a given simulated instant:
/// `<ms>:<node>:<line>`, e.g. `500:A:SET_SLAVE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub at_ms: u64,
    pub node: NodeId,
    pub line: String,
}

impl FromStr for ScheduledCommand {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, ':');
        let (Some(at), Some(node), Some(line)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("expected <ms>:<node>:<line>, got {value:?}"));
        };
        let at_ms = at
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid time {at:?}"))?;
        let node = node
            .trim()
            .parse::<NodeId>()
            .map_err(|_| anyhow!("unknown node {node:?}"))?;
        Ok(Self {
            at_ms,
            node,
            line: line.to_owned(),
        })
    }
}

/// Run the pair for `duration_ms` of simulated time, echoing every host line
/// as `<node> <line>` on stdout.
pub async fn run(
    pair_config: &PairConfig,
    duration_ms: u64,
    mut schedule: Vec<ScheduledCommand>,
    realtime: bool,
) -> Result<SimulatedPair> {
    let mut pair = SimulatedPair::new(pair_config)?;
    schedule.sort_by_key(|command| command.at_ms);
    let mut schedule = schedule.into_iter().peekable();
    let mut pacing = interval(Duration::from_millis(POLL_INTERVAL_MS));
    pacing.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(duration_ms, realtime, "simulation started");
    while pair.now_ms() < duration_ms {
        while let Some(command) = schedule.next_if(|command| command.at_ms <= pair.now_ms()) {
            info!(node = %command.node, line = %command.line, "host command");
            pair.host(command.node).send(&command.line);
        }
        if realtime {
            pacing.tick().await;
        }
        pair.step();
        for node in [NodeId::A, NodeId::B] {
            for line in pair.host(node).take_lines() {
                println!("{node} {line}");
            }
        }
    }
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_commands_keep_colons_in_the_line() {
        let command: ScheduledCommand = "250:B:led_rojo:true".parse().expect("parses");
        assert_eq!(
            command,
            ScheduledCommand {
                at_ms: 250,
                node: NodeId::B,
                line: "led_rojo:true".into(),
            }
        );
        assert!("SET_SLAVE".parse::<ScheduledCommand>().is_err());
        assert!("x:A:SET_SLAVE".parse::<ScheduledCommand>().is_err());
        assert!("10:C:SET_SLAVE".parse::<ScheduledCommand>().is_err());
    }

    #[tokio::test]
    async fn scheduled_role_change_moves_telemetry() {
        let schedule = vec!["300:A:SET_SLAVE".parse().expect("command")];
        let pair = run(&PairConfig::default(), 800, schedule, false)
            .await
            .expect("simulation");
        assert_eq!(pair.node(NodeId::B).role(), rbus_common::Role::Active);
        assert_eq!(pair.node(NodeId::A).role(), rbus_common::Role::Passive);
    }
}
