//! ---
//! rbus_section: "07-testing"
//! rbus_subsection: "integration-tests"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "End-to-end scenarios for a node pair on a simulated bus."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use anyhow::Result;
use rbus_common::{NodeId, PairConfig, Role};
use rbus_node::LinkCounters;
use rbus_proto::{HostLine, Led, LedCommand, SensorReading, SensorVolts};
use rbus_sim::{SimulatedPair, POLL_INTERVAL_MS};

const A_READING: SensorReading = SensorReading {
    pot: Some(3102),
    ldr: Some(1241),
    enc: Some(620),
};
const B_READING: SensorReading = SensorReading {
    pot: Some(1500),
    ldr: Some(2000),
    enc: Some(2500),
};

fn reference_pair() -> Result<SimulatedPair> {
    SimulatedPair::with_readings(&PairConfig::default(), A_READING, B_READING)
}

fn counters(pair: &SimulatedPair, node: NodeId) -> LinkCounters {
    pair.node(node).metrics().counters()
}

fn acks(pair: &SimulatedPair, node: NodeId) -> Vec<LedCommand> {
    pair.host(node)
        .take_classified()
        .into_iter()
        .filter_map(|line| match line {
            HostLine::Ack(command) => Some(command),
            _ => None,
        })
        .collect()
}

fn active_count(pair: &SimulatedPair) -> usize {
    [NodeId::A, NodeId::B]
        .into_iter()
        .filter(|node| pair.node(*node).role() == Role::Active)
        .count()
}

#[test]
fn active_node_reports_both_boards() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(300);

    let last = pair.host(NodeId::A).take_reports().pop().expect("report");
    assert_eq!(last.device, NodeId::A);
    assert_eq!(last.role, Role::Active);
    assert!((last.local.pot - 2.50).abs() < 0.01);
    assert!((last.remote.pot - 1.209).abs() < 0.001);
    assert!((last.remote.ldr - 1.612).abs() < 0.001);
    assert!((last.remote.enc - 2.015).abs() < 0.001);
    assert_eq!(last.remote.ax, 0.0);
    assert!(last.timestamp <= pair.now_ms());
    Ok(())
}

#[test]
fn set_slave_moves_telemetry_to_the_peer() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(200);
    assert_eq!(active_count(&pair), 1);

    pair.host(NodeId::A).send("SET_SLAVE");
    pair.run_for(100);
    assert_eq!(pair.node(NodeId::A).role(), Role::Passive);
    assert_eq!(pair.node(NodeId::B).role(), Role::Active);
    assert_eq!(active_count(&pair), 1);

    pair.host(NodeId::A).take_lines();
    pair.host(NodeId::B).take_lines();
    pair.run_for(400);
    assert!(pair.host(NodeId::A).take_reports().is_empty());
    let reports = pair.host(NodeId::B).take_reports();
    assert!(reports.len() >= 7);
    let last = reports.last().expect("report");
    assert_eq!(last.device, NodeId::B);
    assert_eq!(last.role, Role::Active);
    assert!((last.remote.pot - 2.50).abs() < 0.01);
    assert_eq!(counters(&pair, NodeId::A).role_transitions, 1);
    assert_eq!(counters(&pair, NodeId::B).role_transitions, 1);
    Ok(())
}

#[test]
fn passive_node_only_answers() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(1000);

    let passive = counters(&pair, NodeId::B);
    assert_eq!(passive.telemetry_requests, 0);
    assert_eq!(passive.host_reports, 0);
    assert!(passive.frames_sent > 0);
    assert!(passive.frames_sent <= counters(&pair, NodeId::A).telemetry_requests);
    assert!(pair.host(NodeId::B).take_reports().is_empty());
    assert_eq!(counters(&pair, NodeId::A).role_conflicts, 0);
    Ok(())
}

#[test]
fn locally_addressed_led_stays_off_the_bus() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(100);
    let before = counters(&pair, NodeId::A);

    pair.host(NodeId::A).take_lines();
    pair.host(NodeId::A).send(r#"{"led_rojo":true}"#);
    pair.run_for(300);

    let after = counters(&pair, NodeId::A);
    assert_eq!(
        after.frames_sent - before.frames_sent,
        after.telemetry_requests - before.telemetry_requests,
        "only telemetry requests may reach the bus"
    );
    assert!(pair.handles(NodeId::A).leds.is_on(Led::Rojo));
    assert!(!pair.handles(NodeId::B).leds.is_on(Led::Rojo));
    assert_eq!(
        acks(&pair, NodeId::A),
        vec![LedCommand::new(Led::Rojo, true)]
    );
    Ok(())
}

#[test]
fn targeted_commands_are_forwarded_to_the_peer() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(100);
    let before = counters(&pair, NodeId::A);

    pair.host(NodeId::A).send(r#"{"target":"B","led_rojo":true}"#);
    pair.host(NodeId::A).send("b_led_verde:true");
    pair.run_for(300);

    let after = counters(&pair, NodeId::A);
    assert_eq!(
        after.frames_sent - before.frames_sent,
        after.telemetry_requests - before.telemetry_requests + 2
    );
    let peer = &pair.handles(NodeId::B).leds;
    assert!(peer.is_on(Led::Rojo));
    assert!(peer.is_on(Led::Verde));
    assert!(!pair.handles(NodeId::A).leds.is_on(Led::Rojo));
    assert_eq!(
        acks(&pair, NodeId::B),
        vec![
            LedCommand::new(Led::Rojo, true),
            LedCommand::new(Led::Verde, true)
        ]
    );
    Ok(())
}

#[test]
fn peer_data_turns_to_zeros_once_stale() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(300);
    pair.bus().set_link_up(false);

    pair.host(NodeId::A).take_lines();
    pair.run_for(200);
    let recent = pair.host(NodeId::A).take_reports().pop().expect("report");
    assert!(
        (recent.remote.pot - 1.209).abs() < 0.001,
        "a snapshot younger than the threshold is still reported"
    );

    pair.run_for(600);
    let reports = pair.host(NodeId::A).take_reports();
    let last = reports.last().expect("report");
    assert_eq!(last.remote, SensorVolts::ZERO);
    assert!((last.local.pot - 2.50).abs() < 0.01);
    Ok(())
}

#[test]
fn unanswered_requests_leave_the_snapshot_alone() -> Result<()> {
    let mut pair = reference_pair()?;
    pair.run_for(300);
    pair.bus().set_link_up(false);
    // Let any reply already on the wire land.
    pair.run_for(2 * POLL_INTERVAL_MS);
    let snapshot = pair.node(NodeId::A).peer_snapshot().expect("snapshot");
    let timeouts = counters(&pair, NodeId::A).reply_timeouts;

    pair.handles(NodeId::B)
        .sensors
        .set(SensorReading::new(10, 20, 30));
    pair.run_for(400);

    assert_eq!(pair.node(NodeId::A).peer_snapshot(), Some(snapshot));
    assert!(counters(&pair, NodeId::A).reply_timeouts > timeouts);

    pair.bus().set_link_up(true);
    pair.run_for(200);
    let fresh = pair.node(NodeId::A).peer_snapshot().expect("snapshot");
    assert!(fresh.captured_at() > snapshot.captured_at());
    assert_eq!(fresh.reading(), SensorReading::new(10, 20, 30));
    Ok(())
}
