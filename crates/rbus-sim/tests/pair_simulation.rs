//! ---
//! rbus_section: "06-simulation"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Simulated bus medium and node peripherals."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use anyhow::Result;
use rbus_common::{NodeId, PairConfig, Role};
use rbus_proto::{HostLine, Led, LedCommand, SensorVolts};
use rbus_sim::SimulatedPair;

#[test]
fn noisy_pair_exchanges_telemetry() -> Result<()> {
    let mut pair = SimulatedPair::new(&PairConfig::default())?;
    pair.run_for(500);

    let reports = pair.host(NodeId::A).take_reports();
    assert!(reports.len() >= 9);
    let last = reports.last().expect("report");
    assert!((last.remote.pot - 1.209).abs() < 0.05);
    assert!(pair.host(NodeId::B).take_reports().is_empty());

    let stats = pair.bus().stats();
    assert_eq!(stats.lost, 0);
    assert_eq!(stats.garbled, 0);
    assert!(stats.delivered > 0);
    Ok(())
}

#[test]
fn every_transmission_waits_for_the_settle_time() -> Result<()> {
    let mut pair = SimulatedPair::new(&PairConfig::default())?;
    pair.run_for(300);
    let sent = pair.node(NodeId::A).metrics().counters().frames_sent
        + pair.node(NodeId::B).metrics().counters().frames_sent;
    let delay = pair.delay();
    assert_eq!(delay.calls, sent);
    assert_eq!(delay.total.as_micros(), u128::from(sent) * 1000);
    assert!(!pair.bus().driver_enabled(NodeId::A));
    assert!(pair.bus().receiver_enabled(NodeId::B));
    Ok(())
}

#[test]
fn cut_cable_ages_remote_values_to_zero() -> Result<()> {
    let mut pair = SimulatedPair::new(&PairConfig::default())?;
    pair.run_for(200);
    pair.bus().set_link_up(false);
    pair.run_for(1000);

    let last = pair
        .host(NodeId::A)
        .take_reports()
        .pop()
        .expect("reports continue while the peer is unreachable");
    assert_eq!(last.remote, SensorVolts::ZERO);
    assert!(last.local.pot > 2.0);
    assert!(pair.node(NodeId::A).metrics().counters().reply_timeouts > 0);

    pair.bus().set_link_up(true);
    pair.run_for(200);
    let recovered = pair.host(NodeId::A).take_reports().pop().expect("report");
    assert!(recovered.remote.pot > 1.0);
    Ok(())
}

#[test]
fn simultaneous_role_commands_can_leave_both_passive() -> Result<()> {
    let mut pair = SimulatedPair::new(&PairConfig::default())?;
    pair.run_for(100);
    pair.host(NodeId::A).send("SET_MASTER");
    pair.host(NodeId::B).send("SET_MASTER");
    pair.run_for(200);

    // Each node told the other to step down; nothing breaks the tie.
    assert_eq!(pair.node(NodeId::A).role(), Role::Passive);
    assert_eq!(pair.node(NodeId::B).role(), Role::Passive);
    pair.host(NodeId::A).take_reports();
    pair.run_for(200);
    assert!(pair.host(NodeId::A).take_reports().is_empty());
    assert!(pair.host(NodeId::B).take_reports().is_empty());

    pair.host(NodeId::B).send("SET_MASTER");
    pair.run_for(200);
    assert_eq!(pair.node(NodeId::B).role(), Role::Active);
    assert_eq!(pair.node(NodeId::A).role(), Role::Passive);
    Ok(())
}

#[test]
fn mismatched_deployment_is_rejected() {
    let mut config = PairConfig::default();
    config.b.initial_role = Role::Active;
    assert!(SimulatedPair::new(&config).is_err());
}

#[test]
fn led_driver_fault_is_counted_and_not_acknowledged() -> Result<()> {
    let mut pair = SimulatedPair::new(&PairConfig::default())?;
    pair.run_for(100);
    pair.handles(NodeId::A).leds.set_faulty(Led::Rojo, true);
    pair.host(NodeId::A).take_lines();

    pair.host(NodeId::A).send(r#"{"led_rojo":true,"led_verde":true}"#);
    pair.run_for(50);

    let leds = &pair.handles(NodeId::A).leds;
    assert!(!leds.is_on(Led::Rojo));
    assert!(leds.is_on(Led::Verde));
    let acks: Vec<LedCommand> = pair
        .host(NodeId::A)
        .take_classified()
        .into_iter()
        .filter_map(|line| match line {
            HostLine::Ack(command) => Some(command),
            _ => None,
        })
        .collect();
    assert_eq!(acks, vec![LedCommand::new(Led::Verde, true)]);
    assert_eq!(pair.node(NodeId::A).metrics().counters().link_faults, 1);
    Ok(())
}
