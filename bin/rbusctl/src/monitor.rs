//! ---
//! rbus_section: "05-host-interfaces"
//! rbus_subsection: "binary"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Telemetry monitor for the host link."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
use std::io::{BufRead, BufReader, ErrorKind, Read};

use anyhow::{Context, Result};
use rbus_proto::{HostLine, HostReport, SensorVolts};
use tracing::debug;

/// Follow the host link, printing one line per report, ack or diagnostic.
pub fn run<R: Read>(port: R, raw_json: bool, count: Option<u64>) -> Result<()> {
    let mut reader = BufReader::new(port);
    let mut line = String::new();
    let mut reports = 0u64;
    loop {
        if count.is_some_and(|limit| reports >= limit) {
            return Ok(());
        }
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => return Err(err).context("host link read failed"),
        }
        if line.trim().is_empty() {
            continue;
        }
        let classified = HostLine::classify(&line);
        if matches!(classified, HostLine::Report(_)) {
            reports += 1;
        }
        println!("{}", render(&classified, &line, raw_json)?);
    }
}

fn render(classified: &HostLine, raw: &str, raw_json: bool) -> Result<String> {
    Ok(match classified {
        HostLine::Report(report) if raw_json => serde_json::to_string(report)?,
        HostLine::Report(report) => render_report(report),
        HostLine::Ack(command) => format!("ack   {} {}", command.led, on_off(command.on)),
        HostLine::Diagnostic(text) => {
            debug!(line = %raw.trim(), "unclassified host line");
            format!("note  {text}")
        }
    })
}

fn render_report(report: &HostReport) -> String {
    format!(
        "{} {:<7} t={:>8}ms local[{}] remote[{}]",
        report.device,
        report.role.as_str(),
        report.timestamp,
        volts(&report.local),
        volts(&report.remote)
    )
}

fn volts(values: &SensorVolts) -> String {
    format!(
        "pot={:.2}V ldr={:.2}V enc={:.2}V",
        values.pot, values.ldr, values.enc
    )
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
