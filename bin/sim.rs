//! The `sim` binary: load `conf.toml` as a [`RunConfig`], run it, and write
//! `epicurve.csv`. Grounded on `pydemic-covid-rs`'s own `bin/sim.rs` — a
//! logger, a `toml`-deserialized config with a literal `Default`, and a
//! single run-then-write function — generalized here from that binary's
//! hardcoded SEIR run to `epicast`'s configurable driver.

use std::fs;

use epicast::prelude::*;

fn write_epicurve(outcome: &RunOutcome, path: &str) {
    let mut buf = Vec::new();
    outcome.write_csv(&mut buf).expect("telemetry always serializes to CSV");
    fs::write(path, buf).unwrap_or_else(|e| panic!("failed to write {path}: {e}"));
}

fn main() {
    simple_logger::SimpleLogger::new().init().unwrap();

    let config: RunConfig = match fs::read_to_string("conf.toml") {
        Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| panic!("invalid conf.toml: {e}")),
        Err(_) => {
            log::warn!("conf.toml not found, running with built-in defaults");
            RunConfig::default()
        }
    };

    let outcome = run(&config).unwrap_or_else(|e| panic!("run failed: {e}"));
    log::info!(
        "final state counts: {:?} (total rounds: {})",
        outcome.final_state_counts,
        outcome.telemetry.len()
    );
    write_epicurve(&outcome, "epicurve.csv");
}
