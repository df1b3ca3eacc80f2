//! Per-round telemetry (`spec.md` §3 "Telemetry record", §4.5 step 15).
//!
//! A fixed-shape record per round: state populations, total infected,
//! infected by channel, infected by children/adults, and quarantine
//! actions. Rendered to CSV with a hand-built, dynamically-widthed header
//! (one `state_N` column per disease sub-state, one `loc_<kind>` column per
//! location type actually present) rather than a single `#[derive(Serialize)]`
//! struct, since the schema's width depends on the chosen `DiseaseProfile`
//! and location roster — generalized from `covid-rs`'s
//! `sim/epicurve_tracker.rs`/`reporter.rs` `render_epicurve_csv` convention,
//! which faced the same "one column per tracked category" shape.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::params::LocationKind;

/// One round's population-level summary.
#[derive(Debug, Clone)]
pub struct RoundTelemetry {
    pub round: u32,
    pub state_counts: Vec<usize>,
    pub total_infected: usize,
    pub infected_household: usize,
    pub infected_school: usize,
    pub infected_office: usize,
    pub infected_interhousehold: usize,
    pub infected_by_location: BTreeMap<LocationKind, usize>,
    pub infected_by_children: usize,
    pub infected_by_adults: usize,
    pub quarantined_by_detection: usize,
    pub quarantined_by_test: usize,
}

impl RoundTelemetry {
    /// A record with every counter zeroed, for the rounds emitted after
    /// termination (`spec.md` §4.5 step 3, P8).
    pub fn zero_filled(round: u32, state_counts: Vec<usize>) -> Self {
        RoundTelemetry {
            round,
            state_counts,
            total_infected: 0,
            infected_household: 0,
            infected_school: 0,
            infected_office: 0,
            infected_interhousehold: 0,
            infected_by_location: BTreeMap::new(),
            infected_by_children: 0,
            infected_by_adults: 0,
            quarantined_by_detection: 0,
            quarantined_by_test: 0,
        }
    }
}

/// Render a telemetry sequence as CSV. The header's `state_N` columns
/// match the width of the first record; `loc_<kind>` columns cover the
/// union of location kinds seen across all records (missing entries render
/// as `0`).
pub fn write_csv<W: Write>(records: &[RoundTelemetry], writer: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);

    let num_states = records.first().map(|r| r.state_counts.len()).unwrap_or(0);
    let mut kinds: Vec<LocationKind> =
        records.iter().flat_map(|r| r.infected_by_location.keys().copied()).collect();
    kinds.sort_by_key(|k| k.label());
    kinds.dedup();

    let mut header = vec!["round".to_string()];
    header.extend((0..num_states).map(|i| format!("state_{i}")));
    header.extend(
        [
            "total_infected",
            "infected_household",
            "infected_school",
            "infected_office",
            "infected_interhousehold",
        ]
        .map(String::from),
    );
    header.extend(kinds.iter().map(|k| format!("loc_{}", k.label())));
    header.extend(
        [
            "infected_by_children",
            "infected_by_adults",
            "quarantined_by_detection",
            "quarantined_by_test",
        ]
        .map(String::from),
    );
    w.write_record(&header)?;

    for r in records {
        let mut row = vec![r.round.to_string()];
        row.extend(r.state_counts.iter().map(|c| c.to_string()));
        row.push(r.total_infected.to_string());
        row.push(r.infected_household.to_string());
        row.push(r.infected_school.to_string());
        row.push(r.infected_office.to_string());
        row.push(r.infected_interhousehold.to_string());
        for kind in &kinds {
            row.push(r.infected_by_location.get(kind).copied().unwrap_or(0).to_string());
        }
        row.push(r.infected_by_children.to_string());
        row.push(r.infected_by_adults.to_string());
        row.push(r.quarantined_by_detection.to_string());
        row.push(r.quarantined_by_test.to_string());
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_filled_record_has_all_zero_counters() {
        let r = RoundTelemetry::zero_filled(5, vec![10, 0, 0, 0]);
        assert_eq!(r.total_infected, 0);
        assert_eq!(r.infected_by_location.len(), 0);
    }

    #[test]
    fn write_csv_includes_dynamic_location_columns() {
        let mut by_loc = BTreeMap::new();
        by_loc.insert(LocationKind::Supermarket, 2);
        let record = RoundTelemetry {
            round: 0,
            state_counts: vec![8, 1, 1],
            total_infected: 2,
            infected_household: 1,
            infected_school: 0,
            infected_office: 0,
            infected_interhousehold: 0,
            infected_by_location: by_loc,
            infected_by_children: 1,
            infected_by_adults: 1,
            quarantined_by_detection: 0,
            quarantined_by_test: 0,
        };
        let mut buf = Vec::new();
        write_csv(&[record], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("loc_supermarket"));
        assert!(text.lines().count() == 2);
    }
}
