//! Ambient configuration types: parameter schedules, location-type
//! constants, and testing configuration (`spec.md` §6).
//!
//! Grounded on `covid-rs`'s `epidemic/params.rs` for the general shape of a
//! `serde`-deserializable, `Default`-carrying parameter struct, generalized
//! here from single scalars to the round-indexed step functions `spec.md`
//! §4.5/§4.6/§6 calls "schedules".

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A round-indexed step function: holds the most recently defined value at
/// or before the queried round (`spec.md` §6 "Parameter schedules", §4.5
/// step 1 "the simulator carries the last value defined").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, f64>", into = "BTreeMap<u32, f64>")]
pub struct Schedule {
    entries: BTreeMap<u32, f64>,
}

impl Schedule {
    /// Build a schedule from explicit entries, validating that round 0 is
    /// present (`spec.md` §7 ConfigInvalid).
    pub fn new(entries: BTreeMap<u32, f64>) -> Result<Self> {
        if !entries.contains_key(&0) {
            return Err(Error::ConfigInvalid(
                "schedule is missing a required round-0 entry".into(),
            ));
        }
        Ok(Schedule { entries })
    }

    /// A schedule with a single constant value from round 0 onward.
    pub fn constant(value: f64) -> Self {
        Schedule { entries: BTreeMap::from([(0, value)]) }
    }

    /// The value in effect at `round`: the entry at the largest key `<=
    /// round`. Never panics once constructed via `new`/`constant`, since
    /// round 0 is always present.
    pub fn value_at(&self, round: u32) -> f64 {
        *self
            .entries
            .range(..=round)
            .next_back()
            .map(|(_, v)| v)
            .expect("Schedule invariant: round 0 entry always present")
    }
}

impl TryFrom<BTreeMap<u32, f64>> for Schedule {
    type Error = Error;
    fn try_from(entries: BTreeMap<u32, f64>) -> Result<Self> {
        Schedule::new(entries)
    }
}

impl From<Schedule> for BTreeMap<u32, f64> {
    fn from(s: Schedule) -> Self {
        s.entries
    }
}

/// The weekday-gated testing regime for one test type (`spec.md` §6
/// "Testing configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Probability a test on an infectious child returns positive.
    pub p: f64,
    /// Weekdays (0=Mon..6=Sun) this test is administered.
    pub weekdays: HashSet<u8>,
}

/// All configured test types, keyed by name (e.g. `"pcr"`, `"antigen"`).
pub type TestingConfig = HashMap<String, TestConfig>;

/// The five recognized venue types (`spec.md` §6 constants table). `House`
/// is recognized in the location CSV but never becomes a `Location` (it
/// seeds the household-to-venue binding instead, `spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Supermarket,
    Shop,
    Restaurant,
    Leisure,
    Nightlife,
}

impl LocationKind {
    pub const ALL: [LocationKind; 5] = [
        LocationKind::Supermarket,
        LocationKind::Shop,
        LocationKind::Restaurant,
        LocationKind::Leisure,
        LocationKind::Nightlife,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LocationKind::Supermarket => "supermarket",
            LocationKind::Shop => "shop",
            LocationKind::Restaurant => "restaurant",
            LocationKind::Leisure => "leisure",
            LocationKind::Nightlife => "nightlife",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        LocationKind::ALL.into_iter().find(|k| k.label() == label)
    }
}

/// Per-venue-type calibration constants (`spec.md` §6 table): average
/// minutes spent per visit, weekly minutes of "need" that drive visit
/// frequency, and the contact-rate multiplier used by `Location::spread`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationParams {
    pub avg_visit_time: f64,
    pub need_minutes: f64,
    pub contact_mult: f64,
}

/// The full constants table, with the defaults `spec.md` §6 gives for
/// every type except `nightlife` (which the spec marks "(config)" for all
/// three fields and therefore has no built-in default here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationParamsTable {
    params: HashMap<LocationKind, LocationParams>,
}

impl LocationParamsTable {
    pub fn get(&self, kind: LocationKind) -> Option<&LocationParams> {
        self.params.get(&kind)
    }

    pub fn insert(&mut self, kind: LocationKind, params: LocationParams) {
        self.params.insert(kind, params);
    }
}

impl Default for LocationParamsTable {
    fn default() -> Self {
        let mut params = HashMap::new();
        params.insert(
            LocationKind::Supermarket,
            LocationParams { avg_visit_time: 60.0, need_minutes: 60.0, contact_mult: 0.25 },
        );
        params.insert(
            LocationKind::Shop,
            LocationParams { avg_visit_time: 60.0, need_minutes: 90.0, contact_mult: 0.25 },
        );
        params.insert(
            LocationKind::Restaurant,
            LocationParams { avg_visit_time: 60.0, need_minutes: 60.0, contact_mult: 0.25 },
        );
        params.insert(
            LocationKind::Leisure,
            LocationParams { avg_visit_time: 120.0, need_minutes: 600.0, contact_mult: 0.25 },
        );
        LocationParamsTable { params }
    }
}

/// Reference duration used to calibrate `Location::spread`'s base rate
/// (`spec.md` §4.3): one infectious and one susceptible agent sharing 13m²
/// for 8 hours at the reference `loc_infec_rate` yields one expected
/// transmission.
pub const REFERENCE_SHARED_MINUTES: f64 = 8.0 * 60.0 / 13.0;

/// Minutes a venue is open per day (`spec.md` §4.3).
pub const MINUTES_OPEN: f64 = 720.0;

/// Default baseline location infection rate (`spec.md` §6), overridable by
/// schedule.
pub const DEFAULT_LOC_INFEC_RATE: f64 = 0.07;

/// Number of consecutive rounds a quarantine entry persists before release
/// (`spec.md` I3, P5).
pub const QUARANTINE_ROUNDS: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_requires_round_zero() {
        let mut m = BTreeMap::new();
        m.insert(3, 0.5);
        assert!(Schedule::new(m).is_err());
    }

    #[test]
    fn schedule_carries_last_value() {
        let mut m = BTreeMap::new();
        m.insert(0, 0.1);
        m.insert(10, 0.9);
        let s = Schedule::new(m).unwrap();
        assert_eq!(s.value_at(0), 0.1);
        assert_eq!(s.value_at(5), 0.1);
        assert_eq!(s.value_at(10), 0.9);
        assert_eq!(s.value_at(1000), 0.9);
    }

    #[test]
    fn location_defaults_match_spec_table() {
        let table = LocationParamsTable::default();
        let sm = table.get(LocationKind::Supermarket).unwrap();
        assert_eq!(sm.avg_visit_time, 60.0);
        assert_eq!(sm.need_minutes, 60.0);
        assert_eq!(sm.contact_mult, 0.25);
        assert!(table.get(LocationKind::Nightlife).is_none());
    }
}
