//! Convenience re-exports for downstream callers and the `sim` binary, in
//! the same spirit as `covid-rs`'s own `prelude` module.

pub use crate::disease::{DiseaseProfile, StatePartition};
pub use crate::driver::{RunConfig, RunOutcome};
pub use crate::error::{Error, Result};
pub use crate::graph::{GraphConfig, PopulationGraph};
pub use crate::location::Location;
pub use crate::neighbors::NeighborMap;
pub use crate::params::{LocationKind, LocationParams, LocationParamsTable, Schedule, TestingConfig};
pub use crate::rng::Rng;
pub use crate::sim::Simulation;
pub use crate::telemetry::RoundTelemetry;
pub use crate::visits::VisitBinder;
pub use crate::AgentId;
