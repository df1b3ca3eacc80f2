//! Error kinds for `epicast`.
//!
//! All errors are terminal: configuration and graph-loading problems are
//! detected before a simulation's round loop starts, and nothing inside the
//! loop itself is fallible (see `spec.md` §7).

use thiserror::Error;

/// The error type returned by configuration validation, graph loading, and
/// building/location ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// A schedule, `perc_immune`, or `num_start_infectious` value is
    /// malformed — missing a round-0 entry, the wrong shape, or references
    /// an unrecognized key.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A neighbor relation failed the symmetry/no-self-loop invariant, or
    /// named an id outside of the declared population.
    #[error("inconsistent contact graph: {0}")]
    GraphInconsistent(String),

    /// The location CSV had a header mismatch or an unparsable field.
    #[error("invalid building/location input: {0}")]
    BuildingInputInvalid(String),

    /// Propagated I/O failure while reading a neighbor or location file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Propagated CSV parsing failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Propagated TOML parsing failure for a run configuration file.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
