//! C3 — the graph generator.
//!
//! Builds the five static contact layers (household, school-standard,
//! school-split halves, office, inter-household) with the statistical
//! shapes `spec.md` §4.2 requires. Grounded step-for-step on
//! `examples/original_source/gengraph.py`'s `EpsimGraph`; a few of its
//! household-merge/duplicate loops are re-expressed as direct set
//! construction rather than transliterated edge-by-edge rewrites (see
//! `DESIGN.md`), since Rust's borrow rules make the original's
//! mutate-through-neighbor-references style awkward, and the direct form
//! makes the symmetry invariant (P4) obviously true by construction rather
//! than by careful bookkeeping.

mod generator;

pub use generator::{generate, GraphConfig, PopulationGraph};
