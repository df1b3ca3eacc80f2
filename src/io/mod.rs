//! Ambient I/O: the neighbor-file and location-CSV formats `spec.md` §6
//! documents as external interfaces. Parsing/writing these is not the
//! epidemic core, but a buildable crate needs to actually produce and
//! consume them (`SPEC_FULL.md` §6 ambient).

pub mod locations;
pub mod neighbors;
