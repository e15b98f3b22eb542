//! Connector layout pipeline.
//!
//! `channels` reserves lanes so parallel connectors never coincide,
//! `junctions` finds the common points a family's connectors converge on,
//! `routes` turns both into orthogonal polylines, `fixer` nudges rows apart
//! when a trunk has no room, and `validate` sanity-checks the result.

pub mod channels;
pub mod fixer;
pub mod junctions;
pub mod routes;
pub mod validate;

pub use fixer::{FixOutcome, fix_positions};
pub use routes::{compute_lines, extend_lines};
pub use validate::{check_stage_validity, stage_rects};
