//! logrot Engine - Rotation, post-processing and retention
//!
//! [`Rotator`] drives one group through a full run: hooks, renames into the
//! archive directory, durable hand-off through the work queue, then
//! post-processing and pruning.

pub mod compress;
pub mod discovery;
pub mod pipeline;
pub mod retention;
pub mod rotator;

pub use compress::Compressor;
pub use pipeline::{DrainStats, Outcome, PostProcessor};
pub use retention::RetentionPruner;
pub use rotator::{RotationReport, Rotator};
