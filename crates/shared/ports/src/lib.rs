//! Chronos Ports
//!
//! Port definitions (traits) for the chronos period-aggregation engine.
//! These define the boundary between the engine and its collaborators:
//! producers feed observations through [`PoiWriter`], rendering and
//! analytics consumers read snapshots through [`PoiReader`].

mod poi;

pub use poi::{PoiReader, PoiWriter};
