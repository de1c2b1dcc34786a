//! Chronos Core Domain
//!
//! Pure domain types for the chronos period-aggregation engine.
//! This crate contains no locks, no I/O, and is 100% unit testable.

pub mod error;
pub mod instruments;
pub mod periods;
pub mod values;

// Re-export commonly used types at crate root
pub use error::{AggregationError, AggregationResult};
pub use instruments::InstrumentId;
pub use periods::{Bar, PeriodKind, PeriodPoi, PricePoint, TimeRange, pick_extreme};
pub use values::{Granularity, Price, SourceId, Timestamp};
