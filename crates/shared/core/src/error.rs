use thiserror::Error;

use crate::values::{Granularity, Price, Timestamp};

/// Domain-level errors for aggregation inputs
///
/// Out-of-order session signals and period-boundary renegotiation are not
/// represented here: both are expected under concurrent producers and are
/// absorbed by the aggregator (no-op and slot re-initialization).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Time range is empty: start {start} is not before end {end}")]
    EmptyRange { start: Timestamp, end: Timestamp },

    #[error("Ranges are neither overlapping nor contiguous")]
    DisjointRanges,

    #[error("Bar low {low} exceeds high {high}")]
    InvalidBar { low: Price, high: Price },

    #[error("Granularity must be at least one minute, got {minutes}")]
    InvalidGranularity { minutes: Granularity },

    #[error("Unknown period kind: {value}")]
    UnknownPeriodKind { value: String },
}

pub type AggregationResult<T> = std::result::Result<T, AggregationError>;
