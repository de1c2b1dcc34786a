use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
///
/// Exact equality matters here: the granularity tie-break only applies when
/// two sources report the same extreme price.
pub type Price = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Source resolution in minutes per sample; smaller = more precise
pub type Granularity = u32;

/// Free-form producer identifier, carried for diagnostics only
pub type SourceId = String;
