//! Chronos Period Clock
//!
//! Pure boundary math for the aggregation engine: derives trading days,
//! week/quarter identity and 4-hour block windows from timestamps alone.
//! Deterministic, stateless, no I/O, no wall-clock reads.

mod boundaries;

pub use boundaries::{four_hour_block, is_monday, iso_week, quarter_index, trading_day};
