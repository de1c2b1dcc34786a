use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, AggregationResult};
use crate::values::{Granularity, Price, Timestamp};

/// Single OHLC observation from one producer
///
/// `granularity` is the producer's sample resolution in minutes: a bar from
/// a 5-minute series carries `granularity = 5`. `time` is the bar's open
/// time; the sample window is `[time, time + granularity)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: Timestamp,
    pub granularity: Granularity,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

impl Bar {
    /// Create a validated bar
    pub fn new(
        time: Timestamp,
        granularity: Granularity,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
    ) -> AggregationResult<Self> {
        if granularity == 0 {
            return Err(AggregationError::InvalidGranularity { minutes: 0 });
        }
        if low > high {
            return Err(AggregationError::InvalidBar { low, high });
        }
        Ok(Self {
            time,
            granularity,
            open,
            high,
            low,
            close,
        })
    }

    /// End of the bar's own sample window
    pub fn window_end(&self) -> Timestamp {
        self.time + Duration::minutes(self.granularity as i64)
    }
}
