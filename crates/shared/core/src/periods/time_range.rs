use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, AggregationResult};
use crate::periods::Bar;
use crate::values::{Granularity, Price, SourceId, Timestamp};

/// One reconciled price field together with its provenance
///
/// Tracks not just the price but when it was observed and at what source
/// resolution, so consumers can tell a daily-bar extreme from a 5-minute one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Price,
    pub time: Timestamp,
    pub granularity: Granularity,
}

impl PricePoint {
    pub fn new(price: Price, time: Timestamp, granularity: Granularity) -> Self {
        Self {
            price,
            time,
            granularity,
        }
    }

    /// Whether `candidate` should replace `self` as the tracked extreme
    ///
    /// A strictly better price in the preferred direction always wins; an
    /// exact price tie goes to the finer-grained source, which narrows down
    /// when the extreme actually occurred.
    pub fn yields_to(&self, candidate: &PricePoint, prefer_higher: bool) -> bool {
        if candidate.price != self.price {
            return if prefer_higher {
                candidate.price > self.price
            } else {
                candidate.price < self.price
            };
        }
        candidate.granularity < self.granularity
    }
}

/// Select the directional extreme of two candidates
///
/// This is the single tie-break rule used for every reconciled field in the
/// engine: price decides, equal prices go to the finer granularity.
pub fn pick_extreme(a: PricePoint, b: PricePoint, prefer_higher: bool) -> PricePoint {
    if a.yields_to(&b, prefer_higher) { b } else { a }
}

/// Contiguous OHLC observation over a half-open `[start, end)` window
///
/// Immutable once constructed; [`TimeRange::merge`] produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    start: Timestamp,
    end: Timestamp,
    open: PricePoint,
    high: PricePoint,
    low: PricePoint,
    close: PricePoint,
    granularity: Granularity,
    source_id: SourceId,
}

impl TimeRange {
    /// Create a validated range
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        open: PricePoint,
        high: PricePoint,
        low: PricePoint,
        close: PricePoint,
        granularity: Granularity,
        source_id: impl Into<SourceId>,
    ) -> AggregationResult<Self> {
        if start >= end {
            return Err(AggregationError::EmptyRange { start, end });
        }
        if granularity == 0 {
            return Err(AggregationError::InvalidGranularity { minutes: 0 });
        }
        if low.price > high.price {
            return Err(AggregationError::InvalidBar {
                low: low.price,
                high: high.price,
            });
        }
        Ok(Self {
            start,
            end,
            open,
            high,
            low,
            close,
            granularity,
            source_id: source_id.into(),
        })
    }

    /// Build the range covering a single bar's own sample window
    pub fn from_bar(bar: &Bar, source_id: impl Into<SourceId>) -> Self {
        let stamp = |price| PricePoint::new(price, bar.time, bar.granularity);
        Self {
            start: bar.time,
            end: bar.window_end(),
            open: stamp(bar.open),
            high: stamp(bar.high),
            low: stamp(bar.low),
            close: stamp(bar.close),
            granularity: bar.granularity,
            source_id: source_id.into(),
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn open(&self) -> PricePoint {
        self.open
    }

    pub fn high(&self) -> PricePoint {
        self.high
    }

    pub fn low(&self) -> PricePoint {
        self.low
    }

    pub fn close(&self) -> PricePoint {
        self.close
    }

    /// Finest source resolution that contributed to this range
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether two ranges can be folded into one
    ///
    /// True when the ranges overlap or the gap between them is under one
    /// minute, in either order. The tolerance absorbs timestamp-alignment
    /// jitter between producers of different resolutions.
    pub fn is_contiguous_with(&self, other: &TimeRange) -> bool {
        if self.start < other.end && self.end > other.start {
            return true;
        }
        let gap = if self.end <= other.start {
            other.start - self.end
        } else {
            self.start - other.end
        };
        gap < Duration::minutes(1)
    }

    /// Fold two contiguous ranges into one
    ///
    /// Argument order does not matter: inputs are normalized by `start`
    /// (equal starts go to the finer source). `open` comes from the earlier
    /// input, `close` from the input ending later, `high`/`low` via
    /// [`pick_extreme`], and the result keeps the finest granularity.
    pub fn merge(a: &TimeRange, b: &TimeRange) -> AggregationResult<TimeRange> {
        if !a.is_contiguous_with(b) {
            return Err(AggregationError::DisjointRanges);
        }

        let earlier = if b.start < a.start || (b.start == a.start && b.granularity < a.granularity)
        {
            b
        } else {
            a
        };
        let close = if a.end != b.end {
            if a.end > b.end { a.close } else { b.close }
        } else if b.close.granularity < a.close.granularity {
            b.close
        } else {
            a.close
        };

        Ok(TimeRange {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
            open: earlier.open,
            high: pick_extreme(a.high, b.high, true),
            low: pick_extreme(a.low, b.low, false),
            close,
            granularity: a.granularity.min(b.granularity),
            source_id: earlier.source_id.clone(),
        })
    }

    /// Restrict the range to a period window, keeping the price provenance
    ///
    /// Returns `None` when nothing of the range falls inside the window.
    pub(crate) fn clip(&self, min_start: Timestamp, max_end: Option<Timestamp>) -> Option<Self> {
        let start = self.start.max(min_start);
        let end = match max_end {
            Some(bound) => self.end.min(bound),
            None => self.end,
        };
        if start >= end {
            return None;
        }
        let mut clipped = self.clone();
        clipped.start = start;
        clipped.end = end;
        Some(clipped)
    }
}
