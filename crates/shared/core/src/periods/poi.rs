use serde::{Deserialize, Serialize};

use crate::error::AggregationResult;
use crate::periods::{Bar, PeriodKind, PricePoint, TimeRange, pick_extreme};
use crate::values::Timestamp;

/// Reconciled open/high/low/close for one period instance
///
/// A POI is created empty when its period begins and becomes initialized on
/// the first observation. `high`/`low` track extremes under the
/// finer-granularity tie-break; `open` is pinned by the earliest
/// observation; `close` follows the latest contribution. Two update modes
/// feed it: direct bars ([`PeriodPoi::apply_bar`]) and ranged summaries
/// ([`PeriodPoi::contribute`]), the latter also tracking coverage gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodPoi {
    kind: PeriodKind,
    period_start: Timestamp,
    /// `None` while the period is live (unbounded end)
    period_end: Option<Timestamp>,
    state: PoiState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum PoiState {
    Empty,
    Initialized(PoiData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PoiData {
    open: PricePoint,
    high: PricePoint,
    low: PricePoint,
    close: PricePoint,
    latest_observation_time: Timestamp,
    /// Sorted, disjoint covered ranges; populated by range contributions only
    coverage: Vec<TimeRange>,
}

impl PeriodPoi {
    /// Create an empty POI for a freshly opened period
    pub fn new(kind: PeriodKind, period_start: Timestamp, period_end: Option<Timestamp>) -> Self {
        Self {
            kind,
            period_start,
            period_end,
            state: PoiState::Empty,
        }
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    pub fn period_start(&self) -> Timestamp {
        self.period_start
    }

    pub fn period_end(&self) -> Option<Timestamp> {
        self.period_end
    }

    /// Whether the period is still open-ended
    pub fn is_live(&self) -> bool {
        self.period_end.is_none()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, PoiState::Initialized(_))
    }

    pub fn open(&self) -> Option<PricePoint> {
        self.data().map(|d| d.open)
    }

    pub fn high(&self) -> Option<PricePoint> {
        self.data().map(|d| d.high)
    }

    pub fn low(&self) -> Option<PricePoint> {
        self.data().map(|d| d.low)
    }

    pub fn close(&self) -> Option<PricePoint> {
        self.data().map(|d| d.close)
    }

    pub fn latest_observation_time(&self) -> Option<Timestamp> {
        self.data().map(|d| d.latest_observation_time)
    }

    /// Covered sub-ranges accumulated by range contributions
    pub fn coverage(&self) -> &[TimeRange] {
        self.data().map(|d| d.coverage.as_slice()).unwrap_or(&[])
    }

    /// Whether an observation at `time` belongs to this period's window
    pub fn admits(&self, time: Timestamp) -> bool {
        time >= self.period_start && self.period_end.is_none_or(|end| time < end)
    }

    /// Seal the period at `end`, if it is still unbounded
    pub fn close_at(&mut self, end: Timestamp) {
        if self.period_end.is_none() {
            self.period_end = Some(end);
        }
    }

    /// Ingest one direct bar
    ///
    /// First bar initializes all four fields; later bars replace `high` when
    /// strictly greater (or equal from a finer source) and `low`
    /// symmetrically. `close` always reflects the most recent *call*, not
    /// the latest bar time: producers must deliver same-period bars in time
    /// order for `close` to be meaningful. `open` is never touched after
    /// initialization.
    pub fn apply_bar(&mut self, bar: &Bar) {
        match &mut self.state {
            PoiState::Empty => {
                let stamp = |price| PricePoint::new(price, bar.time, bar.granularity);
                self.state = PoiState::Initialized(PoiData {
                    open: stamp(bar.open),
                    high: stamp(bar.high),
                    low: stamp(bar.low),
                    close: stamp(bar.close),
                    latest_observation_time: bar.time,
                    coverage: Vec::new(),
                });
            }
            PoiState::Initialized(data) => {
                let high = PricePoint::new(bar.high, bar.time, bar.granularity);
                if data.high.yields_to(&high, true) {
                    data.high = high;
                }
                let low = PricePoint::new(bar.low, bar.time, bar.granularity);
                if data.low.yields_to(&low, false) {
                    data.low = low;
                }
                data.close = PricePoint::new(bar.close, bar.time, bar.granularity);
                data.latest_observation_time = data.latest_observation_time.max(bar.time);
            }
        }
    }

    /// Ingest one ranged OHLC summary
    ///
    /// The range is clipped to the period window (discarded when nothing
    /// remains) and folded into the covered-range list until no neighbor is
    /// contiguous anymore, so a single contribution may bridge several gaps.
    /// The reconciled OHLC is then recomputed from scratch over the coverage.
    /// Returns whether the contribution changed the POI.
    pub fn contribute(&mut self, range: &TimeRange) -> AggregationResult<bool> {
        let Some(clipped) = range.clip(self.period_start, self.period_end) else {
            return Ok(false);
        };

        let mut ranges = match &mut self.state {
            PoiState::Initialized(data) => std::mem::take(&mut data.coverage),
            PoiState::Empty => Vec::new(),
        };
        ranges.push(clipped);
        ranges.sort_by_key(|r| r.start());

        let mut folded: Vec<TimeRange> = Vec::with_capacity(ranges.len());
        for next in ranges {
            match folded.last_mut() {
                Some(last) if last.is_contiguous_with(&next) => {
                    *last = TimeRange::merge(last, &next)?;
                }
                _ => folded.push(next),
            }
        }

        self.recompute(folded);
        Ok(true)
    }

    /// Rebuild the reconciled OHLC from the covered-range list
    fn recompute(&mut self, coverage: Vec<TimeRange>) {
        let (Some(first), Some(last)) = (coverage.first(), coverage.last()) else {
            self.state = PoiState::Empty;
            return;
        };

        let mut high = first.high();
        let mut low = first.low();
        for range in &coverage {
            high = pick_extreme(high, range.high(), true);
            low = pick_extreme(low, range.low(), false);
        }

        // Ranges are sorted and disjoint, so the last one ends latest
        let close = last.close();
        let open = first.open();
        self.state = PoiState::Initialized(PoiData {
            open,
            high,
            low,
            close,
            latest_observation_time: close.time,
            coverage,
        });
    }

    /// Whether the covered ranges span the whole period without gaps
    ///
    /// True only when coverage has collapsed to a single range reaching the
    /// period start and, for a bounded period, the period end.
    pub fn has_complete_coverage(&self) -> bool {
        match &self.state {
            PoiState::Initialized(data) if data.coverage.len() == 1 => {
                let range = &data.coverage[0];
                range.start() <= self.period_start
                    && self.period_end.is_none_or(|end| range.end() >= end)
            }
            _ => false,
        }
    }

    /// Uncovered sub-intervals inside the period window
    ///
    /// Includes a leading gap when coverage starts after the period start
    /// and, for bounded periods, a trailing gap when it ends early. A live
    /// period has no trailing edge to measure against, so none is reported.
    pub fn gaps(&self) -> impl Iterator<Item = (Timestamp, Timestamp)> + '_ {
        let coverage = self.coverage();
        let period_start = self.period_start;
        let period_end = self.period_end;

        let leading = coverage
            .first()
            .filter(|range| range.start() > period_start)
            .map(|range| (period_start, range.start()));
        let middle = coverage.windows(2).filter_map(|pair| {
            (pair[1].start() > pair[0].end()).then(|| (pair[0].end(), pair[1].start()))
        });
        let trailing = match (coverage.last(), period_end) {
            (Some(last), Some(end)) if last.end() < end => Some((last.end(), end)),
            (None, Some(end)) if period_start < end => Some((period_start, end)),
            _ => None,
        };

        leading.into_iter().chain(middle).chain(trailing)
    }

    fn data(&self) -> Option<&PoiData> {
        match &self.state {
            PoiState::Initialized(data) => Some(data),
            PoiState::Empty => None,
        }
    }
}
