use chronos_core::{AggregationResult, Bar, PeriodKind, PeriodPoi, TimeRange, Timestamp};

/// Port for reading reconciled period state
///
/// Every returned [`PeriodPoi`] is an owned snapshot valid at the instant of
/// the call; a concurrently-running transition can never mutate it under the
/// caller.
pub trait PoiReader: Send + Sync {
    /// Snapshot of the POI in the given slot, if that period exists
    fn poi(&self, kind: PeriodKind, is_current: bool) -> Option<PeriodPoi>;

    /// Whether the slot's covered ranges span its whole period
    fn has_complete_coverage(&self, kind: PeriodKind, is_current: bool) -> bool;

    /// Snapshots of every initialized period, current and previous
    fn initialized_periods(&self) -> Vec<(PeriodKind, bool, PeriodPoi)>;
}

/// Port for feeding observations into the engine
///
/// Implementations serialize uncoordinated concurrent producers internally;
/// no call blocks on I/O or suspends.
pub trait PoiWriter: Send + Sync {
    /// Signal a session start
    ///
    /// Signals that are not strictly newer than the last accepted one are
    /// absorbed as no-ops: duplicate and out-of-order session signals from
    /// concurrent producers are expected and benign.
    fn set_session_start(&self, session_start: Timestamp);

    /// Ingest one direct OHLC bar into every period it falls inside
    fn ingest_bar(&self, bar: &Bar);

    /// Contribute a ranged OHLC summary to one period slot
    ///
    /// A `(period_start, period_end)` pair that disagrees with the slot's
    /// stored boundaries re-initializes the slot: producers observing a
    /// boundary change ahead of the engine is a normal occurrence, not an
    /// error.
    fn contribute_range(
        &self,
        kind: PeriodKind,
        is_current: bool,
        period_start: Timestamp,
        period_end: Option<Timestamp>,
        range: &TimeRange,
    ) -> AggregationResult<()>;

    /// Drop all period state for the instrument (administrative use)
    fn clear(&self);
}
