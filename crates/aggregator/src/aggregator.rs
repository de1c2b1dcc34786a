use chrono::{Datelike, NaiveDate};
use log::debug;
use parking_lot::RwLock;

use chronos_clock::{four_hour_block, is_monday, iso_week, quarter_index, trading_day};
use chronos_core::{AggregationResult, Bar, PeriodKind, PeriodPoi, TimeRange, Timestamp};
use chronos_ports::{PoiReader, PoiWriter};

/// Per-instrument period-aggregation engine
///
/// Owns the full current/previous POI table across all period kinds, the
/// session anchor and trading-day tracking, and drives every transition.
/// All mutation and every read serialize through one internal lock;
/// producers share the engine via `Arc` handed out by the
/// [`AggregatorRegistry`](crate::AggregatorRegistry). Reads return owned
/// snapshots that a concurrent transition can never touch.
pub struct InstrumentAggregator {
    state: RwLock<AggregatorState>,
}

struct AggregatorState {
    current: [Option<PeriodPoi>; PeriodKind::COUNT],
    previous: [Option<PeriodPoi>; PeriodKind::COUNT],
    last_session_start: Option<Timestamp>,
    last_trading_day: Option<NaiveDate>,
}

impl AggregatorState {
    const EMPTY_SLOT: Option<PeriodPoi> = None;

    fn new() -> Self {
        Self {
            current: [Self::EMPTY_SLOT; PeriodKind::COUNT],
            previous: [Self::EMPTY_SLOT; PeriodKind::COUNT],
            last_session_start: None,
            last_trading_day: None,
        }
    }

    /// Demote the current period of `kind` and open a fresh one at `new_start`
    ///
    /// An initialized outgoing period is sealed at `new_start` (if still
    /// unbounded) and becomes the previous one, dropping anything older; an
    /// untouched outgoing period is simply discarded. Retention stays at
    /// exactly one current plus at most one previous per kind.
    fn transition(&mut self, kind: PeriodKind, new_start: Timestamp) {
        let idx = kind.index();
        if let Some(mut outgoing) = self.current[idx].take() {
            if outgoing.is_initialized() {
                outgoing.close_at(new_start);
                self.previous[idx] = Some(outgoing);
            }
        }
        self.current[idx] = Some(PeriodPoi::new(kind, new_start, None));
        debug!("{} period opened at {}", kind, new_start);
    }

    /// Seal and demote the current period of `kind` without opening a new one
    fn retire(&mut self, kind: PeriodKind, end: Timestamp) {
        let idx = kind.index();
        if let Some(mut outgoing) = self.current[idx].take() {
            if outgoing.is_initialized() {
                outgoing.close_at(end);
                self.previous[idx] = Some(outgoing);
            }
            debug!("{} period retired at {}", kind, end);
        }
    }

    fn set_session_start(&mut self, t: Timestamp) {
        if self.last_session_start.is_some_and(|last| t <= last) {
            debug!("session start {} not newer than last accepted; ignored", t);
            return;
        }
        let day = trading_day(t);

        // Every accepted session opens a new daily period
        self.transition(PeriodKind::Daily, t);

        match self.last_trading_day {
            None => {
                // First session ever: the calendar periods all begin here.
                // FourHour stays empty until bars arrive (see roll_four_hour).
                self.transition(PeriodKind::Weekly, t);
                self.transition(PeriodKind::Monthly, t);
                self.transition(PeriodKind::Quarterly, t);
                self.transition(PeriodKind::Yearly, t);
                if is_monday(day) {
                    self.transition(PeriodKind::MondaySession, t);
                }
            }
            Some(last_day) => {
                let year_changed = day.year() != last_day.year();

                if is_monday(day) && !is_monday(last_day) {
                    self.transition(PeriodKind::MondaySession, t);
                } else if !is_monday(day)
                    && self.current[PeriodKind::MondaySession.index()].is_some()
                {
                    self.retire(PeriodKind::MondaySession, t);
                }

                if iso_week(day) != iso_week(last_day) || year_changed {
                    self.transition(PeriodKind::Weekly, t);
                }
                if day.month() != last_day.month() || year_changed {
                    self.transition(PeriodKind::Monthly, t);
                }
                if quarter_index(day) != quarter_index(last_day) || year_changed {
                    self.transition(PeriodKind::Quarterly, t);
                }
                if year_changed {
                    self.transition(PeriodKind::Yearly, t);
                }
            }
        }

        self.last_session_start = Some(t);
        self.last_trading_day = Some(day);
    }

    /// Lazy 4-hour block transition, driven by bar arrival
    ///
    /// Blocks subdivide whatever the current session turns out to be, and a
    /// session can be replaced by a corrected signal before any bar arrives,
    /// so the block boundary is derived here rather than in
    /// `set_session_start`. Stale bars for an already-superseded block never
    /// roll the window backwards.
    fn roll_four_hour(&mut self, time: Timestamp) {
        let Some(anchor) = self.last_session_start else {
            return;
        };
        let Some((block_start, _)) = four_hour_block(anchor, time) else {
            debug!("bar at {} precedes session anchor {}; no 4h block", time, anchor);
            return;
        };

        let advances = match &self.current[PeriodKind::FourHour.index()] {
            Some(live) => block_start > live.period_start(),
            None => true,
        };
        if advances {
            self.transition(PeriodKind::FourHour, block_start);
        }
    }

    fn ingest_bar(&mut self, bar: &Bar) {
        self.roll_four_hour(bar.time);
        for kind in PeriodKind::ALL {
            if let Some(poi) = self.current[kind.index()].as_mut() {
                if poi.admits(bar.time) {
                    poi.apply_bar(bar);
                }
            }
        }
    }

    fn contribute_range(
        &mut self,
        kind: PeriodKind,
        is_current: bool,
        period_start: Timestamp,
        period_end: Option<Timestamp>,
        range: &TimeRange,
    ) -> AggregationResult<()> {
        let slot = if is_current {
            &mut self.current[kind.index()]
        } else {
            &mut self.previous[kind.index()]
        };

        // A producer observing different boundaries than the stored slot has
        // seen a boundary change first: start the slot over on its terms.
        let boundaries_match = slot
            .as_ref()
            .is_some_and(|poi| poi.period_start() == period_start && poi.period_end() == period_end);
        if !boundaries_match {
            debug!(
                "{} slot renegotiated to [{}, {:?})",
                kind, period_start, period_end
            );
            *slot = Some(PeriodPoi::new(kind, period_start, period_end));
        }

        if let Some(poi) = slot.as_mut() {
            if !poi.contribute(range)? {
                debug!(
                    "range [{}, {}) from {} lies outside {} period; discarded",
                    range.start(),
                    range.end(),
                    range.source_id(),
                    kind
                );
            }
        }
        Ok(())
    }

    fn slot(&self, kind: PeriodKind, is_current: bool) -> &Option<PeriodPoi> {
        if is_current {
            &self.current[kind.index()]
        } else {
            &self.previous[kind.index()]
        }
    }
}

impl InstrumentAggregator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AggregatorState::new()),
        }
    }

    /// Signal a session start; not-newer signals are absorbed as no-ops
    pub fn set_session_start(&self, session_start: Timestamp) {
        self.state.write().set_session_start(session_start);
    }

    /// Ingest one direct OHLC bar into every period admitting its timestamp
    pub fn ingest_bar(&self, bar: &Bar) {
        self.state.write().ingest_bar(bar);
    }

    /// Contribute a ranged OHLC summary to one period slot
    pub fn contribute_range(
        &self,
        kind: PeriodKind,
        is_current: bool,
        period_start: Timestamp,
        period_end: Option<Timestamp>,
        range: &TimeRange,
    ) -> AggregationResult<()> {
        self.state
            .write()
            .contribute_range(kind, is_current, period_start, period_end, range)
    }

    /// Snapshot of the POI in the given slot, if that period exists
    pub fn poi(&self, kind: PeriodKind, is_current: bool) -> Option<PeriodPoi> {
        self.state.read().slot(kind, is_current).clone()
    }

    /// Whether the slot's covered ranges span its whole period
    pub fn has_complete_coverage(&self, kind: PeriodKind, is_current: bool) -> bool {
        self.state
            .read()
            .slot(kind, is_current)
            .as_ref()
            .is_some_and(PeriodPoi::has_complete_coverage)
    }

    /// Snapshots of every initialized period, current and previous
    pub fn initialized_periods(&self) -> Vec<(PeriodKind, bool, PeriodPoi)> {
        let state = self.state.read();
        let mut periods = Vec::new();
        for kind in PeriodKind::ALL {
            for is_current in [true, false] {
                if let Some(poi) = state.slot(kind, is_current) {
                    if poi.is_initialized() {
                        periods.push((kind, is_current, poi.clone()));
                    }
                }
            }
        }
        periods
    }

    /// Last accepted session start, if any
    pub fn last_session_start(&self) -> Option<Timestamp> {
        self.state.read().last_session_start
    }

    /// Trading day of the last accepted session, if any
    pub fn last_trading_day(&self) -> Option<NaiveDate> {
        self.state.read().last_trading_day
    }

    /// Drop all period state for the instrument
    pub fn clear(&self) {
        *self.state.write() = AggregatorState::new();
    }
}

impl Default for InstrumentAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoiWriter for InstrumentAggregator {
    fn set_session_start(&self, session_start: Timestamp) {
        InstrumentAggregator::set_session_start(self, session_start);
    }

    fn ingest_bar(&self, bar: &Bar) {
        InstrumentAggregator::ingest_bar(self, bar);
    }

    fn contribute_range(
        &self,
        kind: PeriodKind,
        is_current: bool,
        period_start: Timestamp,
        period_end: Option<Timestamp>,
        range: &TimeRange,
    ) -> AggregationResult<()> {
        InstrumentAggregator::contribute_range(self, kind, is_current, period_start, period_end, range)
    }

    fn clear(&self) {
        InstrumentAggregator::clear(self);
    }
}

impl PoiReader for InstrumentAggregator {
    fn poi(&self, kind: PeriodKind, is_current: bool) -> Option<PeriodPoi> {
        InstrumentAggregator::poi(self, kind, is_current)
    }

    fn has_complete_coverage(&self, kind: PeriodKind, is_current: bool) -> bool {
        InstrumentAggregator::has_complete_coverage(self, kind, is_current)
    }

    fn initialized_periods(&self) -> Vec<(PeriodKind, bool, PeriodPoi)> {
        InstrumentAggregator::initialized_periods(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    fn bar(time: Timestamp) -> Bar {
        Bar::new(time, 5, dec!(100), dec!(105), dec!(95), dec!(102)).unwrap()
    }

    #[test]
    fn test_first_session_bootstraps_calendar_periods() {
        let agg = InstrumentAggregator::new();
        // Sunday Jan 5, 23:00 -> trading day Monday Jan 6
        agg.set_session_start(at(5, 23, 0));

        for kind in [
            PeriodKind::Daily,
            PeriodKind::Weekly,
            PeriodKind::Monthly,
            PeriodKind::Quarterly,
            PeriodKind::Yearly,
            PeriodKind::MondaySession,
        ] {
            let poi = agg.poi(kind, true).unwrap_or_else(|| panic!("{kind} missing"));
            assert_eq!(poi.period_start(), at(5, 23, 0));
            assert!(poi.is_live());
            assert!(!poi.is_initialized());
        }
        assert!(agg.poi(PeriodKind::FourHour, true).is_none(), "4h is lazy");
    }

    #[test]
    fn test_non_monday_first_session_skips_monday_slot() {
        let agg = InstrumentAggregator::new();
        // Monday Jan 6, 23:00 -> trading day Tuesday Jan 7
        agg.set_session_start(at(6, 23, 0));

        assert!(agg.poi(PeriodKind::MondaySession, true).is_none());
        assert!(agg.poi(PeriodKind::Daily, true).is_some());
    }

    #[test]
    fn test_daily_scenario_reconciles_first_bar() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 23, 0)));

        let daily = agg.poi(PeriodKind::Daily, true).unwrap();
        assert!(daily.is_initialized());
        assert_eq!(daily.open().unwrap().price, dec!(100));
        assert_eq!(daily.high().unwrap().price, dec!(105));
        assert_eq!(daily.high().unwrap().time, at(5, 23, 0));
        assert_eq!(daily.low().unwrap().price, dec!(95));
        assert_eq!(daily.low().unwrap().time, at(5, 23, 0));
        assert_eq!(daily.close().unwrap().price, dec!(102));
    }

    #[test]
    fn test_duplicate_session_start_is_exactly_once() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 23, 0)));
        let before = agg.initialized_periods();

        agg.set_session_start(at(5, 23, 0));
        agg.set_session_start(at(5, 22, 0));

        assert_eq!(agg.initialized_periods(), before);
        assert_eq!(agg.last_session_start(), Some(at(5, 23, 0)));
    }

    #[test]
    fn test_daily_transition_demotes_current() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 23, 5)));
        agg.set_session_start(at(6, 23, 0));

        let previous = agg.poi(PeriodKind::Daily, false).unwrap();
        assert_eq!(previous.period_start(), at(5, 23, 0));
        assert_eq!(previous.period_end(), Some(at(6, 23, 0)));
        assert!(previous.is_initialized());

        let current = agg.poi(PeriodKind::Daily, true).unwrap();
        assert_eq!(current.period_start(), at(6, 23, 0));
        assert!(current.is_live());
        assert!(!current.is_initialized());
    }

    #[test]
    fn test_untouched_period_leaves_no_previous() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        // No bars at all before the next session
        agg.set_session_start(at(6, 23, 0));

        assert!(agg.poi(PeriodKind::Daily, false).is_none());
    }

    #[test]
    fn test_retention_is_bounded_over_many_transitions() {
        let agg = InstrumentAggregator::new();
        for day in 2..=30 {
            agg.set_session_start(at(day, 23, 0));
            agg.ingest_bar(&bar(at(day, 23, 5)));
        }

        let daily: Vec<_> = agg
            .initialized_periods()
            .into_iter()
            .filter(|(kind, _, _)| *kind == PeriodKind::Daily)
            .collect();
        assert_eq!(daily.len(), 2, "exactly one current and one previous");
        assert!(agg.poi(PeriodKind::Daily, true).is_some());
        assert!(agg.poi(PeriodKind::Daily, false).is_some());
    }

    #[test]
    fn test_monday_session_opens_and_retires() {
        let agg = InstrumentAggregator::new();
        // Sunday Jan 5 23:00 -> trading day Monday Jan 6: Monday period opens
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 23, 5)));
        assert!(agg.poi(PeriodKind::MondaySession, true).is_some());

        // Monday Jan 6 23:00 -> trading day Tuesday Jan 7: Monday period ends
        agg.set_session_start(at(6, 23, 0));

        assert!(agg.poi(PeriodKind::MondaySession, true).is_none());
        let monday = agg.poi(PeriodKind::MondaySession, false).unwrap();
        assert_eq!(monday.period_start(), at(5, 23, 0));
        assert_eq!(monday.period_end(), Some(at(6, 23, 0)));
    }

    #[test]
    fn test_weekly_transitions_on_iso_week_change() {
        let agg = InstrumentAggregator::new();
        // Trading days Tue Jan 7 .. Fri Jan 10: same ISO week
        agg.set_session_start(at(6, 23, 0));
        agg.ingest_bar(&bar(at(6, 23, 5)));
        let week_start = agg.poi(PeriodKind::Weekly, true).unwrap().period_start();
        for day in 7..=9 {
            agg.set_session_start(at(day, 23, 0));
        }
        assert_eq!(
            agg.poi(PeriodKind::Weekly, true).unwrap().period_start(),
            week_start,
            "no transition inside the week"
        );

        // Sunday Jan 12 23:00 -> trading day Monday Jan 13: next ISO week
        agg.set_session_start(at(12, 23, 0));
        let weekly = agg.poi(PeriodKind::Weekly, true).unwrap();
        assert_eq!(weekly.period_start(), at(12, 23, 0));
        let prior = agg.poi(PeriodKind::Weekly, false).unwrap();
        assert_eq!(prior.period_end(), Some(at(12, 23, 0)));
    }

    #[test]
    fn test_month_quarter_year_transitions() {
        let agg = InstrumentAggregator::new();
        let dec30 = Utc.with_ymd_and_hms(2025, 12, 30, 23, 0, 0).unwrap();
        let dec31 = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        agg.set_session_start(dec30);
        agg.ingest_bar(&Bar::new(dec30, 60, dec!(100), dec!(101), dec!(99), dec!(100)).unwrap());

        // Trading day rolls from Dec 31 to Jan 1: month, quarter and year all turn
        agg.set_session_start(dec31);

        for kind in [PeriodKind::Monthly, PeriodKind::Quarterly, PeriodKind::Yearly] {
            let current = agg.poi(kind, true).unwrap();
            assert_eq!(current.period_start(), dec31, "{kind} should transition");
            let previous = agg.poi(kind, false).unwrap();
            assert_eq!(previous.period_end(), Some(dec31));
        }
    }

    #[test]
    fn test_four_hour_ignored_without_session_anchor() {
        let agg = InstrumentAggregator::new();
        agg.ingest_bar(&bar(at(6, 10, 0)));
        assert!(agg.poi(PeriodKind::FourHour, true).is_none());
    }

    #[test]
    fn test_four_hour_blocks_roll_with_bars() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));

        agg.ingest_bar(&bar(at(5, 23, 5)));
        let block0 = agg.poi(PeriodKind::FourHour, true).unwrap();
        assert_eq!(block0.period_start(), at(5, 23, 0));
        assert!(block0.is_initialized());

        // 03:05 next day is 4h05m after the anchor: block 1
        agg.ingest_bar(&bar(at(6, 3, 5)));
        let block1 = agg.poi(PeriodKind::FourHour, true).unwrap();
        assert_eq!(block1.period_start(), at(6, 3, 0));
        let sealed = agg.poi(PeriodKind::FourHour, false).unwrap();
        assert_eq!(sealed.period_start(), at(5, 23, 0));
        assert_eq!(sealed.period_end(), Some(at(6, 3, 0)));
    }

    #[test]
    fn test_four_hour_pre_anchor_bar_is_ignored() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 22, 0)));
        assert!(agg.poi(PeriodKind::FourHour, true).is_none());
    }

    #[test]
    fn test_stale_block_bar_does_not_roll_backwards() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(6, 3, 5)));
        let live_start = agg.poi(PeriodKind::FourHour, true).unwrap().period_start();

        // Late bar for the already-superseded first block
        agg.ingest_bar(&bar(at(5, 23, 30)));
        assert_eq!(
            agg.poi(PeriodKind::FourHour, true).unwrap().period_start(),
            live_start
        );
    }

    #[test]
    fn test_bar_before_period_start_is_skipped() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 20, 0)));

        assert!(!agg.poi(PeriodKind::Daily, true).unwrap().is_initialized());
    }

    #[test]
    fn test_clear_drops_everything() {
        let agg = InstrumentAggregator::new();
        agg.set_session_start(at(5, 23, 0));
        agg.ingest_bar(&bar(at(5, 23, 5)));
        assert!(!agg.initialized_periods().is_empty());

        agg.clear();

        assert!(agg.initialized_periods().is_empty());
        assert_eq!(agg.last_session_start(), None);
    }
}
