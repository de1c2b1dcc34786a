use std::sync::Arc;

use dashmap::DashMap;
use log::info;

use chronos_core::InstrumentId;

use crate::InstrumentAggregator;

/// Process-wide map from instrument to its aggregation engine
///
/// Explicitly constructed and owned by whichever context wires up
/// producers; there is no hidden global. Clones share the same underlying
/// map, so every producer holding a clone resolves an instrument to the
/// same aggregator.
#[derive(Clone)]
pub struct AggregatorRegistry {
    aggregators: Arc<DashMap<InstrumentId, Arc<InstrumentAggregator>>>,
}

impl AggregatorRegistry {
    pub fn new() -> Self {
        Self {
            aggregators: Arc::new(DashMap::new()),
        }
    }

    /// Get the aggregator for an instrument, creating it on first touch
    ///
    /// Concurrent first-touch for the same instrument observes exactly one
    /// surviving instance; the entry lock makes losers adopt the winner's.
    pub fn get_or_create(&self, instrument_id: impl Into<InstrumentId>) -> Arc<InstrumentAggregator> {
        let id = instrument_id.into();
        self.aggregators
            .entry(id.clone())
            .or_insert_with(|| {
                info!("creating aggregator for {}", id);
                Arc::new(InstrumentAggregator::new())
            })
            .value()
            .clone()
    }

    /// Get the aggregator for an instrument without creating one
    pub fn get(&self, instrument_id: &InstrumentId) -> Option<Arc<InstrumentAggregator>> {
        self.aggregators
            .get(instrument_id)
            .map(|entry| entry.value().clone())
    }

    /// All instruments with an aggregator
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.aggregators.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }

    /// Drop every aggregator (test/administrative use, never the hot path)
    pub fn reset(&self) {
        self.aggregators.clear();
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
