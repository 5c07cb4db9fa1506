//! Reconciliation
//!
//! Client-side state machine for submitted target data. Each batch moves
//! `Submitted -> AwaitingServerValidation -> {Confirmed | Denied} ->
//! Reconciled`; the unconfirmed map is the only record of a batch in
//! flight, and removing the batch from it is what guards against applying
//! a confirmation twice.
//!
//! Batch ids come from a wrapping counter that skips ids still in flight.
//! Batches that never hear back are evicted after a timeout, and the
//! oldest goes first when the map is full.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::tag::Tag;
use crate::core::vec2::Vec2;
use super::ledger::{HitMarkerLedger, LedgerConfig, ScreenHitEntry};
use super::messages::ConfirmTargetData;

/// Presentation data for one submitted hit, aligned with its position in
/// the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerEntry {
    /// Screen projection at submission time; `None` when off screen
    pub screen_position: Option<Vec2>,
    /// Hit-zone tag, if the surface carried one
    pub hit_zone: Option<Tag>,
    /// Whether the client drew this hit as a success
    pub show_as_success: bool,
}

/// A submitted batch awaiting its confirm/deny.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnconfirmedBatch {
    /// Correlation id
    pub unique_id: u16,
    /// Trigger pull the batch belongs to
    pub cartridge_id: u32,
    /// Simulation time of submission
    pub submitted_at: f64,
    /// One entry per submitted hit, same order
    pub markers: Vec<MarkerEntry>,
}

/// What applying a `ConfirmTargetData` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No such batch in flight (duplicate, stale or evicted); nothing changed.
    Unknown,
    /// The authority refused the activation; the batch was dropped.
    Denied,
    /// Accepted, but every hit was invalidated; the batch was dropped.
    AllInvalidated,
    /// Accepted; `promoted` entries were added to the confirmed ledger.
    Confirmed {
        /// Entries promoted
        promoted: usize,
    },
}

/// Why a batch left the unconfirmed map without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Older than the configured timeout.
    TimedOut,
    /// Pushed out by a newer batch at capacity.
    Capacity,
}

/// Batches in flight, keyed by id.
#[derive(Debug, Clone)]
pub struct UnconfirmedBatches {
    batches: BTreeMap<u16, UnconfirmedBatch>,
    next_id: u16,
    timeout: f64,
    capacity: usize,
}

impl UnconfirmedBatches {
    /// Empty map using the timeout and capacity from `config`.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            batches: BTreeMap::new(),
            next_id: 0,
            timeout: config.unconfirmed_batch_timeout,
            capacity: config.max_outstanding_batches.clamp(1, usize::from(u16::MAX)),
        }
    }

    /// Next id not currently in flight.
    ///
    /// Monotonic with wraparound; `None` only if all 65536 ids are taken.
    pub fn allocate_id(&mut self) -> Option<u16> {
        for _ in 0..=u16::MAX as u32 {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.batches.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }

    /// Store a batch, evicting the oldest ones if at capacity.
    pub fn insert(&mut self, batch: UnconfirmedBatch) -> Vec<(u16, EvictionReason)> {
        let mut evicted = Vec::new();
        while self.batches.len() >= self.capacity {
            match self.oldest() {
                Some(id) => {
                    self.batches.remove(&id);
                    evicted.push((id, EvictionReason::Capacity));
                }
                None => break,
            }
        }
        self.batches.insert(batch.unique_id, batch);
        evicted
    }

    /// Evict batches submitted more than the timeout before `now`.
    pub fn evict_expired(&mut self, now: f64) -> Vec<(u16, EvictionReason)> {
        let timeout = self.timeout;
        let expired: Vec<u16> = self
            .batches
            .values()
            .filter(|b| now - b.submitted_at > timeout)
            .map(|b| b.unique_id)
            .collect();

        for id in &expired {
            self.batches.remove(id);
        }
        expired.into_iter().map(|id| (id, EvictionReason::TimedOut)).collect()
    }

    /// Remove and return a batch. Each id can be taken once.
    pub fn take(&mut self, unique_id: u16) -> Option<UnconfirmedBatch> {
        self.batches.remove(&unique_id)
    }

    /// Look up a batch without removing it.
    pub fn get(&self, unique_id: u16) -> Option<&UnconfirmedBatch> {
        self.batches.get(&unique_id)
    }

    /// Number of batches in flight.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    fn oldest(&self) -> Option<u16> {
        self.batches
            .values()
            .min_by(|a, b| a.submitted_at.total_cmp(&b.submitted_at))
            .map(|b| b.unique_id)
    }
}

/// Client side of the reconciliation exchange for one controller.
#[derive(Debug, Clone)]
pub struct ReconciliationProtocol {
    unconfirmed: UnconfirmedBatches,
    ledger: HitMarkerLedger,
}

impl ReconciliationProtocol {
    /// Fresh state from `config`.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            unconfirmed: UnconfirmedBatches::new(config),
            ledger: HitMarkerLedger::new(config),
        }
    }

    /// Presentation read model.
    pub fn ledger(&self) -> &HitMarkerLedger {
        &self.ledger
    }

    /// Batches in flight.
    pub fn unconfirmed(&self) -> &UnconfirmedBatches {
        &self.unconfirmed
    }

    /// Reserve an id for a batch about to be submitted.
    pub fn allocate_id(&mut self) -> Option<u16> {
        self.unconfirmed.allocate_id()
    }

    /// Record a submitted batch and draw its predicted markers.
    ///
    /// Only entries shown as success and on screen get a predicted marker.
    pub fn submit(&mut self, batch: UnconfirmedBatch) {
        for marker in &batch.markers {
            if let (true, Some(pos)) = (marker.show_as_success, marker.screen_position) {
                self.ledger.add_predicted(batch.unique_id, pos, marker.hit_zone.clone(), batch.submitted_at);
            }
        }

        for (id, reason) in self.unconfirmed.insert(batch) {
            warn!(unique_id = id, ?reason, "unconfirmed batch evicted");
        }
    }

    /// Apply the authority's decision.
    ///
    /// Unknown ids are a no-op, which makes duplicate delivery harmless.
    pub fn apply_confirmation(&mut self, msg: &ConfirmTargetData, now: f64) -> ReconcileOutcome {
        let Some(batch) = self.unconfirmed.take(msg.unique_id) else {
            debug!(unique_id = msg.unique_id, "confirmation for unknown batch ignored");
            return ReconcileOutcome::Unknown;
        };

        if !msg.success {
            debug!(unique_id = msg.unique_id, "batch denied");
            return ReconcileOutcome::Denied;
        }

        let hit_count = batch.markers.len();
        if msg.invalidated_count(hit_count) >= hit_count {
            debug!(unique_id = msg.unique_id, "every hit invalidated");
            return ReconcileOutcome::AllInvalidated;
        }

        let mut promoted = 0;
        for (index, marker) in batch.markers.into_iter().enumerate() {
            if !marker.show_as_success || msg.is_invalidated(index) {
                continue;
            }
            let Some(screen_position) = marker.screen_position else {
                continue;
            };

            let confirmed = self.ledger.confirmed_mut();
            if promoted == 0 {
                confirmed.begin_confirmation(now);
            }
            confirmed.push(ScreenHitEntry { screen_position, hit_zone: marker.hit_zone });
            promoted += 1;
        }

        debug!(unique_id = msg.unique_id, promoted, "batch confirmed");
        ReconcileOutcome::Confirmed { promoted }
    }

    /// Housekeeping: evict stale batches and expire predicted markers.
    pub fn tick(&mut self, now: f64) -> Vec<(u16, EvictionReason)> {
        self.ledger.expire_predicted(now);
        let evicted = self.unconfirmed.evict_expired(now);
        for (id, reason) in &evicted {
            warn!(unique_id = *id, ?reason, "unconfirmed batch evicted");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn marker(x: f32) -> MarkerEntry {
        MarkerEntry {
            screen_position: Some(Vec2::new(x, 0.0)),
            hit_zone: None,
            show_as_success: true,
        }
    }

    fn batch(unique_id: u16, submitted_at: f64, markers: Vec<MarkerEntry>) -> UnconfirmedBatch {
        UnconfirmedBatch { unique_id, cartridge_id: 0, submitted_at, markers }
    }

    fn positions(protocol: &ReconciliationProtocol) -> Vec<f32> {
        protocol
            .ledger()
            .recent_confirmed_hits()
            .iter()
            .map(|e| e.screen_position.x)
            .collect()
    }

    #[test]
    fn test_partial_invalidation_scenario() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(5, 0.0, vec![marker(0.0), marker(1.0), marker(2.0)]));

        let outcome = protocol.apply_confirmation(&ConfirmTargetData::confirm(5, vec![1]), 0.05);
        assert_eq!(outcome, ReconcileOutcome::Confirmed { promoted: 2 });
        assert_eq!(positions(&protocol), vec![0.0, 2.0]);
        assert!(protocol.unconfirmed().get(5).is_none());
    }

    #[test]
    fn test_duplicate_confirmation_is_noop() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(1, 0.0, vec![marker(3.0)]));

        let msg = ConfirmTargetData::confirm(1, vec![]);
        assert_eq!(protocol.apply_confirmation(&msg, 0.01), ReconcileOutcome::Confirmed { promoted: 1 });
        assert_eq!(protocol.apply_confirmation(&msg, 0.02), ReconcileOutcome::Unknown);
        assert_eq!(positions(&protocol), vec![3.0]);
    }

    #[test]
    fn test_denied_promotes_nothing() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(2, 0.0, vec![marker(1.0)]));

        assert_eq!(protocol.apply_confirmation(&ConfirmTargetData::deny(2), 0.01), ReconcileOutcome::Denied);
        assert!(protocol.ledger().recent_confirmed_hits().is_empty());
        assert!(protocol.unconfirmed().is_empty());
        // The predicted marker keeps its own lifetime
        assert_eq!(protocol.ledger().predicted_markers(0.01).count(), 1);
    }

    #[test]
    fn test_all_invalidated_promotes_nothing() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(3, 0.0, vec![marker(1.0), marker(2.0)]));

        let outcome = protocol.apply_confirmation(&ConfirmTargetData::confirm(3, vec![1, 0, 1]), 0.01);
        assert_eq!(outcome, ReconcileOutcome::AllInvalidated);
        assert!(protocol.ledger().time_since_last_confirmation(0.02).is_none());
    }

    #[test]
    fn test_non_success_and_offscreen_not_promoted() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        let wall = MarkerEntry { show_as_success: false, ..marker(1.0) };
        let offscreen = MarkerEntry { screen_position: None, ..marker(2.0) };
        protocol.submit(batch(4, 0.0, vec![wall, offscreen, marker(3.0)]));

        let outcome = protocol.apply_confirmation(&ConfirmTargetData::confirm(4, vec![]), 0.01);
        assert_eq!(outcome, ReconcileOutcome::Confirmed { promoted: 1 });
        assert_eq!(positions(&protocol), vec![3.0]);
        assert_eq!(protocol.ledger().predicted_markers(0.0).count(), 1);
    }

    #[test]
    fn test_out_of_order_confirmations() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(0, 0.0, vec![marker(0.0)]));
        protocol.submit(batch(1, 0.01, vec![marker(1.0)]));

        protocol.apply_confirmation(&ConfirmTargetData::confirm(1, vec![]), 0.05);
        protocol.apply_confirmation(&ConfirmTargetData::confirm(0, vec![]), 0.06);
        assert_eq!(positions(&protocol), vec![1.0, 0.0]);
    }

    #[test]
    fn test_allocator_skips_outstanding_ids() {
        let config = LedgerConfig::default();
        let mut batches = UnconfirmedBatches::new(&config);

        let a = batches.allocate_id().unwrap();
        batches.insert(batch(a, 0.0, vec![]));
        let b = batches.allocate_id().unwrap();
        batches.insert(batch(b, 0.0, vec![]));
        assert_ne!(a, b);

        // Out-of-order confirmation frees `a`; the counter does not reuse it
        batches.take(a);
        let c = batches.allocate_id().unwrap();
        assert_ne!(c, b);
        assert_eq!(c, 2);
    }

    #[test]
    fn test_allocator_wraps() {
        let mut batches = UnconfirmedBatches::new(&LedgerConfig::default());
        batches.next_id = u16::MAX;
        batches.insert(batch(0, 0.0, vec![]));

        assert_eq!(batches.allocate_id(), Some(u16::MAX));
        // 0 is still in flight
        assert_eq!(batches.allocate_id(), Some(1));
    }

    #[test]
    fn test_timeout_eviction() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        protocol.submit(batch(7, 0.0, vec![marker(1.0)]));
        protocol.submit(batch(8, 4.0, vec![marker(1.0)]));

        let evicted = protocol.tick(5.5);
        assert_eq!(evicted, vec![(7, EvictionReason::TimedOut)]);
        assert_eq!(
            protocol.apply_confirmation(&ConfirmTargetData::confirm(7, vec![]), 5.6),
            ReconcileOutcome::Unknown
        );
        assert!(protocol.unconfirmed().get(8).is_some());
    }

    #[test]
    fn test_capacity_eviction() {
        let config = LedgerConfig { max_outstanding_batches: 2, ..LedgerConfig::default() };
        let mut batches = UnconfirmedBatches::new(&config);
        batches.insert(batch(10, 1.0, vec![]));
        batches.insert(batch(11, 0.5, vec![]));

        let evicted = batches.insert(batch(12, 2.0, vec![]));
        assert_eq!(evicted, vec![(11, EvictionReason::Capacity)]);
        assert_eq!(batches.len(), 2);
    }

    proptest! {
        #[test]
        fn test_redelivery_is_idempotent(
            invalid in proptest::collection::vec(0u8..6, 0..6),
            success in any::<bool>(),
            copies in 1usize..5,
        ) {
            let markers: Vec<_> = (0..4).map(|i| marker(i as f32)).collect();
            let msg = ConfirmTargetData { unique_id: 9, success, invalidated_indices: invalid };

            let mut once = ReconciliationProtocol::new(&LedgerConfig::default());
            once.submit(batch(9, 0.0, markers.clone()));
            once.apply_confirmation(&msg, 0.01);

            let mut many = ReconciliationProtocol::new(&LedgerConfig::default());
            many.submit(batch(9, 0.0, markers));
            for _ in 0..copies {
                many.apply_confirmation(&msg, 0.01);
            }

            prop_assert_eq!(once.ledger().recent_confirmed_hits(), many.ledger().recent_confirmed_hits());
            prop_assert_eq!(once.unconfirmed().len(), many.unconfirmed().len());
        }

        #[test]
        fn test_confirmations_outside_window_never_mix(gap in 0.1001f64..2.0) {
            let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
            protocol.submit(batch(1, 0.0, vec![marker(1.0)]));
            protocol.submit(batch(2, 0.0, vec![marker(2.0)]));

            protocol.apply_confirmation(&ConfirmTargetData::confirm(1, vec![]), 0.1);
            protocol.apply_confirmation(&ConfirmTargetData::confirm(2, vec![]), 0.1 + gap);
            prop_assert_eq!(positions(&protocol), vec![2.0]);
        }

        #[test]
        fn test_chained_confirmations_never_mix_across_window(
            first_gap in 0.01f64..0.095,
            second_gap in 0.01f64..0.095,
        ) {
            prop_assume!(first_gap + second_gap > 0.1001);

            let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
            for id in 1..=3u16 {
                protocol.submit(batch(id, 0.0, vec![marker(f32::from(id))]));
            }

            protocol.apply_confirmation(&ConfirmTargetData::confirm(1, vec![]), 0.2);
            protocol.apply_confirmation(&ConfirmTargetData::confirm(2, vec![]), 0.2 + first_gap);
            protocol.apply_confirmation(&ConfirmTargetData::confirm(3, vec![]), 0.2 + first_gap + second_gap);
            prop_assert_eq!(positions(&protocol), vec![2.0, 3.0]);
        }
    }

    #[test]
    fn test_chained_confirmations_scenario() {
        let mut protocol = ReconciliationProtocol::new(&LedgerConfig::default());
        for id in 1..=3u16 {
            protocol.submit(batch(id, 0.0, vec![marker(f32::from(id))]));
        }

        protocol.apply_confirmation(&ConfirmTargetData::confirm(1, vec![]), 0.0);
        protocol.apply_confirmation(&ConfirmTargetData::confirm(2, vec![]), 0.08);
        protocol.apply_confirmation(&ConfirmTargetData::confirm(3, vec![]), 0.16);
        assert_eq!(positions(&protocol), vec![2.0, 3.0]);
    }
}
