//! Hit Marker Ledger
//!
//! Presentation-facing bookkeeping of hit markers:
//! - predicted markers, drawn the moment a shot is simulated locally and
//!   expiring on their own cosmetic timer
//! - the confirmed ledger, holding only hits from the most recent volley
//!
//! The two are independent. Confirmation never touches a predicted marker;
//! it only adds to the confirmed ledger.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::tag::Tag;
use crate::core::vec2::Vec2;

/// Timing and capacity knobs for hit-marker bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Confirmations further apart than this (seconds) do not share the
    /// confirmed ledger.
    pub confirmed_window: f64,
    /// Cosmetic lifetime of a predicted marker (seconds).
    pub predicted_marker_lifetime: f64,
    /// Unconfirmed batches older than this (seconds) are evicted.
    pub unconfirmed_batch_timeout: f64,
    /// Most unconfirmed batches held at once; the oldest goes first.
    pub max_outstanding_batches: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            confirmed_window: 0.1,
            predicted_marker_lifetime: 0.4,
            unconfirmed_batch_timeout: 5.0,
            max_outstanding_batches: 64,
        }
    }
}

/// Rolling window of confirmed entries.
///
/// Generic over the entry so the client can keep screen positions while the
/// authority mirrors world-space hits. Each entry remembers the confirmation
/// that added it and leaves once that confirmation falls outside the window.
#[derive(Debug, Clone)]
pub struct ConfirmedHitLedger<T> {
    entries: Vec<T>,
    confirmed_at: Vec<f64>,
    last_confirmation: Option<f64>,
    window: f64,
}

impl<T> ConfirmedHitLedger<T> {
    /// Empty ledger with the given window (seconds).
    pub fn new(window: f64) -> Self {
        Self { entries: Vec::new(), confirmed_at: Vec::new(), last_confirmation: None, window }
    }

    /// Start a confirmation at `now`.
    ///
    /// Drops every entry confirmed more than the window before `now`, then
    /// resets the recency clock.
    pub fn begin_confirmation(&mut self, now: f64) {
        let window = self.window;
        let mut keep = self.confirmed_at.iter().map(|&at| now - at <= window);
        self.entries.retain(|_| keep.next().unwrap_or(false));
        self.confirmed_at.retain(|&at| now - at <= window);
        self.last_confirmation = Some(now);
    }

    /// Append an entry to the current volley.
    pub fn push(&mut self, entry: T) {
        // Outside a confirmation the entry is stale on the next one
        let at = self.last_confirmation.unwrap_or(f64::NEG_INFINITY);
        self.entries.push(entry);
        self.confirmed_at.push(at);
    }

    /// Entries of the current volley.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Time since the last confirmation, if there was one.
    pub fn time_since_last_confirmation(&self, now: f64) -> Option<Duration> {
        self.last_confirmation
            .and_then(|last| Duration::try_from_secs_f64((now - last).max(0.0)).ok())
    }
}

/// A confirmed hit as presentation code sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenHitEntry {
    /// Screen position computed when the shot was submitted
    pub screen_position: Vec2,
    /// Hit-zone tag of the struck surface, if any
    pub hit_zone: Option<Tag>,
}

/// A marker drawn before the authority has answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedMarker {
    /// Batch the marker came from
    pub unique_id: u16,
    /// Screen position
    pub screen_position: Vec2,
    /// Hit-zone tag, if any
    pub hit_zone: Option<Tag>,
    /// Simulation time the marker disappears
    pub expires_at: f64,
}

/// Client-side read model for hit markers.
#[derive(Debug, Clone)]
pub struct HitMarkerLedger {
    confirmed: ConfirmedHitLedger<ScreenHitEntry>,
    predicted: Vec<PredictedMarker>,
    predicted_lifetime: f64,
}

impl HitMarkerLedger {
    /// Ledger using the windows from `config`.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            confirmed: ConfirmedHitLedger::new(config.confirmed_window),
            predicted: Vec::new(),
            predicted_lifetime: config.predicted_marker_lifetime,
        }
    }

    /// Hits of the most recent confirmed volley.
    pub fn recent_confirmed_hits(&self) -> &[ScreenHitEntry] {
        self.confirmed.entries()
    }

    /// Time since the authority last confirmed a hit.
    pub fn time_since_last_confirmation(&self, now: f64) -> Option<Duration> {
        self.confirmed.time_since_last_confirmation(now)
    }

    /// Predicted markers still on screen at `now`.
    pub fn predicted_markers(&self, now: f64) -> impl Iterator<Item = &PredictedMarker> {
        self.predicted.iter().filter(move |m| m.expires_at > now)
    }

    /// Drop predicted markers whose lifetime is over.
    pub fn expire_predicted(&mut self, now: f64) {
        self.predicted.retain(|m| m.expires_at > now);
    }

    pub(crate) fn add_predicted(&mut self, unique_id: u16, screen_position: Vec2, hit_zone: Option<Tag>, now: f64) {
        self.predicted.push(PredictedMarker {
            unique_id,
            screen_position,
            hit_zone,
            expires_at: now + self.predicted_lifetime,
        });
    }

    pub(crate) fn confirmed_mut(&mut self) -> &mut ConfirmedHitLedger<ScreenHitEntry> {
        &mut self.confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(x: f32) -> ScreenHitEntry {
        ScreenHitEntry { screen_position: Vec2::new(x, 0.0), hit_zone: None }
    }

    #[test]
    fn test_window_keeps_close_confirmations() {
        let mut ledger = ConfirmedHitLedger::new(0.1);
        ledger.begin_confirmation(1.0);
        ledger.push(entry(1.0));
        ledger.begin_confirmation(1.05);
        ledger.push(entry(2.0));
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn test_window_clears_stale_confirmations() {
        let mut ledger = ConfirmedHitLedger::new(0.1);
        ledger.begin_confirmation(1.0);
        ledger.push(entry(1.0));
        ledger.begin_confirmation(1.2);
        ledger.push(entry(2.0));
        assert_eq!(ledger.entries(), &[entry(2.0)]);
    }

    #[test]
    fn test_chained_confirmations_expire_per_entry() {
        let mut ledger = ConfirmedHitLedger::new(0.1);
        for (i, now) in [0.0, 0.08, 0.16].into_iter().enumerate() {
            ledger.begin_confirmation(now);
            ledger.push(entry(i as f32 + 1.0));
        }
        // 0.16 is within the window of 0.08 but not of 0.0
        assert_eq!(ledger.entries(), &[entry(2.0), entry(3.0)]);
    }

    #[test]
    fn test_time_since_last_confirmation() {
        let mut ledger: ConfirmedHitLedger<ScreenHitEntry> = ConfirmedHitLedger::new(0.1);
        assert_eq!(ledger.time_since_last_confirmation(3.0), None);

        ledger.begin_confirmation(1.0);
        let elapsed = ledger.time_since_last_confirmation(1.5).unwrap();
        assert!((elapsed.as_secs_f64() - 0.5).abs() < 1.0e-9);
    }

    #[test]
    fn test_predicted_markers_expire() {
        let mut ledger = HitMarkerLedger::new(&LedgerConfig::default());
        ledger.add_predicted(1, Vec2::new(10.0, 10.0), None, 0.0);

        assert_eq!(ledger.predicted_markers(0.3).count(), 1);
        assert_eq!(ledger.predicted_markers(0.5).count(), 0);

        ledger.expire_predicted(0.5);
        assert_eq!(ledger.predicted_markers(0.0).count(), 0);
        assert!(ledger.recent_confirmed_hits().is_empty());
    }
}
