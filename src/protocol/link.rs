//! Lossy Link
//!
//! Seeded in-process message channel that drops, duplicates and delays
//! messages. Stands in for the network between a firing client and its
//! authority in the demo and in tests, so loss and reordering are
//! reproducible.

use serde::{Serialize, Deserialize};
use crate::core::rng::DeterministicRng;

/// Fault injection knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Probability a message is lost.
    pub drop_probability: f32,
    /// Probability a delivered message arrives twice.
    pub duplicate_probability: f32,
    /// Minimum delivery delay in ticks.
    pub min_delay_ticks: u32,
    /// Maximum delivery delay in ticks.
    pub max_delay_ticks: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.0,
            duplicate_probability: 0.0,
            min_delay_ticks: 1,
            max_delay_ticks: 1,
        }
    }
}

impl LinkConfig {
    /// Perfect link with a fixed one-tick delay.
    pub fn reliable() -> Self {
        Self::default()
    }
}

/// One direction of a lossy channel.
#[derive(Debug, Clone)]
pub struct LossyLink<T> {
    config: LinkConfig,
    rng: DeterministicRng,
    in_flight: Vec<(u64, u64, T)>,
    next_seq: u64,
    sent: u64,
    dropped: u64,
}

impl<T: Clone> LossyLink<T> {
    /// Link with the given faults, seeded for reproducibility.
    pub fn new(config: LinkConfig, seed: u64) -> Self {
        Self {
            config,
            rng: DeterministicRng::new(seed),
            in_flight: Vec::new(),
            next_seq: 0,
            sent: 0,
            dropped: 0,
        }
    }

    /// Send `msg` at tick `now`.
    pub fn send(&mut self, msg: T, now: u64) {
        self.sent += 1;
        if self.rng.next_bool(self.config.drop_probability) {
            self.dropped += 1;
            return;
        }

        let copies = if self.rng.next_bool(self.config.duplicate_probability) { 2 } else { 1 };
        for _ in 0..copies {
            let delay = self.delay();
            self.in_flight.push((now + delay, self.next_seq, msg.clone()));
            self.next_seq += 1;
        }
    }

    /// Messages due at or before tick `now`, in arrival order.
    pub fn poll(&mut self, now: u64) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|(at, _, _)| *at <= now);
        self.in_flight = pending;

        due.sort_by_key(|(at, seq, _)| (*at, *seq));
        due.into_iter().map(|(_, _, msg)| msg).collect()
    }

    /// Messages still in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Messages sent and messages dropped so far.
    pub fn stats(&self) -> (u64, u64) {
        (self.sent, self.dropped)
    }

    fn delay(&mut self) -> u64 {
        let min = self.config.min_delay_ticks.min(self.config.max_delay_ticks);
        let span = self.config.max_delay_ticks.max(min) - min;
        u64::from(min + self.rng.next_int(span + 1))
    }
}
