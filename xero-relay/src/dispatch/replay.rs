//! Replay protection hook.
//!
//! Xero puts a random `entropy` value and event sequence numbers in every
//! delivery. Whether a repeated delivery should be dropped depends on the
//! deployment, so the check is pluggable and off by default.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::warn;

use crate::config::{Config, ReplayMode};
use crate::dispatch::event::EventBatch;

/// Decision for one authenticated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayDecision {
    Fresh,
    Replayed { reason: String },
}

/// Decides whether an authenticated batch was already delivered.
pub trait ReplayGuard: Send + Sync {
    fn check(&self, batch: &EventBatch) -> ReplayDecision;
}

/// Accepts every batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReplayCheck;

impl ReplayGuard for NoReplayCheck {
    fn check(&self, _batch: &EventBatch) -> ReplayDecision {
        ReplayDecision::Fresh
    }
}

/// Remembers the last `capacity` entropy values and flags repeats.
///
/// Memory is per process; a restart or a second instance forgets
/// everything seen so far.
#[derive(Debug)]
pub struct EntropyReplayGuard {
    capacity: usize,
    seen: Mutex<SeenWindow>,
}

#[derive(Debug, Default)]
struct SeenWindow {
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl EntropyReplayGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: Mutex::new(SeenWindow::default()),
        }
    }
}

impl ReplayGuard for EntropyReplayGuard {
    fn check(&self, batch: &EventBatch) -> ReplayDecision {
        if batch.entropy.is_empty() {
            return ReplayDecision::Fresh;
        }

        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if seen.set.contains(&batch.entropy) {
            warn!(
                entropy = %batch.entropy,
                first_event_sequence = batch.first_event_sequence,
                last_event_sequence = batch.last_event_sequence,
                "xero_replay_detected"
            );
            return ReplayDecision::Replayed {
                reason: format!("entropy {} already processed", batch.entropy),
            };
        }

        seen.set.insert(batch.entropy.clone());
        seen.order.push_back(batch.entropy.clone());
        while seen.order.len() > self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.set.remove(&oldest);
            }
        }

        ReplayDecision::Fresh
    }
}

/// Build the guard selected by configuration.
pub fn guard_from_config(config: &Config) -> Box<dyn ReplayGuard> {
    match config.replay_mode {
        ReplayMode::None => Box::new(NoReplayCheck),
        ReplayMode::Entropy => Box::new(EntropyReplayGuard::new(config.replay_window)),
    }
}
