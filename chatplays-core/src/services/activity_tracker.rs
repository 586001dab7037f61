//! Sliding-window count of distinct chatters.
//!
//! Repeat commands (`a x5`) are only fun while the room is small, so the
//! repeat suffix is switched off once enough different people are talking.

use std::collections::{HashSet, VecDeque};
use chrono::{DateTime, Duration, Utc};

use chatplays_common::models::SpamAbility;

pub const ACTIVITY_WINDOW_MINUTES: i64 = 10;
pub const REPEAT_GATE_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct ChatterActivityEntry {
    pub participant_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ActivityTracker {
    /// Oldest first; callers feed non-decreasing timestamps.
    entries: VecDeque<ChatterActivityEntry>,
    window: Duration,
    threshold: usize,
}

impl ActivityTracker {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            window,
            threshold,
        }
    }

    /// Notes a message from `participant_id` and returns the distinct chatter
    /// count inside the window ending at `now`.
    pub fn record(&mut self, participant_id: &str, now: DateTime<Utc>) -> usize {
        self.entries.push_back(ChatterActivityEntry {
            participant_id: participant_id.to_string(),
            created_at: now,
        });
        self.evict_expired(now);
        self.unique_chatters(now)
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.entries.front() {
            if now - oldest.created_at > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Distinct chatters inside the window, without evicting anything.
    pub fn unique_chatters(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|e| now - e.created_at <= self.window)
            .map(|e| e.participant_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn gate_open(&self, unique_chatters: usize) -> bool {
        unique_chatters < self.threshold
    }

    pub fn repeats_allowed(&self, now: DateTime<Utc>) -> bool {
        self.gate_open(self.unique_chatters(now))
    }

    pub fn spam_ability(&self, now: DateTime<Utc>) -> SpamAbility {
        let unique_chatters = self.unique_chatters(now);
        SpamAbility {
            enabled: self.gate_open(unique_chatters),
            unique_chatters,
            threshold: self.threshold,
            window_minutes: self.window.num_minutes(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(ACTIVITY_WINDOW_MINUTES), REPEAT_GATE_THRESHOLD)
    }
}
