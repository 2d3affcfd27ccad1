//! Decision cooldown tracking.
//!
//! One tracker for live executions (4-24h windows per strategy) and a
//! separate tracker for dry-run simulations (~2h) so a simulated decision
//! does not spam every cycle while the real cooldown stays untouched.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide cooldown map. Interior-locked; safe to share between the
/// cycle guard and command handlers.
#[derive(Default)]
pub struct CooldownTracker {
    marks: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision of this kind as just executed.
    pub fn mark(&self, key: &str) {
        self.mark_at(key, Utc::now());
    }

    pub fn mark_at(&self, key: &str, at: DateTime<Utc>) {
        self.marks
            .lock()
            .expect("cooldown lock poisoned")
            .insert(key.to_string(), at);
    }

    /// True when the window since the last mark has fully elapsed (or the
    /// key was never marked).
    pub fn is_ready(&self, key: &str, window: Duration, now: DateTime<Utc>) -> bool {
        match self
            .marks
            .lock()
            .expect("cooldown lock poisoned")
            .get(key)
        {
            Some(marked) => now > *marked + window,
            None => true,
        }
    }

    pub fn last_marked(&self, key: &str) -> Option<DateTime<Utc>> {
        self.marks
            .lock()
            .expect("cooldown lock poisoned")
            .get(key)
            .copied()
    }

    pub fn clear(&self, key: &str) {
        self.marks
            .lock()
            .expect("cooldown lock poisoned")
            .remove(key);
    }
}
