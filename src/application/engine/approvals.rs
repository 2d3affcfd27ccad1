//! Approval queue for `APPROVAL`-tier decisions.
//!
//! A queued entry holds the full decision; admin approval re-dispatches it
//! with the tier overridden to `Auto`, exactly once. Entries expire after
//! the configured window and a periodic sweeper drops them.

use crate::domain::decision::Decision;
use crate::domain::errors::ApprovalError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub id: String,
    pub description: String,
    pub amount_usd: f64,
    pub decision: Decision,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ApprovalQueue {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a decision for admin approval. Returns the approval id.
    pub fn queue(&self, decision: Decision, expiry: Duration) -> PendingApproval {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        let entry = PendingApproval {
            id: id.clone(),
            description: format!(
                "{} ({}) — {}",
                decision.kind, decision.urgency.as_str(), decision.reasoning
            ),
            amount_usd: decision.estimated_impact_usd,
            decision,
            expires_at: Utc::now() + expiry,
        };
        info!(
            "approval queued [{}]: {} (${:.2})",
            entry.id, entry.description, entry.amount_usd
        );
        self.pending
            .lock()
            .expect("approval lock poisoned")
            .insert(id, entry.clone());
        entry
    }

    /// Take an entry for execution. The entry leaves the queue either way,
    /// so a stored action can never run twice.
    pub fn take(&self, id: &str) -> Result<PendingApproval, ApprovalError> {
        let entry = self
            .pending
            .lock()
            .expect("approval lock poisoned")
            .remove(id)
            .ok_or_else(|| ApprovalError::NotFound { id: id.to_string() })?;

        if entry.expires_at < Utc::now() {
            return Err(ApprovalError::Expired {
                id: id.to_string(),
                expired_at: entry.expires_at.to_rfc3339(),
            });
        }
        Ok(entry)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.pending.lock().expect("approval lock poisoned");
        let before = pending.len();
        pending.retain(|id, entry| {
            let keep = entry.expires_at >= now;
            if !keep {
                debug!("approval [{}] expired unexecuted", id);
            }
            keep
        });
        before - pending.len()
    }

    pub fn list(&self) -> Vec<PendingApproval> {
        let mut entries: Vec<PendingApproval> = self
            .pending
            .lock()
            .expect("approval lock poisoned")
            .values()
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.expires_at);
        entries
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("approval lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
