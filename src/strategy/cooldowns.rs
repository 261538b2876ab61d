use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named per-symbol cooldowns armed by fills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    ScaleIn,
    ScaleOut,
}

/// An emitted intent still awaiting its fill or reject. While set, the
/// evaluator is blocked for the symbol so a decision cannot be emitted twice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PendingIntent {
    pub intent_id: Uuid,
    pub emitted_at: DateTime<Utc>,
}

/// Cooldown state for one symbol: timed action cooldowns plus the pending
/// intent slot. Lives on the symbol lane, persisted with the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CooldownRegistry {
    expires: HashMap<CooldownKind, DateTime<Utc>>,
    pending: Option<PendingIntent>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` for `secs` starting at `from` (the fill timestamp).
    pub fn arm(&mut self, kind: CooldownKind, from: DateTime<Utc>, secs: u64) {
        self.expires.insert(kind, from + Duration::seconds(secs as i64));
    }

    pub fn active(&self, kind: CooldownKind, now: DateTime<Utc>) -> bool {
        self.expires.get(&kind).is_some_and(|until| now < *until)
    }

    pub fn pending(&self) -> Option<&PendingIntent> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, intent_id: Uuid, emitted_at: DateTime<Utc>) {
        self.pending = Some(PendingIntent {
            intent_id,
            emitted_at,
        });
    }

    /// Clear the pending slot if it belongs to `intent_id`. Returns whether
    /// anything was cleared.
    pub fn clear_pending(&mut self, intent_id: Uuid) -> bool {
        if self.pending.is_some_and(|p| p.intent_id == intent_id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Release a pending intent older than `timeout_secs`. Returns the
    /// released intent id so the caller can count the timeout.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, timeout_secs: u64) -> Option<Uuid> {
        let p = self.pending?;
        if now - p.emitted_at >= Duration::seconds(timeout_secs as i64) {
            self.pending = None;
            Some(p.intent_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_arm_and_expiry() {
        let mut cd = CooldownRegistry::new();
        cd.arm(CooldownKind::ScaleIn, ts(0), 1800);

        assert!(cd.active(CooldownKind::ScaleIn, ts(0)));
        assert!(cd.active(CooldownKind::ScaleIn, ts(1799)));
        assert!(!cd.active(CooldownKind::ScaleIn, ts(1800)));
        assert!(!cd.active(CooldownKind::ScaleOut, ts(0)));
    }

    #[test]
    fn test_pending_lifecycle() {
        let mut cd = CooldownRegistry::new();
        let id = Uuid::new_v4();
        cd.set_pending(id, ts(0));
        assert!(cd.pending().is_some());

        assert!(!cd.clear_pending(Uuid::new_v4()));
        assert!(cd.pending().is_some());

        assert!(cd.clear_pending(id));
        assert!(cd.pending().is_none());
    }

    #[test]
    fn test_pending_timeout() {
        let mut cd = CooldownRegistry::new();
        let id = Uuid::new_v4();
        cd.set_pending(id, ts(0));

        assert_eq!(cd.expire_pending(ts(59), 60), None);
        assert!(cd.pending().is_some());

        assert_eq!(cd.expire_pending(ts(60), 60), Some(id));
        assert!(cd.pending().is_none());
    }
}
