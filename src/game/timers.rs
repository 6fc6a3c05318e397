//! Scheduled-task queue keyed by (entity, action)
//!
//! Every delayed effect in a match lives here and fires on the match task.

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;
use uuid::Uuid;

/// What a pending timer will do when it fires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Waiting -> Active after the settle delay
    StartMatch,
    /// One second of match countdown
    CountdownTick,
    /// Ended -> Waiting, clearing the arena
    ResetMatch,
    /// Bring an eliminated player back
    RespawnPlayer(Uuid),
    /// Take the special weapon back from its holder
    WeaponExpiry(Uuid),
    RespawnHealthPack(String),
    RespawnSpecialWeapon,
    /// Drop projectile bookkeeping
    ExpireProjectile(Uuid),
}

impl TimerKey {
    /// Player this timer acts on, if any
    pub fn player(&self) -> Option<Uuid> {
        match self {
            TimerKey::RespawnPlayer(id) | TimerKey::WeaponExpiry(id) => Some(*id),
            _ => None,
        }
    }

    /// Timers that belong to a running round and die with it
    pub fn is_round_scoped(&self) -> bool {
        matches!(
            self,
            TimerKey::RespawnPlayer(_)
                | TimerKey::WeaponExpiry(_)
                | TimerKey::RespawnHealthPack(_)
                | TimerKey::RespawnSpecialWeapon
                | TimerKey::ExpireProjectile(_)
        )
    }
}

/// Ordered timer queue. Each key is pending at most once.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<(Instant, u64), TimerKey>,
    pending: HashMap<TimerKey, (Instant, u64)>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `at`. Returns false and leaves the existing
    /// deadline untouched if the key is already pending.
    pub fn schedule(&mut self, key: TimerKey, at: Instant) -> bool {
        if self.pending.contains_key(&key) {
            return false;
        }
        let slot = (at, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(slot, key.clone());
        self.pending.insert(key, slot);
        true
    }

    /// Cancel a pending timer. Returns true if one was removed.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.pending.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer matching `pred`, returning how many
    pub fn cancel_where(&mut self, pred: impl Fn(&TimerKey) -> bool) -> usize {
        let doomed: Vec<TimerKey> = self.pending.keys().filter(|k| pred(k)).cloned().collect();
        for key in &doomed {
            self.cancel(key);
        }
        doomed.len()
    }

    pub fn is_pending(&self, key: &TimerKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn deadline(&self, key: &TimerKey) -> Option<Instant> {
        self.pending.get(key).map(|(at, _)| *at)
    }

    /// Earliest deadline in the queue
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the earliest timer due at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerKey, Instant)> {
        let (&slot, _) = self.queue.iter().next()?;
        if slot.0 > now {
            return None;
        }
        let key = self.queue.remove(&slot)?;
        self.pending.remove(&key);
        Some((key, slot.0))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pops_in_deadline_order() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKey::ResetMatch, now + Duration::from_secs(10));
        scheduler.schedule(TimerKey::StartMatch, now + Duration::from_secs(2));
        scheduler.schedule(TimerKey::CountdownTick, now + Duration::from_secs(2));

        assert_eq!(scheduler.next_deadline(), Some(now + Duration::from_secs(2)));
        assert!(scheduler.pop_due(now).is_none());

        let later = now + Duration::from_secs(5);
        assert_eq!(scheduler.pop_due(later).map(|(k, _)| k), Some(TimerKey::StartMatch));
        assert_eq!(scheduler.pop_due(later).map(|(k, _)| k), Some(TimerKey::CountdownTick));
        assert!(scheduler.pop_due(later).is_none());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_schedule_is_idempotent_per_key() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        assert!(scheduler.schedule(TimerKey::StartMatch, now + Duration::from_secs(2)));
        assert!(!scheduler.schedule(TimerKey::StartMatch, now + Duration::from_secs(5)));
        assert_eq!(
            scheduler.deadline(&TimerKey::StartMatch),
            Some(now + Duration::from_secs(2))
        );
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_cancel_by_player() {
        let now = Instant::now();
        let gone = Uuid::new_v4();
        let stays = Uuid::new_v4();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKey::RespawnPlayer(gone), now);
        scheduler.schedule(TimerKey::WeaponExpiry(gone), now);
        scheduler.schedule(TimerKey::RespawnPlayer(stays), now);

        let removed = scheduler.cancel_where(|k| k.player() == Some(gone));
        assert_eq!(removed, 2);
        assert!(scheduler.is_pending(&TimerKey::RespawnPlayer(stays)));
        assert!(!scheduler.is_pending(&TimerKey::WeaponExpiry(gone)));
        assert_eq!(scheduler.pop_due(now).map(|(k, _)| k), Some(TimerKey::RespawnPlayer(stays)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancelled_key_can_be_rescheduled() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKey::RespawnSpecialWeapon, now + Duration::from_secs(30));
        assert!(scheduler.cancel(&TimerKey::RespawnSpecialWeapon));
        assert!(!scheduler.cancel(&TimerKey::RespawnSpecialWeapon));
        assert!(scheduler.schedule(TimerKey::RespawnSpecialWeapon, now));
        assert_eq!(scheduler.next_deadline(), Some(now));
    }
}
