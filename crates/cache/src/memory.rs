// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process cache backend for single-node deployments.

use crate::{CacheEntry, CacheError, JobCache, Ticket};
use async_trait::async_trait;
use drover_core::{Clock, JobKey};
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Lease {
    holder: SmolStr,
    expiry_ms: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    /// 0 while the key is only reserved by `open_new_ticket`.
    revision: u64,
    status: SmolStr,
    value: Vec<u8>,
    last_activity_ms: u64,
    lease: Option<Lease>,
}

/// Single-process implementation of [`JobCache`].
pub struct MemoryJobCache<C: Clock> {
    clock: C,
    slots: Mutex<BTreeMap<JobKey, Slot>>,
}

impl<C: Clock> MemoryJobCache<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, slots: Mutex::new(BTreeMap::new()) }
    }

    fn live_lease<'a>(slot: &'a Slot, now_ms: u64) -> Option<&'a Lease> {
        slot.lease.as_ref().filter(|l| l.expiry_ms > now_ms)
    }

    /// A ticket's lease must still be on the slot, unexpired, and at the
    /// revision the holder read.
    fn check_ticket(slot: &Slot, ticket: &Ticket, now_ms: u64) -> Result<(), CacheError> {
        match &slot.lease {
            Some(lease) if lease.holder == ticket.holder => {
                if lease.expiry_ms <= now_ms {
                    return Err(CacheError::LeaseExpired(ticket.key.clone()));
                }
            }
            Some(_) => return Err(CacheError::LeaseConflict(ticket.key.clone())),
            None => return Err(CacheError::LeaseExpired(ticket.key.clone())),
        }
        if slot.revision != ticket.revision {
            return Err(CacheError::Superseded {
                key: ticket.key.clone(),
                held: ticket.revision,
                current: slot.revision,
            });
        }
        Ok(())
    }

    fn entry_of(key: &JobKey, slot: &Slot) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            revision: slot.revision,
            status: slot.status.clone(),
            value: slot.value.clone(),
            last_activity_ms: slot.last_activity_ms,
        }
    }
}

#[async_trait]
impl<C: Clock> JobCache for MemoryJobCache<C> {
    async fn open_new_ticket(&self, key: &JobKey, duration: Duration) -> Result<Ticket, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let expiry_ms = self.clock.deadline_ms(duration);
        let mut slots = self.slots.lock();

        if let Some(slot) = slots.get(key) {
            // A dead reservation (revision 0, lease gone) can be reclaimed.
            if slot.revision > 0 || Self::live_lease(slot, now_ms).is_some() {
                return Err(CacheError::AlreadyExists(key.clone()));
            }
        }

        let holder = SmolStr::new(Uuid::new_v4().to_string());
        slots.insert(
            key.clone(),
            Slot {
                revision: 0,
                status: SmolStr::default(),
                value: Vec::new(),
                last_activity_ms: now_ms,
                lease: Some(Lease { holder: holder.clone(), expiry_ms }),
            },
        );
        Ok(Ticket { key: key.clone(), revision: 0, holder, expiry_ms })
    }

    async fn open_ticket(
        &self,
        key: &JobKey,
        revision: u64,
        duration: Duration,
    ) -> Result<Ticket, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let expiry_ms = self.clock.deadline_ms(duration);
        let mut slots = self.slots.lock();

        let slot = slots
            .get_mut(key)
            .filter(|s| s.revision > 0)
            .ok_or_else(|| CacheError::NotFound(key.clone()))?;
        if Self::live_lease(slot, now_ms).is_some() {
            return Err(CacheError::LeaseConflict(key.clone()));
        }
        if slot.revision != revision {
            return Err(CacheError::Superseded {
                key: key.clone(),
                held: revision,
                current: slot.revision,
            });
        }

        let holder = SmolStr::new(Uuid::new_v4().to_string());
        slot.lease = Some(Lease { holder: holder.clone(), expiry_ms });
        Ok(Ticket { key: key.clone(), revision, holder, expiry_ms })
    }

    async fn close_ticket(&self, ticket: &Ticket) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&ticket.key) else { return };
        let held_here = slot.lease.as_ref().is_some_and(|l| l.holder == ticket.holder);
        if !held_here {
            return;
        }
        slot.lease = None;
        // Abandoned reservation: nothing was ever written at this key.
        if slot.revision == 0 {
            slots.remove(&ticket.key);
        }
    }

    async fn add_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(&ticket.key)
            .ok_or_else(|| CacheError::NotFound(ticket.key.clone()))?;
        Self::check_ticket(slot, ticket, now_ms)?;
        if slot.revision != 0 {
            return Err(CacheError::AlreadyExists(ticket.key.clone()));
        }
        slot.revision = 1;
        slot.status = SmolStr::new(status);
        slot.value = value.to_vec();
        slot.last_activity_ms = now_ms;
        Ok(slot.revision)
    }

    async fn update_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(&ticket.key)
            .filter(|s| s.revision > 0)
            .ok_or_else(|| CacheError::NotFound(ticket.key.clone()))?;
        Self::check_ticket(slot, ticket, now_ms)?;
        slot.revision += 1;
        slot.status = SmolStr::new(status);
        slot.value = value.to_vec();
        slot.last_activity_ms = now_ms;
        Ok(slot.revision)
    }

    async fn remove_entry(&self, ticket: &Ticket) -> Result<(), CacheError> {
        let now_ms = self.clock.epoch_ms();
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(&ticket.key)
            .filter(|s| s.revision > 0)
            .ok_or_else(|| CacheError::NotFound(ticket.key.clone()))?;
        Self::check_ticket(slot, ticket, now_ms)?;
        slots.remove(&ticket.key);
        Ok(())
    }

    async fn get_entry(&self, key: &JobKey) -> Result<Option<CacheEntry>, CacheError> {
        let slots = self.slots.lock();
        Ok(slots.get(key).filter(|s| s.revision > 0).map(|s| Self::entry_of(key, s)))
    }

    async fn get_entry_at(
        &self,
        key: &JobKey,
        revision: u64,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let slots = self.slots.lock();
        Ok(slots
            .get(key)
            .filter(|s| s.revision == revision && revision > 0)
            .map(|s| Self::entry_of(key, s)))
    }

    async fn query_state(&self, statuses: &[&str]) -> Result<Vec<CacheEntry>, CacheError> {
        let slots = self.slots.lock();
        Ok(slots
            .iter()
            .filter(|(_, s)| s.revision > 0 && statuses.contains(&s.status.as_str()))
            .map(|(k, s)| Self::entry_of(k, s))
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
