// src/services/replay_guard.rs
//! Nonce replay protection for DIDWba credentials.
//!
//! Consumed nonces are kept per DID together with the time they were first
//! seen. A `(did, nonce)` pair is rejected for as long as it stays in the
//! table; entries older than the nonce window are purged by an opportunistic
//! cleanup that request traffic triggers at most once per cleanup interval.
//!
//! # Window invariant
//! The nonce window must be longer than the timestamp window. A nonce is only
//! forgotten after any credential carrying it has already gone stale, so a
//! purged nonce cannot be replayed.
//!
//! # Limitations
//! State is per process. Replicas behind a load balancer each keep their own
//! table, so a nonce consumed on one replica is unknown to the others.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

use crate::error::AuthError;
use crate::utils::clock::Clock;

/// Upper bound on records (identities visited plus nonces removed) handled
/// per lock acquisition during cleanup.
const CLEANUP_BATCH_SIZE: usize = 256;

/// Nonces consumed by one DID.
#[derive(Default)]
struct IdentityNonces {
    /// nonce -> first use
    used: HashMap<String, DateTime<Utc>>,
    /// The same records in recording order, oldest first
    order: VecDeque<(DateTime<Utc>, String)>,
}

impl IdentityNonces {
    /// Pops records older than `cutoff` from the front, spending one unit of
    /// `budget` per record.
    ///
    /// # Returns
    /// Records removed, and whether every expired record is gone.
    fn purge(&mut self, cutoff: DateTime<Utc>, budget: &mut usize) -> (usize, bool) {
        let mut removed = 0;
        while let Some(&(used_at, _)) = self.order.front() {
            if used_at >= cutoff {
                return (removed, true);
            }
            if *budget == 0 {
                return (removed, false);
            }
            if let Some((_, nonce)) = self.order.pop_front() {
                self.used.remove(&nonce);
            }
            *budget -= 1;
            removed += 1;
        }
        (removed, true)
    }

    fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

type NonceTable = BTreeMap<String, IdentityNonces>;

/// Per-process table of consumed nonces.
///
/// A single mutex guards the whole table. Check-and-record is one critical
/// section, so two concurrent requests with the same nonce produce exactly one
/// success. Cleanup walks the table in key order with a cursor and releases
/// the lock after at most `CLEANUP_BATCH_SIZE` records, so a single
/// identity with a huge backlog cannot stall recording either.
pub struct ReplayGuard {
    /// DID -> consumed nonces
    nonces: Mutex<NonceTable>,
    /// Time of the last completed (or claimed) purge
    last_cleanup: Mutex<DateTime<Utc>>,
    nonce_ttl: Duration,
    cleanup_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl ReplayGuard {
    /// Creates an empty guard.
    ///
    /// # Arguments
    /// * `nonce_ttl` - How long a consumed nonce is remembered
    /// * `cleanup_interval` - Minimum spacing between opportunistic purges
    /// * `clock` - Time source shared with the rest of the pipeline
    pub fn new(nonce_ttl: Duration, cleanup_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            nonces: Mutex::new(BTreeMap::new()),
            last_cleanup: Mutex::new(now),
            nonce_ttl,
            cleanup_interval,
            clock,
        }
    }

    /// Atomically checks that `nonce` is unused for `did` and records it.
    ///
    /// # Errors
    /// `NonceReused` if the pair is already in the table.
    pub fn verify_and_record(&self, did: &str, nonce: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        let mut table = self.nonces.lock();
        let identity = table.entry(did.to_string()).or_default();

        match identity.used.entry(nonce.to_string()) {
            Entry::Occupied(_) => {
                debug!("Nonce {} has already been used for DID {}", nonce, did);
                Err(AuthError::NonceReused)
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                identity.order.push_back((now, nonce.to_string()));
                Ok(())
            }
        }
    }

    /// Runs [`cleanup`](Self::cleanup) if more than the cleanup interval has
    /// passed since the last purge.
    ///
    /// # Returns
    /// `Some(removed)` when a purge ran, `None` when it was not due.
    pub fn maybe_cleanup(&self) -> Option<usize> {
        let now = self.clock.now();
        {
            let mut last = self.last_cleanup.lock();
            if now - *last <= self.cleanup_interval {
                return None;
            }
            // Claim the run so concurrent requests skip it
            *last = now;
        }
        Some(self.cleanup())
    }

    /// Removes every nonce older than the nonce window and every DID left
    /// without nonces.
    ///
    /// # Returns
    /// Number of nonce records removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let cutoff = now - self.nonce_ttl;

        let mut removed = 0;
        let mut resume = Bound::Unbounded;
        loop {
            let (count, next) = self.purge_batch(resume, cutoff);
            removed += count;
            match next {
                Some(bound) => resume = bound,
                None => break,
            }
        }

        *self.last_cleanup.lock() = now;
        if removed > 0 {
            info!("Cleaned up {} expired nonces", removed);
        } else {
            debug!("Nonce cleanup found nothing to remove");
        }
        removed
    }

    /// One lock hold of cleanup, starting at `resume`.
    ///
    /// # Returns
    /// Records removed, and where the next batch starts (`None` when the walk
    /// reached the end of the table).
    fn purge_batch(
        &self,
        resume: Bound<String>,
        cutoff: DateTime<Utc>,
    ) -> (usize, Option<Bound<String>>) {
        let mut table = self.nonces.lock();
        let mut budget = CLEANUP_BATCH_SIZE;
        let mut removed = 0;
        let mut emptied = Vec::new();
        let mut next = None;

        for (did, identity) in table.range_mut((resume, Bound::Unbounded)) {
            if budget == 0 {
                next = Some(Bound::Included(did.clone()));
                break;
            }
            budget -= 1;

            let (count, done) = identity.purge(cutoff, &mut budget);
            removed += count;
            if identity.is_empty() {
                emptied.push(did.clone());
            }
            if !done {
                next = Some(Bound::Included(did.clone()));
                break;
            }
        }

        for did in emptied {
            table.remove(&did);
        }
        (removed, next)
    }

    /// True if `nonce` is currently recorded for `did`.
    pub fn contains(&self, did: &str, nonce: &str) -> bool {
        self.nonces
            .lock()
            .get(did)
            .map_or(false, |identity| identity.used.contains_key(nonce))
    }

    /// Number of DIDs with at least one recorded nonce.
    pub fn identity_count(&self) -> usize {
        self.nonces.lock().len()
    }

    /// Total number of recorded nonces.
    pub fn len(&self) -> usize {
        self.nonces.lock().values().map(|identity| identity.used.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.lock().is_empty()
    }

    /// Time of the last purge.
    pub fn last_cleanup(&self) -> DateTime<Utc> {
        *self.last_cleanup.lock()
    }
}
