//! The shared, transferable resource.
//!
//! `ResourceState` is the only shared mutable object in a simulation. The
//! owner lives behind a `parking_lot` mutex whose critical section covers
//! exactly one ownership check plus one mutation. The current owner is also
//! published to an atomic so that readers never take the lock.
//!
//! A use runs to completion inside the critical section, so the resource is
//! busy exactly while the lock is held and no reader can observe a use in
//! progress. There is no separate busy flag to inspect.

use log::trace;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::id::ActorId;

/// Error when an actor acts on the resource without owning it.
///
/// Always recoverable: the caller should re-read the owner and decide again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    /// The caller is not (or no longer) the owner
    #[error("stale ownership: {caller} acted on a resource owned by {owner}")]
    Stale {
        /// Actor that attempted the operation
        caller: ActorId,
        /// Actor that actually owned the resource at that instant
        owner: ActorId,
    },
}

/// Point-in-time view of the resource, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceSnapshot {
    /// Current owner
    pub owner: ActorId,
    /// Number of successful mutations so far
    pub version: u64,
}

/// Usage statistics for a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    /// Successful uses
    pub uses: u64,

    /// Successful ownership transfers
    pub transfers: u64,

    /// Transfers since the most recent use (all transfers if never used)
    pub transfers_since_use: u64,

    /// Operations rejected because the caller was not the owner
    pub stale_rejections: u64,

    /// Number of successful mutations (uses plus transfers)
    pub version: u64,
}

#[derive(Debug)]
struct Cell {
    owner: ActorId,
    version: u64,
}

/// Counters updated inside the critical section and read without it.
#[derive(Debug, Default)]
struct Counters {
    uses: AtomicU64,
    transfers: AtomicU64,
    transfers_since_use: AtomicU64,
    stale_rejections: AtomicU64,
    version: AtomicU64,
}

/// The single shared resource contended by all actors.
#[derive(Debug)]
pub struct ResourceState {
    cell: Mutex<Cell>,

    /// Mirror of `cell.owner`, written only while the lock is held
    published_owner: AtomicU32,

    counters: Counters,
}

/// Create a resource owned by `initial_owner`, ready to be shared.
pub fn create_resource(initial_owner: ActorId) -> Arc<ResourceState> {
    Arc::new(ResourceState::new(initial_owner))
}

impl ResourceState {
    /// Create a resource owned by `initial_owner`
    pub fn new(initial_owner: ActorId) -> Self {
        Self {
            cell: Mutex::new(Cell {
                owner: initial_owner,
                version: 0,
            }),
            published_owner: AtomicU32::new(initial_owner.raw()),
            counters: Counters::default(),
        }
    }

    /// The present owner. Never blocks.
    pub fn current_owner(&self) -> ActorId {
        ActorId::new(self.published_owner.load(Ordering::Acquire))
    }

    /// Use the resource as `actor`.
    ///
    /// Succeeds only if `actor` is the current owner; otherwise returns
    /// false without side effects.
    pub fn try_use(&self, actor: ActorId) -> bool {
        self.try_use_as(actor).is_ok()
    }

    /// Use the resource as `actor`, returning the mutation's sequence number.
    pub fn try_use_as(&self, actor: ActorId) -> Result<u64, OwnershipError> {
        let mut cell = self.cell.lock();
        if cell.owner != actor {
            return Err(self.reject(actor, cell.owner));
        }

        cell.version += 1;
        let version = cell.version;
        self.counters.uses.fetch_add(1, Ordering::SeqCst);
        self.counters.transfers_since_use.store(0, Ordering::SeqCst);
        self.counters.version.store(version, Ordering::SeqCst);

        trace!("Resource used by {} (version {})", actor, version);
        Ok(version)
    }

    /// Move ownership from `from` to `to`.
    ///
    /// Fails (returns false) if `from` is not the current owner, i.e. the
    /// caller is stale. A failed transfer never mutates state.
    pub fn transfer_to(&self, from: ActorId, to: ActorId) -> bool {
        self.try_transfer(from, to).is_ok()
    }

    /// Move ownership from `from` to `to`, returning the mutation's sequence
    /// number.
    ///
    /// Transferring to oneself succeeds without counting as a transfer.
    pub fn try_transfer(&self, from: ActorId, to: ActorId) -> Result<u64, OwnershipError> {
        let mut cell = self.cell.lock();
        if cell.owner != from {
            return Err(self.reject(from, cell.owner));
        }
        if from == to {
            return Ok(cell.version);
        }

        cell.owner = to;
        cell.version += 1;
        let version = cell.version;
        self.published_owner.store(to.raw(), Ordering::Release);
        self.counters.transfers.fetch_add(1, Ordering::SeqCst);
        self.counters
            .transfers_since_use
            .fetch_add(1, Ordering::SeqCst);
        self.counters.version.store(version, Ordering::SeqCst);

        trace!("Resource transferred {} -> {} (version {})", from, to, version);
        Ok(version)
    }

    /// Owner and version, read atomically under the lock.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let cell = self.cell.lock();
        ResourceSnapshot {
            owner: cell.owner,
            version: cell.version,
        }
    }

    /// Usage statistics. Lock-free; individual fields may be from
    /// slightly different instants.
    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            uses: self.counters.uses.load(Ordering::SeqCst),
            transfers: self.counters.transfers.load(Ordering::SeqCst),
            transfers_since_use: self.counters.transfers_since_use.load(Ordering::SeqCst),
            stale_rejections: self.counters.stale_rejections.load(Ordering::SeqCst),
            version: self.counters.version.load(Ordering::SeqCst),
        }
    }

    fn reject(&self, caller: ActorId, owner: ActorId) -> OwnershipError {
        self.counters
            .stale_rejections
            .fetch_add(1, Ordering::Relaxed);
        trace!("Rejected stale caller {} (owner is {})", caller, owner);
        OwnershipError::Stale { caller, owner }
    }
}
