//! Generations and the per-module update sequencer.
//!
//! A [`Generation`] is an immutable snapshot of a module's metadata state:
//! tables, heaps and patch table after N applied deltas. Generation 0 is the
//! baseline produced at load; each committed update appends exactly one more.
//! History is forward-only: a committed generation can never be uncommitted,
//! and "rollback" means applying a further corrective delta.
//!
//! The [`GenerationSequencer`] owns the only mutable shared state of a module:
//! the list of published generations and the index of the current one. The
//! list is an append-only [`boxcar::Vec`], so readers index into it without a
//! lock; the current index is published with a single release store and read
//! with acquire loads, which is the atomicity point of the whole engine. A
//! reader observes either the state consistent with generation N-1 or with N,
//! never a mixture.
//!
//! Writers are serialized by a try-lock: at most one [`UpdateTicket`] exists
//! per module at a time, and a concurrent `begin_update` reports
//! [`Error::Busy`] instead of blocking.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, TryLockError,
};

use crate::{
    metadata::{heaps::HeapSet, patch::PatchTable, tables::TableSet},
    Error, Result,
};

/// One immutable snapshot of a module's metadata and patch state.
#[derive(Debug)]
pub struct Generation {
    /// Generation number: 0 for the baseline, then +1 per committed update.
    pub number: u32,
    /// Table state after this generation's delta.
    pub tables: TableSet,
    /// Heap state after this generation's delta.
    pub heaps: HeapSet,
    /// Method bodies in effect as of this generation.
    pub patches: PatchTable,
}

impl Generation {
    /// The baseline generation 0 for a freshly loaded module.
    #[must_use]
    pub fn baseline(tables: TableSet, heaps: HeapSet) -> Self {
        Generation {
            number: 0,
            tables,
            heaps,
            patches: PatchTable::empty(),
        }
    }
}

/// Exclusive permission to publish the next generation of one module.
///
/// Holding the ticket holds the module's update lock; dropping it without
/// committing aborts the update with no visible effect.
#[derive(Debug)]
pub struct UpdateTicket<'a> {
    #[allow(dead_code)]
    guard: MutexGuard<'a, ()>,
    generation: u32,
}

impl UpdateTicket<'_> {
    /// The generation number this ticket will publish.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Tracks and publishes the generations of one module.
#[derive(Debug)]
pub struct GenerationSequencer {
    /// Serializes updates: at most one ticket outstanding per module.
    update_lock: Mutex<()>,
    /// All published generations, indexed by generation number.
    generations: boxcar::Vec<Arc<Generation>>,
    /// Index of the current generation. Store-release on publish,
    /// load-acquire on read.
    current: AtomicUsize,
}

impl GenerationSequencer {
    /// A sequencer seeded with the baseline generation.
    #[must_use]
    pub fn new(baseline: Generation) -> Self {
        let generations = boxcar::Vec::new();
        generations.push(Arc::new(baseline));
        GenerationSequencer {
            update_lock: Mutex::new(()),
            generations,
            current: AtomicUsize::new(0),
        }
    }

    /// The currently published generation.
    ///
    /// Lock-free; safe to call from any thread at any time, including while an
    /// update is in flight.
    #[must_use]
    pub fn current(&self) -> Arc<Generation> {
        let index = self.current.load(Ordering::Acquire);
        Arc::clone(&self.generations[index])
    }

    /// Number of the currently published generation.
    #[must_use]
    pub fn current_number(&self) -> u32 {
        self.current().number
    }

    /// Begin an update, reserving the next generation number.
    ///
    /// # Errors
    /// [`Error::Busy`] if another update on this module is already in flight.
    /// Callers are expected to retry; the poisoned-lock case is also surfaced
    /// as [`Error::Busy`] since the module state itself is untouched by a
    /// failed updater.
    pub fn begin_update(&self) -> Result<UpdateTicket<'_>> {
        let guard = match self.update_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::Busy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let generation = self.current.load(Ordering::Acquire) as u32 + 1;
        Ok(UpdateTicket { guard, generation })
    }

    /// Publish `generation`, consuming the ticket.
    ///
    /// This is the single atomic visibility point: after the release store,
    /// every thread that loads the current index observes the complete new
    /// generation.
    ///
    /// # Errors
    /// [`Error::Publish`] if the generation's number does not line up with the
    /// ticket or the published history. Unreachable under the ticket
    /// discipline; it indicates a coordination bug, aborts this update, and
    /// leaves published generations intact.
    pub fn commit(&self, ticket: UpdateTicket<'_>, generation: Generation) -> Result<u32> {
        let number = generation.number;
        if number != ticket.generation() {
            return Err(Error::Publish(format!(
                "ticket reserved generation {}, commit carries {number}",
                ticket.generation()
            )));
        }
        if self.generations.count() != number as usize {
            return Err(Error::Publish(format!(
                "generation {number} does not extend a history of {}",
                self.generations.count()
            )));
        }

        let index = self.generations.push(Arc::new(generation));
        self.current.store(index, Ordering::Release);
        // The ticket's guard drops here, after the new index is visible.
        drop(ticket);
        Ok(number)
    }

    /// Abandon an update with no visible effect.
    ///
    /// Nothing was published, so there is nothing to undo; the reserved
    /// generation number is simply released for the next attempt.
    pub fn abort(&self, ticket: UpdateTicket<'_>) {
        drop(ticket);
    }
}
