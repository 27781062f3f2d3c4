//! Year Router: the shared year → queue registry
//!
//! All registry mutation (queue creation, writer registration, reorder
//! buffer, sentinels) happens under one coarse lock, so "does this year
//! exist" and "create it" can never race. Pushing into an existing queue is
//! a lock-free channel send.
//!
//! In ordered mode the reorder buffer is bounded: a batch more than the
//! reorder window ahead of the oldest unrouted batch waits before it is
//! buffered. The oldest batch never waits, so routing always makes progress.

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::types::{QueueItem, RoutedMessage};

/// Reorder window used unless the caller sets one
const DEFAULT_REORDER_WINDOW: u64 = 64;

struct YearQueue {
    sender: Sender<QueueItem>,
    /// Taken by the one writer that registers for this year
    receiver: Option<Receiver<QueueItem>>,
    routed: usize,
}

impl YearQueue {
    fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver: Some(receiver),
            routed: 0,
        }
    }
}

#[derive(Default)]
struct RouterState {
    queues: IndexMap<String, YearQueue>,
    /// Completed batches waiting for an earlier sequence number
    pending: BTreeMap<u64, Vec<RoutedMessage>>,
    next_seq: u64,
    done: bool,
}

/// Routes classified messages into per-year FIFO queues.
///
/// Shared by reference (`Arc`) between workers, writers and the driver.
pub struct YearRouter {
    state: Mutex<RouterState>,
    /// Signalled whenever `next_seq` advances or shutdown begins
    slot_freed: Condvar,
    preserve_order: bool,
    reorder_window: u64,
    /// New years are announced here so a writer can start on them early
    discovered: Mutex<Option<Sender<String>>>,
}

impl YearRouter {
    pub fn new(preserve_order: bool) -> Self {
        Self {
            state: Mutex::new(RouterState::default()),
            slot_freed: Condvar::new(),
            preserve_order,
            reorder_window: DEFAULT_REORDER_WINDOW,
            discovered: Mutex::new(None),
        }
    }

    /// Hold at most `window - 1` completed batches in the reorder buffer
    pub fn with_reorder_window(mut self, window: usize) -> Self {
        self.reorder_window = window.max(1) as u64;
        self
    }

    /// Announce every newly created year on `sender`
    pub fn with_discovery(self, sender: Sender<String>) -> Self {
        *self.lock_discovered() = Some(sender);
        self
    }

    /// Lock registry with poison recovery
    fn lock_state(&self) -> MutexGuard<'_, RouterState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("a thread panicked while routing, recovering year registry");
                poisoned.into_inner()
            }
        }
    }

    fn lock_discovered(&self) -> MutexGuard<'_, Option<Sender<String>>> {
        match self.discovered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Get or create the queue for `year`; call with the registry lock held
    fn queue_for<'a>(&self, state: &'a mut RouterState, year: &str) -> &'a mut YearQueue {
        if !state.queues.contains_key(year) {
            tracing::debug!("discovered year {}", year);
            if state.done {
                tracing::error!("year {} appeared after shutdown was signalled", year);
            }
            if let Some(sender) = self.lock_discovered().as_ref() {
                let _ = sender.send(year.to_string());
            }
        }
        state
            .queues
            .entry(year.to_string())
            .or_insert_with(YearQueue::new)
    }

    /// Append one fragment to `year`'s queue, creating the queue if needed
    pub fn route(&self, year: &str, fragment: String) {
        let sender = {
            let mut state = self.lock_state();
            let queue = self.queue_for(&mut state, year);
            queue.routed += 1;
            queue.sender.clone()
        };
        // The router keeps a receiver alive until a writer takes it
        let _ = sender.send(QueueItem::Message(fragment));
    }

    /// Route every message of one batch, or none of them.
    ///
    /// In ordered mode batches are held back until all batches with a lower
    /// sequence number have been routed. A failed batch must still call this
    /// (with no messages) so its slot is released.
    pub fn route_batch(&self, seq: u64, messages: Vec<RoutedMessage>) {
        if !self.preserve_order {
            let mut state = self.lock_state();
            self.push_all(&mut state, messages);
            return;
        }

        let mut state = self.wait_for_slot(self.lock_state(), seq);
        if seq < state.next_seq || state.pending.contains_key(&seq) {
            tracing::error!("batch {} routed twice, ignoring the repeat", seq);
            return;
        }
        if state.done {
            self.push_all(&mut state, messages);
            return;
        }
        state.pending.insert(seq, messages);

        let before = state.next_seq;
        while let Some(ready) = {
            let next = state.next_seq;
            state.pending.remove(&next)
        } {
            self.push_all(&mut state, ready);
            state.next_seq += 1;
        }
        if state.next_seq != before {
            self.slot_freed.notify_all();
        }
    }

    /// Block while `seq` is outside the reorder window
    fn wait_for_slot<'a>(
        &self,
        mut state: MutexGuard<'a, RouterState>,
        seq: u64,
    ) -> MutexGuard<'a, RouterState> {
        while !state.done && seq >= state.next_seq.saturating_add(self.reorder_window) {
            tracing::trace!("batch {} waits for batch {}", seq, state.next_seq);
            state = match self.slot_freed.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        state
    }

    fn push_all(&self, state: &mut RouterState, messages: Vec<RoutedMessage>) {
        for message in messages {
            let queue = self.queue_for(state, &message.year);
            queue.routed += 1;
            let _ = queue.sender.send(QueueItem::Message(message.markup));
        }
    }

    /// Claim `year`'s queue for writing.
    ///
    /// Creates the queue if it does not exist yet. Returns `None` when a
    /// writer already registered for this year, so repeated calls are safe.
    pub fn register_writer(&self, year: &str) -> Option<Receiver<QueueItem>> {
        let mut state = self.lock_state();
        self.queue_for(&mut state, year).receiver.take()
    }

    /// Push one sentinel into every queue.
    ///
    /// Must only be called after every batch has been routed. Anything
    /// still held in the reorder buffer is released first, in order.
    pub fn signal_done(&self) {
        let mut state = self.lock_state();
        if state.done {
            return;
        }

        if !state.pending.is_empty() {
            tracing::warn!(
                "{} batches still waiting for batch {} at shutdown, releasing them",
                state.pending.len(),
                state.next_seq
            );
            let pending = std::mem::take(&mut state.pending);
            for (_, messages) in pending {
                self.push_all(&mut state, messages);
            }
        }

        state.done = true;
        for (year, queue) in state.queues.iter() {
            tracing::trace!("sending done to {}", year);
            let _ = queue.sender.send(QueueItem::Done);
        }
        drop(state);
        self.slot_freed.notify_all();

        // No more years can appear; writers stop once the job queue drains
        self.lock_discovered().take();
    }

    /// Years seen so far, in discovery order
    pub fn years(&self) -> Vec<String> {
        self.lock_state().queues.keys().cloned().collect()
    }

    /// Messages routed per year, in discovery order
    pub fn routed_counts(&self) -> IndexMap<String, usize> {
        self.lock_state()
            .queues
            .iter()
            .map(|(year, queue)| (year.clone(), queue.routed))
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.lock_state().done
    }

    /// Completed batches held back in the reorder buffer
    pub fn pending_batches(&self) -> usize {
        self.lock_state().pending.len()
    }
}
