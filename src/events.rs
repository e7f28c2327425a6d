//! Asynchronous delivery of best-block events to the pending pool.
//!
//! Events are pushed onto a bounded queue inside the import critical
//! section and drained by a single worker thread, so delivery order always
//! matches import order and a slow consumer back-pressures the importer
//! instead of growing an unbounded buffer.

use crate::{
    externals::PendingPool,
    primitives::{Receipt, SealedBlock},
};
use std::{
    sync::mpsc::{sync_channel, Receiver, SyncSender},
    thread,
};
use tracing::{debug, trace};

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// An event emitted by the chain core.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// The canonical tip advanced to `block`.
    BestBlock {
        /// The new best block.
        block: SealedBlock,
        /// Receipts of the new best block.
        receipts: Vec<Receipt>,
    },
}

/// Sending side of the event queue, held by the chain core.
///
/// Dropping the last sender shuts the worker down after it drains the
/// queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SyncSender<ChainEvent>,
}

impl EventSender {
    /// Enqueues an event, blocking while the queue is full.
    ///
    /// Returns whether the worker is still alive.
    pub fn send(&self, event: ChainEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Drains [`ChainEvent`]s onto a [`PendingPool`] from a dedicated worker
/// thread.
#[derive(Debug)]
pub struct EventDispatcher {
    worker: Option<thread::JoinHandle<()>>,
}

impl EventDispatcher {
    /// Spawns the worker thread and returns the dispatcher together with
    /// the sender the chain core should use.
    pub fn spawn(
        pool: std::sync::Arc<dyn PendingPool>,
        capacity: usize,
    ) -> (Self, EventSender) {
        let (tx, rx) = sync_channel(capacity);
        let worker = thread::Builder::new()
            .name("chain-events".to_string())
            .spawn(move || run(rx, pool))
            .expect("failed to spawn event dispatch thread");
        (Self { worker: Some(worker) }, EventSender { tx })
    }

    /// Waits for the worker to drain the queue and exit. Call after every
    /// [`EventSender`] clone has been dropped.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run(rx: Receiver<ChainEvent>, pool: std::sync::Arc<dyn PendingPool>) {
    while let Ok(event) = rx.recv() {
        match event {
            ChainEvent::BestBlock { block, receipts } => {
                trace!(
                    target: "chain::events",
                    number = block.number(),
                    hash = %block.hash(),
                    "Delivering best block"
                );
                pool.process_best(&block, &receipts);
            }
        }
    }
    debug!(target: "chain::events", "Event queue closed, dispatch thread exiting");
}
