//! Slot-pooled graph dispatcher.
//!
//! A [`GraphDispatcher`] owns a fixed collection of pre-built graph
//! instances ("slots") and multiplexes incoming sessions across them. One
//! session occupies one slot for exactly one round; producers are
//! backpressured (or refused, under `nowait`) when every slot is busy.

mod pool;

pub use pool::IndexPool;

use parking_lot::Mutex;
use sluice_core::{Dispatcher, Graph, Result, Session, SluiceError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

struct Slot {
    graph: Arc<Graph>,
    /// The round thread currently or last associated with this slot.
    /// At most one is alive at a time; the pool only hands the slot out
    /// again after the previous round released it.
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Dispatches sessions across a pool of pre-built graph instances.
pub struct GraphDispatcher {
    slots: Vec<Slot>,
    pool: Arc<IndexPool>,
}

impl Default for GraphDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphDispatcher {
    /// An empty dispatcher. Register slots with
    /// [`add_graph`](GraphDispatcher::add_graph).
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            pool: Arc::new(IndexPool::new(0)),
        }
    }

    /// Register one pre-built graph as a managed slot; returns its index.
    pub fn add_graph(&mut self, graph: Graph) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot {
            graph: Arc::new(graph),
            worker: Mutex::new(None),
        });
        self.pool.resize(self.slots.len());
        index
    }

    /// Number of registered slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The graph instance behind a slot, if the index is valid.
    pub fn graph(&self, index: usize) -> Option<&Arc<Graph>> {
        self.slots.get(index).map(|slot| &slot.graph)
    }

    /// Wait for every in-flight round to finish.
    pub fn shutdown(&self) {
        for slot in &self.slots {
            if let Some(handle) = slot.worker.lock().take() {
                let _ = handle.join();
            }
        }
    }
}

impl Dispatcher for GraphDispatcher {
    fn dispatch(&self, session: Session, nowait: bool) -> Result<bool> {
        let Some(index) = self.pool.get(nowait) else {
            return Ok(false);
        };
        let slot = &self.slots[index];

        // Reclaim the finished round thread that released this slot.
        if let Some(handle) = slot.worker.lock().take() {
            let _ = handle.join();
        }

        debug!(graph = %slot.graph.name(), slot = index, "dispatching session");
        let graph = Arc::clone(&slot.graph);
        let pool = Arc::clone(&self.pool);
        let thread_name = format!("sluice-slot-{index}");
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_round(&graph, session, &pool, index))
            .map_err(|err| {
                // The slot must not leak if the thread never started.
                self.pool.put(index);
                SluiceError::Spawn {
                    name: thread_name,
                    cause: err.to_string(),
                }
            })?;
        *slot.worker.lock() = Some(handle);
        Ok(true)
    }
}

impl Drop for GraphDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One full round on one slot: reset, initialize, execute, finalize,
/// reset, release. A failed round is logged and the slot still comes back
/// clean; the error aborts only this round.
fn run_round(graph: &Graph, session: Session, pool: &IndexPool, index: usize) {
    graph.reset();
    let result = (|| -> Result<()> {
        if let Some(initializer) = session.initializer {
            initializer(graph)?;
        }
        graph.exec()?;
        if let Some(finalizer) = session.finalizer {
            finalizer(graph)?;
        }
        Ok(())
    })();
    if let Err(err) = result {
        error!(graph = %graph.name(), slot = index, error = %err, "round failed");
    }
    graph.reset();
    pool.put(index);
}
