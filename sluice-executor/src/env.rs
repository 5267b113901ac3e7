//! Execution environment: the glue owning dispatcher, runner, and the
//! built graphs and ingresses.

use crate::dispatch::GraphDispatcher;
use crate::runner::IngressRunner;
use sluice_core::{Graph, Ingress, Result};
use std::sync::Arc;
use tracing::{info, warn};

enum DispatcherState {
    /// Slots may still be added.
    Building(GraphDispatcher),
    /// Shared with ingress threads; frozen.
    Built(Arc<GraphDispatcher>),
}

/// Owns one pipeline deployment: the graph instances behind the
/// dispatcher's slots, the ingress sources, and the runner driving them.
///
/// Graphs and ingresses are staged with [`add_graph`](ExecEnv::add_graph)
/// / [`add_ingress`](ExecEnv::add_ingress) (typically by
/// [`GraphDef::build_env`](crate::linker::GraphDef::build_env)), then
/// [`build`](ExecEnv::build) wires them together and
/// [`start`](ExecEnv::start) brings the pipeline up.
pub struct ExecEnv {
    staged_graphs: Vec<Graph>,
    staged_ingresses: Vec<Box<dyn Ingress>>,
    dispatcher: DispatcherState,
    runner: IngressRunner,
}

impl ExecEnv {
    /// An empty environment.
    pub fn new() -> Self {
        Self {
            staged_graphs: Vec::new(),
            staged_ingresses: Vec::new(),
            dispatcher: DispatcherState::Building(GraphDispatcher::new()),
            runner: IngressRunner::new(),
        }
    }

    /// Stage a graph instance to become a dispatcher slot.
    pub fn add_graph(&mut self, graph: Graph) {
        self.staged_graphs.push(graph);
    }

    /// Stage an ingress to be driven by the runner.
    pub fn add_ingress(&mut self, ingress: Box<dyn Ingress>) {
        self.staged_ingresses.push(ingress);
    }

    /// Wire every staged graph into the dispatcher and every staged
    /// ingress into the runner. Graphs cannot be added once the
    /// environment has started.
    pub fn build(&mut self) {
        match &mut self.dispatcher {
            DispatcherState::Building(dispatcher) => {
                for graph in self.staged_graphs.drain(..) {
                    dispatcher.add_graph(graph);
                }
            }
            DispatcherState::Built(_) => {
                if !self.staged_graphs.is_empty() {
                    warn!(
                        staged = self.staged_graphs.len(),
                        "graphs staged after start are ignored"
                    );
                    self.staged_graphs.clear();
                }
            }
        }
        for ingress in self.staged_ingresses.drain(..) {
            self.runner.add(ingress);
        }
    }

    /// The dispatcher, once the environment has started.
    pub fn dispatcher(&self) -> Option<&Arc<GraphDispatcher>> {
        match &self.dispatcher {
            DispatcherState::Built(dispatcher) => Some(dispatcher),
            DispatcherState::Building(_) => None,
        }
    }

    /// Build anything still staged, freeze the dispatcher, and start
    /// every ingress thread.
    pub fn start(&mut self) -> Result<()> {
        self.build();
        let state = std::mem::replace(
            &mut self.dispatcher,
            DispatcherState::Building(GraphDispatcher::new()),
        );
        self.dispatcher = match state {
            DispatcherState::Building(dispatcher) => {
                DispatcherState::Built(Arc::new(dispatcher))
            }
            built @ DispatcherState::Built(_) => built,
        };
        let DispatcherState::Built(dispatcher) = &self.dispatcher else {
            unreachable!("dispatcher frozen above");
        };
        info!(
            slots = dispatcher.slot_count(),
            ingresses = self.runner.ingress_count(),
            "execution environment starting"
        );
        self.runner.start(Arc::clone(dispatcher) as Arc<dyn sluice_core::Dispatcher>)
    }

    /// Signal every ingress to stop. Does not wait.
    pub fn stop(&self) {
        self.runner.stop();
    }

    /// Wait for ingress threads to exit, then for in-flight rounds.
    pub fn join(&mut self) {
        self.runner.join();
        if let DispatcherState::Built(dispatcher) = &self.dispatcher {
            dispatcher.shutdown();
        }
        info!("execution environment stopped");
    }

    /// Start and block until the pipeline is stopped and drained.
    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        self.join();
        Ok(())
    }
}

impl Default for ExecEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_freezes_staged_graphs_into_slots() {
        let mut env = ExecEnv::new();
        env.add_graph(Graph::new("a"));
        env.add_graph(Graph::new("b"));
        env.start().unwrap();
        assert_eq!(env.dispatcher().unwrap().slot_count(), 2);
        env.stop();
        env.join();
    }

    #[test]
    fn graphs_staged_after_start_are_ignored() {
        let mut env = ExecEnv::new();
        env.add_graph(Graph::new("a"));
        env.start().unwrap();
        env.add_graph(Graph::new("late"));
        env.build();
        assert_eq!(env.dispatcher().unwrap().slot_count(), 1);
        env.stop();
        env.join();
    }
}
