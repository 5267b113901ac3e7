//! Dataflow graph and its activation-counting scheduler.
//!
//! A [`Graph`] is a closed set of named [`Variable`]s and operators with
//! input/output dependency edges. One call to [`Graph::exec`] runs one
//! round: every operator whose inputs become set runs exactly once, on a
//! pool of worker threads, and the round ends when no activated operator
//! is still pending.
//!
//! ## Scheduling
//!
//! Scheduling is push-based, not polling. Each operator carries an
//! activation counter; setting a variable (externally before the round, or
//! as an operator output during it) increments the counter of every
//! consumer, and an operator whose counter reaches its input count is
//! pushed onto the run queue exactly once. Completions are drained on the
//! calling thread, which is the sole writer of activation counters; no
//! per-counter locking is needed.

mod builder;

pub use builder::GraphBuilder;

use crate::error::{Result, SluiceError};
use crate::variable::Variable;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, trace};

/// Worker threads used by [`Graph::exec`].
pub const DEFAULT_CONCURRENCY: usize = 4;

/// An operator body: reads its inputs and sets all of its outputs through
/// the [`Context`], or fails the round with an error.
pub type OpFn = Box<dyn Fn(&mut Context<'_, '_>) -> Result<()> + Send + Sync>;

pub(crate) enum Completion {
    Done(usize),
    Failed(usize, SluiceError),
}

struct Op {
    name: String,
    func: OpFn,
    /// Input variable indices, in declaration order.
    params: Vec<usize>,
    /// Output variable indices, in declaration order.
    results: Vec<usize>,
    /// Inputs set so far this round. Written only by the thread draining
    /// the completion queue.
    activation: AtomicUsize,
}

/// A one-shot completion token for asynchronous operators.
///
/// Obtained from [`Context::defer`]; the operator's round is not complete
/// until [`Done::complete`] is called. Dropping the token without firing
/// it fails the round with [`SluiceError::CompletionDropped`] rather than
/// stalling it forever.
pub struct Done {
    tx: Sender<Completion>,
    op_index: usize,
    op_name: String,
    fired: bool,
}

impl Done {
    /// Signal that the operator has finished and all outputs are set.
    pub fn complete(mut self) {
        self.fired = true;
        let _ = self.tx.send(Completion::Done(self.op_index));
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if !self.fired {
            let _ = self.tx.send(Completion::Failed(
                self.op_index,
                SluiceError::CompletionDropped {
                    op: self.op_name.clone(),
                },
            ));
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").field("op", &self.op_name).finish()
    }
}

/// Per-invocation handle passed to an operator body.
///
/// Gives access to the operator's name and its input/output variables, and
/// to the one-shot [`defer`](Context::defer) capability for asynchronous
/// completion.
pub struct Context<'g, 'd> {
    graph: &'g Graph,
    op: &'g Op,
    done: &'d mut Option<Done>,
}

impl<'g> Context<'g, '_> {
    /// The executing operator's name.
    pub fn name(&self) -> &str {
        &self.op.name
    }

    /// Number of declared input variables.
    pub fn input_count(&self) -> usize {
        self.op.params.len()
    }

    /// Number of declared output variables.
    pub fn output_count(&self) -> usize {
        self.op.results.len()
    }

    /// The input variable at position `at`, in declaration order.
    ///
    /// # Panics
    /// Panics if `at` is out of range, like slice indexing.
    pub fn input(&self, at: usize) -> &'g Variable {
        &self.graph.vars[self.op.params[at]]
    }

    /// The output variable at position `at`, in declaration order.
    ///
    /// # Panics
    /// Panics if `at` is out of range, like slice indexing.
    pub fn output(&self, at: usize) -> &'g Variable {
        &self.graph.vars[self.op.results[at]]
    }

    /// Iterate the input variables in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &'g Variable> + '_ {
        self.op.params.iter().map(|&i| &self.graph.vars[i])
    }

    /// Iterate the output variables in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &'g Variable> + '_ {
        self.op.results.iter().map(|&i| &self.graph.vars[i])
    }

    /// Take the completion token, turning this invocation asynchronous.
    ///
    /// After `defer()` the operator body may return without finishing the
    /// round; the round completes when [`Done::complete`] is called (all
    /// outputs must be set by then). Calling `defer()` a second time fails
    /// with [`SluiceError::DeferAlreadyTaken`]. An operator that has taken
    /// the token must signal completion through it exclusively, not by
    /// returning an error.
    pub fn defer(&mut self) -> Result<Done> {
        self.done.take().ok_or_else(|| SluiceError::DeferAlreadyTaken {
            op: self.op.name.clone(),
        })
    }
}

/// A named dataflow graph: variables, operators, and the reverse
/// dependency index driving activation.
///
/// Graphs are built once (directly, via [`GraphBuilder`], or from a parsed
/// definition) and reused across many rounds via [`reset`](Graph::reset).
pub struct Graph {
    name: String,
    vars: Vec<Variable>,
    var_index: HashMap<String, usize>,
    ops: Vec<Op>,
    op_index: HashMap<String, usize>,
    /// Output variable name -> producing operator name.
    producers: HashMap<String, String>,
    /// Variable index -> indices of operators consuming it.
    var_deps: Vec<Vec<usize>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            var_index: HashMap::new(),
            ops: Vec::new(),
            op_index: HashMap::new(),
            producers: HashMap::new(),
            var_deps: Vec::new(),
        }
    }

    /// The graph's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new variable.
    ///
    /// Fails with [`SluiceError::DuplicateVariable`] if the name is taken.
    pub fn def_var(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.var_index.contains_key(&name) {
            return Err(SluiceError::DuplicateVariable {
                graph: self.name.clone(),
                name,
            });
        }
        let index = self.vars.len();
        self.var_index.insert(name.clone(), index);
        self.vars.push(Variable::new(name));
        self.var_deps.push(Vec::new());
        Ok(())
    }

    /// Register several variables at once.
    pub fn def_vars<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.def_var(name)?;
        }
        Ok(())
    }

    /// Register an operator consuming `inputs` and producing `outputs`.
    ///
    /// All referenced variables must already be defined. Each output
    /// variable may be produced by exactly one operator; a second producer
    /// fails with [`SluiceError::DuplicateProducer`] here, never at
    /// execution time.
    pub fn add_op(
        &mut self,
        name: impl Into<String>,
        inputs: &[&str],
        outputs: &[&str],
        func: OpFn,
    ) -> Result<()> {
        let name = name.into();
        if self.op_index.contains_key(&name) {
            return Err(SluiceError::DuplicateOp {
                graph: self.name.clone(),
                name,
            });
        }

        let mut params = Vec::with_capacity(inputs.len());
        for input in inputs {
            params.push(self.var_position(input)?);
        }
        let mut results = Vec::with_capacity(outputs.len());
        for output in outputs {
            if let Some(owner) = self.producers.get(*output) {
                return Err(SluiceError::DuplicateProducer {
                    var: (*output).to_string(),
                    op: owner.clone(),
                });
            }
            results.push(self.var_position(output)?);
        }
        // producer uniqueness within this op's own output list
        for (i, output) in outputs.iter().enumerate() {
            if outputs[..i].contains(output) {
                return Err(SluiceError::DuplicateProducer {
                    var: (*output).to_string(),
                    op: name,
                });
            }
        }

        let op_idx = self.ops.len();
        for &param in &params {
            self.var_deps[param].push(op_idx);
        }
        for output in outputs {
            self.producers.insert((*output).to_string(), name.clone());
        }
        self.op_index.insert(name.clone(), op_idx);
        self.ops.push(Op {
            name,
            func,
            params,
            results,
            activation: AtomicUsize::new(0),
        });
        Ok(())
    }

    fn var_position(&self, name: &str) -> Result<usize> {
        self.var_index
            .get(name)
            .copied()
            .ok_or_else(|| SluiceError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Look up a variable by name.
    pub fn find_var(&self, name: &str) -> Option<&Variable> {
        self.var_index.get(name).map(|&i| &self.vars[i])
    }

    /// Look up a variable by name, failing with
    /// [`SluiceError::UndefinedVariable`] if unknown.
    pub fn var(&self, name: &str) -> Result<&Variable> {
        self.find_var(name)
            .ok_or_else(|| SluiceError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Iterate all variables in definition order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Number of registered operators.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Clear every variable and every activation counter.
    ///
    /// Must run before each round; safe to call between rounds any number
    /// of times.
    pub fn reset(&self) {
        for var in &self.vars {
            var.clear();
        }
        for op in &self.ops {
            op.activation.store(0, Ordering::Relaxed);
        }
    }

    /// Run one round with [`DEFAULT_CONCURRENCY`] worker threads.
    pub fn exec(&self) -> Result<()> {
        self.exec_with(DEFAULT_CONCURRENCY)
    }

    /// Run one round to completion with `concurrency` worker threads.
    ///
    /// Blocks until every reachable operator has run exactly once. An
    /// operator is reachable when all of its inputs become set, starting
    /// from the variables set before this call. The first operator failure
    /// (or an operator completing without all outputs set) aborts the
    /// round: no further activations are propagated, in-flight operators
    /// are drained, and the error is returned.
    pub fn exec_with(&self, concurrency: usize) -> Result<()> {
        let concurrency = concurrency.max(1);
        debug!(graph = %self.name, concurrency, "round starting");

        let (run_tx, run_rx) = crossbeam_channel::unbounded::<Option<usize>>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<Completion>();

        let result = thread::scope(|scope| {
            for _ in 0..concurrency {
                let run_rx = run_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || self.worker_loop(run_rx, done_tx));
            }

            let mut pending = 0usize;
            for (var_idx, var) in self.vars.iter().enumerate() {
                if var.is_set() {
                    pending += self.activate_consumers(var_idx, &run_tx);
                }
            }

            let mut first_error: Option<SluiceError> = None;
            while pending > 0 {
                let Ok(completion) = done_rx.recv() else {
                    break;
                };
                pending -= 1;
                match completion {
                    Completion::Done(op_idx) => {
                        let op = &self.ops[op_idx];
                        trace!(graph = %self.name, op = %op.name, "operator done");
                        let unset = op
                            .results
                            .iter()
                            .find(|&&var_idx| !self.vars[var_idx].is_set());
                        if let Some(&var_idx) = unset {
                            let err = SluiceError::OutputNotSet {
                                op: op.name.clone(),
                                var: self.vars[var_idx].name().to_string(),
                            };
                            error!(graph = %self.name, error = %err, "round failed");
                            first_error.get_or_insert(err);
                        } else if first_error.is_none() {
                            for &var_idx in &op.results {
                                pending += self.activate_consumers(var_idx, &run_tx);
                            }
                        }
                    }
                    Completion::Failed(op_idx, err) => {
                        error!(
                            graph = %self.name,
                            op = %self.ops[op_idx].name,
                            error = %err,
                            "operator failed"
                        );
                        first_error.get_or_insert(err);
                    }
                }
            }

            for _ in 0..concurrency {
                let _ = run_tx.send(None);
            }
            match first_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        });

        debug!(graph = %self.name, "round finished");
        result
    }

    /// Bump the activation counter of every consumer of `var_idx`,
    /// enqueueing operators that become fully activated. Returns how many
    /// operators were enqueued.
    fn activate_consumers(&self, var_idx: usize, run_tx: &Sender<Option<usize>>) -> usize {
        let mut activated = 0;
        for &op_idx in &self.var_deps[var_idx] {
            let op = &self.ops[op_idx];
            let count = op.activation.fetch_add(1, Ordering::Relaxed) + 1;
            if count == op.params.len() {
                activated += 1;
                let _ = run_tx.send(Some(op_idx));
            }
        }
        activated
    }

    fn worker_loop(&self, run_rx: Receiver<Option<usize>>, done_tx: Sender<Completion>) {
        while let Ok(Some(op_idx)) = run_rx.recv() {
            let op = &self.ops[op_idx];
            trace!(graph = %self.name, op = %op.name, "operator starting");
            let mut done = Some(Done {
                tx: done_tx.clone(),
                op_index: op_idx,
                op_name: op.name.clone(),
                fired: false,
            });
            let mut ctx = Context {
                graph: self,
                op,
                done: &mut done,
            };
            match (op.func)(&mut ctx) {
                Ok(()) => {
                    if let Some(done) = done.take() {
                        done.complete();
                    }
                    // else: deferred; the token signals completion.
                }
                Err(err) => {
                    if done.take().is_some() {
                        let _ = done_tx.send(Completion::Failed(op_idx, err));
                    } else {
                        // The token already owns completion; the error can
                        // only be surfaced in the log.
                        error!(
                            graph = %self.name,
                            op = %op.name,
                            error = %err,
                            "operator failed after deferring completion"
                        );
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("vars", &self.vars.len())
            .field("ops", &self.ops.len())
            .finish()
    }
}
