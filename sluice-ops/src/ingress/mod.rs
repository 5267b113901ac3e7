//! In-process memory ingress.
//!
//! Feeds string work items from a channel into a pipeline, and collects
//! one output string per completed round. The counterpart of a socket
//! receiver for tests, benchmarks, and CLI-driven pipelines.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use sluice_core::{
    Ingress, IngressFactory, Params, Result, Session, SluiceError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Injects inputs into, and collects outputs from, the memory ingresses
/// created by one [`MemoryIngressFactory`].
#[derive(Clone)]
pub struct MemoryHandle {
    feed: Sender<String>,
    results: Receiver<String>,
}

impl MemoryHandle {
    /// Queue one input value.
    pub fn send(&self, input: impl Into<String>) -> Result<()> {
        self.feed
            .send(input.into())
            .map_err(|_| SluiceError::ChannelClosed {
                context: "memory ingress feed".to_string(),
            })
    }

    /// Wake a receive loop blocked on an empty feed, e.g. for shutdown.
    ///
    /// The empty string is the wake-up sentinel; it never becomes a
    /// session.
    pub fn unblock(&self) {
        let _ = self.feed.send(String::new());
    }

    /// Wait for the next completed round's output.
    pub fn recv(&self) -> Result<String> {
        self.results.recv().map_err(|_| SluiceError::ChannelClosed {
            context: "memory ingress results".to_string(),
        })
    }

    /// Wait for the next output, up to `timeout`.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<String> {
        self.results
            .recv_timeout(timeout)
            .map_err(|_| SluiceError::ChannelClosed {
                context: "memory ingress results".to_string(),
            })
    }
}

/// A channel-fed ingress.
///
/// Each received string becomes one session: the initializer sets the
/// configured input variable, the finalizer takes the configured output
/// variable and delivers it to the factory's results channel.
pub struct MemoryIngress {
    name: String,
    input_var: String,
    output_var: String,
    feed: Receiver<String>,
    results: Sender<String>,
    running: AtomicBool,
}

impl Ingress for MemoryIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_var(&self) -> &str {
        &self.input_var
    }

    fn prepare_session(&self, nowait: bool) -> Result<Option<Session>> {
        let value = if nowait {
            match self.feed.try_recv() {
                Ok(value) => value,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    self.stop();
                    return Ok(None);
                }
            }
        } else {
            match self.feed.recv() {
                Ok(value) => value,
                Err(_) => {
                    // All handles gone; nothing will ever arrive.
                    self.stop();
                    return Ok(None);
                }
            }
        };
        if value.is_empty() {
            debug!(ingress = %self.name, "wake-up sentinel received");
            return Ok(None);
        }

        let input_var = self.input_var.clone();
        let output_var = self.output_var.clone();
        let results = self.results.clone();
        Ok(Some(
            Session::new()
                .with_initializer(move |graph| {
                    graph.var(&input_var)?.set(value);
                    Ok(())
                })
                .with_finalizer(move |graph| {
                    let output = graph.var(&output_var)?.take::<String>()?;
                    results.send(output).map_err(|_| SluiceError::ChannelClosed {
                        context: "memory ingress results".to_string(),
                    })
                }),
        ))
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Factory for [`MemoryIngress`], type name `memory`.
///
/// All ingresses created by one factory share its feed and results
/// channels; get a [`MemoryHandle`] with
/// [`handle`](MemoryIngressFactory::handle) before moving the factory
/// into a registry.
///
/// Params: `var`, the input variable to set (default `input`), and
/// `out`, the output variable to collect (default `out`).
pub struct MemoryIngressFactory {
    feed_tx: Sender<String>,
    feed_rx: Receiver<String>,
    results_tx: Sender<String>,
    results_rx: Receiver<String>,
}

impl MemoryIngressFactory {
    /// A factory with fresh feed/results channels.
    pub fn new() -> Self {
        let (feed_tx, feed_rx) = unbounded();
        let (results_tx, results_rx) = unbounded();
        Self {
            feed_tx,
            feed_rx,
            results_tx,
            results_rx,
        }
    }

    /// A handle for feeding inputs and collecting outputs.
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            feed: self.feed_tx.clone(),
            results: self.results_rx.clone(),
        }
    }
}

impl Default for MemoryIngressFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl IngressFactory for MemoryIngressFactory {
    fn create_ingress(
        &self,
        name: &str,
        _type_name: &str,
        params: &Params,
    ) -> Result<Box<dyn Ingress>> {
        Ok(Box::new(MemoryIngress {
            name: name.to_string(),
            input_var: params.get("var").cloned().unwrap_or_else(|| "input".into()),
            output_var: params.get("out").cloned().unwrap_or_else(|| "out".into()),
            feed: self.feed_rx.clone(),
            results: self.results_tx.clone(),
            running: AtomicBool::new(true),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::Graph;

    fn ingress_with_handle() -> (Box<dyn Ingress>, MemoryHandle) {
        let factory = MemoryIngressFactory::new();
        let handle = factory.handle();
        let ingress = factory
            .create_ingress("mem", "memory", &Params::new())
            .unwrap();
        (ingress, handle)
    }

    fn echo_graph() -> Graph {
        let mut graph = Graph::new("echo");
        graph.def_vars(["input", "out"]).unwrap();
        graph
            .add_op(
                "echo",
                &["input"],
                &["out"],
                Box::new(|ctx| {
                    let value = ctx.input(0).get::<String>()?.clone();
                    ctx.output(0).set(value);
                    Ok(())
                }),
            )
            .unwrap();
        graph
    }

    #[test]
    fn session_round_trips_through_a_graph() {
        let (ingress, handle) = ingress_with_handle();
        handle.send("hello").unwrap();

        let session = ingress.prepare_session(false).unwrap().unwrap();
        let graph = echo_graph();
        graph.reset();
        (session.initializer.unwrap())(&graph).unwrap();
        graph.exec().unwrap();
        (session.finalizer.unwrap())(&graph).unwrap();

        assert_eq!(handle.recv().unwrap(), "hello");
    }

    #[test]
    fn nowait_without_input_prepares_nothing() {
        let (ingress, _handle) = ingress_with_handle();
        assert!(ingress.prepare_session(true).unwrap().is_none());
    }

    #[test]
    fn sentinel_prepares_nothing() {
        let (ingress, handle) = ingress_with_handle();
        handle.unblock();
        assert!(ingress.prepare_session(false).unwrap().is_none());
        assert!(ingress.is_running());
    }

    #[test]
    fn custom_variable_names() {
        let factory = MemoryIngressFactory::new();
        let handle = factory.handle();
        let mut params = Params::new();
        params.insert("var".to_string(), "frame".to_string());
        params.insert("out".to_string(), "score".to_string());
        let ingress = factory.create_ingress("mem", "memory", &params).unwrap();
        assert_eq!(ingress.input_var(), "frame");

        handle.send("f0").unwrap();
        let session = ingress.prepare_session(false).unwrap().unwrap();

        let mut graph = Graph::new("g");
        graph.def_vars(["frame", "score"]).unwrap();
        graph
            .add_op(
                "rate",
                &["frame"],
                &["score"],
                Box::new(|ctx| {
                    let frame = ctx.input(0).get::<String>()?.clone();
                    ctx.output(0).set(frame + ":0.9");
                    Ok(())
                }),
            )
            .unwrap();
        graph.reset();
        (session.initializer.unwrap())(&graph).unwrap();
        graph.exec().unwrap();
        (session.finalizer.unwrap())(&graph).unwrap();
        assert_eq!(handle.recv().unwrap(), "f0:0.9");
    }
}
