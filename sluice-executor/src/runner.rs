//! Ingress runner: one thread per ingress source.

use sluice_core::{Dispatcher, Ingress, Result, SluiceError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Owns a collection of ingresses and drives each on its own thread.
///
/// `start` spawns one thread per ingress calling [`Ingress::run`];
/// `stop` signals every ingress cooperatively; `join` waits for the
/// threads to exit. Stopping and joining are separate so a caller can
/// signal shutdown, unblock any ingress stuck in a blocking receive (with
/// whatever mechanism that ingress provides), and only then join.
#[derive(Default)]
pub struct IngressRunner {
    ingresses: Vec<Arc<dyn Ingress>>,
    threads: Vec<JoinHandle<()>>,
}

impl IngressRunner {
    /// An empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ingress to be driven once started.
    pub fn add(&mut self, ingress: Box<dyn Ingress>) {
        self.ingresses.push(Arc::from(ingress));
    }

    /// Number of registered ingresses.
    pub fn ingress_count(&self) -> usize {
        self.ingresses.len()
    }

    /// Spawn one receive loop thread per registered ingress.
    pub fn start(&mut self, dispatcher: Arc<dyn Dispatcher>) -> Result<()> {
        for ingress in &self.ingresses {
            let ingress = Arc::clone(ingress);
            let dispatcher = Arc::clone(&dispatcher);
            let thread_name = format!("sluice-ingress-{}", ingress.name());
            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    info!(ingress = %ingress.name(), "ingress started");
                    ingress.run(dispatcher.as_ref());
                    info!(ingress = %ingress.name(), "ingress stopped");
                })
                .map_err(|err| SluiceError::Spawn {
                    name: thread_name,
                    cause: err.to_string(),
                })?;
            self.threads.push(handle);
        }
        Ok(())
    }

    /// Signal every ingress to stop. Does not wait; see
    /// [`join`](IngressRunner::join).
    pub fn stop(&self) {
        for ingress in &self.ingresses {
            debug!(ingress = %ingress.name(), "stopping ingress");
            ingress.stop();
        }
    }

    /// Wait for all receive loops to exit.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::Session;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullDispatcher;

    impl Dispatcher for NullDispatcher {
        fn dispatch(&self, _session: Session, _nowait: bool) -> Result<bool> {
            Ok(true)
        }
    }

    struct TickingIngress {
        ticks: AtomicUsize,
        running: AtomicBool,
    }

    impl Ingress for TickingIngress {
        fn name(&self) -> &str {
            "ticker"
        }

        fn prepare_session(&self, _nowait: bool) -> Result<Option<Session>> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            Ok(Some(Session::new()))
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn start_stop_join_lifecycle() {
        let mut runner = IngressRunner::new();
        runner.add(Box::new(TickingIngress {
            ticks: AtomicUsize::new(0),
            running: AtomicBool::new(true),
        }));
        assert_eq!(runner.ingress_count(), 1);

        runner.start(Arc::new(NullDispatcher)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        runner.stop();
        runner.join();
    }
}
