//! Dispatcher and ingress abstractions.

use crate::error::Result;
use crate::session::Session;
use tracing::error;

/// Accepts sessions and runs each against some graph instance.
///
/// `dispatch` returns `Ok(true)` if a slot was acquired and the round
/// started, or `Ok(false)` when `nowait` is set and no slot was free;
/// resource exhaustion is a boolean, not an error, so the caller can
/// decide to drop or retry the work item.
pub trait Dispatcher: Send + Sync {
    /// Submit one session. Blocks for a free slot unless `nowait`.
    fn dispatch(&self, session: Session, nowait: bool) -> Result<bool>;
}

/// A source of work: pulls or accepts input from somewhere and turns it
/// into [`Session`]s for a [`Dispatcher`].
///
/// Implementations keep their mutable state behind interior mutability so
/// a runner thread can drive [`run`](Ingress::run) while another thread
/// calls [`stop`](Ingress::stop). Stopping is cooperative: an in-flight
/// blocking receive is not interrupted; a concrete ingress that wants
/// responsive shutdown must arrange to unblock itself (a timeout, a
/// sentinel message, or similar).
pub trait Ingress: Send + Sync {
    /// Instance name, for logs and thread names.
    fn name(&self) -> &str;

    /// The graph variable this ingress feeds.
    fn input_var(&self) -> &str {
        "input"
    }

    /// Produce the next session, or `Ok(None)` when no work is available
    /// right now. Transient failures should be reported as `Ok(None)`,
    /// not as errors.
    fn prepare_session(&self, nowait: bool) -> Result<Option<Session>>;

    /// Receive one unit of work and dispatch it.
    ///
    /// Returns `Ok(true)` only if a session was prepared and a slot
    /// acquired.
    fn recv(&self, dispatcher: &dyn Dispatcher, nowait: bool) -> Result<bool> {
        match self.prepare_session(nowait)? {
            Some(session) => dispatcher.dispatch(session, nowait),
            None => Ok(false),
        }
    }

    /// Receive and dispatch until [`stop`](Ingress::stop) is observed.
    fn run(&self, dispatcher: &dyn Dispatcher) {
        while self.is_running() {
            if let Err(err) = self.recv(dispatcher, false) {
                error!(ingress = %self.name(), error = %err, "ingress receive failed");
            }
        }
    }

    /// Ask the ingress to stop. Takes effect at the next `is_running`
    /// check.
    fn stop(&self);

    /// Whether [`run`](Ingress::run) should keep looping.
    fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingDispatcher {
        accepted: AtomicUsize,
    }

    impl Dispatcher for CountingDispatcher {
        fn dispatch(&self, _session: Session, _nowait: bool) -> Result<bool> {
            self.accepted.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct ScriptedIngress {
        remaining: Mutex<usize>,
        running: AtomicBool,
    }

    impl Ingress for ScriptedIngress {
        fn name(&self) -> &str {
            "scripted"
        }

        fn prepare_session(&self, _nowait: bool) -> Result<Option<Session>> {
            let mut remaining = self.remaining.lock();
            if *remaining == 0 {
                self.stop();
                return Ok(None);
            }
            *remaining -= 1;
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
    fn run_dispatches_until_stopped() {
        let ingress = ScriptedIngress {
            remaining: Mutex::new(3),
            running: AtomicBool::new(true),
        };
        let dispatcher = CountingDispatcher {
            accepted: AtomicUsize::new(0),
        };
        ingress.run(&dispatcher);
        assert_eq!(dispatcher.accepted.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn recv_without_work_is_not_dispatched() {
        let ingress = ScriptedIngress {
            remaining: Mutex::new(0),
            running: AtomicBool::new(true),
        };
        let dispatcher = CountingDispatcher {
            accepted: AtomicUsize::new(0),
        };
        assert!(!ingress.recv(&dispatcher, true).unwrap());
        assert_eq!(dispatcher.accepted.load(Ordering::SeqCst), 0);
    }
}
