//! Sessions: the per-round initializer/finalizer pair.

use crate::error::Result;
use crate::graph::Graph;
use std::fmt;

/// A hook applied to a graph immediately before or after one round.
pub type SessionHook = Box<dyn FnOnce(&Graph) -> Result<()> + Send>;

/// One unit of dispatchable work.
///
/// The initializer runs after the slot's graph is reset and before
/// `exec()`, typically to set the round's input variables; the finalizer
/// runs after `exec()` and before the graph is reset again, typically to
/// harvest output variables. Either may be absent.
#[derive(Default)]
pub struct Session {
    /// Sets input variables before the round.
    pub initializer: Option<SessionHook>,
    /// Reads output variables after the round.
    pub finalizer: Option<SessionHook>,
}

impl Session {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initializer hook.
    pub fn with_initializer(
        mut self,
        hook: impl FnOnce(&Graph) -> Result<()> + Send + 'static,
    ) -> Self {
        self.initializer = Some(Box::new(hook));
        self
    }

    /// Set the finalizer hook.
    pub fn with_finalizer(
        mut self,
        hook: impl FnOnce(&Graph) -> Result<()> + Send + 'static,
    ) -> Self {
        self.finalizer = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("initializer", &self.initializer.is_some())
            .field("finalizer", &self.finalizer.is_some())
            .finish()
    }
}
