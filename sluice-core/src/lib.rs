//! Sluice Core Library
//!
//! This crate provides the foundational types and traits for the Sluice
//! dataflow pipeline engine.
//!
//! # Overview
//!
//! Sluice runs small computation pipelines (graphs of operators that
//! consume and produce named, dynamically-typed variables) with
//! dependency-driven scheduling and a pool of reusable graph instances
//! for bounded-parallelism concurrent execution.
//!
//! # Key Components
//!
//! - **Variable**: a named slot holding at most one typed value per round
//! - **Graph**: variables + operators + the activation-counting scheduler
//! - **Session**: initializer/finalizer callbacks around one round
//! - **Traits**: `Dispatcher`, `Ingress`, and the op/ingress factories
//!
//! # Example
//!
//! ```
//! use sluice_core::prelude::*;
//!
//! let mut graph = Graph::new("double");
//! graph.def_vars(["n", "doubled"])?;
//! graph.add_op(
//!     "double",
//!     &["n"],
//!     &["doubled"],
//!     Box::new(|ctx| {
//!         let n = *ctx.input(0).get::<i64>()?;
//!         ctx.output(0).set(n * 2);
//!         Ok(())
//!     }),
//! )?;
//!
//! graph.var("n")?.set(21i64);
//! graph.exec()?;
//! assert_eq!(*graph.var("doubled")?.get::<i64>()?, 42);
//! # Ok::<(), SluiceError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod prelude;
pub mod session;
pub mod traits;
pub mod variable;

// Re-export key types at crate root for convenience
pub use error::{Result, SluiceError};
pub use graph::{Context, Done, Graph, GraphBuilder, OpFn, DEFAULT_CONCURRENCY};
pub use session::{Session, SessionHook};
pub use traits::{Dispatcher, Ingress, IngressFactory, IngressRegistry, OpFactory, OpRegistry, Params};
pub use variable::Variable;
