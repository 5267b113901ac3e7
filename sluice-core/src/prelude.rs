//! Convenience re-exports for operator and ingress implementors.

pub use crate::error::{Result, SluiceError};
pub use crate::graph::{Context, Done, Graph, GraphBuilder, OpFn};
pub use crate::session::{Session, SessionHook};
pub use crate::traits::{
    Dispatcher, Ingress, IngressFactory, IngressRegistry, OpFactory, OpRegistry, Params,
};
pub use crate::variable::{ValueRef, Variable};
