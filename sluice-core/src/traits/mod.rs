//! Core abstractions: dispatching, ingress sources, and factories.

mod factory;
mod ingress;

pub use factory::{IngressFactory, IngressRegistry, OpFactory, OpRegistry, Params};
pub use ingress::{Dispatcher, Ingress};
