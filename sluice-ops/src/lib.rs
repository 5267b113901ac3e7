//! Standard operator and ingress factories for Sluice pipelines.
//!
//! Everything here is generic plumbing: string operators for wiring and
//! testing pipelines, and a channel-backed memory ingress for feeding
//! work items from within the process. Domain-specific operators (image
//! handling, model execution, message publishing) live in their own
//! crates and register alongside these.

#![warn(clippy::all)]

pub mod ingress;
pub mod ops;

pub use ingress::{MemoryHandle, MemoryIngress, MemoryIngressFactory};
pub use ops::{AppendFactory, ConstFactory, WrapFactory};

use sluice_core::{OpRegistry, Result};

/// Register the standard operator factories under their default type
/// names (`str.append`, `str.const`).
pub fn register_default_ops(registry: &mut OpRegistry) -> Result<()> {
    registry.register("str.append", AppendFactory)?;
    registry.register("str.const", ConstFactory)?;
    Ok(())
}
