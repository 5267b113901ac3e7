//! CLI subcommands.

pub mod check;
pub mod run;

use sluice_core::{IngressRegistry, OpRegistry, Result};
use sluice_ops::{register_default_ops, MemoryHandle, MemoryIngressFactory};

/// The standard registries every subcommand resolves against: the string
/// operators plus one `memory` ingress, whose handle is returned for
/// feeding and collecting.
pub fn standard_registries() -> Result<(OpRegistry, IngressRegistry, MemoryHandle)> {
    let mut ops = OpRegistry::new();
    register_default_ops(&mut ops)?;

    let mut ingresses = IngressRegistry::new();
    let memory = MemoryIngressFactory::new();
    let handle = memory.handle();
    ingresses.register("memory", memory)?;

    Ok((ops, ingresses, handle))
}
