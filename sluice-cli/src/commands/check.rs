//! `sluice check` - validate a pipeline definition.

use super::standard_registries;
use anyhow::{Context, Result};
use sluice_executor::GraphDef;

pub fn execute(file: &str) -> Result<()> {
    let (ops, ingresses, _handle) = standard_registries()?;
    let def = GraphDef::parse_file(&ops, &ingresses, file)
        .with_context(|| format!("validation failed for '{file}'"))?;

    let names = def.graph_names();
    println!(
        "{file}: OK ({} graph{})",
        names.len(),
        if names.len() == 1 { "" } else { "s" }
    );
    for name in names {
        if name.is_empty() {
            println!("  (unnamed)");
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}
