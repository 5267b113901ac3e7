//! `sluice run` - execute a pipeline, wired to stdin/stdout.

use super::standard_registries;
use anyhow::{Context, Result};
use sluice_core::Params;
use sluice_executor::GraphDef;
use std::io::BufRead;
use tracing::info;

pub fn execute(file: &str, graph: Option<&str>, args: Vec<(String, String)>) -> Result<()> {
    let (ops, ingresses, handle) = standard_registries()?;
    let mut def = GraphDef::parse_file(&ops, &ingresses, file)
        .with_context(|| format!("failed to load pipeline definition '{file}'"))?;
    if let Some(graph) = graph {
        def.select_graph(graph)?;
    }

    let params: Params = args.into_iter().collect();
    let mut env = def.build_env(&params)?;
    env.start()?;
    info!(file, "pipeline running; feeding lines from stdin");

    // Print each completed round's output as it arrives. The thread dies
    // with the process once stdin is drained and the pipeline has stopped.
    let _printer = {
        let handle = handle.clone();
        std::thread::spawn(move || {
            while let Ok(output) = handle.recv() {
                println!("{output}");
            }
        })
    };

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.is_empty() {
            continue;
        }
        handle.send(line)?;
    }

    info!("stdin closed; shutting down");
    env.stop();
    handle.unblock();
    env.join();
    Ok(())
}
