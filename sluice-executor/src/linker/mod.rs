//! The graph definition language.
//!
//! A small textual schema declares graphs, their variables, ingress
//! points, and operators, and binds them to registered factories:
//!
//! ```text
//! # one pipeline: udp datagrams -> decode -> score -> publish
//! graph monitor
//! arg host = localhost
//! in frame = udp use ingress.udp{port:2053}
//! image = decode(frame) use op.decode_image{}
//! score = rate(image) use op.sensitivity{}
//! publish(score) use op.mqtt_pub{topic:alerts}
//! ```
//!
//! [`GraphDef`] runs the full pipeline (tokenize, parse, cross-reference)
//! up front, so every definition error surfaces with a source location
//! before any graph or ingress object exists. The parsed definition can
//! then be instantiated any number of times, parameterized by runtime
//! arguments.

mod parser;
mod resolver;
mod token;

pub use parser::{
    ArgDef, Ast, GraphScheme, IndexedList, IngressDef, OpDef, ParamEntry, Parser, TokenId, VarRef,
    VarUsage,
};
pub use resolver::{Xref, XrefGraph, XrefIngress, XrefOp, XrefVar};
pub use token::{tokenize, Keyword, LiteralKind, Location, Token, TokenKind, Tokenizer};

use crate::env::ExecEnv;
use resolver::build_xref;
use sluice_core::{
    Graph, Ingress, IngressRegistry, OpRegistry, Params, Result, SluiceError,
};
use std::path::Path;
use tracing::debug;

/// A parsed, cross-referenced graph definition bound to a pair of factory
/// registries.
///
/// The first graph in the script is pre-selected; [`select_graph`]
/// (GraphDef::select_graph) switches the default used by
/// [`build_graph`](GraphDef::build_graph),
/// [`build_ingresses`](GraphDef::build_ingresses), and
/// [`build_env`](GraphDef::build_env).
pub struct GraphDef<'r> {
    ops: &'r OpRegistry,
    ingresses: &'r IngressRegistry,
    ast: Ast,
    xref: Xref,
    selected: String,
}

impl<'r> GraphDef<'r> {
    /// Parse and cross-reference a script.
    pub fn parse(
        ops: &'r OpRegistry,
        ingresses: &'r IngressRegistry,
        script: &str,
    ) -> Result<Self> {
        let ast = parser::parse(script)?;
        let xref = build_xref(&ast, ops, ingresses)?;
        let selected = xref
            .graphs
            .iter()
            .next()
            .and_then(|g| ast.graphs.get(g.scheme_index))
            .map(|scheme| scheme.name.clone())
            .unwrap_or_default();
        debug!(graphs = xref.graphs.len(), "definition parsed");
        Ok(Self {
            ops,
            ingresses,
            ast,
            xref,
            selected,
        })
    }

    /// Parse and cross-reference a script file.
    pub fn parse_file(
        ops: &'r OpRegistry,
        ingresses: &'r IngressRegistry,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let script = std::fs::read_to_string(path).map_err(|err| SluiceError::Io {
            path: path.to_path_buf(),
            cause: err.to_string(),
        })?;
        Self::parse(ops, ingresses, &script)
    }

    /// Names of every graph in the definition, in declaration order.
    pub fn graph_names(&self) -> Vec<String> {
        self.ast.graphs.iter().map(|g| g.name.clone()).collect()
    }

    /// Choose the graph that subsequent builds refer to.
    pub fn select_graph(&mut self, name: &str) -> Result<()> {
        if self.xref.graphs.find(name).is_none() {
            return Err(SluiceError::GraphNotFound {
                name: name.to_string(),
            });
        }
        self.selected = name.to_string();
        Ok(())
    }

    /// Build the selected graph, parameterized by runtime arguments.
    pub fn build_graph(&self, args: &Params) -> Result<Graph> {
        self.build_graph_named(&self.selected, args)
    }

    /// Build a graph by name, parameterized by runtime arguments.
    pub fn build_graph_named(&self, name: &str, args: &Params) -> Result<Graph> {
        let xg = self
            .xref
            .graphs
            .find(name)
            .ok_or_else(|| SluiceError::GraphNotFound {
                name: name.to_string(),
            })?;
        let scheme = self
            .ast
            .graphs
            .get(xg.scheme_index)
            .expect("xref indexes into the ast");

        let mut graph = Graph::new(scheme.name.clone());
        for var in xg.vars.iter() {
            graph.def_var(self.ast.text(var.name_tok))?;
        }
        for op in xg.ops.iter() {
            let def = scheme.ops.get(op.def_index).expect("xref indexes the scheme");
            let op_name = self.ast.text(def.name);
            let type_name = self.ast.text(def.factory.expect("validated by xref"));
            let inputs: Vec<&str> = op
                .inputs
                .iter()
                .map(|&position| self.var_name(xg, position))
                .collect();
            let outputs: Vec<&str> = op
                .outputs
                .iter()
                .map(|&position| self.var_name(xg, position))
                .collect();
            let params = self.make_params(scheme, &def.params, args);
            let func = self.ops.create_op(op_name, type_name, &params)?;
            graph.add_op(op_name, &inputs, &outputs, func)?;
        }
        debug!(graph = %graph.name(), ops = graph.op_count(), "graph built");
        Ok(graph)
    }

    /// Instantiate the selected graph's ingresses.
    pub fn build_ingresses(&self, args: &Params) -> Result<Vec<Box<dyn Ingress>>> {
        self.build_ingresses_in_graph(&self.selected, args)
    }

    /// Instantiate a named graph's ingresses.
    pub fn build_ingresses_in_graph(
        &self,
        name: &str,
        args: &Params,
    ) -> Result<Vec<Box<dyn Ingress>>> {
        let xg = self
            .xref
            .graphs
            .find(name)
            .ok_or_else(|| SluiceError::GraphNotFound {
                name: name.to_string(),
            })?;
        let scheme = self
            .ast
            .graphs
            .get(xg.scheme_index)
            .expect("xref indexes into the ast");

        let mut built = Vec::new();
        for ingress in xg.ingresses.iter() {
            let def = scheme
                .ingresses
                .get(ingress.def_index)
                .expect("xref indexes the scheme");
            let ingress_name = self.ast.text(def.name);
            let type_name = self.ast.text(def.factory.expect("validated by xref"));
            let params = self.make_params(scheme, &def.params, args);
            built.push(
                self.ingresses
                    .create_ingress(ingress_name, type_name, &params)?,
            );
        }
        Ok(built)
    }

    /// Build the selected graph and its ingresses into a ready
    /// (but unstarted) execution environment.
    pub fn build_env(&self, args: &Params) -> Result<ExecEnv> {
        let mut env = ExecEnv::new();
        env.add_graph(self.build_graph(args)?);
        for ingress in self.build_ingresses(args)? {
            env.add_ingress(ingress);
        }
        env.build();
        Ok(env)
    }

    fn var_name<'a>(&'a self, xg: &'a XrefGraph, position: usize) -> &'a str {
        let var = xg.vars.get(position).expect("position from xref");
        self.ast.text(var.name_tok)
    }

    /// Merge a declaration's param block with the graph's `arg` defaults
    /// and the runtime arguments.
    ///
    /// Precedence: script-declared values win; runtime arguments override
    /// `arg` defaults and fill keys the script leaves blank or absent. A
    /// script param with an empty value claims the key without overriding
    /// a merged value.
    fn make_params(&self, scheme: &GraphScheme, entries: &[ParamEntry], args: &Params) -> Params {
        let mut merged = Params::new();
        for arg in scheme.args.iter() {
            if let Some(value) = arg.value {
                merged.insert(
                    self.ast.text(arg.name).to_string(),
                    self.ast.text(value).to_string(),
                );
            }
        }
        for (key, value) in args {
            merged.insert(key.clone(), value.clone());
        }
        for entry in entries {
            let key = self.ast.text(entry.key).to_string();
            let value = self.ast.text(entry.value);
            if value.is_empty() {
                merged.entry(key).or_default();
            } else {
                merged.insert(key, value.to_string());
            }
        }
        merged
    }
}
