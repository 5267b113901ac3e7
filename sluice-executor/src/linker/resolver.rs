//! Cross-referencer: binds parsed declarations to factories and to each
//! other before anything executable is built.
//!
//! For each graph section this pass resolves factory type names against
//! the registries, assembles the variable table, and enforces the
//! reference rules: an input variable must already exist as an ingress
//! target or an earlier operator's output; an output variable must not
//! already be produced; names may not repeat within one declaration; and
//! an externally-fed variable nothing consumes is an error. All failures
//! carry the source location of the offending token.

use super::parser::{Ast, IndexedList, TokenId, VarUsage};
use super::token::parse_error;
use sluice_core::{IngressRegistry, OpRegistry, Result};
use std::collections::HashSet;

/// A resolved variable: where it was first named and how it is used.
#[derive(Debug)]
pub struct XrefVar {
    /// Token that first introduced the variable.
    pub name_tok: TokenId,
    /// Whether the variable enters the graph from outside (`In`) or is
    /// produced by an operator (`Out`).
    pub usage: VarUsage,
    /// How many operators consume it.
    pub consumers: usize,
    /// How many ingresses feed it.
    pub feeders: usize,
}

/// A resolved operator: its declaration plus variable-table positions.
#[derive(Debug)]
pub struct XrefOp {
    /// Position of the declaration in the scheme's op list.
    pub def_index: usize,
    /// Input positions in the graph's variable table.
    pub inputs: Vec<usize>,
    /// Output positions in the graph's variable table.
    pub outputs: Vec<usize>,
}

/// A resolved ingress: its declaration plus variable-table positions.
#[derive(Debug)]
pub struct XrefIngress {
    /// Position of the declaration in the scheme's ingress list.
    pub def_index: usize,
    /// Target positions in the graph's variable table.
    pub inputs: Vec<usize>,
}

/// One graph's cross-reference tables.
#[derive(Debug)]
pub struct XrefGraph {
    /// Position of the scheme in the AST's graph list.
    pub scheme_index: usize,
    /// Every variable, in first-mention order.
    pub vars: IndexedList<XrefVar>,
    /// Every ingress, in declaration order.
    pub ingresses: IndexedList<XrefIngress>,
    /// Every operator, in declaration order.
    pub ops: IndexedList<XrefOp>,
}

/// Cross-reference tables for every graph in a parsed script.
#[derive(Debug, Default)]
pub struct Xref {
    /// Graphs in declaration order.
    pub graphs: IndexedList<XrefGraph>,
}

/// Resolve a parsed script against the factory registries.
pub fn build_xref(ast: &Ast, ops: &OpRegistry, ingresses: &IngressRegistry) -> Result<Xref> {
    let mut xref = Xref::default();
    for (scheme_index, scheme) in ast.graphs.iter().enumerate() {
        let mut graph = XrefGraph {
            scheme_index,
            vars: IndexedList::new(),
            ingresses: IndexedList::new(),
            ops: IndexedList::new(),
        };
        build_graph_refs(ast, ops, ingresses, &mut graph)?;
        xref.graphs.add(scheme.name.clone(), graph);
    }
    Ok(xref)
}

fn build_graph_refs(
    ast: &Ast,
    ops: &OpRegistry,
    ingresses: &IngressRegistry,
    xg: &mut XrefGraph,
) -> Result<()> {
    let scheme = ast
        .graphs
        .get(xg.scheme_index)
        .expect("scheme index produced by enumeration");

    for (def_index, def) in scheme.ingresses.iter().enumerate() {
        let factory_tok = def.factory.expect("parser guarantees a factory token");
        let type_name = ast.text(factory_tok);
        if ingresses.get(type_name).is_none() {
            return Err(parse_error(
                ast.loc(factory_tok),
                format!("ingress type not found: {type_name}"),
            ));
        }

        let mut entry = XrefIngress {
            def_index,
            inputs: Vec::new(),
        };
        let mut seen = HashSet::new();
        for var in &def.inputs {
            let name = ast.text(var.name);
            if !seen.insert(name.to_string()) {
                return Err(parse_error(
                    ast.loc(var.name),
                    format!("var {name} duplicated"),
                ));
            }
            let position = xg.vars.add(
                name.to_string(),
                XrefVar {
                    name_tok: var.name,
                    usage: VarUsage::In,
                    consumers: 0,
                    feeders: 0,
                },
            );
            let entry_var = xg.vars.get_mut(position).expect("just added");
            if entry_var.usage != VarUsage::In {
                return Err(parse_error(
                    ast.loc(var.name),
                    format!("var {name} used as output"),
                ));
            }
            entry_var.feeders += 1;
            entry.inputs.push(position);
        }
        let name = ast.text(def.name);
        xg.ingresses.must_add(name, ast.loc(def.name), entry)?;
    }

    for (def_index, def) in scheme.ops.iter().enumerate() {
        let factory_tok = def.factory.expect("parser guarantees a factory token");
        let type_name = ast.text(factory_tok);
        if ops.get(type_name).is_none() {
            return Err(parse_error(
                ast.loc(factory_tok),
                format!("op type not found: {type_name}"),
            ));
        }

        let mut entry = XrefOp {
            def_index,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        for var in &def.inputs {
            let name = ast.text(var.name);
            let Some(position) = xg.vars.position(name) else {
                return Err(parse_error(
                    ast.loc(var.name),
                    format!("undefined: {name}"),
                ));
            };
            xg.vars.get_mut(position).expect("position from lookup").consumers += 1;
            entry.inputs.push(position);
        }
        let mut seen = HashSet::new();
        for var in &def.outputs {
            let name = ast.text(var.name);
            if !seen.insert(name.to_string()) {
                return Err(parse_error(
                    ast.loc(var.name),
                    format!("var {name} duplicated"),
                ));
            }
            let position = xg.vars.must_add(
                name,
                ast.loc(var.name),
                XrefVar {
                    name_tok: var.name,
                    usage: VarUsage::Out,
                    consumers: 0,
                    feeders: 0,
                },
            )?;
            entry.outputs.push(position);
        }
        let name = ast.text(def.name);
        xg.ops.must_add(name, ast.loc(def.name), entry)?;
    }

    for var in xg.vars.iter() {
        if var.usage == VarUsage::In && var.consumers == 0 {
            return Err(parse_error(
                ast.loc(var.name_tok),
                format!("var {} not used", ast.text(var.name_tok)),
            ));
        }
    }

    Ok(())
}
