//! Declarative graph assembly.

use super::{Graph, OpFn};
use crate::error::{Result, SluiceError};
use std::collections::{HashMap, HashSet};

/// A factory producing one operator body per built graph instance.
pub type OpFactoryFn = Box<dyn Fn() -> OpFn>;

struct OpDef {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    factory: OpFactoryFn,
}

/// Assembles a [`Graph`] declaratively, validating every variable
/// reference before any graph object exists.
///
/// The builder checks what the graph itself would check (undefined
/// variables, duplicate operator names, duplicate output producers) but
/// at declaration time, so a broken pipeline fails before its operator
/// factories ever run. `build` can be called repeatedly to stamp out
/// fresh graph instances (one per dispatcher slot).
pub struct GraphBuilder {
    vars: Vec<String>,
    var_set: HashSet<String>,
    ops: Vec<OpDef>,
    op_names: HashSet<String>,
    producers: HashMap<String, String>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            var_set: HashSet::new(),
            ops: Vec::new(),
            op_names: HashSet::new(),
            producers: HashMap::new(),
        }
    }

    /// Declare a variable. Re-declaring the same name is a no-op.
    pub fn var(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.var_set.insert(name.clone()) {
            self.vars.push(name);
        }
        self
    }

    /// Declare several variables.
    pub fn vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.var(name);
        }
        self
    }

    /// Declare an operator over previously declared variables.
    pub fn op(
        mut self,
        name: impl Into<String>,
        inputs: &[&str],
        outputs: &[&str],
        factory: impl Fn() -> OpFn + 'static,
    ) -> Result<Self> {
        let name = name.into();
        for input in inputs {
            if !self.var_set.contains(*input) {
                return Err(SluiceError::UndefinedVariable {
                    name: (*input).to_string(),
                });
            }
        }
        for output in outputs {
            if !self.var_set.contains(*output) {
                return Err(SluiceError::UndefinedVariable {
                    name: (*output).to_string(),
                });
            }
            if let Some(owner) = self.producers.get(*output) {
                return Err(SluiceError::DuplicateProducer {
                    var: (*output).to_string(),
                    op: owner.clone(),
                });
            }
        }
        if !self.op_names.insert(name.clone()) {
            return Err(SluiceError::DuplicateOp {
                graph: String::new(),
                name,
            });
        }
        for output in outputs {
            self.producers.insert((*output).to_string(), name.clone());
        }
        self.ops.push(OpDef {
            name,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            factory: Box::new(factory),
        });
        Ok(self)
    }

    /// Materialize a fresh graph: variables first, then operators, each
    /// operator body created anew from its factory.
    pub fn build(&self, name: impl Into<String>) -> Result<Graph> {
        let mut graph = Graph::new(name);
        for var in &self.vars {
            graph.def_var(var.clone())?;
        }
        for def in &self.ops {
            let inputs: Vec<&str> = def.inputs.iter().map(String::as_str).collect();
            let outputs: Vec<&str> = def.outputs.iter().map(String::as_str).collect();
            graph.add_op(def.name.clone(), &inputs, &outputs, (def.factory)())?;
        }
        Ok(graph)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper_factory() -> OpFn {
        Box::new(|ctx| {
            let value = ctx.input(0).get::<String>()?.clone();
            ctx.output(0).set(value.to_uppercase());
            Ok(())
        })
    }

    #[test]
    fn builds_a_working_graph() {
        let builder = GraphBuilder::new()
            .vars(["in", "out"])
            .op("upper", &["in"], &["out"], upper_factory)
            .unwrap();

        // two independent instances from one builder
        for round in 0..2 {
            let g = builder.build(format!("g{round}")).unwrap();
            g.var("in").unwrap().set(String::from("abc"));
            g.exec().unwrap();
            assert_eq!(*g.var("out").unwrap().get::<String>().unwrap(), "ABC");
        }
    }

    #[test]
    fn undefined_variable_rejected_eagerly() {
        let err = GraphBuilder::new()
            .var("out")
            .op("op", &["missing"], &["out"], upper_factory)
            .err()
            .unwrap();
        assert_eq!(err.code(), "E003");
    }

    #[test]
    fn duplicate_producer_rejected_eagerly() {
        let err = GraphBuilder::new()
            .vars(["a", "out"])
            .op("one", &["a"], &["out"], upper_factory)
            .unwrap()
            .op("two", &["a"], &["out"], upper_factory)
            .err()
            .unwrap();
        assert_eq!(err.code(), "E004");
    }

    #[test]
    fn duplicate_op_name_rejected() {
        let err = GraphBuilder::new()
            .vars(["a", "b", "c"])
            .op("op", &["a"], &["b"], upper_factory)
            .unwrap()
            .op("op", &["a"], &["c"], upper_factory)
            .err()
            .unwrap();
        assert_eq!(err.code(), "E002");
    }
}
