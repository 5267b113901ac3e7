//! State-machine parser for the graph definition language.
//!
//! Walks the token stream through explicit states (graph headers,
//! argument lists, operator and ingress declarations) with the shared
//! var-list and param-block sub-states reached via a saved return point.
//! Produces an [`Ast`] whose definitions reference tokens by index, so
//! every later diagnostic can report an exact source location.

use super::token::{self, Keyword, Location, Token};
use sluice_core::Result;
use std::collections::HashMap;

/// Index of a token inside [`Ast::tokens`].
pub type TokenId = usize;

/// An ordered collection with by-name lookup, preserving insertion order.
#[derive(Debug)]
pub struct IndexedList<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for IndexedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IndexedList<T> {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Item by position.
    pub fn get(&self, at: usize) -> Option<&T> {
        self.items.get(at)
    }

    /// Item by name.
    pub fn find(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    /// Position by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// The most recently inserted item.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Insert unless the name is taken; returns the item's position either
    /// way.
    pub fn add(&mut self, name: impl Into<String>, item: T) -> usize {
        let name = name.into();
        if let Some(&existing) = self.index.get(&name) {
            return existing;
        }
        let position = self.items.len();
        self.index.insert(name, position);
        self.items.push(item);
        position
    }

    /// Item by position, mutably.
    pub fn get_mut(&mut self, at: usize) -> Option<&mut T> {
        self.items.get_mut(at)
    }

    /// Insert, failing with a located "already defined" error on a
    /// duplicate name.
    pub fn must_add(&mut self, name: &str, loc: Location, item: T) -> Result<usize> {
        if self.index.contains_key(name) {
            return Err(token::parse_error(loc, format!("already defined {name}")));
        }
        Ok(self.add(name.to_string(), item))
    }
}

/// How a variable reference is used at its declaration site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarUsage {
    /// Consumed: an operator input or ingress target.
    In,
    /// Produced: an operator output.
    Out,
}

/// A variable reference inside a declaration.
#[derive(Debug, Clone, Copy)]
pub struct VarRef {
    /// The name token.
    pub name: TokenId,
    /// Input or output position.
    pub usage: VarUsage,
}

/// One `key: value` entry of a param block.
#[derive(Debug, Clone, Copy)]
pub struct ParamEntry {
    /// The key token.
    pub key: TokenId,
    /// The value token.
    pub value: TokenId,
}

/// An `arg` declaration.
#[derive(Debug, Clone, Copy)]
pub struct ArgDef {
    /// The name token.
    pub name: TokenId,
    /// The default-value token, if a default was given.
    pub value: Option<TokenId>,
}

/// An operator declaration.
#[derive(Debug)]
pub struct OpDef {
    /// The name token.
    pub name: TokenId,
    /// Input variable references, in call order.
    pub inputs: Vec<VarRef>,
    /// Output variable references, in declaration order.
    pub outputs: Vec<VarRef>,
    /// The factory type token. Always present in a successfully parsed
    /// definition.
    pub factory: Option<TokenId>,
    /// The declared param block.
    pub params: Vec<ParamEntry>,
}

/// An ingress declaration.
#[derive(Debug)]
pub struct IngressDef {
    /// The name token.
    pub name: TokenId,
    /// Target variable references.
    pub inputs: Vec<VarRef>,
    /// The factory type token. Always present in a successfully parsed
    /// definition.
    pub factory: Option<TokenId>,
    /// The declared param block.
    pub params: Vec<ParamEntry>,
}

/// One graph section of the script.
#[derive(Debug, Default)]
pub struct GraphScheme {
    /// Graph name; empty for the implicit unnamed graph.
    pub name: String,
    /// The name token, when the graph was declared explicitly.
    pub name_tok: Option<TokenId>,
    /// `arg` declarations.
    pub args: IndexedList<ArgDef>,
    /// Operator declarations.
    pub ops: IndexedList<OpDef>,
    /// Ingress declarations.
    pub ingresses: IndexedList<IngressDef>,
}

/// The parsed script: the token stream plus the ordered graph sections
/// referencing into it.
#[derive(Debug, Default)]
pub struct Ast {
    /// Every token of the script, including whitespace and comments.
    pub tokens: Vec<Token>,
    /// Graph sections in declaration order.
    pub graphs: IndexedList<GraphScheme>,
}

impl Ast {
    /// The token behind an id.
    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id]
    }

    /// A token's cooked text.
    pub fn text(&self, id: TokenId) -> &str {
        &self.tokens[id].parsed
    }

    /// A token's location.
    pub fn loc(&self, id: TokenId) -> Location {
        self.tokens[id].loc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectKeyword,
    GraphName,
    GraphEnd,
    ArgName,
    ArgAssign,
    ArgValue,
    ArgEnd,
    OpOutVarOrName,
    OpOutVarOrNameNext,
    OpName,
    OpUse,
    OpType,
    OpEnd,
    InName,
    InUse,
    InType,
    InEnd,
    VarsBegin,
    VarsName,
    VarsEnd,
    ParamsBegin,
    ParamsKey,
    ParamsColon,
    ParamsValue,
    ParamsEnd,
}

/// Where the var-list sub-machine hands control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarListReturn {
    /// `in <vars>`: expect `=` then the ingress name.
    IngressAssign,
    /// `<outs>,`: expect `=` then the operator name.
    OpOutAssign,
    /// `name(<ins>`: expect `)` then `use`.
    OpInClose,
}

/// Where the param-block sub-machine hands control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamsReturn {
    Op,
    Ingress,
}

/// The definition-language parser.
///
/// Feed tokens with [`step`](Parser::step) and take the AST with
/// [`finish`](Parser::finish), or use [`parse`] for a complete script.
pub struct Parser {
    ast: Ast,
    state: State,
    /// First symbol of a keyword-less declaration, pending
    /// classification as output variable or operator name.
    saved: TokenId,
    var_refs: Vec<VarRef>,
    var_usage: VarUsage,
    var_return: VarListReturn,
    params: Vec<ParamEntry>,
    pending_key: Option<TokenId>,
    params_return: ParamsReturn,
}

impl Parser {
    /// A fresh parser.
    pub fn new() -> Self {
        Self {
            ast: Ast::default(),
            state: State::ExpectKeyword,
            saved: 0,
            var_refs: Vec::new(),
            var_usage: VarUsage::In,
            var_return: VarListReturn::IngressAssign,
            params: Vec::new(),
            pending_key: None,
            params_return: ParamsReturn::Op,
        }
    }

    /// Consume one token.
    pub fn step(&mut self, token: Token) -> Result<()> {
        let id = self.ast.tokens.len();
        self.ast.tokens.push(token);
        self.dispatch(id)
    }

    /// Consume a token stream.
    pub fn feed(&mut self, tokens: Vec<Token>) -> Result<()> {
        for token in tokens {
            self.step(token)?;
        }
        Ok(())
    }

    /// Validate the terminal state and take the AST.
    pub fn finish(mut self) -> Result<Ast> {
        self.commit_graph()?;
        Ok(self.ast)
    }

    fn dispatch(&mut self, id: TokenId) -> Result<()> {
        let tok = &self.ast.tokens[id];
        let loc = tok.loc;

        // Spaces and comments never drive the machine; newlines do only
        // in the states that end a declaration.
        if tok.is_space() || tok.is_comment() {
            return Ok(());
        }
        let ends_on_newline = matches!(
            self.state,
            State::GraphEnd | State::ArgAssign | State::ArgEnd | State::OpEnd | State::InEnd
        );
        if tok.is_newline() && !ends_on_newline {
            return Ok(());
        }

        match self.state {
            State::ExpectKeyword => match tok.keyword() {
                Some(Keyword::Graph) => {
                    self.commit_graph()?;
                    self.state = State::GraphName;
                }
                Some(Keyword::Arg) => self.state = State::ArgName,
                Some(Keyword::Op) => self.state = State::OpOutVarOrName,
                Some(Keyword::In) => {
                    self.begin_vars(VarUsage::In, VarListReturn::IngressAssign);
                }
                None if tok.is_sym() => {
                    self.saved = id;
                    self.state = State::OpOutVarOrNameNext;
                }
                None => return Err(token::parse_error(loc, "expect keyword")),
            },
            State::GraphName => {
                if tok.is_sym() {
                    let name = tok.parsed.clone();
                    self.ast.graphs.must_add(
                        &name,
                        loc,
                        GraphScheme {
                            name: name.clone(),
                            name_tok: Some(id),
                            ..GraphScheme::default()
                        },
                    )?;
                    self.state = State::GraphEnd;
                } else {
                    return Err(token::parse_error(loc, "expect graph name"));
                }
            }
            State::GraphEnd => {
                if tok.is_newline() {
                    self.state = State::ExpectKeyword;
                } else {
                    return Err(token::parse_error(loc, "expect newline"));
                }
            }
            State::ArgName => {
                if tok.is_sym() {
                    let name = tok.parsed.clone();
                    let scheme = self.scheme();
                    scheme
                        .args
                        .must_add(&name, loc, ArgDef { name: id, value: None })?;
                    self.state = State::ArgAssign;
                } else {
                    return Err(token::parse_error(loc, "expect arg name"));
                }
            }
            State::ArgAssign => {
                if tok.is_newline() {
                    self.state = State::ExpectKeyword;
                } else if tok.op() == Some('=') {
                    self.state = State::ArgValue;
                } else if tok.op() == Some(',') {
                    self.state = State::ArgName;
                } else {
                    return Err(token::parse_error(loc, "expect '=', ',' or newline"));
                }
            }
            State::ArgValue => {
                if tok.is_literal() {
                    if let Some(arg) = self.scheme().args.last_mut() {
                        arg.value = Some(id);
                    }
                    self.state = State::ArgEnd;
                } else {
                    return Err(token::parse_error(loc, "expect default value"));
                }
            }
            State::ArgEnd => {
                if tok.is_newline() {
                    self.state = State::ExpectKeyword;
                } else if tok.op() == Some(',') {
                    self.state = State::ArgName;
                } else {
                    return Err(token::parse_error(loc, "expect ',' or newline"));
                }
            }
            State::OpOutVarOrName => {
                if tok.is_sym() {
                    self.saved = id;
                    self.state = State::OpOutVarOrNameNext;
                } else {
                    return Err(token::parse_error(loc, "expect var name or op name"));
                }
            }
            State::OpOutVarOrNameNext => match tok.op() {
                Some(',') => {
                    self.begin_vars_with_saved(VarUsage::Out, VarListReturn::OpOutAssign);
                }
                Some('(') => {
                    self.commit_op(self.saved)?;
                    self.begin_vars(VarUsage::In, VarListReturn::OpInClose);
                }
                Some('=') => {
                    self.begin_vars_with_saved(VarUsage::Out, VarListReturn::OpOutAssign);
                    self.state = State::OpName;
                }
                _ => return Err(token::parse_error(loc, "expect ',', '(' or '='")),
            },
            State::OpName => {
                if tok.is_sym() {
                    self.commit_op(id)?;
                    self.var_usage = VarUsage::In;
                    self.var_refs.clear();
                    self.var_return = VarListReturn::OpInClose;
                    self.state = State::VarsBegin;
                } else {
                    return Err(token::parse_error(loc, "expect op name"));
                }
            }
            State::OpUse => {
                if tok.op() == Some(':') || (tok.is_sym() && tok.parsed == "use") {
                    self.state = State::OpType;
                } else {
                    return Err(token::parse_error(loc, "expect ':' or 'use'"));
                }
            }
            State::OpType => {
                if tok.is_sym() {
                    if let Some(op) = self.scheme().ops.last_mut() {
                        op.factory = Some(id);
                    }
                    self.params_return = ParamsReturn::Op;
                    self.state = State::ParamsBegin;
                } else {
                    return Err(token::parse_error(loc, "expect op type"));
                }
            }
            State::OpEnd => {
                if tok.is_newline() {
                    self.state = State::ExpectKeyword;
                } else if tok.op() == Some(',') {
                    self.state = State::OpOutVarOrName;
                } else {
                    return Err(token::parse_error(loc, "expect ',' or newline"));
                }
            }
            State::InName => {
                if tok.is_sym() {
                    let name = tok.parsed.clone();
                    let inputs = std::mem::take(&mut self.var_refs);
                    self.scheme().ingresses.must_add(
                        &name,
                        loc,
                        IngressDef {
                            name: id,
                            inputs,
                            factory: None,
                            params: Vec::new(),
                        },
                    )?;
                    self.state = State::InUse;
                } else {
                    return Err(token::parse_error(loc, "expect ingress name"));
                }
            }
            State::InUse => {
                if tok.op() == Some(':') || (tok.is_sym() && tok.parsed == "use") {
                    self.state = State::InType;
                } else {
                    return Err(token::parse_error(loc, "expect ':' or 'use'"));
                }
            }
            State::InType => {
                if tok.is_sym() {
                    if let Some(ingress) = self.scheme().ingresses.last_mut() {
                        ingress.factory = Some(id);
                    }
                    self.params_return = ParamsReturn::Ingress;
                    self.state = State::ParamsBegin;
                } else {
                    return Err(token::parse_error(loc, "expect ingress type"));
                }
            }
            State::InEnd => {
                if tok.is_newline() {
                    self.state = State::ExpectKeyword;
                } else if tok.op() == Some(',') {
                    self.state = State::InName;
                } else {
                    return Err(token::parse_error(loc, "expect ',' or newline"));
                }
            }
            State::VarsBegin => {
                if tok.op() == Some('(') {
                    self.state = State::VarsName;
                } else {
                    return Err(token::parse_error(loc, "expect '('"));
                }
            }
            State::VarsName => {
                if tok.is_sym() {
                    self.var_refs.push(VarRef {
                        name: id,
                        usage: self.var_usage,
                    });
                    self.state = State::VarsEnd;
                } else {
                    return self.var_list_return(id);
                }
            }
            State::VarsEnd => {
                if tok.op() == Some(',') {
                    self.state = State::VarsName;
                } else {
                    return self.var_list_return(id);
                }
            }
            State::ParamsBegin => {
                if tok.op() == Some('{') {
                    self.state = State::ParamsKey;
                } else {
                    return Err(token::parse_error(loc, "expect '{'"));
                }
            }
            State::ParamsKey => {
                if tok.op() == Some('}') {
                    self.end_params();
                } else if tok.is_literal() {
                    self.pending_key = Some(id);
                    self.state = State::ParamsColon;
                } else {
                    return Err(token::parse_error(loc, "expect parameter key"));
                }
            }
            State::ParamsColon => {
                if tok.op() == Some(':') {
                    self.state = State::ParamsValue;
                } else {
                    return Err(token::parse_error(loc, "expect ':'"));
                }
            }
            State::ParamsValue => {
                if tok.is_literal() {
                    let key = self
                        .pending_key
                        .take()
                        .expect("a key always precedes its value");
                    self.params.push(ParamEntry { key, value: id });
                    self.state = State::ParamsEnd;
                } else {
                    return Err(token::parse_error(loc, "expect value"));
                }
            }
            State::ParamsEnd => {
                if tok.op() == Some(',') {
                    self.state = State::ParamsKey;
                } else if tok.op() == Some('}') {
                    self.end_params();
                } else {
                    return Err(token::parse_error(loc, "expect ',' or '}'"));
                }
            }
        }
        Ok(())
    }

    /// The var-list sub-machine hit a token it does not own; resume at the
    /// saved return point with that token.
    fn var_list_return(&mut self, id: TokenId) -> Result<()> {
        let tok = &self.ast.tokens[id];
        let loc = tok.loc;
        match self.var_return {
            VarListReturn::IngressAssign => {
                if tok.op() == Some('=') {
                    self.state = State::InName;
                    Ok(())
                } else {
                    Err(token::parse_error(loc, "expect '='"))
                }
            }
            VarListReturn::OpOutAssign => {
                if tok.op() == Some('=') {
                    self.state = State::OpName;
                    Ok(())
                } else {
                    Err(token::parse_error(loc, "expect '='"))
                }
            }
            VarListReturn::OpInClose => {
                if tok.op() == Some(')') {
                    let inputs = std::mem::take(&mut self.var_refs);
                    if let Some(op) = self.scheme().ops.last_mut() {
                        op.inputs = inputs;
                    }
                    self.state = State::OpUse;
                    Ok(())
                } else {
                    Err(token::parse_error(loc, "expect ',' or ')'"))
                }
            }
        }
    }

    fn end_params(&mut self) {
        let params = std::mem::take(&mut self.params);
        match self.params_return {
            ParamsReturn::Op => {
                if let Some(op) = self.scheme().ops.last_mut() {
                    op.params.extend(params);
                }
                self.state = State::OpEnd;
            }
            ParamsReturn::Ingress => {
                if let Some(ingress) = self.scheme().ingresses.last_mut() {
                    ingress.params.extend(params);
                }
                self.state = State::InEnd;
            }
        }
    }

    fn begin_vars(&mut self, usage: VarUsage, ret: VarListReturn) {
        self.var_usage = usage;
        self.var_refs.clear();
        self.var_return = ret;
        self.state = State::VarsName;
    }

    /// Like [`begin_vars`](Self::begin_vars), pre-seeding the list with
    /// the saved first symbol.
    fn begin_vars_with_saved(&mut self, usage: VarUsage, ret: VarListReturn) {
        self.begin_vars(usage, ret);
        self.var_refs.push(VarRef {
            name: self.saved,
            usage,
        });
    }

    /// Declarations committed on the fly mutate the current (last) graph
    /// scheme, creating the implicit unnamed graph on first use.
    fn scheme(&mut self) -> &mut GraphScheme {
        if self.ast.graphs.is_empty() {
            self.ast
                .graphs
                .add(String::new(), GraphScheme::default());
        }
        self.ast
            .graphs
            .last_mut()
            .expect("ensured non-empty above")
    }

    fn commit_op(&mut self, name_id: TokenId) -> Result<()> {
        let name = self.ast.tokens[name_id].parsed.clone();
        let loc = self.ast.tokens[name_id].loc;
        let outputs = std::mem::take(&mut self.var_refs);
        self.scheme().ops.must_add(
            &name,
            loc,
            OpDef {
                name: name_id,
                inputs: Vec::new(),
                outputs,
                factory: None,
                params: Vec::new(),
            },
        )?;
        Ok(())
    }

    /// Reject a truncated declaration; called between graphs and at end of
    /// input.
    fn commit_graph(&mut self) -> Result<()> {
        match self.state {
            State::ExpectKeyword
            | State::GraphEnd
            | State::ArgAssign
            | State::ArgEnd
            | State::OpEnd
            | State::InEnd => {
                self.state = State::ExpectKeyword;
                Ok(())
            }
            _ => {
                let loc = self
                    .ast
                    .tokens
                    .last()
                    .map(|tok| {
                        let mut loc = tok.loc;
                        loc.offset += tok.text.chars().count();
                        loc.col += tok.text.chars().count();
                        loc
                    })
                    .unwrap_or_default();
                Err(token::parse_error(loc, "unexpected end"))
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenize and parse a complete script.
pub fn parse(input: &str) -> Result<Ast> {
    let mut parser = Parser::new();
    parser.feed(token::tokenize(input)?)?;
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_script() {
        let ast = parse("").unwrap();
        assert_eq!(ast.graphs.len(), 0);
    }

    #[test]
    fn graph_sections() {
        let ast = parse("arg in\ngraph a").unwrap();
        assert_eq!(ast.graphs.len(), 2);
        let mut graphs = ast.graphs.iter();
        assert_eq!(graphs.next().unwrap().name, "");
        let named = graphs.next().unwrap();
        assert_eq!(named.name, "a");
        assert_eq!(ast.text(named.name_tok.unwrap()), "a");

        let ast = parse("graph b").unwrap();
        assert_eq!(ast.graphs.len(), 1);
        assert_eq!(ast.graphs.iter().next().unwrap().name, "b");
    }

    #[test]
    fn duplicate_graph_name_rejected() {
        let err = parse("graph a\ngraph a").unwrap_err();
        assert!(format!("{}", err).contains("already defined a"));
    }

    #[test]
    fn argument_lists() {
        let ast = parse("arg input").unwrap();
        assert_eq!(ast.graphs.len(), 1);
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.name, "");
        assert_eq!(scheme.args.len(), 1);
        let arg = scheme.args.iter().next().unwrap();
        assert_eq!(ast.text(arg.name), "input");
        assert!(arg.value.is_none());

        let ast = parse("arg in1, in2 = hello").unwrap();
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.args.len(), 2);
        let mut args = scheme.args.iter();
        let first = args.next().unwrap();
        assert_eq!(ast.text(first.name), "in1");
        assert!(first.value.is_none());
        let second = args.next().unwrap();
        assert_eq!(ast.text(second.name), "in2");
        assert_eq!(ast.text(second.value.unwrap()), "hello");

        let ast = parse("arg in1, #comment\nin2 = hello\narg in3 = 'world'").unwrap();
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.args.len(), 3);
        let mut args = scheme.args.iter();
        assert!(args.next().unwrap().value.is_none());
        assert_eq!(ast.text(args.next().unwrap().value.unwrap()), "hello");
        assert_eq!(ast.text(args.next().unwrap().value.unwrap()), "world");
    }

    #[test]
    fn ingress_declarations() {
        let ast = parse("in input = udp use ingress.udp{port:1234}").unwrap();
        assert_eq!(ast.graphs.len(), 1);
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.ingresses.len(), 1);
        let ingress = scheme.ingresses.iter().next().unwrap();
        assert_eq!(ast.text(ingress.name), "udp");
        assert_eq!(ast.text(ingress.factory.unwrap()), "ingress.udp");
        assert_eq!(ingress.inputs.len(), 1);
        assert_eq!(ast.text(ingress.inputs[0].name), "input");
        assert_eq!(ingress.inputs[0].usage, VarUsage::In);
        assert_eq!(ingress.params.len(), 1);
        assert_eq!(ast.text(ingress.params[0].key), "port");
        assert_eq!(ast.text(ingress.params[0].value), "1234");

        let ast = parse("in in1, in2 = udp use ingress.udp{port:1234}").unwrap();
        let scheme = ast.graphs.iter().next().unwrap();
        let ingress = scheme.ingresses.iter().next().unwrap();
        assert_eq!(ingress.inputs.len(), 2);
        assert_eq!(ast.text(ingress.inputs[0].name), "in1");
        assert_eq!(ast.text(ingress.inputs[1].name), "in2");
    }

    #[test]
    fn operator_declarations() {
        let ast = parse(
            "op o1 = op1(in1) use optest{k1:val1,k2:val2}\n\
             o2, o3 = op2(in1, in2) use optest{}\n\
             op3(in3) use optest{}",
        )
        .unwrap();
        assert_eq!(ast.graphs.len(), 1);
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.ops.len(), 3);
        let mut ops = scheme.ops.iter();

        let op1 = ops.next().unwrap();
        assert_eq!(ast.text(op1.name), "op1");
        assert_eq!(ast.text(op1.factory.unwrap()), "optest");
        assert_eq!(op1.outputs.len(), 1);
        assert_eq!(op1.inputs.len(), 1);
        assert_eq!(ast.text(op1.outputs[0].name), "o1");
        assert_eq!(op1.outputs[0].usage, VarUsage::Out);
        assert_eq!(ast.text(op1.inputs[0].name), "in1");
        assert_eq!(op1.inputs[0].usage, VarUsage::In);
        assert_eq!(op1.params.len(), 2);
        assert_eq!(ast.text(op1.params[0].key), "k1");
        assert_eq!(ast.text(op1.params[0].value), "val1");
        assert_eq!(ast.text(op1.params[1].key), "k2");
        assert_eq!(ast.text(op1.params[1].value), "val2");

        let op2 = ops.next().unwrap();
        assert_eq!(ast.text(op2.name), "op2");
        assert_eq!(op2.outputs.len(), 2);
        assert_eq!(ast.text(op2.outputs[0].name), "o2");
        assert_eq!(ast.text(op2.outputs[1].name), "o3");
        assert_eq!(op2.inputs.len(), 2);
        assert_eq!(ast.text(op2.inputs[0].name), "in1");
        assert_eq!(ast.text(op2.inputs[1].name), "in2");

        let op3 = ops.next().unwrap();
        assert_eq!(ast.text(op3.name), "op3");
        assert!(op3.outputs.is_empty());
        assert_eq!(op3.inputs.len(), 1);
        assert_eq!(ast.text(op3.inputs[0].name), "in3");
    }

    #[test]
    fn full_pipeline_round_trip() {
        let ast = parse(
            "\n\
             in input = test use ingress.test{value: \"in1\"}\n\
             out = test(input) use op.test{value: \"res\"}\n",
        )
        .unwrap();
        assert_eq!(ast.graphs.len(), 1);
        let scheme = ast.graphs.iter().next().unwrap();

        assert_eq!(scheme.ingresses.len(), 1);
        let ingress = scheme.ingresses.iter().next().unwrap();
        assert_eq!(ast.text(ingress.name), "test");
        assert_eq!(ast.text(ingress.factory.unwrap()), "ingress.test");
        assert_eq!(ingress.inputs.len(), 1);
        assert_eq!(ast.text(ingress.inputs[0].name), "input");
        assert_eq!(ast.text(ingress.params[0].key), "value");
        assert_eq!(ast.text(ingress.params[0].value), "in1");

        assert_eq!(scheme.ops.len(), 1);
        let op = scheme.ops.iter().next().unwrap();
        assert_eq!(ast.text(op.name), "test");
        assert_eq!(ast.text(op.factory.unwrap()), "op.test");
        assert_eq!(op.outputs.len(), 1);
        assert_eq!(ast.text(op.outputs[0].name), "out");
        assert_eq!(op.inputs.len(), 1);
        assert_eq!(ast.text(op.inputs[0].name), "input");
        assert_eq!(op.params.len(), 1);
        assert_eq!(ast.text(op.params[0].key), "value");
        assert_eq!(ast.text(op.params[0].value), "res");
    }

    #[test]
    fn missing_tokens_are_located_errors() {
        // arg with no name
        let err = parse("arg =").unwrap_err();
        assert_eq!(err.code(), "E201");
        assert!(format!("{}", err).contains("expect arg name"));

        // op with a quoted string where its factory type belongs
        let err = parse("out = op1(x) use 'optest'{}").unwrap_err();
        assert!(format!("{}", err).contains("expect op type"));

        // ingress missing '='
        let err = parse("in x y").unwrap_err();
        assert!(format!("{}", err).contains("expect '='"));

        // param block missing ':'
        let err = parse("out = op1(x) use t{k v}").unwrap_err();
        assert!(format!("{}", err).contains("expect ':'"));
    }

    #[test]
    fn truncated_declaration_is_unexpected_end() {
        let err = parse("out = op1(x) use t").unwrap_err();
        assert!(format!("{}", err).contains("unexpected end"));

        let err = parse("graph g\nout = op1(x)").unwrap_err();
        assert!(format!("{}", err).contains("unexpected end"));
    }

    #[test]
    fn duplicate_op_name_rejected() {
        let err = parse("out = a(x) use t{}\nout2 = a(x) use t{}").unwrap_err();
        assert!(format!("{}", err).contains("already defined a"));
    }

    #[test]
    fn chained_declarations_after_comma() {
        let ast = parse("a = one(x) use t{}, b = two(a) use t{}").unwrap();
        let scheme = ast.graphs.iter().next().unwrap();
        assert_eq!(scheme.ops.len(), 2);
    }
}
