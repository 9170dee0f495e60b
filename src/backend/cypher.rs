//! The Cypher subset understood by the embedded backend.
//!
//! Supported clauses:
//!
//! - `MERGE (v:Label {k: expr, ...})` and `MERGE (a)-[r:TYPE {..}]->(b)`
//! - `CREATE` with the same patterns (always creates)
//! - `MATCH (v[:Label] [{..}])[, ...]`
//! - `SET v += $map`, `SET v.key = expr`
//! - `[DETACH] DELETE v[, ...]`
//!
//! where `expr` is a `$parameter`, a quoted string, a number, `true`,
//! `false` or `null`. Keywords are case-insensitive.
//!
//! A statement is lexed (logos), parsed (winnow over the token slice), then
//! bound against its parameters, then applied. Only applying touches the
//! store.
//!
//! ## Grammar
//!
//! ```text
//! <statement> := ";"* (<clause> ";"*)+
//! <clause>    := MERGE <pattern> | CREATE <pattern>
//!              | MATCH <node> ("," <node>)*
//!              | SET <set-item> ("," <set-item>)*
//!              | [DETACH] DELETE ident ("," ident)*
//! <pattern>   := <node> ["-" <rel> "->" <node>]
//! <node>      := "(" [ident] [":" ident] [<props>] ")"
//! <rel>       := "[" [ident] ":" ident [<props>] "]"
//! <props>     := "{" [ident ":" <expr> ("," ident ":" <expr>)*] "}"
//! <set-item>  := ident "+=" <expr> | ident "." ident "=" <expr>
//! ```

use std::collections::HashMap;

use logos::Logos;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode, ParserError, StrContext};
use winnow::prelude::*;
use winnow::token::any;
use winnow::ModalResult;

use super::store::{GraphStore, PropValue, Props};
use crate::error::{DepmapError, Result};
use crate::graph::Params;

// ─── Lexing ─────────────────────────────────────────────────────

/// Raw token kinds. Values are sliced from the source afterwards.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("=")]
    Equals,

    #[token(";")]
    Semicolon,

    #[token("-")]
    Dash,

    #[token("->")]
    Arrow,

    #[token("+=")]
    PlusEquals,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// `` `any text` ``
    #[regex(r"`[^`]*`")]
    QuotedIdent,

    #[regex(r"\$[a-zA-Z0-9_]+")]
    Param,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[regex(r"'(?:[^'\\]|\\.)*'")]
    Str,

    #[regex(r"-?[0-9]+")]
    Int,

    #[regex(r"-?[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,
}

/// Tokens the grammar consumes, values decoded.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Param(String),
    Str(String),
    Int(i64),
    Float(f64),
    Punct(char),
    Arrow,
    PlusEq,
}

/// Strip the quotes of a string literal and resolve its escapes.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn lex(text: &str) -> std::result::Result<Vec<Token>, String> {
    let mut lexer = Lexeme::lexer(text);
    let mut tokens = Vec::new();

    while let Some(lexeme) = lexer.next() {
        let slice = lexer.slice();
        let token = match lexeme {
            Err(()) => {
                return Err(format!(
                    "unexpected input {slice:?} at offset {}",
                    lexer.span().start
                ))
            }
            Ok(Lexeme::Whitespace) => continue,
            Ok(Lexeme::ParenOpen) => Token::Punct('('),
            Ok(Lexeme::ParenClose) => Token::Punct(')'),
            Ok(Lexeme::BracketOpen) => Token::Punct('['),
            Ok(Lexeme::BracketClose) => Token::Punct(']'),
            Ok(Lexeme::BraceOpen) => Token::Punct('{'),
            Ok(Lexeme::BraceClose) => Token::Punct('}'),
            Ok(Lexeme::Colon) => Token::Punct(':'),
            Ok(Lexeme::Comma) => Token::Punct(','),
            Ok(Lexeme::Dot) => Token::Punct('.'),
            Ok(Lexeme::Equals) => Token::Punct('='),
            Ok(Lexeme::Semicolon) => Token::Punct(';'),
            Ok(Lexeme::Dash) => Token::Punct('-'),
            Ok(Lexeme::Arrow) => Token::Arrow,
            Ok(Lexeme::PlusEquals) => Token::PlusEq,
            Ok(Lexeme::Ident) => Token::Ident(slice.to_string()),
            Ok(Lexeme::QuotedIdent) => Token::Ident(slice[1..slice.len() - 1].to_string()),
            Ok(Lexeme::Param) => Token::Param(slice[1..].to_string()),
            Ok(Lexeme::Str) => Token::Str(unescape(slice)),
            Ok(Lexeme::Int) => Token::Int(
                slice
                    .parse()
                    .map_err(|_| format!("bad number {slice}"))?,
            ),
            Ok(Lexeme::Float) => Token::Float(
                slice
                    .parse()
                    .map_err(|_| format!("bad number {slice}"))?,
            ),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

// ─── Parsing ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Param(String),
    Literal(PropValue),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct NodePattern {
    var: Option<String>,
    label: Option<String>,
    props: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
struct RelPattern {
    var: Option<String>,
    rel_type: String,
    props: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Pattern {
    Node(NodePattern),
    Path {
        from: NodePattern,
        rel: RelPattern,
        to: NodePattern,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Merge(Pattern),
    Create(Pattern),
    Match(Vec<NodePattern>),
    SetMap { var: String, value: Expr },
    SetProp { var: String, key: String, value: Expr },
    Delete { vars: Vec<String>, detach: bool },
}

/// A parsed statement, not yet bound to parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    clauses: Vec<Clause>,
}

type Tokens<'t> = &'t [Token];

fn next_token(input: &mut Tokens<'_>) -> ModalResult<Token> {
    any.parse_next(input)
}

/// Exactly `expected`.
fn token<'t>(expected: Token) -> impl Parser<Tokens<'t>, (), ErrMode<ContextError>> {
    move |input: &mut Tokens<'t>| -> ModalResult<()> {
        if next_token(input)? == expected {
            Ok(())
        } else {
            Err(ErrMode::from_input(input))
        }
    }
}

fn punct<'t>(c: char) -> impl Parser<Tokens<'t>, (), ErrMode<ContextError>> {
    token(Token::Punct(c))
}

/// A keyword, case-insensitively.
fn keyword<'t>(word: &'static str) -> impl Parser<Tokens<'t>, (), ErrMode<ContextError>> {
    move |input: &mut Tokens<'t>| -> ModalResult<()> {
        match next_token(input)? {
            Token::Ident(s) if s.eq_ignore_ascii_case(word) => Ok(()),
            _ => Err(ErrMode::from_input(input)),
        }
    }
}

fn ident(input: &mut Tokens<'_>) -> ModalResult<String> {
    match next_token(input)? {
        Token::Ident(s) => Ok(s),
        _ => Err(ErrMode::from_input(input)),
    }
}

fn expr(input: &mut Tokens<'_>) -> ModalResult<Expr> {
    Ok(match next_token(input)? {
        Token::Param(name) => Expr::Param(name),
        Token::Str(s) => Expr::Literal(PropValue::Str(s)),
        Token::Int(i) => Expr::Literal(PropValue::Int(i)),
        Token::Float(x) => Expr::Literal(PropValue::Float(x)),
        Token::Ident(s) if s.eq_ignore_ascii_case("true") => Expr::Literal(PropValue::Bool(true)),
        Token::Ident(s) if s.eq_ignore_ascii_case("false") => {
            Expr::Literal(PropValue::Bool(false))
        }
        Token::Ident(s) if s.eq_ignore_ascii_case("null") => Expr::Literal(PropValue::Null),
        _ => return Err(ErrMode::from_input(input)),
    })
}

fn props(input: &mut Tokens<'_>) -> ModalResult<Vec<(String, Expr)>> {
    let entries: Option<Vec<(String, Expr)>> = opt(delimited(
        punct('{'),
        separated(0.., (terminated(ident, punct(':')), expr), punct(',')),
        punct('}'),
    ))
    .parse_next(input)?;
    Ok(entries.unwrap_or_default())
}

fn node_pattern(input: &mut Tokens<'_>) -> ModalResult<NodePattern> {
    delimited(
        punct('('),
        (opt(ident), opt(preceded(punct(':'), ident)), props),
        punct(')'),
    )
    .map(|(var, label, props)| NodePattern { var, label, props })
    .context(StrContext::Label("node pattern"))
    .parse_next(input)
}

fn rel_pattern(input: &mut Tokens<'_>) -> ModalResult<RelPattern> {
    delimited(
        punct('['),
        (opt(ident), preceded(punct(':'), ident), props),
        punct(']'),
    )
    .map(|(var, rel_type, props)| RelPattern {
        var,
        rel_type,
        props,
    })
    .context(StrContext::Label("relationship pattern"))
    .parse_next(input)
}

fn pattern(input: &mut Tokens<'_>) -> ModalResult<Pattern> {
    let from = node_pattern(input)?;
    let path = opt(preceded(
        punct('-'),
        cut_err((rel_pattern, token(Token::Arrow), node_pattern)),
    ))
    .parse_next(input)?;
    Ok(match path {
        None => Pattern::Node(from),
        Some((rel, (), to)) => Pattern::Path { from, rel, to },
    })
}

fn set_item(input: &mut Tokens<'_>) -> ModalResult<Clause> {
    let var = ident(input)?;
    let clause = alt((
        preceded(token(Token::PlusEq), expr).map(|value| Clause::SetMap {
            var: var.clone(),
            value,
        }),
        (preceded(punct('.'), ident), preceded(punct('='), expr)).map(|(key, value)| {
            Clause::SetProp {
                var: var.clone(),
                key,
                value,
            }
        }),
    ))
    .parse_next(input);
    clause
}

fn delete_targets(input: &mut Tokens<'_>) -> ModalResult<Vec<String>> {
    separated(1.., ident, punct(',')).parse_next(input)
}

fn clause(input: &mut Tokens<'_>) -> ModalResult<Vec<Clause>> {
    alt((
        preceded(keyword("MERGE"), cut_err(pattern)).map(|p: Pattern| vec![Clause::Merge(p)]),
        preceded(keyword("CREATE"), cut_err(pattern)).map(|p: Pattern| vec![Clause::Create(p)]),
        preceded(
            keyword("MATCH"),
            cut_err(separated(1.., node_pattern, punct(','))),
        )
        .map(|patterns: Vec<NodePattern>| vec![Clause::Match(patterns)]),
        preceded(keyword("SET"), cut_err(separated(1.., set_item, punct(',')))),
        preceded((keyword("DETACH"), keyword("DELETE")), cut_err(delete_targets))
            .map(|vars: Vec<String>| vec![Clause::Delete { vars, detach: true }]),
        preceded(keyword("DELETE"), cut_err(delete_targets))
            .map(|vars: Vec<String>| vec![Clause::Delete { vars, detach: false }]),
    ))
    .context(StrContext::Label("clause"))
    .parse_next(input)
}

fn semicolons(input: &mut Tokens<'_>) -> ModalResult<()> {
    repeat(0.., punct(';')).parse_next(input)
}

fn statement(input: &mut Tokens<'_>) -> ModalResult<ParsedStatement> {
    semicolons(input)?;
    let groups: Vec<Vec<Clause>> =
        repeat(1.., terminated(clause, semicolons)).parse_next(input)?;
    Ok(ParsedStatement {
        clauses: groups.into_iter().flatten().collect(),
    })
}

/// Parse a statement in the supported subset.
pub fn parse(text: &str) -> Result<ParsedStatement> {
    let tokens = lex(text).map_err(|reason| DepmapError::unsupported(text, reason))?;
    if tokens.is_empty() {
        return Err(DepmapError::unsupported(text, "empty statement"));
    }
    statement.parse(tokens.as_slice()).map_err(|e| {
        let reason = match tokens.get(e.offset()) {
            Some(token) => format!("unexpected {token:?} at token {}", e.offset()),
            None => "unexpected end of statement".to_string(),
        };
        DepmapError::unsupported(text, reason)
    })
}

// ─── Binding ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct BoundNode {
    var: Option<String>,
    label: Option<String>,
    props: Props,
}

#[derive(Debug, Clone, PartialEq)]
struct BoundRel {
    var: Option<String>,
    rel_type: String,
    props: Props,
}

#[derive(Debug, Clone, PartialEq)]
enum BoundClause {
    MergeNode(BoundNode),
    CreateNode(BoundNode),
    MergePath(BoundNode, BoundRel, BoundNode),
    CreatePath(BoundNode, BoundRel, BoundNode),
    Match(Vec<BoundNode>),
    Set { var: String, props: Props },
    Delete { vars: Vec<String>, detach: bool },
}

/// A statement with every parameter resolved, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    text: String,
    clauses: Vec<BoundClause>,
}

impl BoundStatement {
    /// Whether applying may still fail part-way. Statements without MATCH
    /// or a plain DELETE are fully checked by [`ParsedStatement::bind`].
    pub fn is_fallible(&self) -> bool {
        self.clauses.iter().any(|c| {
            matches!(
                c,
                BoundClause::Match(_) | BoundClause::Delete { detach: false, .. }
            )
        })
    }

    /// Check variable usage before anything runs: every referenced
    /// variable is bound by an earlier clause, is used as the kind of entity
    /// it names, and is not used after being deleted. New node patterns
    /// carry a label.
    fn check_variables(&self) -> Result<()> {
        let text = self.text.as_str();
        let mut bound: HashMap<&str, VarKind> = HashMap::new();

        for clause in &self.clauses {
            match clause {
                BoundClause::MergeNode(n) | BoundClause::CreateNode(n) => {
                    check_node(text, n, &mut bound)?
                }
                BoundClause::MergePath(a, r, b) | BoundClause::CreatePath(a, r, b) => {
                    check_node(text, a, &mut bound)?;
                    check_node(text, b, &mut bound)?;
                    if let Some(var) = r.var.as_deref() {
                        if bound.insert(var, VarKind::Relationship).is_some() {
                            return Err(DepmapError::unsupported(
                                text,
                                format!("variable {var} is already bound"),
                            ));
                        }
                    }
                }
                BoundClause::Match(patterns) => {
                    for p in patterns {
                        if let Some(var) = p.var.as_deref() {
                            bound.insert(var, VarKind::Nodes);
                        }
                    }
                }
                BoundClause::Set { var, .. } => {
                    if !bound.contains_key(var.as_str()) {
                        return Err(unbound(text, var));
                    }
                }
                BoundClause::Delete { vars, .. } => {
                    for var in vars {
                        if bound.remove(var.as_str()).is_none() {
                            return Err(unbound(text, var));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// What a variable names while a statement is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarKind {
    Nodes,
    Relationship,
}

fn unbound(text: &str, var: &str) -> DepmapError {
    DepmapError::unsupported(text, format!("unbound variable {var}"))
}

fn check_node<'a>(
    text: &str,
    node: &'a BoundNode,
    bound: &mut HashMap<&'a str, VarKind>,
) -> Result<()> {
    match node.var.as_deref() {
        Some(var) if bound.get(var) == Some(&VarKind::Relationship) => {
            return Err(DepmapError::unsupported(
                text,
                format!("variable {var} names a relationship"),
            ));
        }
        Some(var) if bound.contains_key(var) => {
            if node.label.is_some() || !node.props.is_empty() {
                return Err(DepmapError::unsupported(
                    text,
                    format!("variable {var} is already bound"),
                ));
            }
        }
        var => {
            if node.label.is_none() {
                return Err(DepmapError::unsupported(
                    text,
                    "node pattern needs a label or a bound variable",
                ));
            }
            if let Some(var) = var {
                bound.insert(var, VarKind::Nodes);
            }
        }
    }
    Ok(())
}

fn bind_value(text: &str, expr: &Expr, params: Option<&Params>) -> Result<PropValue> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(name) => {
            let value = params
                .and_then(|p| p.get(name))
                .ok_or_else(|| DepmapError::MissingParameter(name.clone()))?;
            PropValue::from_json(value).ok_or_else(|| {
                DepmapError::unsupported(text, format!("${name} is not a property value"))
            })
        }
    }
}

fn bind_map(text: &str, expr: &Expr, params: Option<&Params>) -> Result<Props> {
    let Expr::Param(name) = expr else {
        return Err(DepmapError::unsupported(text, "SET += needs a map parameter"));
    };
    let value = params
        .and_then(|p| p.get(name))
        .ok_or_else(|| DepmapError::MissingParameter(name.clone()))?;
    let serde_json::Value::Object(map) = value else {
        return Err(DepmapError::unsupported(text, format!("${name} is not a map")));
    };
    map.iter()
        .map(|(k, v)| {
            PropValue::from_json(v)
                .map(|v| (k.clone(), v))
                .ok_or_else(|| DepmapError::unsupported(text, format!("nested map in ${name}.{k}")))
        })
        .collect()
}

fn bind_props(text: &str, props: &[(String, Expr)], params: Option<&Params>) -> Result<Props> {
    props
        .iter()
        .map(|(k, e)| Ok((k.clone(), bind_value(text, e, params)?)))
        .collect()
}

fn bind_node(text: &str, node: &NodePattern, params: Option<&Params>) -> Result<BoundNode> {
    Ok(BoundNode {
        var: node.var.clone(),
        label: node.label.clone(),
        props: bind_props(text, &node.props, params)?,
    })
}

fn bind_rel(text: &str, rel: &RelPattern, params: Option<&Params>) -> Result<BoundRel> {
    Ok(BoundRel {
        var: rel.var.clone(),
        rel_type: rel.rel_type.clone(),
        props: bind_props(text, &rel.props, params)?,
    })
}

impl ParsedStatement {
    pub fn bind(&self, text: &str, params: Option<&Params>) -> Result<BoundStatement> {
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            clauses.push(match clause {
                Clause::Merge(Pattern::Node(n)) => {
                    BoundClause::MergeNode(bind_node(text, n, params)?)
                }
                Clause::Create(Pattern::Node(n)) => {
                    BoundClause::CreateNode(bind_node(text, n, params)?)
                }
                Clause::Merge(Pattern::Path { from, rel, to }) => BoundClause::MergePath(
                    bind_node(text, from, params)?,
                    bind_rel(text, rel, params)?,
                    bind_node(text, to, params)?,
                ),
                Clause::Create(Pattern::Path { from, rel, to }) => BoundClause::CreatePath(
                    bind_node(text, from, params)?,
                    bind_rel(text, rel, params)?,
                    bind_node(text, to, params)?,
                ),
                Clause::Match(nodes) => BoundClause::Match(
                    nodes
                        .iter()
                        .map(|n| bind_node(text, n, params))
                        .collect::<Result<_>>()?,
                ),
                Clause::SetMap { var, value } => BoundClause::Set {
                    var: var.clone(),
                    props: bind_map(text, value, params)?,
                },
                Clause::SetProp { var, key, value } => {
                    let mut props = Props::new();
                    props.insert(key.clone(), bind_value(text, value, params)?);
                    BoundClause::Set {
                        var: var.clone(),
                        props,
                    }
                }
                Clause::Delete { vars, detach } => BoundClause::Delete {
                    vars: vars.clone(),
                    detach: *detach,
                },
            });
        }
        let statement = BoundStatement {
            text: text.to_string(),
            clauses,
        };
        statement.check_variables()?;
        Ok(statement)
    }
}

/// Parse and bind in one step.
pub fn prepare(text: &str, params: Option<&Params>) -> Result<BoundStatement> {
    parse(text)?.bind(text, params)
}

// ─── Execution ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Binding {
    Nodes(Vec<NodeIndex>),
    Edge(EdgeIndex),
}

/// Counts of what one statement changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub nodes_touched: usize,
    pub relationships_touched: usize,
    pub deleted: usize,
}

impl ApplyStats {
    pub fn add(&mut self, other: ApplyStats) {
        self.nodes_touched += other.nodes_touched;
        self.relationships_touched += other.relationships_touched;
        self.deleted += other.deleted;
    }
}

struct Executor<'s> {
    store: &'s mut GraphStore,
    text: &'s str,
    vars: HashMap<String, Binding>,
    stats: ApplyStats,
}

impl Executor<'_> {
    /// Resolve a node pattern to a single node, merging or creating as asked.
    fn node(&mut self, node: &BoundNode, create: bool) -> Result<NodeIndex> {
        if let Some(var) = &node.var {
            if let Some(binding) = self.vars.get(var) {
                return match binding {
                    Binding::Nodes(nodes) if nodes.len() == 1 && node.props.is_empty() => {
                        Ok(nodes[0])
                    }
                    _ => Err(DepmapError::unsupported(
                        self.text,
                        format!("variable {var} does not name a single node"),
                    )),
                };
            }
        }
        let Some(label) = &node.label else {
            return Err(DepmapError::unsupported(
                self.text,
                "node pattern needs a label or a bound variable",
            ));
        };
        let idx = if create {
            self.store.create_node(label, node.props.clone())
        } else {
            self.store.merge_node(label, &node.props)
        };
        self.stats.nodes_touched += 1;
        if let Some(var) = &node.var {
            self.vars.insert(var.clone(), Binding::Nodes(vec![idx]));
        }
        Ok(idx)
    }

    fn path(&mut self, from: &BoundNode, rel: &BoundRel, to: &BoundNode, create: bool) -> Result<()> {
        // Bound variables are reused even under CREATE.
        let a = self.node(from, create)?;
        let b = self.node(to, create)?;
        let edge = if create {
            self.store.create_edge(a, b, &rel.rel_type, rel.props.clone())
        } else {
            self.store.merge_edge(a, b, &rel.rel_type, &rel.props)
        };
        self.stats.relationships_touched += 1;
        if let Some(var) = &rel.var {
            self.vars.insert(var.clone(), Binding::Edge(edge));
        }
        Ok(())
    }

    /// Returns `false` when a MATCH produced no rows.
    fn clause(&mut self, clause: &BoundClause) -> Result<bool> {
        match clause {
            BoundClause::MergeNode(n) => {
                self.node(n, false)?;
            }
            BoundClause::CreateNode(n) => {
                self.node(n, true)?;
            }
            BoundClause::MergePath(a, r, b) => self.path(a, r, b, false)?,
            BoundClause::CreatePath(a, r, b) => self.path(a, r, b, true)?,
            BoundClause::Match(patterns) => {
                for pattern in patterns {
                    let found = self
                        .store
                        .match_nodes(pattern.label.as_deref(), &pattern.props);
                    if found.is_empty() {
                        return Ok(false);
                    }
                    if let Some(var) = &pattern.var {
                        self.vars.insert(var.clone(), Binding::Nodes(found));
                    }
                }
            }
            BoundClause::Set { var, props } => match self.vars.get(var) {
                Some(Binding::Nodes(nodes)) => {
                    for &idx in nodes {
                        self.store.set_node_props(idx, props);
                    }
                }
                Some(Binding::Edge(idx)) => self.store.set_edge_props(*idx, props),
                None => {
                    return Err(DepmapError::unsupported(
                        self.text,
                        format!("unbound variable {var}"),
                    ))
                }
            },
            BoundClause::Delete { vars, detach } => {
                for var in vars {
                    match self.vars.remove(var) {
                        Some(Binding::Nodes(nodes)) => {
                            for idx in nodes {
                                self.store.delete_node(idx, *detach)?;
                                self.stats.deleted += 1;
                            }
                        }
                        Some(Binding::Edge(idx)) => {
                            self.store.delete_edge(idx);
                            self.stats.deleted += 1;
                        }
                        None => {
                            return Err(DepmapError::unsupported(
                                self.text,
                                format!("unbound variable {var}"),
                            ))
                        }
                    }
                }
            }
        }
        Ok(true)
    }
}

/// Apply a bound statement to `store`.
pub fn apply(store: &mut GraphStore, statement: &BoundStatement) -> Result<ApplyStats> {
    let mut exec = Executor {
        store,
        text: &statement.text,
        vars: HashMap::new(),
        stats: ApplyStats::default(),
    };
    for clause in &statement.clauses {
        if !exec.clause(clause)? {
            break;
        }
    }
    Ok(exec.stats)
}
