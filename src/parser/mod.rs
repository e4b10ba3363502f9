//! Query-language parser.
//!
//! Lexes and parses the grammar in `query.pest` (mirrored from the
//! language specification in the crate docs) into the [`AstNode`] tree,
//! assigning a fresh [`NodeId`] to every node in a single left-to-right
//! pass. Keywords are case-insensitive; `#` starts a shell-style
//! comment running to end of line; whitespace is insignificant.

use crate::ast::{AstNode, CmpOp, NodeId};
use crate::error::{EngineError, Span};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "parser/query.pest"]
struct QueryParser;

struct Builder {
    next_id: u32,
}

impl Builder {
    fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Parse query text into an AST rooted at a `Query` node.
pub fn parse_query(text: &str) -> Result<AstNode, EngineError> {
    let mut pairs = QueryParser::parse(Rule::query, text).map_err(pest_to_engine_error)?;
    let query_pair = pairs.next().expect("grammar guarantees a query pair");
    let mut inner = query_pair.into_inner();
    let tbl_expr_pair = inner.next().expect("query := tbl_expr EOI");

    let mut builder = Builder { next_id: 0 };
    let id = builder.fresh();
    let child = build_tbl_expr(&mut builder, tbl_expr_pair)?;
    Ok(AstNode::Query(id, Box::new(child)))
}

fn pest_to_engine_error(err: pest::error::Error<Rule>) -> EngineError {
    let (start, end) = match &err.location {
        pest::error::InputLocation::Pos(p) => (*p, *p),
        pest::error::InputLocation::Span((s, e)) => (*s, *e),
    };
    let message = err.to_string();
    EngineError::Parse {
        message,
        span: Span { start, end },
    }
}

fn build_tbl_expr(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::tbl_expr);
    let mut terms = Vec::new();
    for term_pair in pair.into_inner() {
        match term_pair.as_rule() {
            Rule::tbl_term => terms.push(build_tbl_term(b, term_pair)?),
            Rule::or_op => {}
            other => unreachable!("unexpected rule in tbl_expr: {other:?}"),
        }
    }
    Ok(fold_junction(b, terms, true))
}

fn build_tbl_term(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::tbl_term);
    let mut factors = Vec::new();
    for factor_pair in pair.into_inner() {
        match factor_pair.as_rule() {
            Rule::tbl_factor => factors.push(build_tbl_factor(b, factor_pair)?),
            Rule::and_op => {}
            other => unreachable!("unexpected rule in tbl_term: {other:?}"),
        }
    }
    Ok(fold_junction(b, factors, false))
}

/// `tbl_factor` is `(not_op ~ tbl_factor) | ("(" ~ tbl_expr ~ ")") | tbl_op`.
/// Pest flattens the `not_op ~ tbl_factor` sequence into two sibling
/// pairs inside `tbl_factor`'s inner pairs, so we peek at the first
/// child's rule rather than matching a single alternative.
fn build_tbl_factor(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::tbl_factor);
    let mut children = pair.into_inner();
    let first = children.next().expect("tbl_factor has at least one child");
    match first.as_rule() {
        Rule::not_op => {
            let nested = children.next().expect("not_op is followed by tbl_factor");
            let child = build_tbl_factor(b, nested)?;
            let id = b.fresh();
            Ok(AstNode::Negation(id, Box::new(child)))
        }
        Rule::tbl_expr => build_tbl_expr(b, first),
        Rule::tbl_op => build_tbl_op(b, first),
        other => unreachable!("unexpected rule in tbl_factor: {other:?}"),
    }
}

fn build_tbl_op(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    let inner = pair.into_inner().next().expect("tbl_op has one alternative");
    match inner.as_rule() {
        Rule::kw_op => {
            let text = extract_string(inner);
            let id = b.fresh();
            Ok(AstNode::KeywordLeaf(id, text))
        }
        Rule::col_op_wrap => {
            let col_expr_pair = inner.into_inner().next().expect("col_op_wrap wraps col_expr");
            let body = build_col_expr(b, col_expr_pair)?;
            let id = b.fresh();
            Ok(AstNode::ColScope(id, Box::new(body)))
        }
        other => unreachable!("unexpected rule in tbl_op: {other:?}"),
    }
}

fn build_col_expr(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::col_expr);
    let mut terms = Vec::new();
    for term_pair in pair.into_inner() {
        match term_pair.as_rule() {
            Rule::col_term => terms.push(build_col_term(b, term_pair)?),
            Rule::or_op => {}
            other => unreachable!("unexpected rule in col_expr: {other:?}"),
        }
    }
    Ok(fold_junction(b, terms, true))
}

fn build_col_term(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::col_term);
    let mut factors = Vec::new();
    for factor_pair in pair.into_inner() {
        match factor_pair.as_rule() {
            Rule::col_factor => factors.push(build_col_factor(b, factor_pair)?),
            Rule::and_op => {}
            other => unreachable!("unexpected rule in col_term: {other:?}"),
        }
    }
    Ok(fold_junction(b, factors, false))
}

fn build_col_factor(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    debug_assert_eq!(pair.as_rule(), Rule::col_factor);
    let mut children = pair.into_inner();
    let first = children.next().expect("col_factor has at least one child");
    match first.as_rule() {
        Rule::not_op => {
            let nested = children.next().expect("not_op is followed by col_factor");
            let child = build_col_factor(b, nested)?;
            let id = b.fresh();
            Ok(AstNode::Negation(id, Box::new(child)))
        }
        Rule::col_expr => build_col_expr(b, first),
        Rule::col_op => build_col_op(b, first),
        other => unreachable!("unexpected rule in col_factor: {other:?}"),
    }
}

fn build_col_op(b: &mut Builder, pair: Pair<Rule>) -> Result<AstNode, EngineError> {
    let inner = pair.into_inner().next().expect("col_op has one alternative");
    match inner.as_rule() {
        Rule::name_op => {
            let mut parts = inner.into_inner();
            let string_pair = parts.next().expect("name_op has a string");
            let int_pair = parts.next().expect("name_op has an int");
            let text = unescape(string_pair.as_str());
            let k: i64 = int_pair.as_str().parse().expect("grammar guarantees a valid int");
            let id = b.fresh();
            Ok(AstNode::NameLeaf(id, text, k))
        }
        Rule::pp_op => {
            let mut parts = inner.into_inner();
            let p_pair = parts.next().expect("pp_op has a float");
            let cmp_pair = parts.next().expect("pp_op has a cmp");
            let ref_pair = parts.next().expect("pp_op has a signed number");
            let p: f64 = p_pair.as_str().parse().expect("grammar guarantees a valid float");
            let cmp = CmpOp::parse(&cmp_pair.as_str().to_ascii_lowercase())
                .expect("grammar guarantees a valid comparator");
            let reference: f64 = ref_pair.as_str().parse().expect("grammar guarantees a valid number");
            let id = b.fresh();
            Ok(AstNode::PercentileLeaf(id, p, cmp, reference))
        }
        other => unreachable!("unexpected rule in col_op: {other:?}"),
    }
}

fn extract_string(kw_op_pair: Pair<Rule>) -> String {
    let string_pair = kw_op_pair
        .into_inner()
        .next()
        .expect("kw_op wraps a string");
    unescape(string_pair.as_str())
}

/// Unescape a quoted string body: `\c` becomes the literal character
/// `c` for any `c` (covers the escaped-quote case required by the
/// grammar and is permissive about anything else a user escapes).
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Collapse a flat list of children under an n-ary junction, or return
/// the sole child unchanged if there is only one (mirrors the grammar:
/// `expr := term (OR term)+ | term`, so a lone term is not wrapped).
fn fold_junction(b: &mut Builder, mut children: Vec<AstNode>, is_or: bool) -> AstNode {
    if children.len() == 1 {
        return children.pop().expect("checked len == 1");
    }
    let id = b.fresh();
    if is_or {
        AstNode::Disjunction(id, children)
    } else {
        AstNode::Conjunction(id, children)
    }
}
