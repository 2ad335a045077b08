//! Syntactic expansions.
//!
//! Expansions live in an arena owned by the grammar and refer to each other by
//! [`ExpId`]. Productions are referenced by name and tokens by kind, so the
//! arena is a forest of trees with no cycles.

use super::{ProdId, TokenKind};
use llkc::Span;
use smartstring::alias::String;

/// Index of an expansion node in the grammar arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpId(pub usize);

/// Explicit lookahead attached to the front of an alternative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lookahead {
    /// Fixed number of tokens to inspect.
    pub amount: Option<usize>,
    /// Opaque semantic predicate.
    pub semantic: Option<String>,
    /// Syntactic scan-ahead expansion.
    pub nested: Option<ExpId>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionKind {
    Sequence(Vec<ExpId>),
    Choice(Vec<ExpId>),
    ZeroOrMore(ExpId),
    OneOrMore(ExpId),
    ZeroOrOne(ExpId),
    NonTerminal(String),
    Token(TokenKind),
    /// Token referenced by name, resolved to [`ExpansionKind::Token`] during validation.
    TokenName(String),
    /// String literal in a production, resolved to a token kind during validation.
    Literal(String),
    /// Opaque action code.
    Action(String),
    Lookahead(Lookahead),
}

impl ExpansionKind {
    /// Choice points are where the generated parser picks between alternatives.
    pub fn is_choice_point(&self) -> bool {
        matches!(
            self,
            ExpansionKind::Choice(_)
                | ExpansionKind::ZeroOrMore(_)
                | ExpansionKind::OneOrMore(_)
                | ExpansionKind::ZeroOrOne(_)
        )
    }

    /// Direct children in declaration order. The nested expansion of a
    /// lookahead is included.
    pub fn children(&self) -> Vec<ExpId> {
        match self {
            ExpansionKind::Sequence(items) | ExpansionKind::Choice(items) => items.clone(),
            ExpansionKind::ZeroOrMore(body)
            | ExpansionKind::OneOrMore(body)
            | ExpansionKind::ZeroOrOne(body) => vec![*body],
            ExpansionKind::Lookahead(la) => la.nested.into_iter().collect(),
            ExpansionKind::NonTerminal(_)
            | ExpansionKind::Token(_)
            | ExpansionKind::TokenName(_)
            | ExpansionKind::Literal(_)
            | ExpansionKind::Action(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub kind: ExpansionKind,
    pub span: Span,
    pub parent: Option<ExpId>,
    pub production: ProdId,
}
