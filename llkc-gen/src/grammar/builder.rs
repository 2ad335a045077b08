//! Programmatic grammar construction.
//!
//! [`GrammarBuilder`] is what a grammar-file front end drives: it declares
//! lexical states, token definitions and productions, numbering tokens in
//! declaration order and lowering [`Expr`] trees into the expansion arena.
//! Names are not resolved here; that is the job of validation.

use super::{
    DEFAULT_STATE, ExpId, ExpansionKind, Grammar, Lookahead, Pattern, ProdId, StateScope,
    TokenDefinition, TokenKind,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::options::Options;
use llkc::{Disposition, Span};
use smartstring::alias::String;

/// Expansion tree as written in a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
    ZeroOrOne(Box<Expr>),
    NonTerminal(String),
    Token(String),
    Literal(String),
    Action(String),
    Lookahead {
        amount: Option<usize>,
        semantic: Option<String>,
        nested: Option<Box<Expr>>,
        negated: bool,
    },
    /// Attaches a source span to the wrapped node.
    At(Span, Box<Expr>),
}

impl Expr {
    pub fn seq(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Seq(items.into_iter().collect())
    }

    pub fn choice(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Choice(items.into_iter().collect())
    }

    pub fn star(body: Expr) -> Self {
        Expr::ZeroOrMore(Box::new(body))
    }

    pub fn plus(body: Expr) -> Self {
        Expr::OneOrMore(Box::new(body))
    }

    pub fn opt(body: Expr) -> Self {
        Expr::ZeroOrOne(Box::new(body))
    }

    pub fn nt(name: &str) -> Self {
        Expr::NonTerminal(name.into())
    }

    pub fn tok(name: &str) -> Self {
        Expr::Token(name.into())
    }

    pub fn lit(image: &str) -> Self {
        Expr::Literal(image.into())
    }

    pub fn action(code: &str) -> Self {
        Expr::Action(code.into())
    }

    /// `LOOKAHEAD(n)`
    pub fn lookahead(amount: usize) -> Self {
        Expr::Lookahead {
            amount: Some(amount),
            semantic: None,
            nested: None,
            negated: false,
        }
    }

    /// `LOOKAHEAD({predicate})`
    pub fn predicate(code: &str) -> Self {
        Expr::Lookahead {
            amount: None,
            semantic: Some(code.into()),
            nested: None,
            negated: false,
        }
    }

    /// `LOOKAHEAD(expansion)`
    pub fn scan(nested: Expr) -> Self {
        Expr::Lookahead {
            amount: None,
            semantic: None,
            nested: Some(Box::new(nested)),
            negated: false,
        }
    }

    /// Flips the negation flag of a lookahead; other nodes are unchanged.
    pub fn negate(self) -> Self {
        match self {
            Expr::Lookahead {
                amount,
                semantic,
                nested,
                negated,
            } => Expr::Lookahead {
                amount,
                semantic,
                nested,
                negated: !negated,
            },
            Expr::At(span, inner) => Expr::At(span, Box::new((*inner).negate())),
            other => other,
        }
    }

    pub fn at(self, span: Span) -> Self {
        Expr::At(span, Box::new(self))
    }
}

/// Token declaration, consumed by [`GrammarBuilder::token`].
#[derive(Debug, Clone)]
pub struct TokenDecl {
    name: String,
    pattern: Pattern,
    states: StateScope,
    next_state: Option<String>,
    disposition: Disposition,
    private: bool,
    ignore_case: Option<bool>,
    span: Span,
}

impl TokenDecl {
    pub fn new(name: &str, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            states: StateScope::Initial,
            next_state: None,
            disposition: Disposition::Token,
            private: false,
            ignore_case: None,
            span: Span::default(),
        }
    }

    pub fn skip(mut self) -> Self {
        self.disposition = Disposition::Skip;
        self
    }

    pub fn more(mut self) -> Self {
        self.disposition = Disposition::More;
        self
    }

    pub fn special(mut self) -> Self {
        self.disposition = Disposition::Special;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn in_states(mut self, states: &[&str]) -> Self {
        self.states = StateScope::Only(states.iter().map(|&s| s.into()).collect());
        self
    }

    pub fn in_all_states(mut self) -> Self {
        self.states = StateScope::All;
        self
    }

    pub fn next_state(mut self, state: &str) -> Self {
        self.next_state = Some(state.into());
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = Some(ignore_case);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

pub struct GrammarBuilder {
    grammar: Grammar,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            grammar: Grammar::new(options),
        }
    }

    /// Declares a lexical state. The first declared state is the initial one;
    /// declaring a state twice has no effect.
    pub fn lexical_state(&mut self, name: &str, span: Span) -> &mut Self {
        let (_, fresh) = self.grammar.states.add(name);
        if fresh {
            self.grammar.state_spans.push(span);
        }
        self
    }

    /// Adds a token definition; kinds are assigned in declaration order.
    ///
    /// A string literal used in an earlier production already owns a kind,
    /// so declaring the same string afterwards is reported as a duplicate.
    pub fn token(&mut self, decl: TokenDecl) -> &mut Self {
        if let Some(idx) = self.grammar.token_names.idx(&decl.name) {
            let earlier = self.grammar.tokens[idx].span;
            self.duplicate("token", &decl.name, decl.span, earlier);
            return self;
        }
        let definition = TokenDefinition {
            name: decl.name,
            kind: self.grammar.tokens.len() as TokenKind,
            pattern: decl.pattern,
            states: decl.states,
            next_state: decl.next_state,
            disposition: decl.disposition,
            private: decl.private,
            ignore_case: decl.ignore_case,
            anonymous: false,
            span: decl.span,
        };
        if let Pattern::Literal(image) = &definition.pattern {
            let initial = self.grammar.initial_state();
            let used = self
                .grammar
                .literal_definition(image)
                .filter(|t| t.anonymous && definition.is_active_in(initial, initial))
                .map(|t| t.span);
            if let Some(earlier) = used {
                let what = format!("string {:?} of token {}", image.as_str(), definition.name);
                self.grammar.declaration_errors.push(Diagnostic {
                    severity: Severity::Error,
                    kind: DiagnosticKind::DuplicateName,
                    span: definition.span,
                    message: format!("{} is already used in a production at {}", what, earlier.display()),
                });
                return self;
            }
        }
        self.grammar.token_names.add(&definition.name);
        self.grammar.tokens.push(definition);
        self
    }

    pub fn production(&mut self, name: &str, expr: Expr) -> &mut Self {
        self.production_at(name, None, Span::default(), expr)
    }

    pub fn production_at(
        &mut self,
        name: &str,
        result_type: Option<&str>,
        span: Span,
        expr: Expr,
    ) -> &mut Self {
        let (idx, fresh) = self.grammar.prod_names.add(name);
        if !fresh {
            let earlier = self.grammar.productions[idx].span;
            self.duplicate("production", name, span, earlier);
            return self;
        }
        let id: ProdId = self.grammar.productions.len();
        let root = self.lower(&expr, span, id);
        self.grammar.productions.push(super::Production {
            name: name.into(),
            id,
            root,
            result_type: result_type.map(Into::into),
            span,
        });
        self
    }

    pub fn build(mut self) -> Grammar {
        if self.grammar.states.is_empty() {
            self.grammar.states.add(DEFAULT_STATE);
            self.grammar.state_spans.push(Span::default());
        }
        self.grammar.plans = vec![None; self.grammar.exp_count()];
        log::debug!(
            "grammar: {} tokens, {} productions, {} expansions, {} lexical states",
            self.grammar.tokens.len(),
            self.grammar.productions.len(),
            self.grammar.exp_count(),
            self.grammar.states.len()
        );
        self.grammar
    }

    fn duplicate(&mut self, what: &str, name: &str, span: Span, earlier: Span) {
        self.grammar.declaration_errors.push(Diagnostic {
            severity: Severity::Error,
            kind: DiagnosticKind::DuplicateName,
            span,
            message: format!(
                "{} {} is already defined at {}",
                what,
                name,
                earlier.display()
            ),
        });
    }

    fn lower(&mut self, expr: &Expr, span: Span, prod: ProdId) -> ExpId {
        let kind = match expr {
            Expr::At(span, inner) => return self.lower(inner, *span, prod),
            Expr::Seq(items) => ExpansionKind::Sequence(self.lower_all(items, span, prod)),
            Expr::Choice(items) => ExpansionKind::Choice(self.lower_all(items, span, prod)),
            Expr::ZeroOrMore(body) => ExpansionKind::ZeroOrMore(self.lower(body, span, prod)),
            Expr::OneOrMore(body) => ExpansionKind::OneOrMore(self.lower(body, span, prod)),
            Expr::ZeroOrOne(body) => ExpansionKind::ZeroOrOne(self.lower(body, span, prod)),
            Expr::NonTerminal(name) => ExpansionKind::NonTerminal(name.clone()),
            Expr::Token(name) => ExpansionKind::TokenName(name.clone()),
            Expr::Literal(image) => {
                // Claims a kind here so the literal ranks by its position.
                if self.grammar.literal_definition(image).is_none() {
                    self.grammar.add_literal_token(image, span);
                }
                ExpansionKind::Literal(image.clone())
            }
            Expr::Action(code) => ExpansionKind::Action(code.clone()),
            Expr::Lookahead {
                amount,
                semantic,
                nested,
                negated,
            } => {
                let nested = nested.as_ref().map(|n| self.lower(n, span, prod));
                ExpansionKind::Lookahead(Lookahead {
                    amount: *amount,
                    semantic: semantic.clone(),
                    nested,
                    negated: *negated,
                })
            }
        };
        self.grammar.push_exp(kind, span, prod)
    }

    fn lower_all(&mut self, items: &[Expr], span: Span, prod: ProdId) -> Vec<ExpId> {
        items.iter().map(|e| self.lower(e, span, prod)).collect()
    }
}
