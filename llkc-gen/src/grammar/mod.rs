//! In-memory grammar model.
//!
//! A [`Grammar`] is assembled by [`GrammarBuilder`], checked by
//! [`validate`](crate::validate) and then annotated in place by the analysis
//! stages: the lexer tables go into [`Grammar::lexer`], the closure sets into
//! [`Grammar::closure`] and one lookahead plan per choice point into
//! [`Grammar::plans`].

mod builder;
mod expansion;
mod pattern;

pub use builder::{Expr, GrammarBuilder, TokenDecl};
pub use expansion::{ExpId, Expansion, ExpansionKind, Lookahead};
pub use pattern::{CharClass, ClassItem, Pattern, PatternError, REPEAT_LIMIT};

use crate::closure::ClosureSets;
use crate::diagnostics::Diagnostic;
use crate::lexgen::LexerData;
use crate::options::Options;
use crate::resolve::LookaheadPlan;
use crate::symtab::Symtab;
use llkc::{Disposition, Span};
use smartstring::alias::String;

pub type TokenKind = u32;
pub type ProdId = usize;
pub type StateId = usize;

/// Kind of the built-in end-of-input token.
pub const EOF: TokenKind = llkc::EOF_KIND;

/// Name of the lexical state created when none is declared.
pub const DEFAULT_STATE: &str = "DEFAULT";

/// Lexical states a token definition is active in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateScope {
    /// The initial lexical state.
    #[default]
    Initial,
    All,
    Only(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDefinition {
    pub name: String,
    pub kind: TokenKind,
    pub pattern: Pattern,
    pub states: StateScope,
    pub next_state: Option<String>,
    pub disposition: Disposition,
    /// Only usable as a reference from other patterns.
    pub private: bool,
    /// Overrides [`Options::ignore_case`] when set.
    pub ignore_case: Option<bool>,
    /// Created for a string literal used in a production.
    pub anonymous: bool,
    pub span: Span,
}

impl TokenDefinition {
    fn eof() -> Self {
        Self {
            name: "EOF".into(),
            kind: EOF,
            pattern: Pattern::Seq(Vec::new()),
            states: StateScope::Only(Vec::new()),
            next_state: None,
            disposition: Disposition::Token,
            private: false,
            ignore_case: None,
            anonymous: false,
            span: Span::default(),
        }
    }

    /// Whether the scanner for `state` tries this definition.
    pub fn is_active_in(&self, state: &str, initial: &str) -> bool {
        if self.private || self.kind == EOF {
            return false;
        }
        match &self.states {
            StateScope::Initial => state == initial,
            StateScope::All => true,
            StateScope::Only(names) => names.iter().any(|n| n.as_str() == state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub name: String,
    pub id: ProdId,
    pub root: ExpId,
    /// Opaque result type, passed through to the emitter.
    pub result_type: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub options: Options,
    /// Indexed by kind; kind 0 is `EOF`.
    pub tokens: Vec<TokenDefinition>,
    pub token_names: Symtab,
    /// Indexed by [`StateId`]; state 0 is the initial one.
    pub states: Symtab,
    pub state_spans: Vec<Span>,
    pub productions: Vec<Production>,
    pub prod_names: Symtab,
    pub(crate) expansions: Vec<Expansion>,
    /// Problems found while the grammar was being declared.
    pub(crate) declaration_errors: Vec<Diagnostic>,

    pub lexer: Option<LexerData>,
    pub closure: Option<ClosureSets>,
    /// One slot per expansion node; filled for choice points.
    pub plans: Vec<Option<LookaheadPlan>>,
}

impl Grammar {
    pub(crate) fn new(options: Options) -> Self {
        let mut token_names = Symtab::new();
        token_names.add("EOF");
        Self {
            options,
            tokens: vec![TokenDefinition::eof()],
            token_names,
            states: Symtab::new(),
            state_spans: Vec::new(),
            productions: Vec::new(),
            prod_names: Symtab::new(),
            expansions: Vec::new(),
            declaration_errors: Vec::new(),
            lexer: None,
            closure: None,
            plans: Vec::new(),
        }
    }

    pub fn exp(&self, id: ExpId) -> &Expansion {
        &self.expansions[id.0]
    }

    pub fn exp_count(&self) -> usize {
        self.expansions.len()
    }

    pub fn exp_ids(&self) -> impl Iterator<Item = ExpId> + '_ {
        (0..self.expansions.len()).map(ExpId)
    }

    /// All choice points in arena order.
    pub fn choice_points(&self) -> Vec<ExpId> {
        self.exp_ids()
            .filter(|&id| self.exp(id).kind.is_choice_point())
            .collect()
    }

    pub fn production(&self, name: &str) -> Option<&Production> {
        self.prod_names.idx(name).map(|id| &self.productions[id])
    }

    /// The first declared production.
    pub fn start_production(&self) -> Option<ProdId> {
        (!self.productions.is_empty()).then_some(0)
    }

    pub fn token(&self, kind: TokenKind) -> Option<&TokenDefinition> {
        self.tokens.get(kind as usize)
    }

    pub fn token_kind(&self, name: &str) -> Option<TokenKind> {
        self.token_names.idx(name).map(|i| i as TokenKind)
    }

    pub fn token_name(&self, kind: TokenKind) -> &str {
        self.tokens.get(kind as usize).map_or("?", |t| t.name.as_str())
    }

    pub fn initial_state(&self) -> &str {
        self.states.sym(0).unwrap_or(DEFAULT_STATE)
    }

    /// Kinds active in `state`, in declaration order.
    pub fn active_tokens(&self, state: &str) -> Vec<TokenKind> {
        let initial = self.initial_state();
        self.tokens
            .iter()
            .filter(|t| t.is_active_in(state, initial))
            .map(|t| t.kind)
            .collect()
    }

    /// The first public definition whose pattern is exactly `image` and
    /// that is active in the initial state, whatever its disposition.
    pub fn literal_definition(&self, image: &str) -> Option<&TokenDefinition> {
        let initial = self.initial_state();
        self.tokens.iter().find(|t| {
            matches!(&t.pattern, Pattern::Literal(s) if s.as_str() == image)
                && t.is_active_in(initial, initial)
        })
    }

    /// Kind a string literal in a production stands for. Only definitions
    /// handed to the parser qualify.
    pub fn literal_token(&self, image: &str) -> Option<TokenKind> {
        self.literal_definition(image)
            .filter(|t| t.disposition == Disposition::Token)
            .map(|t| t.kind)
    }

    pub fn plan(&self, id: ExpId) -> Option<&LookaheadPlan> {
        self.plans.get(id.0).and_then(Option::as_ref)
    }

    /// Largest numeric amount among explicit lookaheads.
    pub fn max_explicit_lookahead(&self) -> usize {
        self.expansions
            .iter()
            .filter_map(|e| match &e.kind {
                ExpansionKind::Lookahead(la) => la.amount,
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Nodes of the subtree rooted at `root`, preorder.
    pub fn subtree(&self, root: ExpId) -> Vec<ExpId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.exp(id).kind.children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Human-readable location of an expansion: production name and span.
    pub fn describe(&self, id: ExpId) -> std::string::String {
        let exp = self.exp(id);
        let prod = self
            .productions
            .get(exp.production)
            .map_or("?", |p| p.name.as_str());
        format!("{} at {}", prod, exp.span.display())
    }

    pub(crate) fn push_exp(&mut self, kind: ExpansionKind, span: Span, production: ProdId) -> ExpId {
        let id = ExpId(self.expansions.len());
        for child in kind.children() {
            self.expansions[child.0].parent = Some(id);
        }
        self.expansions.push(Expansion {
            kind,
            span,
            parent: None,
            production,
        });
        id
    }

    pub(crate) fn exp_mut(&mut self, id: ExpId) -> &mut Expansion {
        &mut self.expansions[id.0]
    }

    /// Adds an anonymous token for a string literal used in a production.
    pub(crate) fn add_literal_token(&mut self, image: &str, span: Span) -> TokenKind {
        let kind = self.tokens.len() as TokenKind;
        let name = format!("{:?}", image);
        self.token_names.add(&name);
        self.tokens.push(TokenDefinition {
            name: name.into(),
            kind,
            pattern: Pattern::literal(image),
            states: StateScope::Initial,
            next_state: None,
            disposition: Disposition::Token,
            private: false,
            ignore_case: None,
            anonymous: true,
            span,
        });
        kind
    }
}
