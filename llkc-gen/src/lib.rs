//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Grammar analysis core.
//!
//! `llkc-gen` turns an in-memory grammar into the model a code emitter
//! needs:
//!  * **lexgen**: one minimized DFA per lexical state, longest match with
//!    ties to the earliest declared token,
//!  * **closure**: k-bounded FIRST and FOLLOW sets and left-recursion checks,
//!  * **resolve**: an adaptive LL(k) lookahead plan for every choice point.
//!
//! Grammars are assembled with [`GrammarBuilder`] and analyzed by
//! [`compile`]; problems are reported as [`Diagnostic`]s.
//!
//! ```rust
//! use llkc_gen::{Expr, GrammarBuilder, Pattern, TokenDecl, compile};
//!
//! let mut b = GrammarBuilder::new();
//! b.token(TokenDecl::new("X", Pattern::literal("x")))
//!     .token(TokenDecl::new("Y", Pattern::literal("y")))
//!     .token(TokenDecl::new("Z", Pattern::literal("z")))
//!     .production(
//!         "A",
//!         Expr::choice([
//!             Expr::seq([Expr::tok("X"), Expr::tok("Y")]),
//!             Expr::seq([Expr::tok("X"), Expr::tok("Z")]),
//!         ]),
//!     );
//! let mut grammar = b.build();
//! let result = compile(&mut grammar);
//! assert!(!result.has_fatal());
//!
//! let root = grammar.production("A").unwrap().root;
//! assert_eq!(grammar.plan(root).unwrap().k, 2);
//! ```

pub mod closure;
pub mod diagnostics;
pub mod error;
pub mod grammar;
pub mod lexgen;
pub mod options;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod symtab;
pub mod validate;

pub use closure::{ClosureSets, TokenSequenceSet, compute_closure};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{CompileError, Stage};
pub use grammar::{
    EOF, ExpId, Expr, Grammar, GrammarBuilder, Pattern, ProdId, TokenDecl, TokenKind,
};
pub use lexgen::{LexerData, build_lexer};
pub use options::{ConflictPolicy, Options};
pub use pipeline::{Compilation, compile};
pub use resolve::{LookaheadPlan, Outcome, resolve_lookahead};
pub use validate::validate;
