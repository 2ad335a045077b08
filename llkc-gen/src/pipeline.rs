//! The compiler driver.
//!
//! [`compile`] runs validation and the three analysis stages in order and
//! annotates the grammar in place. Each stage sees every diagnostic of the
//! stages before it; the first stage that records an error is the last one
//! to run.

use crate::closure::compute_closure;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::{CompileError, Stage};
use crate::grammar::Grammar;
use crate::lexgen::build_lexer;
use crate::resolve::resolve_lookahead;
use crate::validate::validate;

/// Result of [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation {
    /// Sorted by position, then kind.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when a stage recorded an error.
    pub stopped_after: Option<Stage>,
}

impl Compilation {
    pub fn has_fatal(&self) -> bool {
        self.stopped_after.is_some()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// The diagnostics, or [`CompileError::Fatal`] when a stage failed.
    pub fn into_result(self) -> Result<Vec<Diagnostic>, CompileError> {
        match self.stopped_after {
            Some(stage) => Err(CompileError::Fatal {
                errors: self.count(Severity::Error),
                stage,
            }),
            None => Ok(self.diagnostics),
        }
    }
}

/// Validates `grammar` and runs lexer construction, closure computation and
/// lookahead resolution on it.
///
/// Annotations from an earlier call are discarded first, so compiling the
/// same grammar again yields the same tables and plans. Results of stages
/// that ran are kept even when a later one fails.
pub fn compile(grammar: &mut Grammar) -> Compilation {
    grammar.lexer = None;
    grammar.closure = None;
    grammar.plans = vec![None; grammar.exp_count()];

    let diags = Diagnostics::new();
    let stopped_after = run(grammar, &diags);
    let diagnostics = diags.into_sorted();
    log::info!(
        "compiled grammar: {} errors, {} warnings, {} notes{}",
        diagnostics.iter().filter(|d| d.severity == Severity::Error).count(),
        diagnostics.iter().filter(|d| d.severity == Severity::Warning).count(),
        diagnostics.iter().filter(|d| d.severity == Severity::Note).count(),
        stopped_after.map_or_else(String::new, |s| format!("; stopped after {}", s))
    );
    Compilation {
        diagnostics,
        stopped_after,
    }
}

fn run(grammar: &mut Grammar, diags: &Diagnostics) -> Option<Stage> {
    validate(grammar, diags);
    if diags.has_fatal() {
        return Some(Stage::Validation);
    }
    log::debug!("validation done: {} tokens", grammar.tokens.len());

    let Some(lexer) = build_lexer(grammar, diags) else {
        return Some(Stage::Lexer);
    };
    log::info!(
        "lexer: {} lexical states, {} dfa states",
        lexer.automata.len(),
        lexer.automata.iter().map(|a| a.dfa.len()).sum::<usize>()
    );
    grammar.lexer = Some(lexer);
    if diags.has_fatal() {
        return Some(Stage::Lexer);
    }

    let closure = compute_closure(grammar, diags);
    log::info!(
        "closure: K={}, {} productions, {} nullable",
        closure.k,
        grammar.productions.len(),
        closure.prod_nullable.iter().filter(|&&n| n).count()
    );
    let fatal = diags.has_fatal();
    if !fatal {
        grammar.plans = resolve_lookahead(grammar, &closure, diags);
    }
    grammar.closure = Some(closure);
    if fatal {
        return Some(Stage::Closure);
    }

    log::info!(
        "lookahead: {} plans, max k {}",
        grammar.plans.iter().flatten().count(),
        grammar.plans.iter().flatten().map(|p| p.k).max().unwrap_or(0)
    );
    diags.has_fatal().then_some(Stage::Lookahead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::grammar::{Expr, GrammarBuilder, Pattern, TokenDecl};
    use crate::options::{ConflictPolicy, Options};
    use crate::report;
    use llkc::{EOF_KIND, Scanner};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// expr ::= term (("+" | "-") term)* ; term ::= NUMBER | "(" expr ")" | ID ("(" expr ")")?
    fn calculator(options: Options) -> Grammar {
        let mut b = GrammarBuilder::with_options(options);
        b.token(TokenDecl::new("WS", Pattern::parse("[ \t\n]+").unwrap()).skip())
            .token(TokenDecl::new("NUMBER", Pattern::parse("[0-9]+").unwrap()))
            .token(TokenDecl::new("ID", Pattern::parse("[a-z][a-z0-9]*").unwrap()))
            .production(
                "expr",
                Expr::seq([
                    Expr::nt("term"),
                    Expr::star(Expr::seq([
                        Expr::choice([Expr::lit("+"), Expr::lit("-")]),
                        Expr::nt("term"),
                    ])),
                ]),
            )
            .production(
                "term",
                Expr::choice([
                    Expr::tok("NUMBER"),
                    Expr::seq([Expr::lit("("), Expr::nt("expr"), Expr::lit(")")]),
                    Expr::seq([
                        Expr::tok("ID"),
                        Expr::opt(Expr::seq([Expr::lit("("), Expr::nt("expr"), Expr::lit(")")])),
                    ]),
                ]),
            );
        b.build()
    }

    fn dump(g: &Grammar) -> Vec<u8> {
        let mut out = Vec::new();
        report::write_lexer(&mut out, g).unwrap();
        report::write_closure(&mut out, g).unwrap();
        report::write_plans(&mut out, g).unwrap();
        out
    }

    #[test]
    fn end_to_end() {
        init_logger();
        let mut g = calculator(Options::default());
        let result = compile(&mut g);
        assert!(!result.has_fatal(), "{:?}", result.diagnostics);
        assert!(result.diagnostics.is_empty());

        let lexer = g.lexer.as_ref().unwrap();
        let kinds: Vec<u32> = Scanner::new(lexer, "f(1 + x)".chars())
            .map(|t| t.unwrap().kind)
            .collect();
        let names: Vec<&str> = kinds.iter().map(|&k| g.token_name(k)).collect();
        assert_eq!(
            names,
            vec!["ID", "\"(\"", "NUMBER", "\"+\"", "ID", "\")\"", "EOF"]
        );

        assert_eq!(g.choice_points().len(), 4);
        for id in g.choice_points() {
            let plan = g.plan(id).unwrap();
            assert_eq!(plan.k, 1);
            assert!(!plan.has_conflict());
        }
        let term = g.production("term").unwrap().root;
        let lp = g.token_kind("\"(\"").unwrap();
        let id = g.token_kind("ID").unwrap();
        assert_eq!(g.plan(term).unwrap().select(&[lp]), Some(1));
        assert_eq!(g.plan(term).unwrap().select(&[id]), Some(2));
        assert_eq!(g.plan(term).unwrap().select(&[EOF_KIND]), None);
    }

    #[test]
    fn compiling_twice_is_idempotent() {
        init_logger();
        let mut a = calculator(Options::default());
        let first = compile(&mut a);
        let first_dump = dump(&a);
        let first_plans = a.plans.clone();

        let second = compile(&mut a);
        assert_eq!(first, second);
        assert_eq!(first_dump, dump(&a));
        assert_eq!(first_plans, a.plans);

        let mut b = calculator(Options::default().with_parallel(false));
        assert_eq!(compile(&mut b), first);
        assert_eq!(dump(&b), first_dump);
    }

    #[test]
    fn left_recursion_stops_before_lookahead() {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("PLUS", Pattern::literal("+")))
            .token(TokenDecl::new("T", Pattern::literal("t")))
            .production(
                "E",
                Expr::choice([
                    Expr::seq([Expr::nt("E"), Expr::tok("PLUS"), Expr::tok("T")]),
                    Expr::tok("T"),
                ]),
            );
        let mut g = b.build();
        let result = compile(&mut g);
        assert_eq!(result.stopped_after, Some(Stage::Closure));
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::LeftRecursion && d.message.contains("E"))
        );
        let root = g.production("E").unwrap().root;
        assert!(g.plan(root).is_none());
        assert!(g.lexer.is_some());
        assert!(g.closure.is_some());
        assert_eq!(
            result.into_result(),
            Err(CompileError::Fatal {
                errors: 1,
                stage: Stage::Closure
            })
        );
    }

    #[test]
    fn validation_errors_stop_everything() {
        let mut b = GrammarBuilder::new();
        b.production("S", Expr::seq([Expr::tok("MISSING"), Expr::nt("Nowhere")]));
        let mut g = b.build();
        let result = compile(&mut g);
        assert_eq!(result.stopped_after, Some(Stage::Validation));
        assert_eq!(result.count(Severity::Error), 2);
        assert!(g.lexer.is_none());
    }

    #[test]
    fn pattern_errors_stop_before_automata() {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("A", Pattern::literal("a")))
            .token(TokenDecl::new("BAD", Pattern::reference("NOPE")))
            .production("S", Expr::tok("A"));
        let mut g = b.build();
        let result = compile(&mut g);
        assert_eq!(result.stopped_after, Some(Stage::Lexer));
        assert_eq!(result.count(Severity::Error), 1);
        assert!(g.lexer.is_none());
        assert!(g.closure.is_none());
    }

    #[test]
    fn inline_literals_rank_by_position() {
        init_logger();
        let grammar = |literal_first: bool| {
            let mut b = GrammarBuilder::new();
            let production = Expr::seq([Expr::lit("if"), Expr::tok("ID")]);
            if literal_first {
                b.production("S", production.clone());
            }
            b.token(TokenDecl::new("WS", Pattern::parse(" +").unwrap()).skip())
                .token(TokenDecl::new("ID", Pattern::parse("[a-z]+").unwrap()));
            if !literal_first {
                b.production("S", production);
            }
            b.build()
        };

        let mut g = grammar(true);
        let result = compile(&mut g);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let names: Vec<&str> = Scanner::new(g.lexer.as_ref().unwrap(), "if ifx".chars())
            .map(|t| g.token_name(t.unwrap().kind))
            .collect();
        assert_eq!(names, vec!["\"if\"", "ID", "EOF"]);

        let mut g = grammar(false);
        let result = compile(&mut g);
        assert!(!result.has_fatal());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnreachableToken);
        assert!(result.diagnostics[0].message.contains("ID matches"));
    }

    #[test]
    fn non_token_references_stop_at_validation() {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("X", Pattern::literal("x")))
            .token(TokenDecl::new("WS", Pattern::literal(" ")).skip())
            .production(
                "S",
                Expr::seq([Expr::tok("X"), Expr::tok("WS"), Expr::lit(" "), Expr::tok("X")]),
            );
        let mut g = b.build();
        let result = compile(&mut g);
        assert_eq!(result.stopped_after, Some(Stage::Validation));
        assert_eq!(
            result
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::NonTokenReference)
                .count(),
            2
        );
    }

    #[test]
    fn conflict_policy_decides_fatality() {
        let grammar = |policy| {
            let mut b = GrammarBuilder::with_options(
                Options::default()
                    .with_max_lookahead(1)
                    .with_conflict_policy(policy),
            );
            b.token(TokenDecl::new("X", Pattern::literal("x")))
                .token(TokenDecl::new("Y", Pattern::literal("y")))
                .production(
                    "S",
                    Expr::choice([
                        Expr::seq([Expr::tok("X"), Expr::tok("Y")]),
                        Expr::tok("X"),
                    ]),
                );
            b.build()
        };

        let mut g = grammar(ConflictPolicy::Warn);
        let result = compile(&mut g);
        assert!(!result.has_fatal());
        assert_eq!(result.count(Severity::Warning), 1);
        assert!(result.into_result().is_ok());

        let mut g = grammar(ConflictPolicy::Error);
        let result = compile(&mut g);
        assert_eq!(result.stopped_after, Some(Stage::Lookahead));
        let root = g.production("S").unwrap().root;
        assert!(g.plan(root).unwrap().has_conflict());
    }
}
