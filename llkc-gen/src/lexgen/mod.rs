//! Lexical automaton builder.
//!
//! One DFA per lexical state, recognizing the union of the token definitions
//! active in that state. The DFA reports the longest match; among equally
//! long matches the definition declared first wins.
//!
//! The stage runs in three steps:
//!  * references between definitions are inlined and every pattern is
//!    checked (sequentially, once per definition),
//!  * each lexical state gets its NFA, DFA, pruning and minimization, one
//!    rayon task per state,
//!  * lexical states that no token action can reach are reported.

pub mod charset;
mod dfa;
mod nfa;

pub use dfa::{Dfa, DfaState, Transition};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::grammar::{EOF, Grammar, Pattern, StateId, TokenKind};
use dfa::{determinize, minimize, prune};
use llkc::{Disposition, ScanTable};
use nfa::Nfa;
use rayon::prelude::*;
use smartstring::alias::String;

/// The DFA of one lexical state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalAutomaton {
    pub name: String,
    /// Kinds active in this state, in declaration order.
    pub tokens: Vec<TokenKind>,
    pub nfa_states: usize,
    pub dfa: Dfa,
}

/// Tables for all lexical states, indexed by [`StateId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerData {
    pub automata: Vec<LexicalAutomaton>,
    /// Indexed by kind.
    pub dispositions: Vec<Disposition>,
    /// Indexed by kind.
    pub next_states: Vec<Option<StateId>>,
}

impl LexerData {
    pub fn automaton(&self, name: &str) -> Option<&LexicalAutomaton> {
        self.automata.iter().find(|a| a.name.as_str() == name)
    }
}

impl ScanTable for LexerData {
    fn initial_mode(&self) -> usize {
        0
    }

    fn mode_name(&self, mode: usize) -> &str {
        self.automata.get(mode).map_or("?", |a| a.name.as_str())
    }

    fn start_state(&self, _mode: usize) -> u32 {
        0
    }

    fn next_state(&self, mode: usize, state: u32, ch: char) -> Option<u32> {
        self.automata.get(mode)?.dfa.next(state, ch as u32)
    }

    fn accepting(&self, mode: usize, state: u32) -> Option<u32> {
        self.automata.get(mode)?.dfa.accept(state)
    }

    fn disposition(&self, kind: u32) -> Disposition {
        self.dispositions
            .get(kind as usize)
            .copied()
            .unwrap_or_default()
    }

    fn next_mode(&self, kind: u32) -> Option<usize> {
        self.next_states.get(kind as usize).copied().flatten()
    }
}

enum RefError {
    Undefined(String),
    Loop(Vec<String>),
}

/// Inlines `Pattern::Ref`s. `stack` holds the definitions being expanded.
fn inline_refs(
    grammar: &Grammar,
    pattern: &Pattern,
    stack: &mut Vec<TokenKind>,
) -> Result<Pattern, RefError> {
    Ok(match pattern {
        Pattern::Ref(name) => {
            let kind = grammar
                .token_kind(name)
                .filter(|&k| k != EOF)
                .ok_or_else(|| RefError::Undefined(name.clone()))?;
            if let Some(pos) = stack.iter().position(|&k| k == kind) {
                let mut cycle: Vec<String> = stack[pos..]
                    .iter()
                    .map(|&k| grammar.tokens[k as usize].name.clone())
                    .collect();
                cycle.push(name.clone());
                return Err(RefError::Loop(cycle));
            }
            stack.push(kind);
            let inlined = inline_refs(grammar, &grammar.tokens[kind as usize].pattern, stack);
            stack.pop();
            inlined?
        }
        Pattern::Seq(items) => Pattern::Seq(inline_all(grammar, items, stack)?),
        Pattern::Alt(items) => Pattern::Alt(inline_all(grammar, items, stack)?),
        Pattern::ZeroOrMore(inner) => {
            Pattern::ZeroOrMore(Box::new(inline_refs(grammar, inner, stack)?))
        }
        Pattern::OneOrMore(inner) => {
            Pattern::OneOrMore(Box::new(inline_refs(grammar, inner, stack)?))
        }
        Pattern::ZeroOrOne(inner) => {
            Pattern::ZeroOrOne(Box::new(inline_refs(grammar, inner, stack)?))
        }
        Pattern::Repeat { inner, min, max } => Pattern::Repeat {
            inner: Box::new(inline_refs(grammar, inner, stack)?),
            min: *min,
            max: *max,
        },
        Pattern::Literal(_) | Pattern::Class(_) => pattern.clone(),
    })
}

fn inline_all(
    grammar: &Grammar,
    items: &[Pattern],
    stack: &mut Vec<TokenKind>,
) -> Result<Vec<Pattern>, RefError> {
    items
        .iter()
        .map(|p| inline_refs(grammar, p, stack))
        .collect()
}

/// Resolved pattern per kind; `None` for `EOF` and for definitions with
/// errors (which are reported).
fn resolve_patterns(grammar: &Grammar, diags: &Diagnostics) -> Vec<Option<Pattern>> {
    grammar
        .tokens
        .iter()
        .map(|token| {
            if token.kind == EOF {
                return None;
            }
            if let Err(e) = token.pattern.validate() {
                diags.report(
                    DiagnosticKind::PatternSyntax,
                    token.span,
                    format!("token {}: {}", token.name, e),
                );
                return None;
            }
            let mut stack = vec![token.kind];
            match inline_refs(grammar, &token.pattern, &mut stack) {
                Err(RefError::Undefined(name)) => {
                    diags.report(
                        DiagnosticKind::UndefinedToken,
                        token.span,
                        format!("token {} refers to undefined token {}", token.name, name),
                    );
                    None
                }
                Err(RefError::Loop(cycle)) => {
                    diags.report(
                        DiagnosticKind::PatternReferenceLoop,
                        token.span,
                        format!("token {} refers to itself: {}", token.name, cycle.join(" -> ")),
                    );
                    None
                }
                Ok(p) if !token.private && p.matches_empty() => {
                    diags.report(
                        DiagnosticKind::EmptyMatchPattern,
                        token.span,
                        format!("token {} matches the empty string", token.name),
                    );
                    None
                }
                Ok(p) => Some(p),
            }
        })
        .collect()
}

fn build_automaton(
    grammar: &Grammar,
    state: &str,
    resolved: &[Option<Pattern>],
    diags: &Diagnostics,
) -> LexicalAutomaton {
    let tokens = grammar.active_tokens(state);
    let mut nfa = Nfa::new();
    for &kind in &tokens {
        let token = &grammar.tokens[kind as usize];
        if let Some(pattern) = &resolved[kind as usize] {
            let ignore_case = token.ignore_case.unwrap_or(grammar.options.ignore_case);
            nfa.add_pattern(pattern, kind, ignore_case);
        }
    }

    let subsets = determinize(&nfa);
    let pruned = prune(&subsets.dfa);
    let dfa = if grammar.options.minimize {
        minimize(&pruned)
    } else {
        pruned
    };

    let accepted = dfa.accepted_kinds();
    for &kind in &tokens {
        if resolved[kind as usize].is_none() || accepted.contains(&kind) {
            continue;
        }
        let token = &grammar.tokens[kind as usize];
        let shadow = subsets
            .kinds
            .iter()
            .zip(&subsets.dfa.states)
            .find(|(kinds, _)| kinds.contains(&kind))
            .and_then(|(_, s)| s.accept);
        let message = match shadow {
            Some(by) => format!(
                "token {} can never be matched in lexical state {}: {} matches the same input first",
                token.name,
                state,
                grammar.token_name(by)
            ),
            None => format!(
                "token {} can never be matched in lexical state {}",
                token.name, state
            ),
        };
        diags.report(DiagnosticKind::UnreachableToken, token.span, message);
    }

    log::debug!(
        "lexer state {}: {} tokens, {} nfa states, {} dfa states ({} before pruning)",
        state,
        tokens.len(),
        nfa.len(),
        dfa.len(),
        subsets.dfa.len()
    );
    LexicalAutomaton {
        name: state.into(),
        tokens,
        nfa_states: nfa.len(),
        dfa,
    }
}

/// Reports lexical states that no token action reaches from the initial one.
fn check_state_reachability(grammar: &Grammar, diags: &Diagnostics) {
    let count = grammar.states.len();
    let mut reached = vec![false; count];
    let mut stack = Vec::new();
    if count > 0 {
        reached[0] = true;
        stack.push(0);
    }
    while let Some(s) = stack.pop() {
        let Some(name) = grammar.states.sym(s) else {
            continue;
        };
        for kind in grammar.active_tokens(name) {
            let token = &grammar.tokens[kind as usize];
            let next = token.next_state.as_deref().and_then(|n| grammar.states.idx(n));
            if let Some(next) = next {
                if !reached[next] {
                    reached[next] = true;
                    stack.push(next);
                }
            }
        }
    }
    for (s, name) in grammar.states.iter().enumerate() {
        if !reached[s] {
            diags.report(
                DiagnosticKind::UnreachableLexicalState,
                grammar.state_spans.get(s).copied().unwrap_or_default(),
                format!(
                    "lexical state {} cannot be reached from {}",
                    name,
                    grammar.initial_state()
                ),
            );
        }
    }
}

/// Stage 1: builds the tables for every lexical state.
///
/// Returns `None` without building any DFA when a definition's pattern is
/// in error; everything found up to that point is reported.
pub fn build_lexer(grammar: &Grammar, diags: &Diagnostics) -> Option<LexerData> {
    let resolved = resolve_patterns(grammar, diags);
    let failed = grammar
        .tokens
        .iter()
        .filter(|t| t.kind != EOF && resolved[t.kind as usize].is_none())
        .count();
    check_state_reachability(grammar, diags);
    if failed > 0 {
        log::debug!("lexer: {} token definitions in error, no automata built", failed);
        return None;
    }

    let states: Vec<&str> = grammar.states.iter().collect();
    let automata: Vec<LexicalAutomaton> = if grammar.options.parallel {
        states
            .par_iter()
            .map(|state| build_automaton(grammar, state, &resolved, diags))
            .collect()
    } else {
        states
            .iter()
            .map(|state| build_automaton(grammar, state, &resolved, diags))
            .collect()
    };

    Some(LexerData {
        automata,
        dispositions: grammar.tokens.iter().map(|t| t.disposition).collect(),
        next_states: grammar
            .tokens
            .iter()
            .map(|t| t.next_state.as_deref().and_then(|n| grammar.states.idx(n)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CharClass, GrammarBuilder, TokenDecl};
    use crate::options::Options;
    use llkc::{EOF_KIND, Scanner};
    use proptest::prelude::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn lexer(b: GrammarBuilder) -> (Grammar, LexerData, Diagnostics) {
        let g = b.build();
        let diags = Diagnostics::new();
        let data = build_lexer(&g, &diags).unwrap();
        (g, data, diags)
    }

    fn scan(data: &LexerData, input: &str) -> Vec<(u32, std::string::String)> {
        Scanner::new(data, input.chars())
            .map(|t| {
                let t = t.unwrap();
                (t.kind, t.image.to_string())
            })
            .collect()
    }

    #[test]
    fn number_plus_number() {
        init_logger();
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("PLUS", Pattern::literal("+")))
            .token(TokenDecl::new("NUMBER", Pattern::parse("[0-9]+").unwrap()));
        let (_, data, diags) = lexer(b);
        assert!(diags.is_empty());
        let toks = scan(&data, "2+3");
        assert_eq!(
            toks,
            vec![
                (2, "2".into()),
                (1, "+".into()),
                (2, "3".into()),
                (EOF_KIND, "".into())
            ]
        );
    }

    #[test]
    fn literal_before_identifier_wins() {
        init_logger();
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("ABC", Pattern::literal("ABC")))
            .token(TokenDecl::new("ID", Pattern::parse("[A-Z][A-Z0-9]*").unwrap()))
            .token(TokenDecl::new("WS", Pattern::parse(" +").unwrap()).skip());
        let (_, data, diags) = lexer(b);
        assert!(diags.is_empty());
        let kinds: Vec<u32> = scan(&data, "ABC ABCD AB").into_iter().map(|t| t.0).collect();
        assert_eq!(kinds, vec![1, 2, 2, EOF_KIND]);
    }

    #[test]
    fn shadowed_literal_is_unreachable() {
        init_logger();
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("ID", Pattern::parse("[a-z]+").unwrap()))
            .token(TokenDecl::new("IF", Pattern::literal("if")));
        let (_, data, diags) = lexer(b);
        let snap = diags.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].kind, DiagnosticKind::UnreachableToken);
        assert!(snap[0].message.contains("IF"));
        assert!(snap[0].message.contains("ID matches"));
        assert!(!data.automata[0].dfa.accepted_kinds().contains(&2));
    }

    #[test]
    fn references_and_private_tokens() {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("DIGIT", Pattern::parse("[0-9]").unwrap()).private())
            .token(TokenDecl::new(
                "INT",
                Pattern::OneOrMore(Box::new(Pattern::reference("DIGIT"))),
            ));
        let (_, data, diags) = lexer(b);
        assert!(diags.is_empty());
        assert_eq!(data.automata[0].tokens, vec![2]);
        assert_eq!(scan(&data, "42")[0], (2, "42".into()));
    }

    #[test]
    fn reference_errors() {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("A", Pattern::Seq(vec![Pattern::literal("a"), Pattern::reference("B")])))
            .token(TokenDecl::new("B", Pattern::Seq(vec![Pattern::literal("b"), Pattern::reference("A")])))
            .token(TokenDecl::new("C", Pattern::reference("NOPE")))
            .token(TokenDecl::new("D", Pattern::parse("x*").unwrap()))
            .token(TokenDecl::new("E", Pattern::Class(CharClass::range('z', 'a'))))
            .token(TokenDecl::new("F", Pattern::literal("f")));
        let g = b.build();
        let diags = Diagnostics::new();
        assert_eq!(build_lexer(&g, &diags), None);
        let kinds: Vec<DiagnosticKind> = diags.snapshot().into_iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds
                .iter()
                .filter(|&&k| k == DiagnosticKind::PatternReferenceLoop)
                .count(),
            2
        );
        assert!(kinds.contains(&DiagnosticKind::UndefinedToken));
        assert!(kinds.contains(&DiagnosticKind::EmptyMatchPattern));
        assert!(kinds.contains(&DiagnosticKind::PatternSyntax));
        assert!(diags.has_fatal());
    }

    #[test]
    fn lexical_states_and_more() {
        init_logger();
        let mut b = GrammarBuilder::new();
        b.lexical_state("DEFAULT", Default::default())
            .lexical_state("STRING", Default::default())
            .lexical_state("ORPHAN", Default::default())
            .token(TokenDecl::new("ID", Pattern::parse("[a-z]+").unwrap()))
            .token(TokenDecl::new("OPEN", Pattern::literal("\"")).more().next_state("STRING"))
            .token(
                TokenDecl::new("BODY", Pattern::parse("[^\"]").unwrap())
                    .more()
                    .in_states(&["STRING"]),
            )
            .token(
                TokenDecl::new("STR", Pattern::literal("\""))
                    .in_states(&["STRING"])
                    .next_state("DEFAULT"),
            )
            .token(TokenDecl::new("KW", Pattern::literal("KW")).ignore_case(true));
        let (_, data, diags) = lexer(b);
        let snap = diags.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].kind, DiagnosticKind::UnreachableLexicalState);
        assert!(snap[0].message.contains("ORPHAN"));

        let toks = scan(&data, "ab\"x y\"kW");
        assert_eq!(
            toks,
            vec![
                (1, "ab".into()),
                (4, "\"x y\"".into()),
                (5, "kW".into()),
                (EOF_KIND, "".into())
            ]
        );
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let build = |parallel: bool| {
            let mut b = GrammarBuilder::with_options(Options::default().with_parallel(parallel));
            b.lexical_state("A", Default::default())
                .lexical_state("B", Default::default())
                .token(TokenDecl::new("X", Pattern::parse("x+|y").unwrap()).next_state("B"))
                .token(TokenDecl::new("Z", Pattern::parse("[a-z]{1,3}").unwrap()).in_all_states());
            lexer(b).1
        };
        assert_eq!(build(true), build(false));
    }

    #[test]
    fn minimization_can_be_disabled() {
        let build = |minimize: bool| {
            let mut b = GrammarBuilder::with_options(Options::default().with_minimize(minimize));
            b.token(TokenDecl::new("X", Pattern::parse("a(b|c)d").unwrap()));
            lexer(b).1
        };
        let small = build(true);
        let large = build(false);
        assert!(small.automata[0].dfa.len() <= large.automata[0].dfa.len());
        assert_eq!(small.automata[0].dfa.len(), 4);
    }

    proptest! {
        #[test]
        fn dfa_agrees_with_nfa(input in "[a-c0-2 ]{0,12}") {
            let patterns = ["ab", "a[a-c]*", "[0-2]+", "b|c", "[ a]{1,2}"];
            let mut b = GrammarBuilder::with_options(Options::default().with_parallel(false));
            for (i, p) in patterns.iter().enumerate() {
                b.token(TokenDecl::new(&format!("T{}", i), Pattern::parse(p).unwrap()));
            }
            let (g, data, _) = lexer(b);
            let mut nfa = Nfa::new();
            for t in g.tokens.iter().skip(1) {
                nfa.add_pattern(&t.pattern, t.kind, false);
            }
            let chars: Vec<char> = input.chars().collect();
            prop_assert_eq!(data.automata[0].dfa.longest_match(&chars), nfa.longest_match(&chars));
        }
    }
}
