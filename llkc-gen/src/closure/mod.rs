//! Set/closure engine.
//!
//! Computes, for every expansion node, whether it can derive the empty
//! string, its FIRST set and its FOLLOW set, all bounded by `K` tokens where
//! `K` is the largest lookahead any choice point may need. Every set is a
//! least fixed point over the production graph: iteration starts from empty
//! sets and stops when a full pass changes nothing.
//!
//! This stage also finds left recursion and loop bodies that can match
//! nothing, both of which would make a generated parser spin.

mod seqset;

pub use seqset::TokenSequenceSet;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::grammar::{EOF, ExpId, ExpansionKind, Grammar, ProdId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureSets {
    /// The bound every set was computed with.
    pub k: usize,
    /// Indexed by expansion.
    pub nullable: Vec<bool>,
    pub first: Vec<TokenSequenceSet>,
    pub follow: Vec<TokenSequenceSet>,
    /// Indexed by production.
    pub prod_nullable: Vec<bool>,
    pub prod_first: Vec<TokenSequenceSet>,
    pub prod_follow: Vec<TokenSequenceSet>,
    /// Productions on a left-recursive cycle.
    pub left_recursive: BTreeSet<ProdId>,
    /// Fixed-point passes (nullable, first, follow).
    pub iterations: (usize, usize, usize),
}

impl ClosureSets {
    /// FIRST of `id` cut to `k` tokens.
    pub fn first_k(&self, id: ExpId, k: usize) -> TokenSequenceSet {
        self.first[id.0].truncate(k)
    }

    pub fn follow_k(&self, id: ExpId, k: usize) -> TokenSequenceSet {
        self.follow[id.0].truncate(k)
    }

    /// The token sequences that can start at `id` when it is followed by
    /// whatever follows `context`: `FIRST_k(id) · FOLLOW_k(context)`.
    pub fn lookahead(&self, id: ExpId, context: ExpId, k: usize) -> TokenSequenceSet {
        self.first[id.0].concat(&self.follow[context.0], k)
    }
}

/// Production referenced by a nonterminal node, if it exists.
fn target(grammar: &Grammar, name: &str) -> Option<ProdId> {
    grammar.production(name).map(|p| p.id)
}

fn compute_nullable(grammar: &Grammar) -> (Vec<bool>, Vec<bool>, usize) {
    let mut nullable = vec![false; grammar.exp_count()];
    let mut prod_nullable = vec![false; grammar.productions.len()];
    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;
        for id in grammar.exp_ids() {
            let value = match &grammar.exp(id).kind {
                ExpansionKind::Sequence(items) => items.iter().all(|i| nullable[i.0]),
                ExpansionKind::Choice(items) => items.iter().any(|i| nullable[i.0]),
                ExpansionKind::ZeroOrMore(_) | ExpansionKind::ZeroOrOne(_) => true,
                ExpansionKind::OneOrMore(body) => nullable[body.0],
                ExpansionKind::NonTerminal(name) => {
                    target(grammar, name).is_some_and(|p| prod_nullable[p])
                }
                ExpansionKind::Token(_)
                | ExpansionKind::TokenName(_)
                | ExpansionKind::Literal(_) => false,
                ExpansionKind::Action(_) | ExpansionKind::Lookahead(_) => true,
            };
            if value && !nullable[id.0] {
                nullable[id.0] = true;
                changed = true;
            }
        }
        for p in &grammar.productions {
            if nullable[p.root.0] && !prod_nullable[p.id] {
                prod_nullable[p.id] = true;
                changed = true;
            }
        }
        if !changed {
            return (nullable, prod_nullable, passes);
        }
    }
}

fn compute_first(
    grammar: &Grammar,
    k: usize,
) -> (Vec<TokenSequenceSet>, Vec<TokenSequenceSet>, usize) {
    let mut first = vec![TokenSequenceSet::empty(); grammar.exp_count()];
    let mut prod_first = vec![TokenSequenceSet::empty(); grammar.productions.len()];
    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;
        for id in grammar.exp_ids() {
            let value = match &grammar.exp(id).kind {
                ExpansionKind::Sequence(items) => items
                    .iter()
                    .fold(TokenSequenceSet::epsilon(), |acc, i| acc.concat(&first[i.0], k)),
                ExpansionKind::Choice(items) => {
                    items.iter().fold(TokenSequenceSet::empty(), |acc, i| acc.union(&first[i.0]))
                }
                ExpansionKind::ZeroOrOne(body) => first[body.0].union(&TokenSequenceSet::epsilon()),
                ExpansionKind::ZeroOrMore(body) => first[body.0].kleene(k),
                ExpansionKind::OneOrMore(body) => {
                    first[body.0].concat(&first[body.0].kleene(k), k)
                }
                ExpansionKind::NonTerminal(name) => target(grammar, name)
                    .map(|p| prod_first[p].clone())
                    .unwrap_or_default(),
                ExpansionKind::Token(kind) => TokenSequenceSet::token(*kind),
                ExpansionKind::TokenName(_) | ExpansionKind::Literal(_) => {
                    TokenSequenceSet::empty()
                }
                ExpansionKind::Action(_) | ExpansionKind::Lookahead(_) => {
                    TokenSequenceSet::epsilon()
                }
            };
            if first[id.0].union_with(&value) {
                changed = true;
            }
        }
        for p in &grammar.productions {
            let root = first[p.root.0].clone();
            if prod_first[p.id].union_with(&root) {
                changed = true;
            }
        }
        if !changed {
            return (first, prod_first, passes);
        }
    }
}

/// FOLLOW sets. The start production and productions nothing refers to are
/// followed by `EOF`; the nested expansion of a syntactic lookahead is
/// followed by the end of the scan, `{ε}`.
fn compute_follow(
    grammar: &Grammar,
    first: &[TokenSequenceSet],
    k: usize,
) -> (Vec<TokenSequenceSet>, Vec<TokenSequenceSet>, usize) {
    let mut follow = vec![TokenSequenceSet::empty(); grammar.exp_count()];
    let mut prod_follow = vec![TokenSequenceSet::empty(); grammar.productions.len()];

    let mut referenced = vec![false; grammar.productions.len()];
    for id in grammar.exp_ids() {
        if let ExpansionKind::NonTerminal(name) = &grammar.exp(id).kind {
            if let Some(p) = target(grammar, name) {
                referenced[p] = true;
            }
        }
    }
    for p in &grammar.productions {
        if Some(p.id) == grammar.start_production() || !referenced[p.id] {
            prod_follow[p.id].insert(vec![EOF]);
        }
    }

    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;
        for p in &grammar.productions {
            let value = prod_follow[p.id].clone();
            changed |= follow[p.root.0].union_with(&value);
        }
        // Parents come after their children in the arena, so a reverse walk
        // sees each parent's FOLLOW before its children need it.
        for id in (0..grammar.exp_count()).rev().map(ExpId) {
            let outer = follow[id.0].clone();
            match &grammar.exp(id).kind {
                ExpansionKind::Sequence(items) => {
                    let mut rest = outer;
                    for item in items.iter().rev() {
                        changed |= follow[item.0].union_with(&rest);
                        rest = first[item.0].concat(&rest, k);
                    }
                }
                ExpansionKind::Choice(items) => {
                    for item in items {
                        changed |= follow[item.0].union_with(&outer);
                    }
                }
                ExpansionKind::ZeroOrOne(body) => {
                    changed |= follow[body.0].union_with(&outer);
                }
                ExpansionKind::ZeroOrMore(body) | ExpansionKind::OneOrMore(body) => {
                    let value = first[body.0].kleene(k).concat(&outer, k);
                    changed |= follow[body.0].union_with(&value);
                }
                ExpansionKind::NonTerminal(name) => {
                    if let Some(p) = target(grammar, name) {
                        changed |= prod_follow[p].union_with(&outer);
                    }
                }
                ExpansionKind::Lookahead(la) => {
                    if let Some(nested) = la.nested {
                        changed |= follow[nested.0].union_with(&TokenSequenceSet::epsilon());
                    }
                }
                ExpansionKind::Token(_)
                | ExpansionKind::TokenName(_)
                | ExpansionKind::Literal(_)
                | ExpansionKind::Action(_) => {}
            }
        }
        if !changed {
            return (follow, prod_follow, passes);
        }
    }
}

/// Productions that can appear leftmost in a derivation of `id`.
fn leftmost(grammar: &Grammar, nullable: &[bool], id: ExpId, out: &mut Vec<ProdId>) {
    match &grammar.exp(id).kind {
        ExpansionKind::Sequence(items) => {
            for item in items {
                leftmost(grammar, nullable, *item, out);
                if !nullable[item.0] {
                    break;
                }
            }
        }
        ExpansionKind::Choice(items) => {
            for item in items {
                leftmost(grammar, nullable, *item, out);
            }
        }
        ExpansionKind::ZeroOrMore(body)
        | ExpansionKind::OneOrMore(body)
        | ExpansionKind::ZeroOrOne(body) => leftmost(grammar, nullable, *body, out),
        ExpansionKind::NonTerminal(name) => out.extend(target(grammar, name)),
        ExpansionKind::Token(_)
        | ExpansionKind::TokenName(_)
        | ExpansionKind::Literal(_)
        | ExpansionKind::Action(_)
        | ExpansionKind::Lookahead(_) => {}
    }
}

/// Depth-first search over leftmost-production edges with an explicit
/// stack. An edge into a production that is still on the active path
/// closes a cycle.
fn find_left_recursion(
    grammar: &Grammar,
    nullable: &[bool],
    diags: &Diagnostics,
) -> BTreeSet<ProdId> {
    let count = grammar.productions.len();
    let edges: Vec<Vec<ProdId>> = grammar
        .productions
        .iter()
        .map(|p| {
            let mut out = Vec::new();
            leftmost(grammar, nullable, p.root, &mut out);
            out.sort_unstable();
            out.dedup();
            out
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }
    let mut mark = vec![Mark::New; count];
    let mut recursive = BTreeSet::new();

    for root in 0..count {
        if mark[root] != Mark::New {
            continue;
        }
        // (production, next edge index)
        let mut stack: Vec<(ProdId, usize)> = vec![(root, 0)];
        mark[root] = Mark::Active;
        while let Some(top) = stack.last_mut() {
            let (p, next) = *top;
            top.1 += 1;
            let Some(&q) = edges[p].get(next) else {
                mark[p] = Mark::Done;
                stack.pop();
                continue;
            };
            match mark[q] {
                Mark::New => {
                    mark[q] = Mark::Active;
                    stack.push((q, 0));
                }
                Mark::Active => {
                    let pos = stack.iter().position(|&(s, _)| s == q).unwrap_or(0);
                    let cycle: Vec<&str> = stack[pos..]
                        .iter()
                        .map(|&(s, _)| grammar.productions[s].name.as_str())
                        .chain(std::iter::once(grammar.productions[q].name.as_str()))
                        .collect();
                    for &(s, _) in &stack[pos..] {
                        recursive.insert(s);
                    }
                    let prod = &grammar.productions[q];
                    diags.report(
                        DiagnosticKind::LeftRecursion,
                        prod.span,
                        format!(
                            "production {} is left-recursive: {}",
                            prod.name,
                            cycle.join(" -> ")
                        ),
                    );
                }
                Mark::Done => {}
            }
        }
    }
    recursive
}

/// Loop bodies that can match nothing never make progress.
fn check_nullable_bodies(grammar: &Grammar, nullable: &[bool], diags: &Diagnostics) {
    for id in grammar.exp_ids() {
        let exp = grammar.exp(id);
        match &exp.kind {
            ExpansionKind::ZeroOrMore(body) | ExpansionKind::OneOrMore(body)
                if nullable[body.0] =>
            {
                diags.report(
                    DiagnosticKind::NullableLoopBody,
                    exp.span,
                    format!(
                        "loop body in {} can match the empty string",
                        grammar.describe(id)
                    ),
                );
            }
            ExpansionKind::ZeroOrOne(body) if nullable[body.0] => {
                diags.report(
                    DiagnosticKind::NullableOptionalBody,
                    exp.span,
                    format!(
                        "optional body in {} can match the empty string",
                        grammar.describe(id)
                    ),
                );
            }
            _ => {}
        }
    }
}

/// Stage 2: the whole-grammar fixed point.
pub fn compute_closure(grammar: &Grammar, diags: &Diagnostics) -> ClosureSets {
    let k = grammar
        .options
        .max_lookahead
        .max(grammar.max_explicit_lookahead())
        .max(1);

    let (nullable, prod_nullable, n_passes) = compute_nullable(grammar);
    let left_recursive = find_left_recursion(grammar, &nullable, diags);
    check_nullable_bodies(grammar, &nullable, diags);

    let (first, prod_first, f_passes) = compute_first(grammar, k);
    let (follow, prod_follow, w_passes) = compute_follow(grammar, &first, k);
    log::debug!(
        "closure: K={}, {} expansions, passes nullable={} first={} follow={}, left-recursive={}",
        k,
        grammar.exp_count(),
        n_passes,
        f_passes,
        w_passes,
        left_recursive.len()
    );

    ClosureSets {
        k,
        nullable,
        first,
        follow,
        prod_nullable,
        prod_first,
        prod_follow,
        left_recursive,
        iterations: (n_passes, f_passes, w_passes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, Pattern, TokenDecl};
    use crate::validate::validate;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn grammar(tokens: &[&str], prods: Vec<(&str, Expr)>) -> Grammar {
        let mut b = GrammarBuilder::new();
        for t in tokens {
            b.token(TokenDecl::new(t, Pattern::literal(&t.to_lowercase())));
        }
        for (name, e) in prods {
            b.production(name, e);
        }
        let mut g = b.build();
        let diags = Diagnostics::new();
        validate(&mut g, &diags);
        assert!(!diags.has_fatal(), "{:?}", diags.snapshot());
        g
    }

    fn seqs(g: &Grammar, set: &TokenSequenceSet) -> Vec<std::string::String> {
        set.iter()
            .map(|s| {
                s.iter()
                    .map(|&k| g.token_name(k))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    #[test]
    fn first_and_follow_of_expression_grammar() {
        init_logger();
        // E ::= T (PLUS T)* ; T ::= NUM | LP E RP
        let g = grammar(
            &["PLUS", "NUM", "LP", "RP"],
            vec![
                (
                    "E",
                    Expr::seq([Expr::nt("T"), Expr::star(Expr::seq([Expr::tok("PLUS"), Expr::nt("T")]))]),
                ),
                (
                    "T",
                    Expr::choice([
                        Expr::tok("NUM"),
                        Expr::seq([Expr::tok("LP"), Expr::nt("E"), Expr::tok("RP")]),
                    ]),
                ),
            ],
        );
        let diags = Diagnostics::new();
        let sets = compute_closure(&g, &diags);
        assert!(diags.is_empty());
        assert_eq!(sets.k, 2);

        let first_e = sets.prod_first[0].truncate(1);
        assert_eq!(seqs(&g, &first_e), vec!["NUM", "LP"]);
        assert_eq!(seqs(&g, &sets.prod_follow[0].truncate(1)), vec!["EOF", "RP"]);
        assert!(sets.prod_follow[0].contains(&[4, 1]));
        let follow_t: Vec<_> = seqs(&g, &sets.prod_follow[1].truncate(1));
        assert_eq!(follow_t, vec!["EOF", "PLUS", "RP"]);
        assert!(sets.prod_first[0].contains(&[2, 1]));
        assert!(sets.prod_first[0].contains(&[3, 2]));
        assert!(sets.prod_first[0].contains(&[3, 3]));
        assert!(!sets.prod_nullable[0]);
    }

    #[test]
    fn nullable_and_kleene() {
        let g = grammar(
            &["A", "B"],
            vec![("S", Expr::seq([Expr::star(Expr::tok("A")), Expr::opt(Expr::tok("B"))]))],
        );
        let sets = compute_closure(&g, &Diagnostics::new());
        let root = g.production("S").unwrap().root;
        assert!(sets.nullable[root.0]);
        assert_eq!(
            seqs(&g, &sets.first[root.0]),
            vec!["", "A", "A A", "A B", "B"]
        );
    }

    #[test]
    fn direct_left_recursion() {
        init_logger();
        let g = grammar(
            &["PLUS", "T"],
            vec![(
                "E",
                Expr::choice([
                    Expr::seq([Expr::nt("E"), Expr::tok("PLUS"), Expr::tok("T")]),
                    Expr::tok("T"),
                ]),
            )],
        );
        let diags = Diagnostics::new();
        let sets = compute_closure(&g, &diags);
        let snap = diags.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].kind, DiagnosticKind::LeftRecursion);
        assert!(snap[0].message.contains("E -> E"));
        assert!(sets.left_recursive.contains(&0));
    }

    #[test]
    fn indirect_left_recursion_through_nullable_prefix() {
        let g = grammar(
            &["X"],
            vec![
                ("A", Expr::seq([Expr::opt(Expr::tok("X")), Expr::nt("B")])),
                ("B", Expr::choice([Expr::seq([Expr::action("{}"), Expr::nt("A")]), Expr::tok("X")])),
            ],
        );
        let diags = Diagnostics::new();
        let sets = compute_closure(&g, &diags);
        assert!(diags.has_fatal());
        assert_eq!(sets.left_recursive, BTreeSet::from([0, 1]));
        assert!(diags.snapshot()[0].message.contains("A -> B -> A"));
    }

    #[test]
    fn nullable_loop_body_is_fatal() {
        let g = grammar(
            &["A"],
            vec![
                ("S", Expr::seq([Expr::star(Expr::opt(Expr::tok("A"))), Expr::tok("A")])),
                ("T", Expr::opt(Expr::action("{}"))),
            ],
        );
        let diags = Diagnostics::new();
        compute_closure(&g, &diags);
        let kinds: Vec<_> = diags.snapshot().into_iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&DiagnosticKind::NullableLoopBody));
        assert!(kinds.contains(&DiagnosticKind::NullableOptionalBody));
    }

    #[test]
    fn unreferenced_production_is_followed_by_eof() {
        let g = grammar(
            &["A"],
            vec![("S", Expr::tok("A")), ("Other", Expr::tok("A"))],
        );
        let sets = compute_closure(&g, &Diagnostics::new());
        assert!(sets.prod_follow[1].contains(&[EOF]));
    }
}
