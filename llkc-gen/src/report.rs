//! Text dumps of an annotated grammar.
//!
//! The output is meant for people and for golden tests: everything is
//! printed in id order, so two compilations of the same grammar produce
//! identical bytes.

use crate::closure::TokenSequenceSet;
use crate::diagnostics::Diagnostic;
use crate::grammar::{ExpId, ExpansionKind, Grammar};
use crate::lexgen::{LexicalAutomaton, Transition};
use crate::resolve::{AltLookahead, Outcome};
use anyhow::{Context, Result};
use std::io::Write;

fn char_label(c: u32) -> String {
    match char::from_u32(c) {
        Some(ch) if ch.is_ascii_graphic() => format!("'{}'", ch),
        _ => format!("0x{:X}", c),
    }
}

fn range_label(t: &Transition) -> String {
    if t.lo == t.hi {
        char_label(t.lo)
    } else {
        format!("{}-{}", char_label(t.lo), char_label(t.hi))
    }
}

fn set_label(grammar: &Grammar, set: &TokenSequenceSet) -> String {
    let seqs: Vec<String> = set
        .iter()
        .map(|seq| {
            if seq.is_empty() {
                "`empty'".to_string()
            } else {
                seq.iter()
                    .map(|&k| grammar.token_name(k))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        })
        .collect();
    format!("{{{}}}", seqs.join(", "))
}

/// Writes the DFA of every lexical state.
///
/// # Parameters
/// - `out`: Output writer (e.g., file or buffer).
/// - `grammar`: A grammar that went through lexer construction.
pub fn write_lexer<W: Write>(out: &mut W, grammar: &Grammar) -> Result<()> {
    let lexer = grammar
        .lexer
        .as_ref()
        .context("grammar has no lexer tables")?;
    for (mode, automaton) in lexer.automata.iter().enumerate() {
        write_automaton(out, grammar, mode, automaton)
            .with_context(|| format!("writing lexical state {}", automaton.name))?;
    }
    Ok(())
}

fn write_automaton<W: Write>(
    out: &mut W,
    grammar: &Grammar,
    mode: usize,
    automaton: &LexicalAutomaton,
) -> Result<()> {
    writeln!(
        out,
        "LEXICAL STATE {} ({}): {} nfa states, {} dfa states",
        automaton.name,
        mode,
        automaton.nfa_states,
        automaton.dfa.len()
    )?;
    let tokens: Vec<&str> = automaton
        .tokens
        .iter()
        .map(|&k| grammar.token_name(k))
        .collect();
    writeln!(out, "  tokens: {}", tokens.join(" "))?;
    for (id, state) in automaton.dfa.states.iter().enumerate() {
        write!(out, "  {}:", id)?;
        if let Some(kind) = state.accept {
            write!(out, " accept {}", grammar.token_name(kind))?;
        }
        for t in &state.transitions {
            write!(out, " {}->{}", range_label(t), t.target)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes FIRST and FOLLOW of every production, `` `empty' `` standing for
/// the empty sequence.
pub fn write_closure<W: Write>(out: &mut W, grammar: &Grammar) -> Result<()> {
    let closure = grammar
        .closure
        .as_ref()
        .context("grammar has no closure sets")?;
    writeln!(out, "K = {}", closure.k)?;
    for p in &grammar.productions {
        writeln!(
            out,
            "FIRST,{},{}",
            p.name,
            set_label(grammar, &closure.prod_first[p.id])
        )?;
        writeln!(
            out,
            "FOLLOW,{},{}",
            p.name,
            set_label(grammar, &closure.prod_follow[p.id])
        )?;
    }
    Ok(())
}

fn construct(grammar: &Grammar, id: ExpId) -> &'static str {
    match grammar.exp(id).kind {
        ExpansionKind::Choice(_) => "choice",
        ExpansionKind::ZeroOrMore(_) => "zero-or-more",
        ExpansionKind::OneOrMore(_) => "one-or-more",
        ExpansionKind::ZeroOrOne(_) => "zero-or-one",
        _ => "expansion",
    }
}

fn write_alternative<W: Write>(
    out: &mut W,
    grammar: &Grammar,
    n: usize,
    alt: &AltLookahead,
) -> Result<()> {
    match alt.expansion {
        Some(_) => write!(out, "  alt {} depth {}", n + 1, alt.depth)?,
        None => write!(out, "  exit depth {}", alt.depth)?,
    }
    if let Some(guard) = &alt.guard {
        let mut parts = Vec::new();
        if let Some(code) = &guard.semantic {
            parts.push(format!("semantic {:?}", code.as_str()));
        }
        if let Some(scan) = guard.scan {
            parts.push(format!("scan {}", grammar.exp(scan).span.display()));
        }
        if guard.negated {
            parts.push("negated".to_string());
        }
        write!(out, " guard({})", parts.join(", "))?;
    }
    writeln!(out, ": {}", set_label(grammar, &alt.set))?;
    Ok(())
}

/// Writes the plan of every choice point in arena order.
pub fn write_plans<W: Write>(out: &mut W, grammar: &Grammar) -> Result<()> {
    for id in grammar.choice_points() {
        let Some(plan) = grammar.plan(id) else {
            writeln!(out, "{} {}: no plan", construct(grammar, id), grammar.describe(id))?;
            continue;
        };
        let outcome = match &plan.outcome {
            Outcome::Resolved => "resolved".to_string(),
            Outcome::Conflict {
                first,
                second,
                prefix,
            } => format!(
                "conflict between {} and {} on {}",
                first + 1,
                second + 1,
                set_label(grammar, &TokenSequenceSet::from_seqs([prefix.clone()]))
            ),
        };
        writeln!(
            out,
            "{} {}: k={}, {}",
            construct(grammar, id),
            grammar.describe(id),
            plan.k,
            outcome
        )?;
        for (n, alt) in plan.alternatives.iter().enumerate() {
            write_alternative(out, grammar, n, alt)
                .with_context(|| format!("writing plan of {}", grammar.describe(id)))?;
        }
    }
    Ok(())
}

/// One diagnostic per line, in the order given.
pub fn write_diagnostics<W: Write>(out: &mut W, diagnostics: &[Diagnostic]) -> Result<()> {
    for d in diagnostics {
        writeln!(out, "{}", d).context("writing diagnostics")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, Pattern, TokenDecl};
    use crate::pipeline::compile;

    fn text(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn grammar() -> Grammar {
        let mut b = GrammarBuilder::new();
        b.token(TokenDecl::new("X", Pattern::literal("x")))
            .token(TokenDecl::new("Y", Pattern::literal("y")))
            .token(TokenDecl::new("Z", Pattern::literal("z")))
            .production(
                "A",
                Expr::choice([
                    Expr::seq([Expr::tok("X"), Expr::tok("Y")]),
                    Expr::seq([Expr::tok("X"), Expr::tok("Z")]),
                ]),
            );
        b.build()
    }

    #[test]
    fn dumps() {
        let mut g = grammar();
        let result = compile(&mut g);
        assert!(!result.has_fatal());

        let lexer = text(|out| write_lexer(out, &g));
        assert!(lexer.starts_with("LEXICAL STATE DEFAULT (0): "));
        assert!(lexer.contains("  tokens: X Y Z\n"));
        assert!(lexer.contains("  0: 'x'->1 'y'->2 'z'->3\n"));
        assert!(lexer.contains("  3: accept Z\n"));

        let closure = text(|out| write_closure(out, &g));
        assert_eq!(closure, "K = 2\nFIRST,A,{X Y, X Z}\nFOLLOW,A,{EOF}\n");

        let plans = text(|out| write_plans(out, &g));
        assert!(plans.starts_with("choice A at "));
        assert!(plans.contains(": k=2, resolved\n"));
        assert!(plans.contains("  alt 1 depth 2: {X Y}\n"));
        assert!(plans.contains("  alt 2 depth 2: {X Z}\n"));

        let diags = text(|out| write_diagnostics(out, &result.diagnostics));
        assert_eq!(diags.lines().count(), 1);
        assert!(diags.contains("note: LookaheadGrowth"));
    }

    #[test]
    fn missing_annotations_are_errors() {
        let g = grammar();
        let mut out = Vec::new();
        let err = write_lexer(&mut out, &g).unwrap_err();
        assert!(err.to_string().contains("no lexer tables"));
        assert!(write_closure(&mut out, &g).is_err());
    }
}
