//! Name resolution and structural checks run before the analysis stages.
//!
//! Token names and string literals used in productions are resolved to token
//! kinds here; only definitions the scanner hands to the parser qualify.
//! Everything else only reports.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::grammar::{ExpId, ExpansionKind, Grammar, StateScope};
use llkc::Disposition;

pub fn validate(grammar: &mut Grammar, diags: &Diagnostics) {
    for d in &grammar.declaration_errors {
        diags.push(d.clone());
    }
    check_lexical_states(grammar, diags);
    resolve_tokens(grammar, diags);
    check_nonterminals(grammar, diags);
    check_lookahead_placement(grammar, diags);
    log::debug!(
        "validate: {} diagnostics, {} tokens after literal resolution",
        diags.len(),
        grammar.tokens.len()
    );
}

fn check_lexical_states(grammar: &Grammar, diags: &Diagnostics) {
    for token in &grammar.tokens {
        let mut names: Vec<&str> = match &token.states {
            StateScope::Only(names) => names.iter().map(|n| n.as_str()).collect(),
            StateScope::Initial | StateScope::All => Vec::new(),
        };
        names.extend(token.next_state.as_deref());
        for name in names {
            if grammar.states.idx(name).is_none() {
                diags.report(
                    DiagnosticKind::UndefinedLexicalState,
                    token.span,
                    format!("token {} refers to undefined lexical state {}", token.name, name),
                );
            }
        }
    }
}

fn resolve_tokens(grammar: &mut Grammar, diags: &Diagnostics) {
    for id in 0..grammar.exp_count() {
        let id = ExpId(id);
        let span = grammar.exp(id).span;
        let resolved = match &grammar.exp(id).kind {
            ExpansionKind::TokenName(name) => match grammar.token_kind(name) {
                Some(kind) if grammar.tokens[kind as usize].private => {
                    diags.report(
                        DiagnosticKind::UndefinedToken,
                        span,
                        format!("private token {} cannot be used in a production", name),
                    );
                    None
                }
                Some(kind) if grammar.tokens[kind as usize].disposition != Disposition::Token => {
                    diags.report(
                        DiagnosticKind::NonTokenReference,
                        span,
                        format!(
                            "token {} is {:?}, not handed to the parser; it cannot be used in a production",
                            name,
                            grammar.tokens[kind as usize].disposition
                        ),
                    );
                    None
                }
                Some(kind) => Some(kind),
                None => {
                    diags.report(
                        DiagnosticKind::UndefinedToken,
                        span,
                        format!("undefined token {}", name),
                    );
                    None
                }
            },
            ExpansionKind::Literal(image) => match grammar.literal_definition(image) {
                Some(t) if t.disposition != Disposition::Token => {
                    diags.report(
                        DiagnosticKind::NonTokenReference,
                        span,
                        format!(
                            "string {:?} is defined as {:?} by token {}; it cannot be used in a production",
                            image.as_str(),
                            t.disposition,
                            t.name
                        ),
                    );
                    None
                }
                Some(t) => Some(t.kind),
                None => {
                    let image = image.clone();
                    log::debug!("adding anonymous token for literal {:?}", image);
                    Some(grammar.add_literal_token(&image, span))
                }
            },
            _ => None,
        };
        if let Some(kind) = resolved {
            grammar.exp_mut(id).kind = ExpansionKind::Token(kind);
        }
    }
}

fn check_nonterminals(grammar: &Grammar, diags: &Diagnostics) {
    for id in grammar.exp_ids() {
        if let ExpansionKind::NonTerminal(name) = &grammar.exp(id).kind {
            if grammar.production(name).is_none() {
                diags.report(
                    DiagnosticKind::UndefinedNonTerminal,
                    grammar.exp(id).span,
                    format!(
                        "undefined nonterminal {} in {}",
                        name,
                        grammar.productions[grammar.exp(id).production].name
                    ),
                );
            }
        }
    }
}

/// A lookahead must be the first unit of a sequence that is an alternative
/// of a choice or the body of a repetition.
fn check_lookahead_placement(grammar: &Grammar, diags: &Diagnostics) {
    for id in grammar.exp_ids() {
        let ExpansionKind::Lookahead(la) = &grammar.exp(id).kind else {
            continue;
        };
        if la.amount.is_none() && la.semantic.is_none() && la.nested.is_none() {
            diags.report(
                DiagnosticKind::MisplacedLookahead,
                grammar.exp(id).span,
                "lookahead specifies nothing",
            );
            continue;
        }
        if !is_well_placed(grammar, id) {
            diags.report(
                DiagnosticKind::MisplacedLookahead,
                grammar.exp(id).span,
                format!(
                    "lookahead is only allowed at the start of an alternative or loop body, found in {}",
                    grammar.describe(id)
                ),
            );
        }
    }
}

fn is_well_placed(grammar: &Grammar, id: ExpId) -> bool {
    let Some(seq) = grammar.exp(id).parent else {
        return false;
    };
    let ExpansionKind::Sequence(items) = &grammar.exp(seq).kind else {
        return false;
    };
    if items.first() != Some(&id) {
        return false;
    }
    grammar
        .exp(seq)
        .parent
        .is_some_and(|p| grammar.exp(p).kind.is_choice_point())
}
