//! Lookahead resolution.
//!
//! Every choice point gets a [`LookaheadPlan`]. The number of tokens an
//! alternative needs is found by a small state machine that starts at one
//! token and grows only the alternatives that still overlap, up to
//! [`Options::max_lookahead`](crate::options::Options::max_lookahead). What
//! is still ambiguous at that depth is a conflict, settled in declaration
//! order.

mod plan;

pub use plan::{AltLookahead, Guard, LookaheadPlan, Outcome};

use crate::closure::{ClosureSets, TokenSequenceSet};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::grammar::{ExpId, ExpansionKind, Grammar, Lookahead, TokenKind};
use crate::options::ConflictPolicy;
use rayon::prelude::*;

/// Search state for one choice point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Try(usize),
    Resolved(usize),
    GrowK(usize),
    ConflictAtMax(usize),
}

/// The first explicit lookahead of an alternative, if it has one.
fn explicit_lookahead(grammar: &Grammar, alt: ExpId) -> Option<&Lookahead> {
    let ExpansionKind::Sequence(items) = &grammar.exp(alt).kind else {
        return None;
    };
    match &grammar.exp(*items.first()?).kind {
        ExpansionKind::Lookahead(la) => Some(la),
        _ => None,
    }
}

struct Resolver<'a> {
    grammar: &'a Grammar,
    closure: &'a ClosureSets,
    diags: &'a Diagnostics,
    max_k: usize,
}

impl Resolver<'_> {
    /// Token sequences that select `alt`: `FIRST_k(alt) · FOLLOW_k(alt)`, or
    /// `FOLLOW_k(choice)` for the exit of `choice`.
    fn language(&self, choice: ExpId, alt: Option<ExpId>, k: usize) -> TokenSequenceSet {
        match alt {
            Some(alt) => self.closure.lookahead(alt, alt, k),
            None => self.closure.follow_k(choice, k),
        }
    }

    fn explicit(&self, alt: ExpId, la: &Lookahead) -> AltLookahead {
        let (depth, set) = match (la.nested, la.amount) {
            (Some(nested), amount) => {
                let depth = amount.unwrap_or(self.closure.k);
                (depth, self.closure.first_k(nested, depth))
            }
            (None, Some(amount)) => (amount, self.closure.lookahead(alt, alt, amount)),
            (None, None) => (0, TokenSequenceSet::epsilon()),
        };
        AltLookahead {
            expansion: Some(alt),
            depth,
            set,
            guard: Some(Guard {
                semantic: la.semantic.clone(),
                scan: la.nested,
                negated: la.negated,
            }),
        }
    }

    fn alternatives(&self, choice: ExpId) -> Vec<Option<ExpId>> {
        match &self.grammar.exp(choice).kind {
            ExpansionKind::Choice(items) => items.iter().copied().map(Some).collect(),
            ExpansionKind::ZeroOrMore(body)
            | ExpansionKind::OneOrMore(body)
            | ExpansionKind::ZeroOrOne(body) => vec![Some(*body), None],
            _ => Vec::new(),
        }
    }

    /// First pair of checked alternatives whose sets share a prefix.
    fn first_overlap(
        &self,
        alts: &[AltLookahead],
        checked: &[usize],
    ) -> Option<(usize, usize, Vec<TokenKind>)> {
        for (n, &i) in checked.iter().enumerate() {
            for &j in &checked[n + 1..] {
                if let Some(prefix) = alts[i].set.overlap(&alts[j].set) {
                    return Some((i, j, prefix));
                }
            }
        }
        None
    }

    /// Checked alternatives that overlap at least one other.
    fn overlapping(&self, alts: &[AltLookahead], checked: &[usize]) -> Vec<usize> {
        checked
            .iter()
            .copied()
            .filter(|&i| {
                checked
                    .iter()
                    .any(|&j| j != i && alts[i].set.overlap(&alts[j].set).is_some())
            })
            .collect()
    }

    fn resolve(&self, choice: ExpId) -> LookaheadPlan {
        let force = self.grammar.options.force_lookahead_check;
        let mut alts: Vec<AltLookahead> = self
            .alternatives(choice)
            .into_iter()
            .map(|alt| {
                let explicit = alt.and_then(|a| Some((a, explicit_lookahead(self.grammar, a)?)));
                match explicit {
                    Some((a, la)) => self.explicit(a, la),
                    None => AltLookahead {
                        expansion: alt,
                        depth: 1,
                        set: self.language(choice, alt, 1),
                        guard: None,
                    },
                }
            })
            .collect();
        let checked: Vec<usize> = (0..alts.len())
            .filter(|&i| force || !alts[i].is_explicit())
            .collect();

        let mut step = Step::Try(1);
        let searched = loop {
            step = match step {
                Step::Try(k) => {
                    let overlapping = self.overlapping(&alts, &checked);
                    let growable = overlapping.iter().any(|&i| !alts[i].is_explicit());
                    if overlapping.is_empty() {
                        Step::Resolved(k)
                    } else if k < self.max_k && growable {
                        for &i in &overlapping {
                            if !alts[i].is_explicit() {
                                alts[i].depth = k + 1;
                                alts[i].set = self.language(choice, alts[i].expansion, k + 1);
                            }
                        }
                        Step::GrowK(k)
                    } else {
                        Step::ConflictAtMax(k)
                    }
                }
                Step::GrowK(k) => Step::Try(k + 1),
                Step::Resolved(k) | Step::ConflictAtMax(k) => break k,
            };
        };

        let outcome = match step {
            Step::ConflictAtMax(k) => match self.first_overlap(&alts, &checked) {
                Some((first, second, prefix)) => {
                    self.report_conflict(choice, &alts, (first, second), &prefix, k);
                    Outcome::Conflict {
                        first,
                        second,
                        prefix,
                    }
                }
                None => Outcome::Resolved,
            },
            _ => Outcome::Resolved,
        };

        if searched > 1 {
            self.diags.report(
                DiagnosticKind::LookaheadGrowth,
                self.grammar.exp(choice).span,
                format!(
                    "choice in {} uses {} tokens of lookahead",
                    self.grammar.describe(choice),
                    searched
                ),
            );
        }
        // Explicit amounts are never searched but still have to be peeked.
        let k = alts.iter().map(|a| a.depth).fold(searched, usize::max);
        log::trace!(
            "plan for {}: k={}, {} alternatives",
            self.grammar.describe(choice),
            k,
            alts.len()
        );

        LookaheadPlan {
            k,
            alternatives: alts,
            outcome,
        }
    }

    fn report_conflict(
        &self,
        choice: ExpId,
        alts: &[AltLookahead],
        (first, second): (usize, usize),
        prefix: &[TokenKind],
        k: usize,
    ) {
        let position = |i: usize| match alts[i].expansion {
            Some(id) => self.grammar.exp(id).span.display(),
            None => "exit".to_string(),
        };
        let tokens = if prefix.is_empty() {
            "<empty>".to_string()
        } else {
            prefix
                .iter()
                .map(|&t| self.grammar.token_name(t))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let severity = match self.grammar.options.conflict_policy {
            ConflictPolicy::Warn => Severity::Warning,
            ConflictPolicy::Error => Severity::Error,
        };
        self.diags.report_with(
            severity,
            DiagnosticKind::LookaheadConflict,
            self.grammar.exp(choice).span,
            format!(
                "choice in {}: alternatives {} ({}) and {} ({}) both start with {} \
                 at {} tokens of lookahead; the earlier one is taken",
                self.grammar.describe(choice),
                first + 1,
                position(first),
                second + 1,
                position(second),
                tokens,
                k
            ),
        );
    }
}

/// Stage 3: a plan for every choice point.
///
/// # Parameters
/// - `grammar`: validated grammar.
/// - `closure`: its closure sets.
/// - `diags`: receives conflicts and lookahead growth notes.
///
/// # Returns
/// One slot per expansion node, filled for choice points.
pub fn resolve_lookahead(
    grammar: &Grammar,
    closure: &ClosureSets,
    diags: &Diagnostics,
) -> Vec<Option<LookaheadPlan>> {
    let resolver = Resolver {
        grammar,
        closure,
        diags,
        max_k: grammar.options.max_lookahead.clamp(1, closure.k),
    };
    let points = grammar.choice_points();
    let plans: Vec<(ExpId, LookaheadPlan)> = if grammar.options.parallel {
        points.par_iter().map(|&id| (id, resolver.resolve(id))).collect()
    } else {
        points.iter().map(|&id| (id, resolver.resolve(id))).collect()
    };

    let mut slots = vec![None; grammar.exp_count()];
    let mut conflicts = 0;
    for (id, plan) in plans {
        conflicts += usize::from(plan.has_conflict());
        slots[id.0] = Some(plan);
    }
    log::debug!(
        "lookahead: {} choice points, {} conflicts",
        points.len(),
        conflicts
    );
    slots
}
