use crate::closure::TokenSequenceSet;
use crate::grammar::{ExpId, TokenKind};
use smartstring::alias::String;

/// Explicit lookahead attached to an alternative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Guard {
    /// Opaque semantic predicate, tested before any token.
    pub semantic: Option<String>,
    /// Nested expansion the parser scans ahead over. The alternative's set
    /// holds its FIRST sequences.
    pub scan: Option<ExpId>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltLookahead {
    /// `None` stands for leaving a repetition or skipping an optional part.
    pub expansion: Option<ExpId>,
    /// Tokens inspected for this alternative.
    pub depth: usize,
    /// Token sequences that select this alternative.
    pub set: TokenSequenceSet,
    pub guard: Option<Guard>,
}

impl AltLookahead {
    pub fn is_explicit(&self) -> bool {
        self.guard.is_some()
    }

    fn accepts(&self, upcoming: &[TokenKind], predicate: &mut impl FnMut(&str) -> bool) -> bool {
        let mut ok = self.set.matches(upcoming);
        if let Some(guard) = &self.guard {
            if let Some(code) = &guard.semantic {
                ok = ok && predicate(code);
            }
            if guard.negated {
                ok = !ok;
            }
        }
        ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every pair of checked alternatives is disjoint.
    Resolved,
    /// Alternatives `first` and `second` still share `prefix` at the
    /// largest depth; the earlier one wins.
    Conflict {
        first: usize,
        second: usize,
        prefix: Vec<TokenKind>,
    },
}

/// Decision procedure for one choice point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookaheadPlan {
    /// Tokens a parser peeks: the depth the search ended at, or the
    /// largest explicit depth when that is greater.
    pub k: usize,
    /// In declaration order. Repetitions and optional parts have two:
    /// the body, then the exit.
    pub alternatives: Vec<AltLookahead>,
    pub outcome: Outcome,
}

impl LookaheadPlan {
    pub fn has_conflict(&self) -> bool {
        matches!(self.outcome, Outcome::Conflict { .. })
    }

    /// Largest depth any alternative needs.
    pub fn max_depth(&self) -> usize {
        self.alternatives.iter().map(|a| a.depth).max().unwrap_or(0)
    }

    /// The alternative a parser would take on `upcoming`, treating every
    /// semantic predicate as true. See [`LookaheadPlan::select_with`].
    pub fn select(&self, upcoming: &[TokenKind]) -> Option<usize> {
        self.select_with(upcoming, |_| true)
    }

    /// The earliest alternative whose guard holds and whose set has a
    /// member that is a prefix of `upcoming`. `predicate` evaluates
    /// semantic predicates.
    ///
    /// `upcoming` should reach `EOF` or be at least [`LookaheadPlan::max_depth`]
    /// tokens long.
    pub fn select_with(
        &self,
        upcoming: &[TokenKind],
        mut predicate: impl FnMut(&str) -> bool,
    ) -> Option<usize> {
        self.alternatives
            .iter()
            .position(|alt| alt.accepts(upcoming, &mut predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alt(seqs: &[&[TokenKind]], guard: Option<Guard>) -> AltLookahead {
        AltLookahead {
            expansion: None,
            depth: seqs.iter().map(|s| s.len()).max().unwrap_or(0),
            set: seqs.iter().map(|s| s.to_vec()).collect(),
            guard,
        }
    }

    #[test]
    fn earliest_matching_alternative_wins() {
        let plan = LookaheadPlan {
            k: 2,
            alternatives: vec![alt(&[&[1, 2]], None), alt(&[&[1]], None)],
            outcome: Outcome::Conflict {
                first: 0,
                second: 1,
                prefix: vec![1],
            },
        };
        assert!(plan.has_conflict());
        assert_eq!(plan.select(&[1, 2]), Some(0));
        assert_eq!(plan.select(&[1, 3]), Some(1));
        assert_eq!(plan.select(&[4, 0]), None);
        assert_eq!(plan.max_depth(), 2);
    }

    #[test]
    fn guards() {
        let predicate = Guard {
            semantic: Some("ready()".into()),
            ..Guard::default()
        };
        let negated = Guard {
            negated: true,
            ..Guard::default()
        };
        let plan = LookaheadPlan {
            k: 1,
            alternatives: vec![
                alt(&[&[]], Some(predicate)),
                alt(&[&[5]], Some(negated)),
                alt(&[&[5]], None),
            ],
            outcome: Outcome::Resolved,
        };
        assert_eq!(plan.select(&[5]), Some(0));
        assert_eq!(plan.select_with(&[5], |_| false), Some(2));
        assert_eq!(plan.select_with(&[6], |code| code != "ready()"), Some(1));
    }
}
