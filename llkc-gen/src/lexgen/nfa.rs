//! Thompson construction of one NFA per lexical state.

use super::charset::CharSet;
use crate::grammar::{Pattern, TokenKind};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct NfaState {
    pub eps: Vec<usize>,
    pub trans: Vec<(CharSet, usize)>,
    pub accept: Option<TokenKind>,
}

/// NFA recognizing the union of the patterns added to it. State 0 is the
/// start state; every added pattern hangs off it by an epsilon edge and
/// ends in a state accepting the pattern's kind.
#[derive(Debug, Clone)]
pub struct Nfa {
    pub states: Vec<NfaState>,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Nfa {
    pub const START: usize = 0;

    pub fn new() -> Self {
        Self {
            states: vec![NfaState::default()],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Adds a pattern whose references are already inlined. A leftover
    /// reference matches nothing.
    pub fn add_pattern(&mut self, pattern: &Pattern, kind: TokenKind, ignore_case: bool) {
        let (start, end) = self.fragment(pattern, ignore_case);
        self.states[Self::START].eps.push(start);
        self.states[end].accept = Some(kind);
    }

    /// All transition labels, for alphabet partitioning.
    pub fn charsets(&self) -> impl Iterator<Item = &CharSet> {
        self.states.iter().flat_map(|s| s.trans.iter().map(|(set, _)| set))
    }

    /// Extends `set` with everything reachable by epsilon edges.
    pub fn closure(&self, set: &mut BTreeSet<usize>) {
        let mut stack: Vec<usize> = set.iter().copied().collect();
        while let Some(s) = stack.pop() {
            for &t in &self.states[s].eps {
                if set.insert(t) {
                    stack.push(t);
                }
            }
        }
    }

    fn state(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    fn eps(&mut self, from: usize, to: usize) {
        self.states[from].eps.push(to);
    }

    fn fragment(&mut self, pattern: &Pattern, ic: bool) -> (usize, usize) {
        match pattern {
            Pattern::Literal(s) => {
                let start = self.state();
                let mut end = start;
                for c in s.chars() {
                    let next = self.state();
                    let set = CharSet::single(c);
                    let set = if ic { set.case_fold() } else { set };
                    self.states[end].trans.push((set, next));
                    end = next;
                }
                (start, end)
            }
            Pattern::Class(class) => {
                let set = CharSet::from_class(class);
                let set = if ic { set.case_fold() } else { set };
                let start = self.state();
                let end = self.state();
                if !set.is_empty() {
                    self.states[start].trans.push((set, end));
                }
                (start, end)
            }
            Pattern::Seq(items) => {
                let start = self.state();
                let mut end = start;
                for item in items {
                    let (s, e) = self.fragment(item, ic);
                    self.eps(end, s);
                    end = e;
                }
                (start, end)
            }
            Pattern::Alt(items) => {
                let start = self.state();
                let end = self.state();
                for item in items {
                    let (s, e) = self.fragment(item, ic);
                    self.eps(start, s);
                    self.eps(e, end);
                }
                (start, end)
            }
            Pattern::ZeroOrMore(inner) => self.repeat(inner, 0, None, ic),
            Pattern::OneOrMore(inner) => self.repeat(inner, 1, None, ic),
            Pattern::ZeroOrOne(inner) => self.repeat(inner, 0, Some(1), ic),
            Pattern::Repeat { inner, min, max } => self.repeat(inner, *min, *max, ic),
            Pattern::Ref(_) => {
                let start = self.state();
                let end = self.state();
                (start, end)
            }
        }
    }

    /// `min` mandatory copies followed by either a loop or `max - min`
    /// optional copies.
    fn repeat(&mut self, inner: &Pattern, min: u32, max: Option<u32>, ic: bool) -> (usize, usize) {
        let start = self.state();
        let mut end = start;
        for _ in 0..min {
            let (s, e) = self.fragment(inner, ic);
            self.eps(end, s);
            end = e;
        }
        match max {
            None => {
                let hub = self.state();
                self.eps(end, hub);
                let (s, e) = self.fragment(inner, ic);
                self.eps(hub, s);
                self.eps(e, hub);
                end = hub;
            }
            Some(max) => {
                let exit = self.state();
                for _ in min..max {
                    let (s, e) = self.fragment(inner, ic);
                    self.eps(end, s);
                    self.eps(end, exit);
                    end = e;
                }
                self.eps(end, exit);
                end = exit;
            }
        }
        (start, end)
    }

    /// Longest match of the whole NFA on `input`, ties to the lowest kind.
    #[cfg(test)]
    pub fn longest_match(&self, input: &[char]) -> Option<(usize, TokenKind)> {
        let mut current = BTreeSet::from([Self::START]);
        self.closure(&mut current);
        let accept = |set: &BTreeSet<usize>| set.iter().filter_map(|&s| self.states[s].accept).min();
        let mut best = accept(&current).map(|k| (0, k));
        for (i, &c) in input.iter().enumerate() {
            let mut next = BTreeSet::new();
            for &s in &current {
                for (set, t) in &self.states[s].trans {
                    if set.contains(c as u32) {
                        next.insert(*t);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            self.closure(&mut next);
            if let Some(k) = accept(&next) {
                best = Some((i + 1, k));
            }
            current = next;
        }
        best
    }
}
