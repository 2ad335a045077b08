//! Subset construction, dead-state pruning, minimization and canonical
//! renumbering.
//!
//! Every step iterates in a fixed order (NFA state sets are `BTreeSet`s,
//! transitions are sorted by their low bound), so the same NFA always yields
//! the same table.

use super::charset::{covering, partition};
use super::nfa::Nfa;
use crate::grammar::TokenKind;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transition {
    pub lo: u32,
    /// Inclusive.
    pub hi: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DfaState {
    /// Sorted by `lo`, disjoint.
    pub transitions: Vec<Transition>,
    pub accept: Option<TokenKind>,
}

/// Deterministic automaton; state 0 is the start state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dfa {
    pub states: Vec<DfaState>,
}

impl Dfa {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn next(&self, state: u32, ch: u32) -> Option<u32> {
        let trans = &self.states.get(state as usize)?.transitions;
        let i = trans.partition_point(|t| t.hi < ch);
        trans.get(i).filter(|t| t.lo <= ch).map(|t| t.target)
    }

    pub fn accept(&self, state: u32) -> Option<TokenKind> {
        self.states.get(state as usize).and_then(|s| s.accept)
    }

    /// Every kind some state accepts.
    pub fn accepted_kinds(&self) -> BTreeSet<TokenKind> {
        self.states.iter().filter_map(|s| s.accept).collect()
    }

    /// Longest match from the start state: `(length, kind)`.
    pub fn longest_match(&self, input: &[char]) -> Option<(usize, TokenKind)> {
        let mut state = 0u32;
        let mut best = self.accept(0).map(|k| (0, k));
        for (i, &c) in input.iter().enumerate() {
            match self.next(state, c as u32) {
                Some(next) => {
                    state = next;
                    if let Some(k) = self.accept(state) {
                        best = Some((i + 1, k));
                    }
                }
                None => break,
            }
        }
        best
    }
}

/// Result of subset construction. `kinds[s]` holds every kind whose accept
/// state is part of DFA state `s`, not only the winning one.
pub struct Subsets {
    pub dfa: Dfa,
    pub kinds: Vec<BTreeSet<TokenKind>>,
}

pub fn determinize(nfa: &Nfa) -> Subsets {
    let intervals = partition(nfa.charsets());
    let moves: Vec<Vec<(usize, usize)>> = nfa
        .states
        .iter()
        .map(|s| {
            s.trans
                .iter()
                .flat_map(|(set, t)| covering(&intervals, set).into_iter().map(move |i| (i, *t)))
                .collect()
        })
        .collect();

    let mut start = BTreeSet::from([Nfa::START]);
    nfa.closure(&mut start);
    let mut subsets = vec![start.clone()];
    let mut index: BTreeMap<BTreeSet<usize>, u32> = BTreeMap::from([(start, 0)]);
    let mut dfa = Dfa::default();
    let mut kinds = Vec::new();

    let mut i = 0;
    while i < subsets.len() {
        let current = subsets[i].clone();
        let mut by_interval: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for &s in &current {
            for &(iv, t) in &moves[s] {
                by_interval.entry(iv).or_default().insert(t);
            }
        }

        let mut transitions: Vec<Transition> = Vec::new();
        for (iv, mut set) in by_interval {
            nfa.closure(&mut set);
            let target = match index.get(&set) {
                Some(&id) => id,
                None => {
                    let id = subsets.len() as u32;
                    index.insert(set.clone(), id);
                    subsets.push(set);
                    id
                }
            };
            let (lo, hi) = intervals[iv];
            push_merged(&mut transitions, Transition { lo, hi, target });
        }

        let accepting: BTreeSet<TokenKind> = current
            .iter()
            .filter_map(|&s| nfa.states[s].accept)
            .collect();
        dfa.states.push(DfaState {
            transitions,
            accept: accepting.first().copied(),
        });
        kinds.push(accepting);
        i += 1;
    }

    log::trace!(
        "determinize: {} nfa states, {} intervals, {} dfa states",
        nfa.len(),
        intervals.len(),
        dfa.len()
    );
    Subsets { dfa, kinds }
}

fn push_merged(transitions: &mut Vec<Transition>, t: Transition) {
    match transitions.last_mut() {
        Some(last) if last.target == t.target && last.hi + 1 == t.lo => last.hi = t.hi,
        _ => transitions.push(t),
    }
}

/// Drops states from which no accepting state is reachable, and every
/// transition into them. The start state is always kept.
pub fn prune(dfa: &Dfa) -> Dfa {
    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); dfa.len()];
    for (s, state) in dfa.states.iter().enumerate() {
        for t in &state.transitions {
            reverse[t.target as usize].push(s);
        }
    }
    let mut live = vec![false; dfa.len()];
    let mut stack: Vec<usize> = (0..dfa.len())
        .filter(|&s| dfa.states[s].accept.is_some())
        .collect();
    for &s in &stack {
        live[s] = true;
    }
    while let Some(s) = stack.pop() {
        for &p in &reverse[s] {
            if !live[p] {
                live[p] = true;
                stack.push(p);
            }
        }
    }
    renumber(dfa, 0, &live)
}

/// Moore partition refinement. Assumes every state is live.
pub fn minimize(dfa: &Dfa) -> Dfa {
    if dfa.is_empty() {
        return dfa.clone();
    }
    let mut block: Vec<usize> = {
        let mut ids: HashMap<Option<TokenKind>, usize> = HashMap::new();
        dfa.states
            .iter()
            .map(|s| {
                let next = ids.len();
                *ids.entry(s.accept).or_insert(next)
            })
            .collect()
    };
    let mut count = block.iter().max().map_or(0, |&m| m + 1);

    loop {
        let mut ids: HashMap<(usize, Vec<Transition>), usize> = HashMap::new();
        let refined: Vec<usize> = dfa
            .states
            .iter()
            .enumerate()
            .map(|(s, state)| {
                let key = (block[s], mapped(state, &block));
                let next = ids.len();
                *ids.entry(key).or_insert(next)
            })
            .collect();
        let refined_count = ids.len();
        block = refined;
        if refined_count == count {
            break;
        }
        count = refined_count;
    }

    let mut merged = vec![DfaState::default(); count];
    let mut seen = vec![false; count];
    for (s, state) in dfa.states.iter().enumerate() {
        let b = block[s];
        if !seen[b] {
            seen[b] = true;
            merged[b] = DfaState {
                transitions: mapped(state, &block),
                accept: state.accept,
            };
        }
    }
    let merged = Dfa { states: merged };
    let live = vec![true; count];
    let minimized = renumber(&merged, block[0], &live);
    log::trace!("minimize: {} -> {} states", dfa.len(), minimized.len());
    minimized
}

/// Transitions of `state` with targets replaced by their block, merged.
fn mapped(state: &DfaState, block: &[usize]) -> Vec<Transition> {
    let mut out = Vec::with_capacity(state.transitions.len());
    for t in &state.transitions {
        push_merged(
            &mut out,
            Transition {
                target: block[t.target as usize] as u32,
                ..*t
            },
        );
    }
    out
}

/// Breadth-first renumbering from `start`, following only transitions into
/// `live` states. Unvisited states disappear.
pub fn renumber(dfa: &Dfa, start: usize, live: &[bool]) -> Dfa {
    let mut new_id: Vec<Option<u32>> = vec![None; dfa.len()];
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start]);
    new_id[start] = Some(0);
    while let Some(s) = queue.pop_front() {
        order.push(s);
        for t in &dfa.states[s].transitions {
            let target = t.target as usize;
            if live[target] && new_id[target].is_none() {
                new_id[target] = Some((order.len() + queue.len()) as u32);
                queue.push_back(target);
            }
        }
    }
    let states = order
        .iter()
        .map(|&s| {
            let state = &dfa.states[s];
            let mut transitions = Vec::with_capacity(state.transitions.len());
            for t in &state.transitions {
                if let Some(target) = new_id[t.target as usize].filter(|_| live[t.target as usize]) {
                    push_merged(&mut transitions, Transition { target, ..*t });
                }
            }
            DfaState {
                transitions,
                accept: state.accept,
            }
        })
        .collect();
    Dfa { states }
}
