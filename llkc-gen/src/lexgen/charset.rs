//! Character sets as sorted, disjoint, non-adjacent inclusive ranges of
//! code points.

use crate::grammar::{CharClass, ClassItem};

pub const MAX_CHAR: u32 = char::MAX as u32;

/// Case variants are only searched below this code point; no cased letters
/// exist above it.
const CASED_LIMIT: u32 = 0x1FFFF;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CharSet {
    ranges: Vec<(u32, u32)>,
}

impl CharSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(ch: char) -> Self {
        Self {
            ranges: vec![(ch as u32, ch as u32)],
        }
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut set = Self {
            ranges: ranges.into_iter().filter(|(lo, hi)| lo <= hi).collect(),
        };
        set.normalize();
        set
    }

    pub fn from_class(class: &CharClass) -> Self {
        let set = Self::from_ranges(class.items.iter().map(|item| match *item {
            ClassItem::Char(c) => (c as u32, c as u32),
            ClassItem::Range(lo, hi) => (lo as u32, hi as u32),
        }));
        if class.negated { set.negate() } else { set }
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, c: u32) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    std::cmp::Ordering::Less
                } else if lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Complement over `0..=MAX_CHAR`.
    pub fn negate(&self) -> CharSet {
        let mut out = Vec::new();
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if lo > next {
                out.push((next, lo - 1));
            }
            next = hi.saturating_add(1);
        }
        if next <= MAX_CHAR {
            out.push((next, MAX_CHAR));
        }
        Self { ranges: out }
    }

    /// Adds the upper and lower case variants of every member.
    pub fn case_fold(&self) -> CharSet {
        let mut extra = Vec::new();
        for &(lo, hi) in &self.ranges {
            if lo > CASED_LIMIT {
                break;
            }
            for c in (lo..=hi.min(CASED_LIMIT)).filter_map(char::from_u32) {
                let lower = c.to_lowercase();
                let upper = c.to_uppercase();
                // Multi-character mappings (such as 'ß' -> "SS") are not variants.
                let variants = (lower.len() == 1)
                    .then_some(lower)
                    .into_iter()
                    .flatten()
                    .chain((upper.len() == 1).then_some(upper).into_iter().flatten());
                for v in variants.filter(|&v| v != c) {
                    extra.push((v as u32, v as u32));
                }
            }
        }
        if extra.is_empty() {
            return self.clone();
        }
        Self::from_ranges(self.ranges.iter().copied().chain(extra))
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }
}

/// Splits the union of `sets` into disjoint elementary intervals such that
/// every set is exactly a union of some of them. Intervals are sorted.
pub fn partition<'a>(sets: impl IntoIterator<Item = &'a CharSet>) -> Vec<(u32, u32)> {
    let mut bounds = Vec::new();
    let mut covered = Vec::new();
    for set in sets {
        for &(lo, hi) in set.ranges() {
            bounds.push(lo);
            bounds.push(hi + 1);
            covered.push((lo, hi));
        }
    }
    bounds.sort_unstable();
    bounds.dedup();
    let covered = CharSet::from_ranges(covered);
    bounds
        .windows(2)
        .map(|w| (w[0], w[1] - 1))
        .filter(|&(lo, _)| covered.contains(lo))
        .collect()
}

/// Indices of the elementary `intervals` that make up `set`.
pub fn covering(intervals: &[(u32, u32)], set: &CharSet) -> Vec<usize> {
    let mut out = Vec::new();
    for &(lo, hi) in set.ranges() {
        let start = intervals.partition_point(|&(_, ihi)| ihi < lo);
        for (i, &(ilo, _)) in intervals.iter().enumerate().skip(start) {
            if ilo > hi {
                break;
            }
            out.push(i);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_overlaps_and_adjacency() {
        let set = CharSet::from_ranges([(5, 9), (1, 3), (4, 4), (20, 25), (22, 30)]);
        assert_eq!(set.ranges(), &[(1, 9), (20, 30)]);
        assert!(set.contains(4));
        assert!(!set.contains(15));
    }

    #[test]
    fn negation_roundtrip() {
        let set = CharSet::from_ranges([(0, 10), (100, 200)]);
        let neg = set.negate();
        assert_eq!(neg.ranges(), &[(11, 99), (201, MAX_CHAR)]);
        assert_eq!(neg.negate(), set);
        assert_eq!(CharSet::empty().negate().ranges(), &[(0, MAX_CHAR)]);
        assert!(CharSet::from_ranges([(0, MAX_CHAR)]).negate().is_empty());
    }

    #[test]
    fn case_fold_adds_variants() {
        let set = CharSet::from_ranges([('a' as u32, 'c' as u32)]).case_fold();
        assert!(set.contains('B' as u32));
        assert!(set.contains('b' as u32));
        assert!(!set.contains('d' as u32));
        let digits = CharSet::from_ranges([('0' as u32, '9' as u32)]);
        assert_eq!(digits.case_fold(), digits);
    }

    #[test]
    fn partition_splits_overlaps() {
        let a = CharSet::from_ranges([('a' as u32, 'z' as u32)]);
        let b = CharSet::single('i');
        let c = CharSet::from_ranges([('0' as u32, '9' as u32)]);
        let parts = partition([&a, &b, &c]);
        assert_eq!(
            parts,
            vec![
                ('0' as u32, '9' as u32),
                ('a' as u32, 'h' as u32),
                ('i' as u32, 'i' as u32),
                ('j' as u32, 'z' as u32),
            ]
        );
        assert_eq!(covering(&parts, &a), vec![1, 2, 3]);
        assert_eq!(covering(&parts, &b), vec![2]);
    }
}
