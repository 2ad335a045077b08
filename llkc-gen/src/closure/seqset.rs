use crate::grammar::TokenKind;
use std::collections::BTreeSet;

/// A set of token sequences, each at most `k` long for the `k` it was built
/// with. A sequence shorter than `k` means the derivation ends there.
///
/// The empty set means "no derivation"; the set holding only the empty
/// sequence means "derives nothing but may end here".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenSequenceSet {
    seqs: BTreeSet<Vec<TokenKind>>,
}

impl TokenSequenceSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `{ε}`
    pub fn epsilon() -> Self {
        Self {
            seqs: BTreeSet::from([Vec::new()]),
        }
    }

    pub fn token(kind: TokenKind) -> Self {
        Self {
            seqs: BTreeSet::from([vec![kind]]),
        }
    }

    pub fn from_seqs(seqs: impl IntoIterator<Item = Vec<TokenKind>>) -> Self {
        Self {
            seqs: seqs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[TokenKind]> {
        self.seqs.iter().map(Vec::as_slice)
    }

    pub fn contains(&self, seq: &[TokenKind]) -> bool {
        self.seqs.contains(seq)
    }

    pub fn contains_epsilon(&self) -> bool {
        self.seqs.first().is_some_and(Vec::is_empty)
    }

    pub fn insert(&mut self, seq: Vec<TokenKind>) -> bool {
        self.seqs.insert(seq)
    }

    /// Adds every member of `other`; returns whether anything was new.
    pub fn union_with(&mut self, other: &TokenSequenceSet) -> bool {
        let before = self.seqs.len();
        self.seqs.extend(other.seqs.iter().cloned());
        self.seqs.len() != before
    }

    pub fn union(&self, other: &TokenSequenceSet) -> TokenSequenceSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// `k`-bounded concatenation: every `a·b` cut to `k` tokens. Members of
    /// `self` that already have `k` tokens need nothing from `other`.
    pub fn concat(&self, other: &TokenSequenceSet, k: usize) -> TokenSequenceSet {
        let mut out = BTreeSet::new();
        for a in &self.seqs {
            if a.len() >= k {
                out.insert(a[..k].to_vec());
                continue;
            }
            for b in &other.seqs {
                let take = (k - a.len()).min(b.len());
                let mut seq = Vec::with_capacity(a.len() + take);
                seq.extend_from_slice(a);
                seq.extend_from_slice(&b[..take]);
                out.insert(seq);
            }
        }
        TokenSequenceSet { seqs: out }
    }

    /// Every member cut to at most `k` tokens.
    pub fn truncate(&self, k: usize) -> TokenSequenceSet {
        TokenSequenceSet {
            seqs: self
                .seqs
                .iter()
                .map(|s| s[..s.len().min(k)].to_vec())
                .collect(),
        }
    }

    /// `k`-bounded Kleene closure: `{ε} ∪ self ∪ self·self ∪ ...`
    pub fn kleene(&self, k: usize) -> TokenSequenceSet {
        let mut out = TokenSequenceSet::epsilon();
        loop {
            let step = out.concat(self, k);
            if !out.union_with(&step) {
                return out;
            }
        }
    }

    /// A pair `(a, b)` with `a` from `self` and `b` from `other` where one is a
    /// prefix of the other; the shorter one is returned. Such a pair means
    /// the two sets cannot be told apart by these sequences.
    pub fn overlap(&self, other: &TokenSequenceSet) -> Option<Vec<TokenKind>> {
        for a in &self.seqs {
            for b in &other.seqs {
                let n = a.len().min(b.len());
                if a[..n] == b[..n] {
                    return Some(a[..n].to_vec());
                }
            }
        }
        None
    }

    /// Whether some member is a prefix of `upcoming`.
    pub fn matches(&self, upcoming: &[TokenKind]) -> bool {
        self.seqs
            .iter()
            .any(|s| s.len() <= upcoming.len() && s[..] == upcoming[..s.len()])
    }
}

impl FromIterator<Vec<TokenKind>> for TokenSequenceSet {
    fn from_iter<T: IntoIterator<Item = Vec<TokenKind>>>(iter: T) -> Self {
        Self::from_seqs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(seqs: &[&[TokenKind]]) -> TokenSequenceSet {
        seqs.iter().map(|s| s.to_vec()).collect()
    }

    #[test]
    fn concat_is_k_bounded() {
        let a = set(&[&[1], &[]]);
        let b = set(&[&[2, 3], &[4]]);
        assert_eq!(a.concat(&b, 2), set(&[&[1, 2], &[1, 4], &[2, 3], &[4]]));
        assert_eq!(a.concat(&b, 1), set(&[&[1], &[2], &[4]]));
        assert_eq!(a.concat(&TokenSequenceSet::empty(), 1), set(&[&[1]]));
    }

    #[test]
    fn truncation_matches_lower_k() {
        let s = set(&[&[1, 2, 3], &[1, 2, 4], &[5]]);
        assert_eq!(s.truncate(2), set(&[&[1, 2], &[5]]));
        assert_eq!(s.truncate(0), TokenSequenceSet::epsilon());
    }

    #[test]
    fn kleene_closure() {
        let body = set(&[&[7]]);
        assert_eq!(body.kleene(3), set(&[&[], &[7], &[7, 7], &[7, 7, 7]]));
        assert_eq!(TokenSequenceSet::empty().kleene(2), TokenSequenceSet::epsilon());
    }

    #[test]
    fn overlap_is_prefix_based() {
        let xy = set(&[&[1, 2]]);
        let xz = set(&[&[1, 3]]);
        let x = set(&[&[1]]);
        assert_eq!(xy.overlap(&xz), None);
        assert_eq!(xy.overlap(&x), Some(vec![1]));
        assert_eq!(x.overlap(&xz), Some(vec![1]));
    }

    #[test]
    fn matches_by_prefix() {
        let s = set(&[&[1, 2], &[3]]);
        assert!(s.matches(&[1, 2, 9]));
        assert!(s.matches(&[3, 0]));
        assert!(!s.matches(&[1, 3]));
        assert!(TokenSequenceSet::epsilon().matches(&[5]));
        assert!(!TokenSequenceSet::empty().matches(&[5]));
    }
}
