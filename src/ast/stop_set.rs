//! Fixed-size bit set over [`AstKind`] codes.
//!
//! A kind present in the set means "do not recurse into this subtree". The
//! universe is known at compile time so the set never grows.

use super::kind::AstKind;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = AstKind::COUNT.div_ceil(WORD_BITS);

/// Set of [`AstKind`]s whose subtrees traversal skips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeKindSet {
    bits: [u64; WORDS],
}

impl NodeKindSet {
    /// The empty set: nothing is pruned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `kind`. Adding twice is a no-op.
    pub fn add(&mut self, kind: AstKind) {
        let code = kind.code();
        self.bits[code / WORD_BITS] |= 1 << (code % WORD_BITS);
    }

    /// Remove `kind`. Removing an absent kind is a no-op.
    pub fn remove(&mut self, kind: AstKind) {
        let code = kind.code();
        self.bits[code / WORD_BITS] &= !(1 << (code % WORD_BITS));
    }

    /// Constant time, called once per visited node.
    #[inline]
    pub fn contains(&self, kind: AstKind) -> bool {
        let code = kind.code();
        self.bits[code / WORD_BITS] & (1 << (code % WORD_BITS)) != 0
    }

    pub fn clear(&mut self) {
        self.bits = [0; WORDS];
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Number of kinds in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Members in code order.
    pub fn iter(&self) -> impl Iterator<Item = AstKind> + '_ {
        AstKind::ALL.iter().copied().filter(|k| self.contains(*k))
    }
}

impl FromIterator<AstKind> for NodeKindSet {
    fn from_iter<I: IntoIterator<Item = AstKind>>(iter: I) -> Self {
        let mut set = NodeKindSet::new();
        for kind in iter {
            set.add(kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_contains_nothing() {
        let set = NodeKindSet::new();
        assert!(set.is_empty());
        assert!(AstKind::ALL.iter().all(|k| !set.contains(*k)));
    }

    #[test]
    fn test_add_remove() {
        let mut set = NodeKindSet::new();
        set.add(AstKind::Javadoc);
        set.add(AstKind::Other);
        set.add(AstKind::Javadoc);
        assert!(set.contains(AstKind::Javadoc));
        assert!(set.contains(AstKind::Other));
        assert!(!set.contains(AstKind::Block));
        assert_eq!(set.len(), 2);

        set.remove(AstKind::Javadoc);
        assert!(!set.contains(AstKind::Javadoc));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![AstKind::Other]);

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_every_kind_fits() {
        let set: NodeKindSet = AstKind::ALL.iter().copied().collect();
        assert_eq!(set.len(), AstKind::COUNT);
    }
}
