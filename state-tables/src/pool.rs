//! Deduplication of entries and payloads at encode time.
//!
//! Entries are pooled by structural value: the first entry with a given
//! value takes the next slot in the entry table and later equal entries
//! reuse it. Payload word lists are pooled the same way, and each distinct
//! list is then placed into one shared array by a [`PuzzlePacker`].

use std::{collections::HashMap, hash::Hash};

use indexmap::IndexSet;

/// Interns values, assigning each distinct value the next index.
#[derive(Clone, Debug)]
pub struct Pool<K> {
    items: IndexSet<K>,
}

impl<K: Hash + Eq> Pool<K> {
    pub fn new() -> Self {
        Pool {
            items: IndexSet::new(),
        }
    }

    /// Return the index of `item`, adding it if it is new.
    pub fn intern(&mut self, item: K) -> usize {
        self.items.insert_full(item).0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The pooled values, in the order they were first seen.
    pub fn into_items(self) -> Vec<K> {
        self.items.into_iter().collect()
    }
}

impl<K: Hash + Eq> Default for Pool<K> {
    fn default() -> Self {
        Pool::new()
    }
}

/// Packs sparse word lists into one shared array.
///
/// Each list is given as `(position, value)` pairs, with positions relative
/// to the list's first key. A list is placed at the lowest non-negative
/// offset at which none of its positions land on a cell already taken by an
/// earlier list, so lists whose shapes interleave share storage.
#[derive(Clone, Debug, Default)]
pub struct PuzzlePacker {
    cells: Vec<Option<u16>>,
}

impl PuzzlePacker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Place a list, returning its committed offset.
    ///
    /// Offsets for which `veto` returns `true` are never chosen.
    pub fn place(&mut self, items: &[(usize, u16)], veto: impl Fn(usize) -> bool) -> usize {
        let fits = |offset: usize| {
            items
                .iter()
                .all(|(pos, _)| !matches!(self.cells.get(offset + pos), Some(Some(_))))
        };
        // past the end of the array every offset fits, so this terminates
        // unless every such offset is vetoed
        let offset = (0..)
            .find(|offset| !veto(*offset) && fits(*offset))
            .unwrap_or_default();
        for (pos, value) in items {
            let idx = offset + pos;
            if idx >= self.cells.len() {
                self.cells.resize(idx + 1, None);
            }
            debug_assert!(self.cells[idx].is_none());
            self.cells[idx] = Some(*value);
        }
        offset
    }

    /// The number of words in the shared array.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read the value at an absolute position, if some list placed one there.
    pub fn get(&self, idx: usize) -> Option<u16> {
        self.cells.get(idx).copied().flatten()
    }

    /// The shared array; cells no list uses are zero.
    pub fn into_words(self) -> Vec<u16> {
        self.cells.into_iter().map(Option::unwrap_or_default).collect()
    }
}

/// A puzzle-fit array with identical lists pooled by key.
#[derive(Clone, Debug)]
pub struct PayloadPool<K> {
    packer: PuzzlePacker,
    placed: HashMap<K, usize>,
}

impl<K: Hash + Eq> PayloadPool<K> {
    pub fn new() -> Self {
        PayloadPool {
            packer: PuzzlePacker::new(),
            placed: HashMap::new(),
        }
    }

    /// The offset of the list identified by `key`, placing it if it is new.
    pub fn place(
        &mut self,
        key: K,
        items: impl FnOnce() -> Vec<(usize, u16)>,
        veto: impl Fn(usize) -> bool,
    ) -> usize {
        if let Some(offset) = self.placed.get(&key) {
            return *offset;
        }
        let offset = self.packer.place(&items(), veto);
        self.placed.insert(key, offset);
        offset
    }

    /// The number of distinct lists placed.
    pub fn num_lists(&self) -> usize {
        self.placed.len()
    }

    /// The number of words in the shared array.
    pub fn len(&self) -> usize {
        self.packer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packer.is_empty()
    }

    pub fn into_words(self) -> Vec<u16> {
        self.packer.into_words()
    }
}

impl<K: Hash + Eq> Default for PayloadPool<K> {
    fn default() -> Self {
        PayloadPool::new()
    }
}

/// Positions and values for a dense list, keyed from zero.
pub fn dense_items(words: &[u16]) -> Vec<(usize, u16)> {
    words.iter().copied().enumerate().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn pool_keeps_first_seen_order() {
        let mut pool = Pool::new();
        assert_eq!(pool.intern("b"), 0);
        assert_eq!(pool.intern("a"), 1);
        assert_eq!(pool.intern("b"), 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.into_items(), ["b", "a"]);
    }

    #[test]
    fn interleaved_shapes_share_storage() {
        let mut packer = PuzzlePacker::new();
        // positions 0, 2, 4
        let evens = [(0, 10), (2, 12), (4, 14)];
        // positions 0, 2
        let more = [(0, 20), (2, 22)];
        assert_eq!(packer.place(&evens, |_| false), 0);
        assert_eq!(packer.place(&more, |_| false), 1);
        assert_eq!(packer.len(), 5);
        assert_eq!(packer.into_words(), [10, 20, 12, 22, 14]);
    }

    #[test]
    fn dense_lists_are_appended() {
        let mut packer = PuzzlePacker::new();
        assert_eq!(packer.place(&dense_items(&[1, 2, 3]), |_| false), 0);
        assert_eq!(packer.place(&dense_items(&[4, 5]), |_| false), 3);
        assert_eq!(packer.into_words(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn vetoed_offsets_are_skipped() {
        let mut packer = PuzzlePacker::new();
        assert_eq!(packer.place(&[(0, 7)], |offset| offset < 2), 2);
        assert_eq!(packer.place(&[(0, 8)], |_| false), 0);
        assert_eq!(packer.into_words(), [8, 0, 7]);
    }

    #[test]
    fn identical_lists_are_pooled() {
        let mut pool = PayloadPool::new();
        let first = pool.place(vec![1u16, 2], || dense_items(&[1, 2]), |_| false);
        let second = pool.place(vec![3u16], || dense_items(&[3]), |_| false);
        let again = pool.place(vec![1u16, 2], || unreachable!(), |_| false);
        assert_eq!((first, second, again), (0, 2, 0));
        assert_eq!(pool.num_lists(), 2);
        assert_eq!(pool.into_words(), [1, 2, 3]);
    }

    #[test]
    fn placed_lists_never_collide() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut packer = PuzzlePacker::new();
            let mut placed = Vec::new();
            for list in 0..12u16 {
                let mut items = Vec::new();
                let mut pos = 0;
                for _ in 0..rng.gen_range(1..8) {
                    items.push((pos, list * 100 + pos as u16));
                    pos += rng.gen_range(1..5);
                }
                let offset = packer.place(&items, |_| false);
                placed.push((offset, items));
            }

            let mut owners = BTreeMap::new();
            for (list, (offset, items)) in placed.iter().enumerate() {
                for (pos, value) in items {
                    assert_eq!(owners.insert(offset + pos, list), None, "collision");
                    assert_eq!(packer.get(offset + pos), Some(*value));
                }
            }
        }
    }
}
