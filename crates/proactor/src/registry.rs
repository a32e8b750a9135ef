//! Completion registry: submission tag → live exchange entry.
//!
//! Tags are small dense integers carried in the SQE `user_data`. The lowest
//! free tag is always handed out first, found through an occupancy bitmap
//! (one bit per tag, 64 tags per block) so the table stays compact.

use crate::exchange::OpKind;

const BITS_PER_BLOCK: usize = 64;

/// Where a registered entry lives: its kind's pool and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    pub kind: OpKind,
    pub slot: u32,
}

impl EntryRef {
    pub const fn new(kind: OpKind, slot: u32) -> Self {
        Self { kind, slot }
    }
}

#[derive(Debug, Default)]
pub struct CompletionRegistry {
    entries: Vec<Option<EntryRef>>,
    /// Occupancy bitmap; bit set = tag in use.
    occupied: Vec<u64>,
    live: usize,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for `tags` concurrent registrations.
    pub fn with_capacity(tags: usize) -> Self {
        let blocks = tags.div_ceil(BITS_PER_BLOCK);
        Self {
            entries: Vec::with_capacity(blocks * BITS_PER_BLOCK),
            occupied: Vec::with_capacity(blocks),
            live: 0,
        }
    }

    /// Register `entry` under the lowest unused tag.
    pub fn register(&mut self, entry: EntryRef) -> u32 {
        let block_idx = match self.occupied.iter().position(|&b| b != u64::MAX) {
            Some(idx) => idx,
            None => {
                self.occupied.push(0);
                self.entries.resize(self.occupied.len() * BITS_PER_BLOCK, None);
                self.occupied.len() - 1
            }
        };
        let bit_idx = (!self.occupied[block_idx]).trailing_zeros() as usize;
        let tag = block_idx * BITS_PER_BLOCK + bit_idx;

        self.occupied[block_idx] |= 1u64 << bit_idx;
        self.entries[tag] = Some(entry);
        self.live += 1;
        tag as u32
    }

    /// Remove and return the entry registered under `tag`.
    ///
    /// # Panics
    /// If `tag` is not registered. A completion always carries a tag this
    /// registry issued, so an unknown tag means the bookkeeping is broken.
    pub fn resolve(&mut self, tag: u32) -> EntryRef {
        let idx = tag as usize;
        let entry = self
            .entries
            .get_mut(idx)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("completion registry: unknown tag {}", tag));

        self.occupied[idx / BITS_PER_BLOCK] &= !(1u64 << (idx % BITS_PER_BLOCK));
        self.live -= 1;
        entry
    }

    pub fn lookup(&self, tag: u32) -> Option<EntryRef> {
        self.entries.get(tag as usize).copied().flatten()
    }

    /// Remove every registration, lowest tag first.
    pub fn drain(&mut self) -> Vec<(u32, EntryRef)> {
        let drained: Vec<(u32, EntryRef)> = self
            .entries
            .iter_mut()
            .enumerate()
            .filter_map(|(tag, slot)| slot.take().map(|e| (tag as u32, e)))
            .collect();
        self.occupied.iter_mut().for_each(|b| *b = 0);
        self.live = 0;
        drained
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Tags the table can hold before growing.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(slot: u32) -> EntryRef {
        EntryRef::new(OpKind::Nop, slot)
    }

    #[test]
    fn test_lowest_free_tag() {
        let mut reg = CompletionRegistry::new();
        assert_eq!(reg.register(nop(0)), 0);
        assert_eq!(reg.register(nop(1)), 1);
        assert_eq!(reg.register(nop(2)), 2);

        assert_eq!(reg.resolve(1), nop(1));
        assert_eq!(reg.register(EntryRef::new(OpKind::Read, 7)), 1);
        assert_eq!(reg.register(nop(3)), 3);
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn test_resolve_returns_registered_entry() {
        let mut reg = CompletionRegistry::new();
        let a = reg.register(EntryRef::new(OpKind::Accept, 4));
        let b = reg.register(EntryRef::new(OpKind::Stat, 9));
        assert_eq!(reg.resolve(b), EntryRef::new(OpKind::Stat, 9));
        assert_eq!(reg.lookup(b), None);
        assert_eq!(reg.resolve(a), EntryRef::new(OpKind::Accept, 4));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_grows_past_one_block() {
        let mut reg = CompletionRegistry::with_capacity(10);
        let tags: Vec<u32> = (0..130).map(|i| reg.register(nop(i))).collect();
        assert_eq!(tags, (0..130).collect::<Vec<u32>>());
        assert!(reg.capacity() >= 130);

        reg.resolve(70);
        reg.resolve(5);
        assert_eq!(reg.register(nop(0)), 5);
        assert_eq!(reg.register(nop(0)), 70);
        assert_eq!(reg.register(nop(0)), 130);
    }

    #[test]
    #[should_panic(expected = "unknown tag 3")]
    fn test_unknown_tag_panics() {
        let mut reg = CompletionRegistry::new();
        reg.register(nop(0));
        reg.resolve(3);
    }

    #[test]
    #[should_panic(expected = "unknown tag 0")]
    fn test_double_resolve_panics() {
        let mut reg = CompletionRegistry::new();
        let tag = reg.register(nop(0));
        reg.resolve(tag);
        reg.resolve(tag);
    }

    #[test]
    fn test_drain() {
        let mut reg = CompletionRegistry::new();
        reg.register(nop(0));
        reg.register(EntryRef::new(OpKind::Delay, 1));
        reg.resolve(0);
        reg.register(nop(2));

        let drained = reg.drain();
        assert_eq!(
            drained,
            vec![(0, nop(2)), (1, EntryRef::new(OpKind::Delay, 1))]
        );
        assert!(reg.is_empty());
        assert_eq!(reg.register(nop(5)), 0);
    }
}
