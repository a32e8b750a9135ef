//! Per-kind object pool for exchange entries.
//!
//! Entries live in a `Vec` and are addressed by stable slot indices.
//! A LIFO free stack hands back the most recently released slot first,
//! so a steady workload keeps reusing the same warm entries and never
//! allocates once the high-water mark is reached. Pools never shrink;
//! only `clear()` at shutdown empties them.

use proactor_core::error::{Failure, IoResult, Resource};

use crate::exchange::{EntryState, ExchangeEntry, ExchangeKind};

/// Occupancy snapshot of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Slots ever created (high-water mark).
    pub capacity: usize,
    /// Slots on the free stack.
    pub available: usize,
}

impl PoolStats {
    #[inline]
    pub fn in_use(&self) -> usize {
        self.capacity - self.available
    }
}

pub struct ObjectPool<K: ExchangeKind> {
    entries: Vec<ExchangeEntry<K>>,
    /// LIFO stack of free slot indices.
    free: Vec<u32>,
    /// Growth ceiling. `None` means unbounded.
    ceiling: Option<usize>,
}

impl<K: ExchangeKind> ObjectPool<K> {
    pub fn new(ceiling: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            ceiling,
        }
    }

    /// Hand out a FREE slot: recycled if one is available, fresh otherwise.
    ///
    /// Fails with `Exhausted(ExchangePool)` when every slot is in use and
    /// the pool is at its ceiling.
    pub fn alloc(&mut self) -> IoResult<u32> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }
        if self.ceiling.is_some_and(|max| self.entries.len() >= max) {
            return Err(Failure::Exhausted(Resource::ExchangePool(K::KIND.name())));
        }
        let slot = self.entries.len() as u32;
        self.entries.push(ExchangeEntry::new());
        Ok(slot)
    }

    /// Recycle the entry in `slot` and push the slot onto the free stack.
    ///
    /// # Panics
    /// If the entry has not completed (see `ExchangeEntry::close`).
    pub fn release(&mut self, slot: u32) {
        self.entries[slot as usize].close();
        debug_assert!(!self.free.contains(&slot), "{} slot {} released twice", K::KIND, slot);
        self.free.push(slot);
    }

    #[inline]
    pub fn get(&self, slot: u32) -> &ExchangeEntry<K> {
        &self.entries[slot as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: u32) -> &mut ExchangeEntry<K> {
        &mut self.entries[slot as usize]
    }

    /// Dispose every entry's native resources, in flight or not, and empty
    /// the pool. Best effort: the kernel is not asked to cancel anything.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.dispose();
        }
        self.entries.clear();
        self.free.clear();
    }

    /// Slots handed out and not yet released.
    pub fn in_use(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.entries.len(),
            available: self.free.len(),
        }
    }

    /// Slots whose entry is in `state`.
    pub fn count_in(&self, state: EntryState) -> usize {
        self.entries.iter().filter(|e| e.state() == state).count()
    }
}

impl<K: ExchangeKind> Default for ObjectPool<K> {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Continuation, DelayKind, NopKind};
    use proactor_core::timeout::Timeout;

    fn noop<T>() -> Continuation<T> {
        Box::new(|_, _| {})
    }

    fn complete(pool: &mut ObjectPool<NopKind>, slot: u32) {
        let entry = pool.get_mut(slot);
        entry.prepare((), noop()).unwrap();
        entry.mark_submitted();
        let _ = entry.complete(0, 0);
    }

    #[test]
    fn test_alloc_sequential() {
        let mut pool = ObjectPool::<NopKind>::default();
        assert_eq!(pool.alloc().unwrap(), 0);
        assert_eq!(pool.alloc().unwrap(), 1);
        assert_eq!(pool.alloc().unwrap(), 2);
        assert_eq!(pool.in_use(), 3);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_returns_same_slot_free() {
        let mut pool = ObjectPool::<NopKind>::default();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        complete(&mut pool, b);
        pool.release(b);

        let again = pool.alloc().unwrap();
        assert_eq!(again, b);
        assert_eq!(pool.get(again).state(), EntryState::Free);
        assert_ne!(again, a);
        assert_eq!(pool.stats(), PoolStats { capacity: 2, available: 0 });
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool = ObjectPool::<NopKind>::default();
        let slots: Vec<u32> = (0..4).map(|_| pool.alloc().unwrap()).collect();
        for &slot in &slots {
            complete(&mut pool, slot);
            pool.release(slot);
        }
        assert_eq!(pool.alloc().unwrap(), 3);
        assert_eq!(pool.alloc().unwrap(), 2);
    }

    #[test]
    fn test_ceiling() {
        let mut pool = ObjectPool::<NopKind>::new(Some(2));
        pool.alloc().unwrap();
        let second = pool.alloc().unwrap();
        assert_eq!(
            pool.alloc(),
            Err(Failure::Exhausted(Resource::ExchangePool("nop")))
        );

        complete(&mut pool, second);
        pool.release(second);
        assert_eq!(pool.alloc(), Ok(second));
    }

    #[test]
    #[should_panic(expected = "close while Submitted")]
    fn test_release_in_flight_panics() {
        let mut pool = ObjectPool::<NopKind>::default();
        let slot = pool.alloc().unwrap();
        let entry = pool.get_mut(slot);
        entry.prepare((), noop()).unwrap();
        entry.mark_submitted();
        pool.release(slot);
    }

    #[test]
    fn test_clear_disposes_in_flight() {
        let mut pool = ObjectPool::<DelayKind>::default();
        let slot = pool.alloc().unwrap();
        let entry = pool.get_mut(slot);
        entry.prepare(Timeout::from_secs(5), noop()).unwrap();
        entry.mark_submitted();
        pool.alloc().unwrap();

        pool.clear();
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn test_clear_empty_is_noop() {
        let mut pool = ObjectPool::<NopKind>::default();
        pool.clear();
        pool.clear();
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.in_use(), 0);
    }
}
