//! Exchange entry factory: one [`ObjectPool`] per operation kind.

use proactor_core::error::IoResult;

use crate::exchange::*;
use crate::pool::{ObjectPool, PoolStats};

macro_rules! pools {
    ($($field:ident: $kind:ty),* $(,)?) => {
        /// Owns every per-kind pool. The proactor obtains, finds and
        /// recycles entries only through here.
        pub struct ExchangeEntryFactory {
            $(pub(crate) $field: ObjectPool<$kind>,)*
        }

        impl ExchangeEntryFactory {
            /// Every pool shares the same growth ceiling.
            pub fn new(ceiling: Option<usize>) -> Self {
                Self {
                    $($field: ObjectPool::new(ceiling),)*
                }
            }

            /// Dispose and empty every pool.
            pub fn clear(&mut self) {
                $(self.$field.clear();)*
            }

            /// Entries handed out and not yet released, across all kinds.
            pub fn in_use(&self) -> usize {
                0 $(+ self.$field.in_use())*
            }

            /// Per-kind occupancy.
            pub fn stats(&self) -> Vec<(OpKind, PoolStats)> {
                vec![$((<$kind as ExchangeKind>::KIND, self.$field.stats()),)*]
            }
        }
    };
}

pools! {
    nop: NopKind,
    delay: DelayKind,
    guard: TimeoutGuardKind,
    close: CloseKind,
    read: ReadKind,
    write: WriteKind,
    read_vector: ReadVectorKind,
    write_vector: WriteVectorKind,
    splice: SpliceKind,
    open: OpenKind,
    socket: SocketKind,
    listen: ListenKind,
    accept: AcceptKind,
    connect: ConnectKind,
    stat: StatKind,
}

impl ExchangeEntryFactory {
    #[inline]
    pub fn pool<K: ExchangeKind>(&mut self) -> &mut ObjectPool<K> {
        K::pool(self)
    }

    /// A FREE entry of kind `K`, identified by its slot.
    #[inline]
    pub fn alloc<K: ExchangeKind>(&mut self) -> IoResult<u32> {
        K::pool(self).alloc()
    }

    #[inline]
    pub fn entry<K: ExchangeKind>(&mut self, slot: u32) -> &mut ExchangeEntry<K> {
        K::pool(self).get_mut(slot)
    }

    #[inline]
    pub fn release<K: ExchangeKind>(&mut self, slot: u32) {
        K::pool(self).release(slot)
    }
}

impl Default for ExchangeEntryFactory {
    fn default() -> Self {
        Self::new(None)
    }
}
