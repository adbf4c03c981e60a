use crate::node::Node;
use crate::sizing::Bound;
use crate::sync::{AtomicPtr, AtomicUsize, Ordering};
use std::boxed::Box;
use std::ptr;
use std::vec::Vec;

/// A single contention point of the arena.
///
/// Cache-aligned so that neighbouring slots never share a line.
///
/// arena 中的单个竞争点。缓存对齐以避免相邻槽的伪共享。
#[repr(align(64))]
pub(crate) struct Slot<T> {
    offer: AtomicPtr<Node<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            offer: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// The elimination arena: a fixed-length table of lazily allocated slots plus
/// the shared [`Bound`].
///
/// Slot storage is only ever added. Shrinking lowers the bound's ceiling but
/// leaves the slot in place, so an index sampled before a shrink is still
/// safe to read.
///
/// 消除竞技场：固定长度的懒分配槽表以及共享的 [`Bound`]。
/// 槽存储只增不减。收缩只降低上限而不释放槽，
/// 因此收缩之前采样的下标仍可安全读取。
pub(crate) struct Arena<T> {
    slots: Box<[AtomicPtr<Slot<T>>]>,
    bound: AtomicUsize,
}

// SAFETY: the arena only stores pointers to slots it owns and to nodes whose
// items are `T: Send`; all access goes through atomics.
unsafe impl<T: Send> Send for Arena<T> {}
unsafe impl<T: Send> Sync for Arena<T> {}

impl<T> Arena<T> {
    /// Create an arena of `len` slots (at least one). Only slot 0 is allocated.
    /// 创建一个含 `len` 个槽的 arena（至少一个）。只分配 0 号槽。
    pub(crate) fn new(len: usize) -> Self {
        let len = len.max(1);
        let slots: Vec<AtomicPtr<Slot<T>>> =
            (0..len).map(|_| AtomicPtr::new(ptr::null_mut())).collect();
        slots[0].store(Box::into_raw(Box::new(Slot::new())), Ordering::Relaxed);

        Self {
            slots: slots.into_boxed_slice(),
            bound: AtomicUsize::new(Bound::initial().into_raw()),
        }
    }

    /// Number of slot positions, i.e. the ceiling can reach `len() - 1`.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, index: usize) -> Option<&Slot<T>> {
        let raw = self.slots.get(index)?.load(Ordering::Acquire);
        // SAFETY: slot pointers come from `Box::into_raw` and are only freed in
        // `Drop`, which needs `&mut self`.
        unsafe { raw.as_ref() }
    }

    /// Allocate storage for `index` if it does not exist yet.
    ///
    /// Idempotent. Racing callers each allocate, and all but the winner free
    /// their copy.
    ///
    /// 如有必要为 `index` 分配槽存储。幂等；竞争失败者释放自己的副本。
    pub(crate) fn ensure_slot(&self, index: usize) {
        let Some(cell) = self.slots.get(index) else {
            return;
        };
        if !cell.load(Ordering::Acquire).is_null() {
            return;
        }
        let fresh = Box::into_raw(Box::new(Slot::new()));
        if cell
            .compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // SAFETY: `fresh` was never shared.
            drop(unsafe { Box::from_raw(fresh) });
        }
    }

    /// Plain read of slot `index`. Unallocated slots read as empty.
    /// 读取 `index` 号槽。未分配的槽视为空。
    #[inline]
    pub(crate) fn read(&self, index: usize) -> *mut Node<T> {
        match self.slot(index) {
            Some(slot) => slot.offer.load(Ordering::Acquire),
            None => ptr::null_mut(),
        }
    }

    /// CAS slot `index` from empty to `node`.
    #[inline]
    pub(crate) fn try_publish(&self, index: usize, node: *mut Node<T>) -> bool {
        self.slot(index).is_some_and(|slot| {
            slot.offer
                .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// CAS slot `index` from `node` back to empty.
    ///
    /// At most one caller wins for a given publication: either a releaser or
    /// the owner retracting its offer.
    ///
    /// 将 `index` 号槽从 `node` CAS 回空。每次发布至多一个调用者成功。
    #[inline]
    pub(crate) fn try_claim(&self, index: usize, node: *mut Node<T>) -> bool {
        self.slot(index).is_some_and(|slot| {
            slot.offer
                .compare_exchange(node, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    #[inline]
    pub(crate) fn bound(&self) -> Bound {
        Bound::from_raw(self.bound.load(Ordering::Acquire))
    }

    /// Raise the ceiling by one if the bound is still `expected`.
    ///
    /// The new slot is allocated before the ceiling covers it.
    ///
    /// 若边界仍为 `expected`，则将上限提高一。新槽在上限覆盖它之前分配。
    pub(crate) fn try_grow(&self, expected: Bound) -> bool {
        let next = expected.ceiling() + 1;
        if next >= self.len() {
            return false;
        }
        self.ensure_slot(next);
        let grown = self.cas_bound(expected, expected.grown());
        if grown {
            tracing::trace!(ceiling = next, seq = expected.seq() + 1, "arena grew");
        }
        grown
    }

    /// Lower the ceiling by one if the bound is still `expected`.
    /// 若边界仍为 `expected`，则将上限降低一。
    pub(crate) fn try_shrink(&self, expected: Bound) -> bool {
        if expected.ceiling() == 0 {
            return false;
        }
        let shrunk = self.cas_bound(expected, expected.shrunk());
        if shrunk {
            tracing::trace!(
                ceiling = expected.ceiling() - 1,
                seq = expected.seq() + 1,
                "arena shrank"
            );
        }
        shrunk
    }

    #[inline]
    fn cas_bound(&self, expected: Bound, new: Bound) -> bool {
        self.bound
            .compare_exchange(
                expected.into_raw(),
                new.into_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self, index: usize) -> bool {
        self.slot(index).is_some()
    }
}

impl<T> Drop for Arena<T> {
    fn drop(&mut self) {
        for cell in self.slots.iter() {
            let raw = cell.swap(ptr::null_mut(), Ordering::Relaxed);
            if !raw.is_null() {
                // SAFETY: allocated by `Box::into_raw` in `new`/`ensure_slot`,
                // and no other reference can exist during `drop`.
                unsafe {
                    drop(Box::from_raw(raw));
                }
            }
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::sync::current;

    #[test]
    fn slot_zero_exists_at_construction() {
        let arena: Arena<u32> = Arena::new(4);
        assert_eq!(arena.len(), 4);
        assert!(arena.is_allocated(0));
        assert!(!arena.is_allocated(1));
        assert_eq!(arena.bound().ceiling(), 0);
    }

    #[test]
    fn zero_len_is_clamped_to_one() {
        let arena: Arena<u32> = Arena::new(0);
        assert_eq!(arena.len(), 1);
        assert!(!arena.try_grow(arena.bound()));
    }

    #[test]
    fn publish_and_claim_are_exclusive() {
        let arena: Arena<u32> = Arena::new(1);
        let mut a = Node::new(current());
        let mut b = Node::new(current());
        let a: *mut Node<u32> = &mut a;
        let b: *mut Node<u32> = &mut b;

        assert!(arena.try_publish(0, a));
        assert!(!arena.try_publish(0, b));
        assert_eq!(arena.read(0), a);

        assert!(!arena.try_claim(0, b));
        assert!(arena.try_claim(0, a));
        assert!(!arena.try_claim(0, a));
        assert!(arena.read(0).is_null());
    }

    #[test]
    fn unallocated_slot_reads_empty_and_rejects_publish() {
        let arena: Arena<u32> = Arena::new(4);
        let mut a = Node::new(current());
        let a: *mut Node<u32> = &mut a;
        assert!(arena.read(3).is_null());
        assert!(!arena.try_publish(3, a));
        assert!(arena.read(100).is_null());
    }

    #[test]
    fn grow_allocates_and_advances_tag() {
        let arena: Arena<u32> = Arena::new(3);
        let b0 = arena.bound();
        assert!(arena.try_grow(b0));
        assert!(arena.is_allocated(1));

        let b1 = arena.bound();
        assert_eq!(b1.ceiling(), 1);
        assert!(b1.seq() > b0.seq());

        // Stale expectation loses.
        assert!(!arena.try_grow(b0));
        assert!(arena.try_grow(b1));
        // Capacity reached.
        assert!(!arena.try_grow(arena.bound()));
        assert_eq!(arena.bound().ceiling(), 2);
    }

    #[test]
    fn shrink_keeps_storage() {
        let arena: Arena<u32> = Arena::new(2);
        assert!(arena.try_grow(arena.bound()));
        assert!(arena.try_shrink(arena.bound()));
        assert_eq!(arena.bound().ceiling(), 0);
        assert!(arena.is_allocated(1));
        assert!(!arena.try_shrink(arena.bound()));
        assert_eq!(arena.bound().seq(), 2);
    }

    #[test]
    fn ensure_slot_is_idempotent() {
        let arena: Arena<u32> = Arena::new(2);
        arena.ensure_slot(1);
        let first = arena.slots[1].load(Ordering::Acquire);
        arena.ensure_slot(1);
        assert_eq!(arena.slots[1].load(Ordering::Acquire), first);
        arena.ensure_slot(5);
    }
}
