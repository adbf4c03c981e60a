use crate::sync::{AtomicPtr, Ordering, Thread};
use std::boxed::Box;
use std::ptr;

/// The cross-thread half of a participant's state.
///
/// A node is what gets published into an arena slot. While published, exactly
/// one other thread may claim it; that releaser takes `item` and fills
/// `matched`. Everything else about the participant stays private to its
/// owning thread.
///
/// Both fields are null when empty. Presence is never encoded in the value,
/// so any `T` (including `None` of an `Option`) travels unchanged.
///
/// 参与者状态中跨线程的部分。
/// 节点被发布到 arena 槽中。发布期间恰好一个其他线程可以认领它；
/// 该释放者取走 `item` 并填充 `matched`。
/// 两个字段为空时均为 null，存在性从不编码在值中。
pub(crate) struct Node<T> {
    /// Item offered by the owner. Written by the owner before publishing,
    /// taken by the releaser or by the owner after a retraction.
    item: AtomicPtr<T>,
    /// Partner's item. Written once per exchange by the releaser.
    matched: AtomicPtr<T>,
    /// Owner thread, woken by a releaser at index 0.
    waiter: Thread,
}

impl<T> Node<T> {
    pub(crate) fn new(waiter: Thread) -> Self {
        Self {
            item: AtomicPtr::new(ptr::null_mut()),
            matched: AtomicPtr::new(ptr::null_mut()),
            waiter,
        }
    }

    /// Owner side: place the item to be offered.
    ///
    /// An item still sitting here belongs to a call that unwound before
    /// publishing; it is dropped.
    ///
    /// 所有者：放入待提供的物品。残留的物品来自发布前就展开的调用，会被丢弃。
    #[inline]
    pub(crate) fn offer(&self, item: Box<T>) {
        let old = self.item.swap(Box::into_raw(item), Ordering::Relaxed);
        if !old.is_null() {
            // SAFETY: the node was not published, so the owner is the only
            // holder of `old`, which came from `Box::into_raw`.
            drop(unsafe { Box::from_raw(old) });
        }
    }

    /// Take the offered item, leaving the field empty.
    ///
    /// Called by the owner after a retraction, or by the releaser after a
    /// successful claim. The claim CAS orders this after the owner's `offer`.
    ///
    /// 取走提供的物品，字段置空。
    #[inline]
    pub(crate) fn take_item(&self) -> Option<Box<T>> {
        let raw = self.item.swap(ptr::null_mut(), Ordering::Acquire);
        // SAFETY: non-null pointers in `item` come from `Box::into_raw` in
        // `offer`, and the swap hands ownership to exactly one caller.
        (!raw.is_null()).then(|| unsafe { Box::from_raw(raw) })
    }

    /// Releaser side: deliver the partner's item.
    ///
    /// After this store the releaser must not touch the node again: the owner
    /// may return and drop it as soon as it observes the match.
    ///
    /// 释放者：交付对方的物品。此后释放者不得再访问该节点。
    #[inline]
    pub(crate) fn fulfill(&self, item: Box<T>) {
        self.matched.store(Box::into_raw(item), Ordering::Release);
    }

    /// Owner side: read-and-clear the match field.
    /// 所有者：读取并清空匹配字段。
    #[inline]
    pub(crate) fn take_match(&self) -> Option<Box<T>> {
        if self.matched.load(Ordering::Acquire).is_null() {
            return None;
        }
        let raw = self.matched.swap(ptr::null_mut(), Ordering::Acquire);
        // SAFETY: only `fulfill` stores non-null pointers, each from
        // `Box::into_raw`, and only the owner swaps them out.
        (!raw.is_null()).then(|| unsafe { Box::from_raw(raw) })
    }

    #[inline]
    pub(crate) fn waiter(&self) -> &Thread {
        &self.waiter
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        drop(self.take_item());
        drop(self.take_match());
    }
}
