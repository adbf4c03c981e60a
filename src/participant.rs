use crate::error::ExchangeError;
use crate::interrupt::{InterruptFlag, Interrupter};
use crate::node::Node;
use crate::random::IndexSequence;
use crate::sizing::{Contention, Resize};
use crate::state::{COMMIT_SPINS, SharedState};
use crate::sync::{self, Arc};
use std::boxed::Box;
use std::ptr::NonNull;
use std::time::{Duration, Instant};

/// Next step of one exchange call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Pick a fresh index below the current ceiling.
    Sample,
    /// Look at the slot and either release its occupant or publish ourselves.
    Inspect(usize),
    /// Published at this index with this spin budget; wait for a releaser.
    Wait(usize, u32),
}

/// Result of inspecting a slot.
enum Inspected<T> {
    /// We claimed a waiting partner and swapped items.
    Released(T),
    /// Our node is now in the slot.
    Published(u32),
    /// Lost a release race to another participant.
    Collided,
    /// Slot was taken between our read and our publish.
    Retry,
    /// Index is above the current ceiling.
    Inactive,
}

/// Result of waiting on a published node.
enum Waited<T> {
    Matched(T),
    /// Spin budget ran out at a non-zero index and the offer was withdrawn.
    SpunOut,
    Cancelled(ExchangeError<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cancel {
    TimedOut,
    Interrupted,
}

impl Cancel {
    #[inline]
    fn into_error<T>(self, item: T) -> ExchangeError<T> {
        match self {
            Cancel::TimedOut => ExchangeError::TimedOut(item),
            Cancel::Interrupted => ExchangeError::Interrupted(item),
        }
    }
}

/// A thread's handle on an [`Exchanger`](crate::Exchanger).
///
/// Created by [`Exchanger::register`](crate::Exchanger::register). It owns the
/// node that gets published into arena slots, the index sequence, the last
/// slot index used, and the contention counters of the sizing controller.
///
/// It is `!Send` and `!Sync`: the node records the registering thread so a
/// partner can wake it, so the handle must stay on that thread.
///
/// **Thread Safety**: one participant per thread; register again on every
/// thread that exchanges.
///
/// 线程在 [`Exchanger`](crate::Exchanger) 上的句柄。
/// 它拥有被发布到 arena 槽中的节点、下标序列、上次使用的槽下标以及尺寸控制器的竞争计数。
/// 它是 `!Send` 和 `!Sync` 的：节点记录了注册线程以便伙伴唤醒它，
/// 因此句柄必须留在该线程上。
pub struct Participant<T> {
    shared: Arc<SharedState<T>>,
    node: NonNull<Node<T>>,
    sequence: IndexSequence,
    /// Last index used, `None` before the first exchange.
    index: Option<usize>,
    contention: Contention,
    interrupt: Arc<InterruptFlag>,
}

impl<T: Send> Participant<T> {
    pub(crate) fn new(shared: Arc<SharedState<T>>, sequence: IndexSequence) -> Self {
        let node = Box::new(Node::new(sync::current()));
        Self {
            shared,
            node: NonNull::from(Box::leak(node)),
            sequence,
            index: None,
            contention: Contention::new(),
            interrupt: Arc::new(InterruptFlag::new()),
        }
    }

    /// Exchange `item` with a partner, waiting as long as it takes.
    ///
    /// Returns the partner's item, or `Interrupted` with `item` handed back if
    /// this participant was interrupted before a partner committed to it.
    ///
    /// 与伙伴交换 `item`，必要时无限等待。
    /// 返回伙伴的物品；若在伙伴确认之前被中断，则返回 `Interrupted` 并归还 `item`。
    #[inline]
    pub fn exchange(&mut self, item: T) -> Result<T, ExchangeError<T>> {
        self.run(item, None)
    }

    /// Exchange `item`, giving up after `timeout`.
    ///
    /// A zero timeout still makes one attempt at slot 0: it succeeds if a
    /// partner is already waiting there.
    ///
    /// 交换 `item`，超过 `timeout` 后放弃。零超时仍会在 0 号槽尝试一次。
    ///
    /// # Example
    /// ```
    /// use rendezvous_arena::Exchanger;
    /// use std::time::Duration;
    ///
    /// let exchanger = Exchanger::new();
    /// let mut me = exchanger.register();
    /// let err = me.exchange_timeout(7u32, Duration::ZERO).unwrap_err();
    /// assert!(err.is_timeout());
    /// assert_eq!(err.into_inner(), 7);
    /// ```
    #[inline]
    pub fn exchange_timeout(&mut self, item: T, timeout: Duration) -> Result<T, ExchangeError<T>> {
        // An unrepresentable deadline is as good as none.
        let deadline = Instant::now().checked_add(timeout);
        self.run(item, deadline)
    }

    /// Exchange `item`, giving up at `deadline`.
    /// 交换 `item`，到 `deadline` 时放弃。
    #[inline]
    pub fn exchange_deadline(&mut self, item: T, deadline: Instant) -> Result<T, ExchangeError<T>> {
        self.run(item, Some(deadline))
    }

    /// A handle other threads can use to interrupt this participant.
    /// 其他线程可用于中断此参与者的句柄。
    pub fn interrupter(&self) -> Interrupter {
        Interrupter::new(Arc::clone(&self.interrupt), self.node().waiter().clone())
    }

    fn run(&mut self, item: T, deadline: Option<Instant>) -> Result<T, ExchangeError<T>> {
        self.node().offer(Box::new(item));

        let expired = deadline.is_some_and(|d| Instant::now() >= d);
        let mut step = match self.index {
            _ if expired => Step::Inspect(0),
            Some(i) => Step::Inspect(i),
            None => Step::Sample,
        };

        loop {
            step = match step {
                Step::Sample => {
                    let ceiling = self.shared.arena.bound().ceiling();
                    let i = self.sequence.sample_index(ceiling);
                    self.index = Some(i);
                    Step::Inspect(i)
                }
                Step::Inspect(i) => match self.inspect(i) {
                    Inspected::Released(theirs) => return Ok(theirs),
                    Inspected::Published(spins) => Step::Wait(i, spins),
                    Inspected::Retry => Step::Inspect(i),
                    Inspected::Collided => {
                        self.record_collision();
                        Step::Sample
                    }
                    Inspected::Inactive => Step::Sample,
                },
                Step::Wait(i, spins) => match self.await_match(i, spins, deadline) {
                    Waited::Matched(theirs) => return Ok(theirs),
                    Waited::Cancelled(err) => return Err(err),
                    Waited::SpunOut => {
                        self.record_spinout();
                        Step::Sample
                    }
                },
            };
        }
    }

    fn inspect(&mut self, i: usize) -> Inspected<T> {
        let arena = &self.shared.arena;
        if i > arena.bound().ceiling() {
            return Inspected::Inactive;
        }

        let occupant = arena.read(i);
        if !occupant.is_null() {
            if arena.try_claim(i, occupant) {
                return Inspected::Released(self.release(occupant, i));
            }
            return Inspected::Collided;
        }

        // Ask the policy before publishing so no foreign code runs while the
        // node is visible to other threads.
        let spins = if self.shared.policy.should_prefer_blocking() {
            0
        } else {
            self.shared.spins
        };
        if arena.try_publish(i, self.node.as_ptr()) {
            Inspected::Published(spins)
        } else {
            Inspected::Retry
        }
    }

    /// Swap items with a partner we just claimed from slot `i`.
    fn release(&self, partner: *mut Node<T>, i: usize) -> T {
        // SAFETY: the claim CAS succeeded, so the partner is parked in its
        // wait loop and its node stays alive until we `fulfill` it.
        let partner = unsafe { &*partner };
        let Some(theirs) = partner.take_item() else {
            unreachable!("BUG: claimed a published node with no offered item");
        };
        let Some(mine) = self.node().take_item() else {
            unreachable!("BUG: releasing without an offered item");
        };
        // Only index 0 ever parks.
        let waiter = (i == 0).then(|| partner.waiter().clone());
        partner.fulfill(mine);
        if let Some(thread) = waiter {
            thread.unpark();
        }
        *theirs
    }

    fn await_match(&mut self, i: usize, mut spins: u32, deadline: Option<Instant>) -> Waited<T> {
        loop {
            if let Some(theirs) = self.node().take_match() {
                return Waited::Matched(*theirs);
            }
            if self.interrupt.take() {
                return self.cancel(i, Cancel::Interrupted);
            }
            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return self.cancel(i, Cancel::TimedOut);
                    }
                    Some(d - now)
                }
                None => None,
            };

            if spins > 0 {
                spins -= 1;
                sync::spin_hint();
                continue;
            }

            if i != 0 {
                return if self.shared.arena.try_claim(i, self.node.as_ptr()) {
                    Waited::SpunOut
                } else {
                    Waited::Matched(self.commit())
                };
            }

            match remaining {
                Some(timeout) => sync::park_timeout(timeout),
                None => sync::park(),
            }
        }
    }

    /// Withdraw the offer at `i`, or commit to the match if a releaser beat us.
    ///
    /// 撤回 `i` 处的提供；若释放者已抢先认领，则确认匹配。
    fn cancel(&mut self, i: usize, reason: Cancel) -> Waited<T> {
        if self.shared.arena.try_claim(i, self.node.as_ptr()) {
            let Some(item) = self.node().take_item() else {
                unreachable!("BUG: retracted a node with no offered item");
            };
            tracing::trace!(index = i, reason = ?reason, "exchange cancelled");
            return Waited::Cancelled(reason.into_error(*item));
        }

        // A releaser already owns our offer; its item is on the way.
        if reason == Cancel::Interrupted {
            self.interrupt.raise();
        }
        Waited::Matched(self.commit())
    }

    /// Wait for a match that is guaranteed to arrive.
    fn commit(&self) -> T {
        let mut spins = 0u32;
        loop {
            if let Some(theirs) = self.node().take_match() {
                return *theirs;
            }
            if spins < COMMIT_SPINS {
                spins += 1;
                sync::spin_hint();
            } else {
                sync::yield_now();
            }
        }
    }

    fn record_collision(&mut self) {
        let arena = &self.shared.arena;
        if let Resize::Grow(bound) = self.contention.on_collision(arena.bound(), arena.len()) {
            arena.try_grow(bound);
        }
    }

    fn record_spinout(&mut self) {
        let arena = &self.shared.arena;
        if let Resize::Shrink(bound) = self.contention.on_spinout(arena.bound()) {
            arena.try_shrink(bound);
        }
    }
}

impl<T> Participant<T> {
    #[inline]
    fn node(&self) -> &Node<T> {
        // SAFETY: allocated in `new`, freed only in `drop`.
        unsafe { self.node.as_ref() }
    }

    /// Index of the slot used by the last exchange, if any.
    /// 上一次交换使用的槽下标（如有）。
    #[inline]
    pub fn last_index(&self) -> Option<usize> {
        self.index
    }

    /// Pretend the previous exchange used slot `index`.
    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn set_last_index(&mut self, index: usize) {
        self.index = Some(index);
    }
}

impl<T> Drop for Participant<T> {
    /// The node is never published outside of an exchange call, so no slot
    /// can still point at it here.
    ///
    /// 节点只在交换调用期间被发布，因此此处不会有槽仍指向它。
    fn drop(&mut self) {
        // SAFETY: allocated by `Box::into_raw` in `new`, unpublished.
        unsafe {
            drop(Box::from_raw(self.node.as_ptr()));
        }
    }
}

impl<T> std::fmt::Debug for Participant<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("last_index", &self.index)
            .field("interrupt_pending", &self.interrupt.is_raised())
            .finish_non_exhaustive()
    }
}
