use crate::arena::Arena;
use crate::participant::Participant;
use crate::policy::{FixedSpin, SpinPolicy};
use crate::random::IndexSequence;
use crate::state::{ARENA_CAPACITY, SPINS, SharedState};
use crate::sync::{Arc, AtomicUsize, Ordering};
use std::boxed::Box;
use std::marker::PhantomData;

/// Builder for configuring an [`Exchanger`].
///
/// - `arena_slots`: how many slots the arena may grow to
/// - `spins`: busy-poll budget of each wait
/// - `spin_policy`: hook that may skip the busy-poll phase
///
/// # Example
/// ```
/// use rendezvous_arena::Exchanger;
///
/// let exchanger = Exchanger::<String>::builder()
///     .arena_slots(8)
///     .spins(256)
///     .build();
/// assert_eq!(exchanger.arena_len(), 8);
/// ```
///
/// 用于配置 [`Exchanger`] 的构建器。
pub struct ExchangerBuilder<T> {
    arena_slots: usize,
    spins: u32,
    policy: Box<dyn SpinPolicy>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Send> ExchangerBuilder<T> {
    /// Create a builder with default settings.
    /// 创建一个带有默认设置的构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            arena_slots: default_arena_slots(),
            spins: SPINS,
            policy: Box::new(FixedSpin),
            _marker: PhantomData,
        }
    }

    /// Set the arena length, clamped to `1..=ARENA_CAPACITY`.
    ///
    /// The arena starts with only slot 0 active and grows toward this length
    /// under contention.
    ///
    /// Default: available parallelism, clamped the same way.
    ///
    /// 设置 arena 长度，限制在 `1..=ARENA_CAPACITY`。
    /// arena 初始只激活 0 号槽，在竞争下向该长度扩张。
    /// 默认：可用并行度，同样限制。
    #[inline]
    pub fn arena_slots(mut self, slots: usize) -> Self {
        self.arena_slots = slots.clamp(1, ARENA_CAPACITY);
        self
    }

    /// Set the busy-poll budget of a single wait.
    ///
    /// `0` makes waiters at index 0 park immediately and waiters elsewhere
    /// give up their slot immediately.
    ///
    /// Default: `1024`
    ///
    /// 设置单次等待的忙轮询预算。默认：`1024`
    #[inline]
    pub fn spins(mut self, spins: u32) -> Self {
        self.spins = spins;
        self
    }

    /// Install a [`SpinPolicy`].
    ///
    /// Default: [`FixedSpin`]
    #[inline]
    pub fn spin_policy(mut self, policy: impl SpinPolicy) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Build the exchanger.
    /// 构建交换器。
    pub fn build(self) -> Exchanger<T> {
        tracing::debug!(
            arena_slots = self.arena_slots,
            spins = self.spins,
            "building exchanger"
        );
        Exchanger {
            shared: Arc::new(SharedState {
                arena: Arena::new(self.arena_slots),
                spins: self.spins,
                policy: self.policy,
                registrations: AtomicUsize::new(0),
            }),
        }
    }
}

impl<T: Send> Default for ExchangerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn default_arena_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, ARENA_CAPACITY)
}

/// A symmetric rendezvous point.
///
/// Any two participants calling `exchange` concurrently hand each other their
/// items. There is no buffering, no ordering beyond pairwise matching, and no
/// producer or consumer role.
///
/// `Exchanger` is `Clone` and can be shared across threads. Each thread
/// registers its own [`Participant`] once and reuses it for every exchange.
///
/// **Typical Usage**:
/// ```
/// use rendezvous_arena::Exchanger;
/// use std::thread;
///
/// let exchanger = Exchanger::new();
///
/// let remote = exchanger.clone();
/// let handle = thread::spawn(move || {
///     let mut me = remote.register();
///     me.exchange("ping").unwrap()
/// });
///
/// let mut me = exchanger.register();
/// assert_eq!(me.exchange("pong").unwrap(), "ping");
/// assert_eq!(handle.join().unwrap(), "pong");
/// ```
///
/// 对称的会合点。
/// 任意两个并发调用 `exchange` 的参与者互相交换物品。没有缓冲，
/// 除成对匹配外没有顺序保证，也没有生产者或消费者角色。
/// `Exchanger` 是 `Clone` 的，可在线程间共享。
/// 每个线程注册一次自己的 [`Participant`] 并在每次交换中复用。
pub struct Exchanger<T> {
    shared: Arc<SharedState<T>>,
}

impl<T> Clone for Exchanger<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> Exchanger<T> {
    /// Create an exchanger with default settings.
    /// 使用默认设置创建交换器。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the exchanger.
    /// 创建用于配置交换器的构建器。
    #[inline]
    pub fn builder() -> ExchangerBuilder<T> {
        ExchangerBuilder::new()
    }

    /// Register a participant for the current thread.
    ///
    /// The participant is bound to the calling thread: it is `!Send` and
    /// `!Sync`, and it keeps its index sequence and last used slot between
    /// calls.
    ///
    /// 为当前线程注册一个参与者。参与者绑定到调用线程，
    /// 在调用之间保留其下标序列和上次使用的槽。
    pub fn register(&self) -> Participant<T> {
        let registration = self.shared.registrations.fetch_add(1, Ordering::Relaxed);
        Participant::new(
            Arc::clone(&self.shared),
            IndexSequence::from_thread(registration),
        )
    }

    /// Register a participant whose index sequence starts from `seed`.
    ///
    /// Useful for reproducible interleavings in tests.
    ///
    /// 注册一个以 `seed` 作为下标序列种子的参与者，便于测试复现。
    pub fn register_with_seed(&self, seed: u64) -> Participant<T> {
        self.shared.registrations.fetch_add(1, Ordering::Relaxed);
        Participant::new(Arc::clone(&self.shared), IndexSequence::with_seed(seed))
    }
}

impl<T> Exchanger<T> {
    /// Highest arena index currently eligible for sampling.
    /// 当前可被采样的最高 arena 下标。
    #[inline]
    pub fn arena_ceiling(&self) -> usize {
        self.shared.arena.bound().ceiling()
    }

    /// Number of slots the arena can grow to.
    /// arena 可扩张到的槽数量。
    #[inline]
    pub fn arena_len(&self) -> usize {
        self.shared.arena.len()
    }

    /// Raise the ceiling to `ceiling` (capped at `arena_len() - 1`) as if
    /// contention had grown it.
    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn grow_arena_to(&self, ceiling: usize) {
        let arena = &self.shared.arena;
        loop {
            let bound = arena.bound();
            if bound.ceiling() >= ceiling || bound.ceiling() + 1 >= arena.len() {
                return;
            }
            arena.try_grow(bound);
        }
    }
}

impl<T: Send> Default for Exchanger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Exchanger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchanger")
            .field("arena_len", &self.arena_len())
            .field("arena_ceiling", &self.arena_ceiling())
            .field("spins", &self.shared.spins)
            .finish()
    }
}
