use crate::state::{GROW_AFTER_COLLISIONS, SHRINK_AFTER_SPINOUTS};

/// Mask selecting the active ceiling from a packed bound.
const CEILING_MASK: usize = 0xff;

/// One unit of the change-sequence tag.
const SEQ_UNIT: usize = CEILING_MASK + 1;

/// The arena's packed bound: active index ceiling in the low 8 bits and a
/// change-sequence tag above it.
///
/// Every grow or shrink bumps the tag, so two reads of an equal `Bound`
/// mean no resize happened in between (modulo tag wrap-around).
///
/// arena 的打包边界：低 8 位为活跃下标上限，其余位为变更序号。
/// 每次扩张或收缩都会增加序号，因此两次读到相同的 `Bound` 意味着期间没有发生调整。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bound(usize);

impl Bound {
    #[inline]
    pub(crate) const fn initial() -> Self {
        Bound(0)
    }

    #[inline]
    pub(crate) const fn from_raw(raw: usize) -> Self {
        Bound(raw)
    }

    #[inline]
    pub(crate) const fn into_raw(self) -> usize {
        self.0
    }

    /// Highest index currently eligible for sampling.
    /// 当前可被采样的最高下标。
    #[inline]
    pub(crate) const fn ceiling(self) -> usize {
        self.0 & CEILING_MASK
    }

    #[inline]
    pub(crate) const fn seq(self) -> usize {
        self.0 >> 8
    }

    /// Bound with the ceiling raised by one and the tag advanced.
    #[inline]
    pub(crate) const fn grown(self) -> Self {
        Bound(self.0.wrapping_add(SEQ_UNIT + 1))
    }

    /// Bound with the ceiling lowered by one and the tag advanced.
    #[inline]
    pub(crate) const fn shrunk(self) -> Self {
        Bound(self.0.wrapping_add(SEQ_UNIT - 1))
    }
}

/// What the controller wants done with the arena after an observation.
/// 控制器在一次观测后希望对 arena 执行的操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resize {
    Keep,
    /// Grow from this exact bound.
    Grow(Bound),
    /// Shrink from this exact bound.
    Shrink(Bound),
}

/// Per-participant contention bookkeeping for the adaptive sizing controller.
///
/// Both counters only accumulate while the globally observed bound stays the
/// same. A changed bound means the arena was resized by someone else, so the
/// evidence gathered so far is stale and gets dropped.
///
/// Growth needs three consecutive collisions: a lost release proves at least
/// two other participants were competing. Shrink needs only two spinouts, so an
/// oversized arena recovers quickly.
///
/// 自适应尺寸控制器的参与者本地竞争统计。
/// 只有当观测到的全局边界保持不变时计数器才会累加；
/// 边界变化说明 arena 已被他人调整，之前的证据作废。
/// 扩张需要连续三次碰撞，收缩只需连续两次自旋超时。
#[derive(Debug, Clone)]
pub(crate) struct Contention {
    observed: Bound,
    collisions: u32,
    spinouts: u32,
}

impl Contention {
    pub(crate) fn new() -> Self {
        Self {
            observed: Bound::initial(),
            collisions: 0,
            spinouts: 0,
        }
    }

    /// Returns `true` if `current` differs from the last observation.
    #[inline]
    fn refresh(&mut self, current: Bound) -> bool {
        if current == self.observed {
            return false;
        }
        self.observed = current;
        self.collisions = 0;
        self.spinouts = 0;
        true
    }

    /// Record a lost release race at `current`.
    ///
    /// `arena_len` caps the ceiling at `arena_len - 1`.
    ///
    /// 记录一次在 `current` 边界下失败的释放竞争。
    pub(crate) fn on_collision(&mut self, current: Bound, arena_len: usize) -> Resize {
        if self.refresh(current) {
            return Resize::Keep;
        }
        self.collisions += 1;
        if self.collisions < GROW_AFTER_COLLISIONS {
            return Resize::Keep;
        }
        self.collisions = 0;
        if current.ceiling() + 1 < arena_len {
            Resize::Grow(current)
        } else {
            Resize::Keep
        }
    }

    /// Record a wait that exhausted its spin budget at `current`.
    ///
    /// 记录一次在 `current` 边界下耗尽自旋预算的等待。
    pub(crate) fn on_spinout(&mut self, current: Bound) -> Resize {
        if self.refresh(current) {
            return Resize::Keep;
        }
        self.spinouts += 1;
        if self.spinouts < SHRINK_AFTER_SPINOUTS {
            return Resize::Keep;
        }
        self.spinouts = 0;
        if current.ceiling() > 0 {
            Resize::Shrink(current)
        } else {
            Resize::Keep
        }
    }
}
