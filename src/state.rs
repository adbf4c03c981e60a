use crate::arena::Arena;
use crate::policy::SpinPolicy;
use crate::sync::AtomicUsize;
use std::boxed::Box;

/// Hard cap on the number of arena slots.
/// arena 槽数量的硬上限。
pub const ARENA_CAPACITY: usize = 256;

/// Default busy-poll budget of a single wait.
/// 单次等待的默认忙轮询预算。
pub const SPINS: u32 = 1 << 10;

/// Consecutive collisions at an unchanged bound before the arena grows.
/// 边界不变时连续碰撞多少次后扩张 arena。
pub(crate) const GROW_AFTER_COLLISIONS: u32 = 3;

/// Consecutive spinouts at an unchanged bound before the arena shrinks.
/// 边界不变时连续自旋超时多少次后收缩 arena。
pub(crate) const SHRINK_AFTER_SPINOUTS: u32 = 2;

/// Spins in the commit wait before falling back to yielding.
pub(crate) const COMMIT_SPINS: u32 = 64;

/// State shared by every handle of one exchanger.
///
/// 同一个交换器所有句柄共享的状态。
pub(crate) struct SharedState<T> {
    pub(crate) arena: Arena<T>,
    pub(crate) spins: u32,
    pub(crate) policy: Box<dyn SpinPolicy>,
    /// Registration counter, mixed into participant seeds.
    pub(crate) registrations: AtomicUsize,
}
