/// Decides whether a waiting participant should skip its busy-poll phase.
///
/// This only affects latency. A waiter that skips spinning at index 0 parks
/// right away; one that skips at a non-zero index retracts right away and
/// moves on. Either way the exchange stays correct.
///
/// Implementations are consulted once per wait, before the offer is
/// published, and must be cheap.
///
/// 决定等待中的参与者是否跳过忙轮询阶段。
/// 这只影响延迟，不影响正确性。每次等待在发布之前调用一次，实现必须廉价。
///
/// # Example
/// ```
/// use rendezvous_arena::{Exchanger, SpinPolicy};
///
/// struct NeverSpin;
///
/// impl SpinPolicy for NeverSpin {
///     fn should_prefer_blocking(&self) -> bool {
///         true
///     }
/// }
///
/// let exchanger = Exchanger::<u32>::builder().spin_policy(NeverSpin).build();
/// # drop(exchanger);
/// ```
pub trait SpinPolicy: Send + Sync + 'static {
    /// Return `true` when the caller should block (or give up its slot)
    /// without spinning first.
    fn should_prefer_blocking(&self) -> bool;
}

/// Always spin the configured number of iterations.
/// 始终自旋配置的次数。
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedSpin;

impl SpinPolicy for FixedSpin {
    #[inline]
    fn should_prefer_blocking(&self) -> bool {
        false
    }
}

/// Skip spinning whenever the host reports more runnable threads than cores.
///
/// `load` is any cheap reading of the host scheduler, for example a counter of
/// busy worker threads maintained by the application.
///
/// 当宿主报告可运行线程多于核心数时跳过自旋。
pub struct Oversubscribed<F> {
    load: F,
    cores: usize,
}

impl<F> Oversubscribed<F>
where
    F: Fn() -> usize + Send + Sync + 'static,
{
    pub fn new(cores: usize, load: F) -> Self {
        Self {
            load,
            cores: cores.max(1),
        }
    }
}

impl<F> SpinPolicy for Oversubscribed<F>
where
    F: Fn() -> usize + Send + Sync + 'static,
{
    #[inline]
    fn should_prefer_blocking(&self) -> bool {
        (self.load)() > self.cores
    }
}

impl<F> std::fmt::Debug for Oversubscribed<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oversubscribed")
            .field("cores", &self.cores)
            .finish_non_exhaustive()
    }
}
