use crate::sync::{Arc, AtomicBool, Ordering, Thread};

/// A participant's cancellation flag.
///
/// Checked only at wait points. Taking the flag clears it, so one interrupt
/// cancels at most one exchange.
///
/// 参与者的取消标志。仅在等待点检查；读取即清除，一次中断至多取消一次交换。
pub(crate) struct InterruptFlag {
    raised: AtomicBool,
}

impl InterruptFlag {
    pub(crate) fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn take(&self) -> bool {
        self.raised.load(Ordering::Relaxed) && self.raised.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Handle for interrupting a participant from another thread.
///
/// Obtained from [`Participant::interrupter`](crate::Participant::interrupter).
/// Interrupting raises the participant's flag and wakes its thread. If the
/// participant is waiting for a partner and can still withdraw its offer, the
/// exchange fails with [`ExchangeError::Interrupted`](crate::ExchangeError::Interrupted).
/// If it is not exchanging, the next exchange that has to wait is interrupted.
///
/// 用于从其他线程中断参与者的句柄。
/// 中断会设置参与者的标志并唤醒其线程。若参与者正在等待且仍可撤回其提供，
/// 则交换以 `Interrupted` 失败；若未在交换，则下一次需要等待的交换会被中断。
#[derive(Clone)]
pub struct Interrupter {
    flag: Arc<InterruptFlag>,
    thread: Thread,
}

impl Interrupter {
    pub(crate) fn new(flag: Arc<InterruptFlag>, thread: Thread) -> Self {
        Self { flag, thread }
    }

    /// Interrupt the participant.
    /// 中断参与者。
    pub fn interrupt(&self) {
        self.flag.raise();
        self.thread.unpark();
    }

    /// Whether an interrupt is pending and not yet consumed.
    /// 是否有尚未被消费的中断。
    pub fn is_pending(&self) -> bool {
        self.flag.is_raised()
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter")
            .field("pending", &self.flag.is_raised())
            .finish()
    }
}
