use thiserror::Error;

/// Why an exchange gave up.
///
/// Both variants hand the offered item back: an error is only produced after
/// the offer was withdrawn, so the item was never delivered to anyone.
///
/// 交换放弃的原因。两个变体都会归还提供的物品：
/// 只有在提供被撤回之后才会产生错误，因此物品从未交付给任何人。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError<T> {
    /// No partner arrived before the deadline.
    /// 截止时间前没有伙伴到达。
    #[error("timed out waiting for an exchange partner")]
    TimedOut(T),

    /// The participant was interrupted while waiting.
    /// 参与者在等待时被中断。
    #[error("interrupted while waiting for an exchange partner")]
    Interrupted(T),
}

impl<T> ExchangeError<T> {
    /// Recover the item that was offered.
    /// 取回提供的物品。
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            ExchangeError::TimedOut(item) | ExchangeError::Interrupted(item) => item,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::TimedOut(_))
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ExchangeError::Interrupted(_))
    }
}
