#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

#[cfg(feature = "loom")]
pub use loom::sync::Arc;
#[cfg(not(feature = "loom"))]
pub use std::sync::Arc;

#[cfg(feature = "loom")]
pub use loom::thread::{Thread, current, park, yield_now};
#[cfg(not(feature = "loom"))]
pub use std::thread::{Thread, current, park, yield_now};

/// Block until unparked or until `timeout` elapses.
/// 阻塞直到被唤醒或 `timeout` 到期。
#[cfg(not(feature = "loom"))]
#[inline]
pub fn park_timeout(timeout: std::time::Duration) {
    std::thread::park_timeout(timeout);
}

/// Loom does not model time, so a timed park degrades to a yield.
/// loom 不模拟时间，因此限时 park 退化为 yield。
#[cfg(feature = "loom")]
#[inline]
pub fn park_timeout(_timeout: std::time::Duration) {
    loom::thread::yield_now();
}

/// One iteration of a busy-poll loop.
/// 忙轮询循环的一次迭代。
#[cfg(not(feature = "loom"))]
#[inline]
pub fn spin_hint() {
    std::hint::spin_loop();
}

#[cfg(feature = "loom")]
#[inline]
pub fn spin_hint() {
    loom::thread::yield_now();
}
