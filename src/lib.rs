//! # rendezvous-arena
//!
//! A lock-free symmetric rendezvous point: two threads that call
//! [`Participant::exchange`] concurrently hand each other one item each.
//!
//! 无锁的对称会合点：两个并发调用 [`Participant::exchange`] 的线程各自交出一个物品并获得对方的物品。
//!
//! ## How it works / 工作原理
//!
//! Offers are published into an *elimination arena*, a small table of
//! cache-aligned slots. A caller picks a slot with its own xorshift sequence
//! and either claims the participant waiting there (and swaps items) or
//! publishes itself and waits. Under contention the arena grows so that
//! independent pairs meet in different slots; when waits go unanswered it
//! shrinks back toward slot 0, where waiters park instead of spinning.
//!
//! 物品提供被发布到一个*消除竞技场*中，即一个缓存对齐的小型槽表。
//! 调用者用自己的 xorshift 序列选择槽，要么认领在那里等待的参与者（并交换物品），
//! 要么发布自己并等待。竞争激烈时 arena 扩张，使独立的配对在不同的槽中相遇；
//! 等待无人响应时则收缩回 0 号槽，那里的等待者会 park 而不是自旋。
//!
//! Cancellation (timeout or [`Interrupter`]) only succeeds if the offer can
//! still be withdrawn. Once a partner has claimed it, the waiter completes the
//! exchange instead, so items are never lost or duplicated.
//!
//! 取消（超时或 [`Interrupter`]）只有在提供仍可撤回时才会成功。
//! 一旦伙伴已认领，等待者会完成交换，因此物品不会丢失或重复。
//!
//! ## Example / 示例
//! ```
//! use rendezvous_arena::Exchanger;
//! use std::thread;
//!
//! let exchanger = Exchanger::new();
//! let other = exchanger.clone();
//!
//! let t = thread::spawn(move || other.register().exchange(String::from("left")).unwrap());
//! let got = exchanger.register().exchange(String::from("right")).unwrap();
//!
//! assert_eq!(got, "left");
//! assert_eq!(t.join().unwrap(), "right");
//! ```

mod arena;
mod error;
mod exchanger;
mod interrupt;
mod node;
mod participant;
mod policy;
mod random;
mod sizing;
mod state;
mod sync;

pub use error::ExchangeError;
pub use exchanger::{Exchanger, ExchangerBuilder};
pub use interrupt::Interrupter;
pub use participant::Participant;
pub use policy::{FixedSpin, Oversubscribed, SpinPolicy};
pub use state::{ARENA_CAPACITY, SPINS};

#[cfg(all(test, not(feature = "loom")))]
mod tests;
