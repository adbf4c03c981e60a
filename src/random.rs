use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Fallback seed for a zero state, xorshift never leaves zero.
const NONZERO_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Per-participant xorshift sequence used to pick arena indices.
///
/// It is deliberately tiny and deterministic: two sequences created with the
/// same seed sample the same indices, which is what tests rely on.
///
/// 每个参与者的 xorshift 序列，用于选择 arena 下标。
/// 相同种子产生相同的下标序列，测试依赖这一点。
#[derive(Debug, Clone)]
pub(crate) struct IndexSequence {
    state: u64,
}

impl IndexSequence {
    #[inline]
    pub(crate) fn with_seed(seed: u64) -> Self {
        let state = if seed == 0 { NONZERO_SEED } else { seed };
        Self { state }
    }

    /// Seed from the identity of the calling thread mixed with a registration number.
    /// 以调用线程的标识和注册序号混合作为种子。
    pub(crate) fn from_thread(registration: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        registration.hash(&mut hasher);
        Self::with_seed(hasher.finish())
    }

    #[inline]
    fn advance(&mut self) -> u64 {
        let mut r = self.state;
        r ^= r << 13;
        r ^= r >> 7;
        r ^= r << 17;
        self.state = r;
        r
    }

    /// Sample an index in `0..=ceiling`.
    /// 在 `0..=ceiling` 范围内采样一个下标。
    #[inline]
    pub(crate) fn sample_index(&mut self, ceiling: usize) -> usize {
        (self.advance() % (ceiling as u64 + 1)) as usize
    }
}
