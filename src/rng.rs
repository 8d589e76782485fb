// Tiny RNG (no external crate).
// Feeds the per-frame `u_random` uniform and the generated noise bitmap.

/// Deterministic xorshift32 RNG for lightweight randomness.
#[derive(Clone, Debug)]
pub struct Rng32 {
    state: u32,
}

impl Rng32 {
    pub fn from_seed(seed: u32) -> Self {
        Self { state: seed | 1 }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        // Xorshift: fast and good enough for visual noise
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform [0,1)
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / ((1u32 << 24) as f32)
    }
}
