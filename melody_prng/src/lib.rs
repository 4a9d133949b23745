// Seedable random source for melody sampling.
//
// xoshiro256++ (Blackman & Vigna, 2019) with the 256-bit state expanded from
// a single `u64` seed by SplitMix64. The sampler draws exactly one `next_f64`
// per chosen token, so a fixed seed replays an identical generation run on
// every platform. Keeping the generator in-tree pins the output stream: an
// upstream RNG crate is free to change its algorithms between releases.
//
// Only integer arithmetic is used inside the generator itself. The float
// conversion in `next_f64` is exact (53 bits into a 53-bit mantissa).

use serde::{Deserialize, Serialize};

/// Deterministic random source injected into every sampling call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodyRng {
    s: [u64; 4],
}

impl MelodyRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut state = seed;
        let s = std::array::from_fn(|_| splitmix64(&mut state));
        Self { s }
    }

    /// Seed from the wall clock, for runs where the caller did not ask for
    /// reproducibility. Returns the seed so it can be logged and replayed.
    pub fn from_clock() -> (Self, u64) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        (Self::new(nanos), nanos)
    }

    /// Next 64 random bits.
    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let out = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);

        let s2 = s2 ^ s0;
        let s3 = s3 ^ s1;
        let s1 = s1 ^ s2;
        let s0 = s0 ^ s3;
        self.s = [s0, s1, s2 ^ (self.s[1] << 17), s3.rotate_left(45)];

        out
    }

    /// Uniform `f64` in [0, 1) built from the top 53 bits of one `next_u64`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;
    *state = state.wrapping_add(GOLDEN_GAMMA);
    let z = *state;
    let z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    let z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
