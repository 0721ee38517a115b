use serde::{Deserialize, Serialize};

/// Source of every random draw the engine makes. Implementations must be
/// deterministic for a given starting state so ticks can be replayed.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn next_f32(&mut self) -> f32;

    fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f32;
        (min + (self.next_f32() * span).floor() as i32).min(max)
    }

    fn bool(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl RandomSource for Rng {
    fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        unit_f32(t ^ (t >> 14))
    }
}

/// Top 24 bits only, so the result is exact in `f32` and never rounds up to 1.
fn unit_f32(bits: u32) -> f32 {
    (bits >> 8) as f32 / 16_777_216.0
}

/// Replays a fixed list of draws, then repeats `fallback`.
#[cfg(test)]
#[derive(Clone, Debug)]
pub(crate) struct ScriptedRng {
    values: std::collections::VecDeque<f32>,
    fallback: f32,
}

#[cfg(test)]
impl ScriptedRng {
    pub(crate) fn new(values: &[f32], fallback: f32) -> Self {
        Self {
            values: values.iter().copied().collect(),
            fallback,
        }
    }

    /// Never fires any probability roll below 1.0.
    pub(crate) fn quiet() -> Self {
        Self::new(&[], 0.999)
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRng {
    fn next_f32(&mut self) -> f32 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}
