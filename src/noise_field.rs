use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;

/// Coherent-noise brush.
///
/// The field samples fractal Perlin noise over the unit square, scaled by
/// `frequency`, then remaps the value through the `[clip_min, clip_max]`
/// window so users can carve sparse or dense patterns out of the same noise.
#[derive(Clone, Debug)]
pub struct NoiseBrush {
    fbm: Fbm<Perlin>,
    seed: u32,
    octaves: usize,
    frequency: f32,
    clip_min: f32,
    clip_max: f32,
}

impl NoiseBrush {
    pub fn new(seed: u32, octaves: usize, frequency: f32) -> Self {
        Self {
            fbm: build_fbm(seed, octaves),
            seed,
            octaves,
            frequency,
            clip_min: 0.0,
            clip_max: 1.0,
        }
    }

    /// Set the remap window applied after normalising noise to `[0, 1]`.
    pub fn with_clip(mut self, min: f32, max: f32) -> Self {
        self.clip_min = min;
        self.clip_max = max;
        self
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn clip(&self) -> (f32, f32) {
        (self.clip_min, self.clip_max)
    }

    /// Normalised noise in `[0, 1]` at field coordinates.
    fn sample(&self, u: f32, v: f32) -> f32 {
        let raw = self.fbm.get([
            (u * self.frequency) as f64,
            (v * self.frequency) as f64,
        ]) as f32;
        (raw * 0.5 + 0.5).clamp(0.0, 1.0)
    }

    fn remap(&self, value: f32) -> f32 {
        let span = self.clip_max - self.clip_min;
        if span <= f32::EPSILON {
            // Degenerate window: hard threshold
            return if value >= self.clip_min { 1.0 } else { 0.0 };
        }
        ((value - self.clip_min) / span).clamp(0.0, 1.0)
    }

    /// Raw `n x n` field, row-major.
    pub fn generate(&self, n: usize) -> Vec<f32> {
        let mut data = vec![0.0; n * n];
        if n == 0 {
            return data;
        }

        data.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
            let v = (y as f32 + 0.5) / n as f32;
            for (x, weight) in row.iter_mut().enumerate() {
                let u = (x as f32 + 0.5) / n as f32;
                *weight = self.remap(self.sample(u, v));
            }
        });
        data
    }
}

fn build_fbm(seed: u32, octaves: usize) -> Fbm<Perlin> {
    Fbm::<Perlin>::new(seed)
        .set_octaves(octaves.max(1))
        .set_lacunarity(2.0)
        .set_persistence(0.5)
}
