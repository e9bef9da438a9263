//! Texture-based brushes.

use image::{DynamicImage, ImageBuffer, LumaA};
use rayon::prelude::*;

type LumaAlphaF32 = ImageBuffer<LumaA<f32>, Vec<f32>>;

/// A brush whose field is a resampled user texture.
#[derive(Clone, Debug)]
pub struct ImageBrush {
    pixels: LumaAlphaF32,
    /// Multiply luminance by the alpha channel
    pub use_alpha: bool,
}

impl ImageBrush {
    pub fn new(image: &DynamicImage) -> Self {
        Self {
            pixels: image.to_luma_alpha32f(),
            use_alpha: false,
        }
    }

    pub fn with_alpha(mut self, use_alpha: bool) -> Self {
        self.use_alpha = use_alpha;
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Resample the texture to an `n x n` raw field (row-major, unclamped).
    /// Row 0 of the field is the bottom of the texture.
    pub fn generate(&self, n: usize) -> Vec<f32> {
        let mut data = vec![0.0; n * n];
        let (w, h) = self.pixels.dimensions();
        if n == 0 || w == 0 || h == 0 {
            return data;
        }

        data.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
            // Texture rows run top-down, field rows bottom-up.
            let v = (n - 1 - y) as f32 + 0.5;
            let sy = v / n as f32 * h as f32 - 0.5;
            for (x, weight) in row.iter_mut().enumerate() {
                let sx = (x as f32 + 0.5) / n as f32 * w as f32 - 0.5;
                *weight = self.sample(sx, sy);
            }
        });
        data
    }

    fn texel(&self, x: i64, y: i64) -> f32 {
        let (w, h) = self.pixels.dimensions();
        let x = x.clamp(0, w as i64 - 1) as u32;
        let y = y.clamp(0, h as i64 - 1) as u32;
        let [luma, alpha] = self.pixels.get_pixel(x, y).0;
        if self.use_alpha {
            luma * alpha
        } else {
            luma
        }
    }

    fn sample(&self, sx: f32, sy: f32) -> f32 {
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);
        let row0 = a + (b - a) * fx;
        let row1 = c + (d - c) * fx;
        row0 + (row1 - row0) * fy
    }
}
