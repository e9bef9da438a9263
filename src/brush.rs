//! Brush field generation.
//!
//! A brush turns its shape parameters into a square array of weights (the
//! falloff field) at a caller-chosen resolution. Fields are cached and only
//! regenerated when a parameter or the requested resolution changes.
//!
//! Sample `(x, y)` of an `n x n` field sits at `(x + 0.5 - n/2, y + 0.5 - n/2)`
//! relative to the field centre, with `y` pointing "up" (toward +Z in world).

use std::f32::consts::FRAC_PI_4;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::falloff::FalloffCurve;
use crate::image_brush::ImageBrush;
use crate::noise_field::NoiseBrush;

/// Shape parameters shared by every brush kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushShape {
    /// Footprint diameter in world units
    pub size: f32,
    /// Radial profile
    pub falloff: FalloffCurve,
    /// 1 = circular, 0 = square
    pub roundness: f32,
    /// Rotation of the square/rounded footprint, counter-clockwise
    pub angle_degrees: f32,
    pub invert: bool,
}

impl Default for BrushShape {
    fn default() -> Self {
        Self {
            size: 10.0,
            falloff: FalloffCurve::linear(),
            roundness: 1.0,
            angle_degrees: 0.0,
            invert: false,
        }
    }
}

/// A generated square weight field.
#[derive(Clone, Debug, PartialEq)]
pub struct BrushSamples {
    size: usize,
    data: Vec<f32>,
}

impl BrushSamples {
    pub fn filled(size: usize, value: f32) -> Self {
        Self {
            size,
            data: vec![value; size * size],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` when `data` is not
    /// `size * size` long.
    pub fn from_vec(size: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == size * size).then_some(Self { size, data })
    }

    /// Side length
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.size + x]
    }

    /// Weight at a possibly out-of-range integer position; outside is 0.
    #[inline]
    fn get_or_zero(&self, x: i64, y: i64) -> f32 {
        let n = self.size as i64;
        if x < 0 || y < 0 || x >= n || y >= n {
            0.0
        } else {
            self.data[y as usize * self.size + x as usize]
        }
    }

    /// Bilinearly resample this field rotated counter-clockwise by `degrees`.
    ///
    /// Used for per-application random rotation so the full generator does not
    /// have to run every tick.
    pub fn rotated(&self, degrees: f32) -> BrushSamples {
        let n = self.size;
        if n == 0 || degrees == 0.0 {
            return self.clone();
        }

        let half = n as f32 * 0.5;
        // Inverse rotation maps a target position back into source space.
        let (sin, cos) = (-degrees).to_radians().sin_cos();
        let mut data = vec![0.0; n * n];

        data.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
            for (x, weight) in row.iter_mut().enumerate() {
                let (px, py) = centered(x, y, half);
                let sx = px * cos - py * sin + half - 0.5;
                let sy = px * sin + py * cos + half - 0.5;
                *weight = self.bilinear(sx, sy);
            }
        });

        BrushSamples { size: n, data }
    }

    fn bilinear(&self, sx: f32, sy: f32) -> f32 {
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let bottom = lerp(self.get_or_zero(x0, y0), self.get_or_zero(x0 + 1, y0), fx);
        let top = lerp(
            self.get_or_zero(x0, y0 + 1),
            self.get_or_zero(x0 + 1, y0 + 1),
            fx,
        );
        lerp(bottom, top, fy)
    }

    fn map_in_place(&mut self, f: impl Fn(f32) -> f32 + Sync) {
        self.data.par_iter_mut().for_each(|w| *w = f(*w));
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn centered(x: usize, y: usize, half: f32) -> (f32, f32) {
    (x as f32 + 0.5 - half, y as f32 + 0.5 - half)
}

/// Generate the procedural falloff field for `shape` at resolution `n`.
///
/// `n == 0` gives an empty field and `n == 1` a single full-weight sample.
/// No clamping is applied to curve output.
pub fn generate_procedural(shape: &BrushShape, n: usize) -> BrushSamples {
    if n <= 1 {
        return BrushSamples::filled(n, 1.0);
    }

    let half = n as f32 * 0.5;
    let mut data = vec![0.0; n * n];

    data.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
        for (x, weight) in row.iter_mut().enumerate() {
            let (px, py) = centered(x, y, half);
            *weight = procedural_weight(shape, px, py, half);
        }
    });

    BrushSamples { size: n, data }
}

fn procedural_weight(shape: &BrushShape, px: f32, py: f32, half: f32) -> f32 {
    let distance = (px * px + py * py).sqrt();

    if shape.roundness >= 1.0 {
        return shape.falloff.evaluate(1.0 - distance / half);
    }

    let (lx, ly) = if shape.angle_degrees != 0.0 {
        let (sin, cos) = (-shape.angle_degrees).to_radians().sin_cos();
        (px * cos - py * sin, px * sin + py * cos)
    } else {
        (px, py)
    };

    let (ex, ey) = square_edge_intersection(lx, ly, half);
    let mut edge_distance = (ex * ex + ey * ey).sqrt();

    let roundness_half = shape.roundness.max(0.0) * half;
    let corner_threshold = half - roundness_half;
    if ex.abs() >= corner_threshold && ey.abs() >= corner_threshold {
        let dx = ex.abs() - corner_threshold;
        let dy = ey.abs() - corner_threshold;
        let corner_distance = (dx * dx + dy * dy).sqrt() - roundness_half;
        edge_distance -= corner_distance;
    }

    shape.falloff.evaluate(1.0 - distance / edge_distance)
}

/// Where a ray from the origin through `(x, y)` leaves the axis-aligned square
/// of half-size `half`.
fn square_edge_intersection(x: f32, y: f32, half: f32) -> (f32, f32) {
    let angle = y.atan2(x);
    let abs = angle.abs();

    if abs <= FRAC_PI_4 {
        (half, half * angle.tan())
    } else if abs >= 3.0 * FRAC_PI_4 {
        (-half, -half * angle.tan())
    } else if angle > 0.0 {
        (half / angle.tan(), half)
    } else {
        (-half / angle.tan(), -half)
    }
}

/// How a brush produces its raw field.
#[derive(Clone, Debug)]
pub enum BrushSource {
    /// Falloff curve + roundness + rotation
    Procedural,
    /// Resampled user texture
    Image(ImageBrush),
    /// Coherent noise with a clip range
    Noise(NoiseBrush),
}

/// A catalogued brush with its cached field.
#[derive(Clone, Debug)]
pub struct Brush {
    id: String,
    source: BrushSource,
    shape: BrushShape,
    /// Multiply image/noise output by the procedural falloff field
    use_falloff_for_custom: bool,
    cache: Option<BrushSamples>,
    cached_invert: bool,
    dirty: bool,
}

impl Brush {
    pub fn new(id: impl Into<String>, source: BrushSource) -> Self {
        Self {
            id: id.into(),
            source,
            shape: BrushShape::default(),
            use_falloff_for_custom: false,
            cache: None,
            cached_invert: false,
            dirty: true,
        }
    }

    pub fn procedural(id: impl Into<String>) -> Self {
        Self::new(id, BrushSource::Procedural)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &BrushSource {
        &self.source
    }

    pub fn set_source(&mut self, source: BrushSource) {
        self.source = source;
        self.dirty = true;
    }

    pub fn shape(&self) -> &BrushShape {
        &self.shape
    }

    /// Adopt new shape parameters; only an actual change marks the field dirty.
    pub fn set_shape(&mut self, shape: &BrushShape) {
        if self.shape != *shape {
            self.shape = shape.clone();
            self.dirty = true;
        }
    }

    pub fn use_falloff_for_custom(&self) -> bool {
        self.use_falloff_for_custom
    }

    pub fn set_use_falloff_for_custom(&mut self, enabled: bool) {
        if self.use_falloff_for_custom != enabled {
            self.use_falloff_for_custom = enabled;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last generated field, if any.
    pub fn samples(&self) -> Option<&BrushSamples> {
        self.cache.as_ref()
    }

    /// The single regeneration step. Regenerates when dirty, when the
    /// resolution differs from the cached field, or when the effective
    /// inversion changed; otherwise returns the cached field.
    pub fn update(&mut self, resolution: usize, invert_globally: bool) -> &BrushSamples {
        let invert = invert_globally || self.shape.invert;
        let fresh = match self.cache.take() {
            Some(cached)
                if !self.dirty && cached.size() == resolution && self.cached_invert == invert =>
            {
                cached
            }
            _ => {
                log::trace!("brush `{}`: regenerating {resolution}x{resolution}", self.id);
                self.generate(resolution, invert)
            }
        };
        self.dirty = false;
        self.cached_invert = invert;
        self.cache.insert(fresh)
    }

    /// Generate a field without touching the cache.
    pub fn generate(&self, resolution: usize, invert: bool) -> BrushSamples {
        let mut samples = match &self.source {
            BrushSource::Procedural => generate_procedural(&self.shape, resolution),
            BrushSource::Image(image) => self.custom(image.generate(resolution), resolution),
            BrushSource::Noise(noise) => self.custom(noise.generate(resolution), resolution),
        };

        if invert {
            samples.map_in_place(|w| 1.0 - w);
        }
        samples
    }

    fn custom(&self, raw: Vec<f32>, resolution: usize) -> BrushSamples {
        let mut samples = BrushSamples {
            size: resolution,
            data: raw,
        };
        if self.use_falloff_for_custom {
            let falloff = generate_procedural(&self.shape, resolution);
            samples
                .data
                .par_iter_mut()
                .zip(falloff.data.par_iter())
                .for_each(|(w, f)| *w *= f);
        }
        samples.map_in_place(|w| w.clamp(0.0, 1.0));
        samples
    }
}
