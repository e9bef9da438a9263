//! Whole-grid operations outside of strokes.
//!
//! Each operation computes into a scratch buffer and commits only when it
//! finishes, so a cancelled run leaves the grid untouched. Cancellation is
//! cooperative: the [`CancelToken`] is checked once per row.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use image::{DynamicImage, ImageBuffer, Luma};
use rayon::prelude::*;

use crate::error::{Result, SculptError};
use crate::terrain_grid::{box_average, SampleLayer, TerrainGrid};

/// Requests cancellation of the operation holding the paired token.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // A full channel already carries a pending cancel
        let _ = self.tx.try_send(());
    }
}

#[derive(Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
    /// Sticky once a cancel was received
    cancelled: AtomicBool,
}

impl CancelToken {
    /// Token that is never cancelled.
    pub fn never() -> Self {
        let (_handle, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) => {
                self.cancelled.store(true, Ordering::Relaxed);
                true
            }
            // Dropping the handle without cancelling is not a cancel
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = bounded(1);
    (
        CancelHandle { tx },
        CancelToken {
            rx,
            cancelled: AtomicBool::new(false),
        },
    )
}

/// Box-smooth the whole height grid `iterations` times.
pub fn smooth_all(
    grid: &mut TerrainGrid,
    iterations: usize,
    radius: usize,
    token: &CancelToken,
) -> Result<()> {
    let size = grid.size(SampleLayer::Height);
    let mut current = grid.heights().to_vec();
    let mut next = vec![0.0; current.len()];
    log::debug!("smoothing {}x{} heights, {iterations} passes", size[0], size[1]);

    for _ in 0..iterations {
        next.par_chunks_mut(size[0])
            .enumerate()
            .try_for_each(|(y, row)| {
                if token.is_cancelled() {
                    return Err(SculptError::Cancelled);
                }
                for (x, out) in row.iter_mut().enumerate() {
                    *out = box_average(&current, size, x, y, radius);
                }
                Ok(())
            })?;
        std::mem::swap(&mut current, &mut next);
    }

    grid.replace_heights(current);
    log::debug!("smoothing finished");
    Ok(())
}

/// Resample a greyscale image onto the height grid. The image's top row is
/// the grid's far (maximum Z) edge.
pub fn import_heightmap(grid: &mut TerrainGrid, image: &DynamicImage, token: &CancelToken) -> Result<()> {
    let luma = image.to_luma32f();
    let (iw, ih) = luma.dimensions();
    if iw == 0 || ih == 0 {
        return Err(SculptError::InvalidLayout("heightmap image is empty".to_string()));
    }
    let [w, h] = grid.size(SampleLayer::Height);
    let texel = |x: u32, y: u32| luma.get_pixel(x.min(iw - 1), y.min(ih - 1)).0[0];

    let mut heights = vec![0.0; w * h];
    heights
        .par_chunks_mut(w)
        .enumerate()
        .try_for_each(|(gy, row)| {
            if token.is_cancelled() {
                return Err(SculptError::Cancelled);
            }
            let v = (h - 1 - gy) as f32 / (h - 1) as f32 * (ih - 1) as f32;
            let y0 = v.floor() as u32;
            let fy = v - y0 as f32;
            for (gx, out) in row.iter_mut().enumerate() {
                let u = gx as f32 / (w - 1) as f32 * (iw - 1) as f32;
                let x0 = u.floor() as u32;
                let fx = u - x0 as f32;
                let top = texel(x0, y0) * (1.0 - fx) + texel(x0 + 1, y0) * fx;
                let bottom = texel(x0, y0 + 1) * (1.0 - fx) + texel(x0 + 1, y0 + 1) * fx;
                *out = (top * (1.0 - fy) + bottom * fy).clamp(0.0, 1.0);
            }
            Ok(())
        })?;

    grid.replace_heights(heights);
    log::debug!("imported {iw}x{ih} heightmap onto {w}x{h} grid");
    Ok(())
}

/// 16-bit greyscale export of the stitched heights, top row = maximum Z.
pub fn export_heightmap(grid: &TerrainGrid) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    let [w, h] = grid.size(SampleLayer::Height);
    ImageBuffer::from_fn(w as u32, h as u32, |x, y| {
        let value = grid.height(x as usize, h - 1 - y as usize);
        Luma([(value * u16::MAX as f32).round() as u16])
    })
}
