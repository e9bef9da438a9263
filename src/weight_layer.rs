//! Per-sample texture weight operations.
//!
//! Each weight sample holds one value per texture channel. After every
//! operation the channels of a sample sum to 1.

/// Default epsilon below which a channel sum is treated as zero.
pub const DEFAULT_WEIGHT_EPSILON: f32 = 1e-5;

/// Scale `weights` so they sum to 1. When the sum is below `epsilon`, fall
/// back to channel 0 = 1 and all others 0. Returns `true` if the fallback
/// was taken.
pub fn normalize(weights: &mut [f32], epsilon: f32) -> bool {
    let sum: f32 = weights.iter().sum();
    if sum < epsilon {
        reset(weights);
        return true;
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }
    false
}

/// Full weight on channel 0.
pub fn reset(weights: &mut [f32]) {
    for (i, w) in weights.iter_mut().enumerate() {
        *w = if i == 0 { 1.0 } else { 0.0 };
    }
}

/// Scale every channel except `channel` so together they sum to `remainder`,
/// keeping their proportions.
fn redistribute_others(weights: &mut [f32], channel: usize, remainder: f32, epsilon: f32) {
    let others: f32 = weights
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != channel)
        .map(|(_, w)| *w)
        .sum();

    for (i, w) in weights.iter_mut().enumerate() {
        if i == channel {
            continue;
        }
        *w = if others > epsilon {
            *w * remainder / others
        } else {
            0.0
        };
    }
}

/// Push `channel` toward 1 by `amount` (0..1), shrinking the other channels
/// proportionally. Returns `true` if the zero-sum fallback was taken.
pub fn paint_toward(weights: &mut [f32], channel: usize, amount: f32, epsilon: f32) -> bool {
    if channel >= weights.len() {
        return false;
    }
    let amount = amount.clamp(0.0, 1.0);
    let current = weights[channel].clamp(0.0, 1.0);
    let target = current + (1.0 - current) * amount;
    weights[channel] = target;
    redistribute_others(weights, channel, 1.0 - target, epsilon);
    normalize(weights, epsilon)
}

/// Pull `channel` toward 0 by `amount`, growing the other channels
/// proportionally. A sample with no other channel to grow keeps its weight.
pub fn erase_toward(weights: &mut [f32], channel: usize, amount: f32, epsilon: f32) -> bool {
    if channel >= weights.len() {
        return false;
    }
    let amount = amount.clamp(0.0, 1.0);
    let current = weights[channel].clamp(0.0, 1.0);
    let target = current * (1.0 - amount);
    weights[channel] = target;
    redistribute_others(weights, channel, 1.0 - target, epsilon);
    normalize(weights, epsilon)
}

/// Index of the heaviest channel (first one on ties).
pub fn dominant_channel(weights: &[f32]) -> usize {
    weights
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &w)| if w > best.1 { (i, w) } else { best })
        .0
}
