//! Parameter curves for building looping per-frame effect sequences.

use crate::{effects::chain::EffectChain, foundation::error::BendResult};

/// `0 -> 1 -> 0` over `proportion` in `[0, 1]`, smooth at both ends.
///
/// Sampling `i / n` for `i in 0..n` gives a sequence that loops without a seam.
pub fn sin_up_down(proportion: f64) -> f64 {
    1.0 - ((proportion * 2.0 * std::f64::consts::PI).cos() + 1.0) / 2.0
}

/// Build `n` chains, calling `f(i, i / n)` for each frame.
pub fn sweep<F>(n: usize, mut f: F) -> BendResult<Vec<EffectChain>>
where
    F: FnMut(usize, f64) -> BendResult<EffectChain>,
{
    (0..n).map(|i| f(i, i as f64 / n as f64)).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/curve.rs"]
mod tests;
