//! Robbins-Monro adaptation of per-dimension proposal scales.

/// Target acceptance rate for blocks scanned one dimension at a time as part
/// of a multi-dimensional sweep.
pub const TARGET_MULTIVARIATE: f64 = 0.234;
/// Target acceptance rate for one-dimensional blocks.
pub const TARGET_UNIVARIATE: f64 = 0.44;

const INITIAL_SCALE: f64 = 0.1;
/// Adaptation starts once early acceptance behavior has stabilized.
const WARMUP_ITERATIONS: usize = 20;
const LN_SCALE_MIN: f64 = -13.0;
const LN_SCALE_MAX: f64 = 6.0;

/// Per-dimension proposal scales driven toward a target acceptance rate.
///
/// After each accept/reject outcome the log-scale moves by
/// `(accepted - target) / sqrt(it + 1)`, clipped to a fixed positive band, so
/// adaptation diminishes over the chain and the scales stay strictly
/// positive. Zero-dimension blocks hold no state and every call is a no-op.
#[derive(Debug, Clone)]
pub struct ScaleAdapter {
    scales: Vec<f64>,
    target: f64,
}

impl ScaleAdapter {
    /// Adapter with the conventional target for the given block dimension.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        let target = if dim == 1 {
            TARGET_UNIVARIATE
        } else {
            TARGET_MULTIVARIATE
        };
        Self::with_target(dim, target)
    }

    #[must_use]
    pub fn with_target(dim: usize, target: f64) -> Self {
        Self {
            scales: vec![INITIAL_SCALE; dim],
            target,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    #[must_use]
    pub fn scale(&self, dim: usize) -> f64 {
        self.scales[dim]
    }

    /// Fold one accept/reject outcome into the scale for `dim`.
    pub fn record(&mut self, dim: usize, accepted: bool, iteration: usize) {
        if iteration < WARMUP_ITERATIONS {
            return;
        }
        let step = 1.0 / usize_to_f64(iteration + 1).sqrt();
        let outcome = if accepted { 1.0 } else { 0.0 };
        let ln_scale = (outcome - self.target).mul_add(step, self.scales[dim].ln());
        self.scales[dim] = ln_scale.clamp(LN_SCALE_MIN, LN_SCALE_MAX).exp();
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_grow_on_acceptance_and_shrink_on_rejection() {
        let mut adapter = ScaleAdapter::new(2);
        let before = adapter.scale(0);
        adapter.record(0, true, 100);
        assert!(adapter.scale(0) > before);

        let before = adapter.scale(1);
        adapter.record(1, false, 100);
        assert!(adapter.scale(1) < before);
    }

    #[test]
    fn warmup_iterations_leave_scales_untouched() {
        let mut adapter = ScaleAdapter::new(1);
        let before = adapter.scale(0);
        adapter.record(0, true, 0);
        adapter.record(0, false, 19);
        assert!((adapter.scale(0) - before).abs() < 1.0e-15);
    }

    #[test]
    fn scales_stay_positive_under_sustained_rejection() {
        let mut adapter = ScaleAdapter::new(1);
        for it in 20..20_000 {
            adapter.record(0, false, it);
        }
        assert!(adapter.scale(0) > 0.0);
        assert!(adapter.scale(0) >= LN_SCALE_MIN.exp());
    }

    #[test]
    fn adaptation_step_diminishes_with_iteration() {
        let mut early = ScaleAdapter::new(1);
        let mut late = ScaleAdapter::new(1);
        early.record(0, true, 25);
        late.record(0, true, 2_500);
        assert!(early.scale(0) > late.scale(0));
    }

    #[test]
    fn zero_dimension_block_is_skipped() {
        let adapter = ScaleAdapter::new(0);
        assert!(adapter.is_empty());
    }

    #[test]
    fn one_dimensional_blocks_use_the_higher_target() {
        let univariate = ScaleAdapter::new(1);
        let multivariate = ScaleAdapter::new(3);
        assert!((univariate.target - TARGET_UNIVARIATE).abs() < 1.0e-15);
        assert!((multivariate.target - TARGET_MULTIVARIATE).abs() < 1.0e-15);
    }
}
