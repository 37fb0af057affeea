//! Posterior draw storage and summaries.

use faer::Mat;
use num_traits::ToPrimitive;

/// Retained posterior draws, one matrix per parameter block with
/// `n_iter - n_burnin` rows each.
///
/// `gammas` and `w_bar_gammas` are absent when no baseline covariates are
/// modeled.
#[derive(Debug, Clone)]
pub struct JmDraws {
    pub bs_gammas: Mat<f64>,
    pub tau_bs_gammas: Mat<f64>,
    pub gammas: Option<Mat<f64>>,
    pub w_bar_gammas: Option<Mat<f64>>,
    pub alphas: Mat<f64>,
    pub sds: Mat<f64>,
    /// Strictly-upper free entries of the correlation Cholesky factor, in
    /// column-major order.
    pub corr_chol: Mat<f64>,
}

/// Acceptance indicators over the retained range, one column per dimension.
#[derive(Debug, Clone)]
pub struct JmAcceptance {
    pub bs_gammas: Mat<f64>,
    pub gammas: Option<Mat<f64>>,
    pub alphas: Mat<f64>,
    pub sds: Mat<f64>,
    pub corr_chol: Mat<f64>,
}

/// Output bundle of one chain: retained draws and acceptance indicators.
#[derive(Debug, Clone)]
pub struct JmSamples {
    pub draws: JmDraws,
    pub acceptance: JmAcceptance,
}

/// Scalar posterior summary statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

/// Posterior summary for every stored parameter block.
#[derive(Debug, Clone, Default)]
pub struct JmPosteriorSummary {
    pub bs_gammas: Vec<ParameterSummary>,
    pub tau_bs_gammas: Option<ParameterSummary>,
    pub gammas: Option<Vec<ParameterSummary>>,
    pub alphas: Vec<ParameterSummary>,
    pub sds: Vec<ParameterSummary>,
    pub corr_chol: Vec<ParameterSummary>,
    pub draw_count: usize,
}

/// Column-wise summaries of a draw matrix.
#[must_use]
pub fn summarize_columns(draws: &Mat<f64>) -> Vec<ParameterSummary> {
    (0..draws.ncols())
        .map(|col| {
            let values: Vec<f64> = (0..draws.nrows()).map(|row| draws[(row, col)]).collect();
            summarize_scalar(&values)
        })
        .collect()
}

/// Compute posterior summaries for all parameter blocks.
#[must_use]
pub fn summarize_draws(draws: &JmDraws) -> JmPosteriorSummary {
    JmPosteriorSummary {
        bs_gammas: summarize_columns(&draws.bs_gammas),
        tau_bs_gammas: summarize_columns(&draws.tau_bs_gammas).first().copied(),
        gammas: draws.gammas.as_ref().map(summarize_columns),
        alphas: summarize_columns(&draws.alphas),
        sds: summarize_columns(&draws.sds),
        corr_chol: summarize_columns(&draws.corr_chol),
        draw_count: draws.bs_gammas.nrows(),
    }
}

#[must_use]
fn summarize_scalar(values: &[f64]) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n.max(1.0);

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ParameterSummary {
        mean,
        std_dev: variance.sqrt(),
        q025: percentile(&sorted, 0.025),
        q50: percentile(&sorted, 0.5),
        q975: percentile(&sorted, 0.975),
    }
}

#[must_use]
fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
