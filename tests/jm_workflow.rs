use faer::Mat;
use joint_models::{
    BlockPrior, JmControl, JmInitialValues, JmPriors, JointModelInput, fit_joint_model,
};
use joint_models::models::jm::covariance::{
    cholesky_upper, corr_chol_from_free, gram_upper, reconstruct_covariance,
};

fn idx(i: usize) -> f64 {
    f64::from(u32::try_from(i).unwrap_or(u32::MAX))
}

/// Five subjects, six quadrature rows each, one longitudinal outcome, no
/// baseline covariates, no interval censoring.
fn five_subject_input() -> JointModelInput {
    let n_quad = 30;
    let per_subject = 6;
    JointModelInput {
        which_event: vec![2],
        which_right: vec![1, 3, 4, 5],
        which_left: vec![],
        which_interval: vec![],
        w0_quad: Mat::from_fn(n_quad, 2, |row, col| {
            if col == 0 {
                1.0
            } else {
                0.2 * idx(row % per_subject)
            }
        }),
        w0_event: Mat::from_fn(5, 2, |row, col| if col == 0 { 1.0 } else { 0.25 * idx(row + 1) }),
        w0_quad2: Mat::<f64>::zeros(0, 2),
        w_quad: Mat::<f64>::zeros(n_quad, 0),
        w_event: Mat::<f64>::zeros(5, 0),
        w_quad2: Mat::<f64>::zeros(0, 0),
        w_bar: Mat::<f64>::zeros(1, 0),
        wlong_quad: vec![Mat::from_fn(n_quad, 1, |row, _col| {
            0.1 * idx(row % per_subject)
        })],
        wlong_event: vec![Mat::from_fn(5, 1, |row, _col| 0.1 * idx(row + 1))],
        wlong_quad2: vec![],
        id_quad: (0..n_quad).map(|row| row / per_subject + 1).collect(),
        log_pwk: vec![(1.0 / idx(per_subject)).ln(); n_quad],
        log_pwk2: vec![],
        any_gammas: false,
        fun_forms: vec![vec![1]],
    }
}

/// Variant with baseline covariates plus left- and interval-censored records.
fn censoring_rich_input() -> JointModelInput {
    let mut input = five_subject_input();
    input.which_event = vec![2];
    input.which_right = vec![1];
    input.which_left = vec![4];
    input.which_interval = vec![3, 5];
    input.any_gammas = true;
    input.w_quad = Mat::from_fn(30, 1, |_row, _col| 0.5);
    input.w_event = Mat::from_fn(5, 1, |_row, _col| 0.5);
    input.w_quad2 = Mat::from_fn(30, 1, |_row, _col| 0.5);
    input.w_bar = Mat::from_fn(1, 1, |_row, _col| 0.7);
    input.w0_quad2 = Mat::from_fn(30, 2, |row, col| {
        if col == 0 { 1.0 } else { 0.15 * idx(row % 6) }
    });
    input.wlong_quad2 = vec![Mat::from_fn(30, 1, |row, _col| 0.05 * idx(row % 6))];
    input.log_pwk2 = vec![(1.0 / 6.0f64).ln(); 30];
    input
}

fn initials(n_gammas: usize) -> JmInitialValues {
    JmInitialValues {
        bs_gammas: vec![0.2, -0.1],
        gammas: vec![0.1; n_gammas],
        alphas: vec![0.3],
        tau_bs_gammas: 1.0,
        b: vec![Mat::from_fn(5, 2, |row, col| {
            0.2 * idx(row + 1) * if col == 0 { 1.0 } else { -0.4 }
        })],
        d: Mat::from_fn(2, 2, |row, col| match (row, col) {
            (0, 0) => 1.2,
            (1, 1) => 0.9,
            _ => -0.3,
        }),
    }
}

fn priors(n_gammas: usize) -> JmPriors {
    JmPriors {
        bs_gammas: BlockPrior::standard(2),
        gammas: BlockPrior::standard(n_gammas),
        alphas: BlockPrior::standard(1),
        a_tau_bs_gammas: 1.0,
        b_tau_bs_gammas: 1.0,
        rank_tau_bs_gammas: 2.0,
        sds_df: 3.0,
        sds_sigma: 10.0,
        lkj_eta: 2.0,
    }
}

fn assert_matrices_identical(a: &Mat<f64>, b: &Mat<f64>) {
    assert_eq!(a.nrows(), b.nrows());
    assert_eq!(a.ncols(), b.ncols());
    for row in 0..a.nrows() {
        for col in 0..a.ncols() {
            assert_eq!(a[(row, col)].to_bits(), b[(row, col)].to_bits());
        }
    }
}

#[test]
fn fixed_seed_runs_are_reproducible_end_to_end() {
    let input = five_subject_input();
    let control = JmControl {
        n_iter: 100,
        n_burnin: 50,
        seed: 2_024,
        ..JmControl::default()
    };

    let (_m1, _r1, first) =
        fit_joint_model(&input, &initials(0), &priors(0), control).expect("fit should run");
    let (_m2, _r2, second) =
        fit_joint_model(&input, &initials(0), &priors(0), control).expect("fit should run");

    assert_eq!(first.draws.bs_gammas.nrows(), 50);
    assert_matrices_identical(&first.draws.bs_gammas, &second.draws.bs_gammas);
    assert_matrices_identical(&first.draws.tau_bs_gammas, &second.draws.tau_bs_gammas);
    assert_matrices_identical(&first.draws.alphas, &second.draws.alphas);
    assert_matrices_identical(&first.draws.sds, &second.draws.sds);
    assert_matrices_identical(&first.draws.corr_chol, &second.draws.corr_chol);
    assert_matrices_identical(&first.acceptance.bs_gammas, &second.acceptance.bs_gammas);
}

#[test]
fn retained_draws_are_the_trailing_slice_of_the_full_chain() {
    let input = five_subject_input();
    let full_control = JmControl {
        n_iter: 100,
        n_burnin: 0,
        seed: 7,
        ..JmControl::default()
    };
    let trimmed_control = JmControl {
        n_iter: 100,
        n_burnin: 50,
        seed: 7,
        ..JmControl::default()
    };

    let (_m1, _r1, full) =
        fit_joint_model(&input, &initials(0), &priors(0), full_control).expect("fit should run");
    let (_m2, _r2, trimmed) = fit_joint_model(&input, &initials(0), &priors(0), trimmed_control)
        .expect("fit should run");

    assert_eq!(full.draws.bs_gammas.nrows(), 100);
    assert_eq!(trimmed.draws.bs_gammas.nrows(), 50);
    for row in 0..50 {
        for col in 0..2 {
            assert_eq!(
                full.draws.bs_gammas[(row + 50, col)].to_bits(),
                trimmed.draws.bs_gammas[(row, col)].to_bits()
            );
        }
        assert_eq!(
            full.draws.tau_bs_gammas[(row + 50, 0)].to_bits(),
            trimmed.draws.tau_bs_gammas[(row, 0)].to_bits()
        );
    }
}

#[test]
fn covariance_draws_reconstruct_to_valid_correlation_matrices() {
    let input = five_subject_input();
    let control = JmControl {
        n_iter: 120,
        n_burnin: 40,
        seed: 11,
        ..JmControl::default()
    };
    let (_model, _report, samples) =
        fit_joint_model(&input, &initials(0), &priors(0), control).expect("fit should run");

    for row in 0..samples.draws.sds.nrows() {
        let sds: Vec<f64> = (0..samples.draws.sds.ncols())
            .map(|col| samples.draws.sds[(row, col)])
            .collect();
        assert!(sds.iter().all(|value| *value > 0.0));

        let free: Vec<f64> = (0..samples.draws.corr_chol.ncols())
            .map(|col| samples.draws.corr_chol[(row, col)])
            .collect();
        let l = corr_chol_from_free(&free, sds.len()).expect("free entries stay in unit ball");

        let correlation = gram_upper(&l);
        for diag in 0..correlation.ncols() {
            assert!((correlation[(diag, diag)] - 1.0).abs() < 1.0e-10);
        }

        let covariance = reconstruct_covariance(&sds, &l);
        for i in 0..covariance.nrows() {
            for j in 0..covariance.ncols() {
                assert!((covariance[(i, j)] - covariance[(j, i)]).abs() < 1.0e-10);
            }
        }
        assert!(cholesky_upper(&covariance).is_some());
    }
}

#[test]
fn all_censoring_schemes_run_together() {
    let input = censoring_rich_input();
    let control = JmControl {
        n_iter: 80,
        n_burnin: 20,
        seed: 3,
        ..JmControl::default()
    };
    let (model, report, samples) =
        fit_joint_model(&input, &initials(1), &priors(1), control).expect("fit should run");

    assert_eq!(model.n_gammas, 1);
    assert_eq!(report.diagnostics.retained_draws, 60);
    let gammas = samples.draws.gammas.as_ref().expect("gammas are modeled");
    let w_bar = samples
        .draws
        .w_bar_gammas
        .as_ref()
        .expect("averaged effect is traced");
    for row in 0..gammas.nrows() {
        assert!(gammas[(row, 0)].is_finite());
        // The averaged-effect trace is the averaging row applied to the
        // gamma draw of the same iteration.
        assert!((w_bar[(row, 0)] - 0.7 * gammas[(row, 0)]).abs() < 1.0e-12);
    }
    for row in 0..samples.draws.bs_gammas.nrows() {
        for col in 0..samples.draws.bs_gammas.ncols() {
            assert!(samples.draws.bs_gammas[(row, col)].is_finite());
        }
    }
}

#[test]
fn mala_and_random_walk_sample_the_same_model() {
    let input = five_subject_input();
    let rw_control = JmControl {
        n_iter: 60,
        n_burnin: 20,
        seed: 5,
        ..JmControl::default()
    };
    let mala_control = JmControl {
        mala: true,
        ..rw_control
    };

    let (_m1, rw_report, _s1) =
        fit_joint_model(&input, &initials(0), &priors(0), rw_control).expect("fit should run");
    let (_m2, mala_report, s2) =
        fit_joint_model(&input, &initials(0), &priors(0), mala_control).expect("fit should run");

    assert_eq!(rw_report.diagnostics.retained_draws, 40);
    assert_eq!(mala_report.diagnostics.retained_draws, 40);
    for row in 0..s2.draws.bs_gammas.nrows() {
        for col in 0..s2.draws.bs_gammas.ncols() {
            assert!(s2.draws.bs_gammas[(row, col)].is_finite());
        }
    }
}
