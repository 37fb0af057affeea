//! Joint survival/longitudinal model input containers.
//!
//! The time-to-event submodel is evaluated on three row grids: the
//! quadrature grid used to integrate the hazard over each subject's risk set
//! (`*_quad`), the event-time grid with one row per subject (`*_event`), and
//! a second quadrature grid for the right endpoint of interval-censored
//! records (`*_quad2`). Index sets arrive 1-based from the host environment
//! and are converted once during preparation.

use faer::Mat;
use thiserror::Error;

use crate::models::matrix_ops::cbind_columns;
use crate::utils::matrix_is_finite;

/// Errors returned when validating joint model inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JointInputError {
    #[error("quadrature grid must be non-empty")]
    EmptyQuadratureGrid,
    #[error("{name} length ({len}) must match the quadrature grid length ({expected})")]
    QuadratureLengthMismatch {
        name: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("{name} rows ({rows}) must match the quadrature grid length ({expected})")]
    QuadratureRowMismatch {
        name: &'static str,
        rows: usize,
        expected: usize,
    },
    #[error("{name} rows ({rows}) must match the subject count ({expected})")]
    SubjectRowMismatch {
        name: &'static str,
        rows: usize,
        expected: usize,
    },
    #[error("{name} contains non-finite values")]
    NonFinite { name: &'static str },
    #[error("{name} holds 1-based indices and must not contain 0")]
    ZeroIndex { name: &'static str },
    #[error("{name} contains subject index {index} outside 1..={subjects}")]
    IndexOutOfRange {
        name: &'static str,
        index: usize,
        subjects: usize,
    },
    #[error("quadrature subject index must form non-decreasing contiguous blocks")]
    UnsortedQuadratureIndex,
    #[error("{name} column count ({cols}) must match its quadrature-grid counterpart ({expected})")]
    ColumnMismatch {
        name: &'static str,
        cols: usize,
        expected: usize,
    },
    #[error("averaging row w_bar must be 1 x {expected}, found {rows} x {cols}")]
    AveragingRowMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
    },
    #[error("at least one longitudinal design block is required")]
    EmptyLongCollection,
    #[error("long design collections must have the same number of outcomes in every context")]
    RaggedLongCollection,
    #[error("functional-form index {index} exceeds the long design width ({width})")]
    FunFormOutOfRange { index: usize, width: usize },
}

/// Numeric input bundle for one joint model fit.
///
/// All matrices are immutable once loaded; the sampler only reads them.
/// `which_*` and `id_quad` are 1-based as supplied by the host environment.
#[derive(Debug, Clone)]
pub struct JointModelInput {
    /// Subjects with an exactly observed event time.
    pub which_event: Vec<usize>,
    /// Right-censored subjects.
    pub which_right: Vec<usize>,
    /// Left-censored subjects.
    pub which_left: Vec<usize>,
    /// Interval-censored subjects.
    pub which_interval: Vec<usize>,
    /// Baseline-hazard basis on the risk-set quadrature grid.
    pub w0_quad: Mat<f64>,
    /// Baseline-hazard basis at the event times (one row per subject).
    pub w0_event: Mat<f64>,
    /// Baseline-hazard basis on the interval right-endpoint grid.
    pub w0_quad2: Mat<f64>,
    /// Baseline covariates on the quadrature grid (may have zero columns).
    pub w_quad: Mat<f64>,
    pub w_event: Mat<f64>,
    pub w_quad2: Mat<f64>,
    /// Averaging row used to trace the covariate effect at reference values.
    pub w_bar: Mat<f64>,
    /// Longitudinal-predictor designs, one matrix per outcome, per context.
    pub wlong_quad: Vec<Mat<f64>>,
    pub wlong_event: Vec<Mat<f64>>,
    pub wlong_quad2: Vec<Mat<f64>>,
    /// Subject index per quadrature row, 1-based, contiguous per subject.
    pub id_quad: Vec<usize>,
    /// Log Gauss-Kronrod weights aligned with the quadrature grid.
    pub log_pwk: Vec<f64>,
    /// Log weights for the interval right-endpoint grid.
    pub log_pwk2: Vec<f64>,
    /// Whether baseline covariate effects are modeled at all.
    pub any_gammas: bool,
    /// Per-outcome 1-based column indices into the combined long design.
    pub fun_forms: Vec<Vec<usize>>,
}

/// Subject-to-quadrature-rows lookup derived from the sorted subject index.
#[derive(Debug, Clone)]
pub struct GroupIndex {
    starts: Vec<usize>,
}

impl GroupIndex {
    /// Build the lookup from a 0-based, non-decreasing, gap-free subject
    /// index.
    fn from_sorted(ids: &[usize]) -> Result<Self, JointInputError> {
        let Some(&first) = ids.first() else {
            return Err(JointInputError::EmptyQuadratureGrid);
        };
        if first != 0 {
            return Err(JointInputError::UnsortedQuadratureIndex);
        }

        let mut starts = vec![0];
        for (row, pair) in ids.windows(2).enumerate() {
            if pair[1] == pair[0] + 1 {
                starts.push(row + 1);
            } else if pair[1] != pair[0] {
                return Err(JointInputError::UnsortedQuadratureIndex);
            }
        }
        starts.push(ids.len());
        Ok(Self { starts })
    }

    #[must_use]
    pub fn n_groups(&self) -> usize {
        self.starts.len() - 1
    }

    /// Contiguous row range belonging to one subject.
    #[must_use]
    pub fn rows(&self, group: usize) -> std::ops::Range<usize> {
        self.starts[group]..self.starts[group + 1]
    }

    /// Per-subject sums of a quadrature-row-aligned vector.
    #[must_use]
    pub fn sum_by_group(&self, values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(values.len(), *self.starts.last().unwrap_or(&0));
        (0..self.n_groups())
            .map(|group| self.rows(group).map(|row| values[row]).sum())
            .collect()
    }
}

/// Validated, 0-based view of a [`JointModelInput`] with the per-outcome long
/// designs column-concatenated and the subject lookup built.
#[derive(Debug, Clone)]
pub struct PreparedJointInput<'a> {
    pub input: &'a JointModelInput,
    pub groups: GroupIndex,
    pub n_subjects: usize,
    pub which_event: Vec<usize>,
    pub which_right: Vec<usize>,
    pub which_left: Vec<usize>,
    pub which_interval: Vec<usize>,
    /// Event and right-censored subjects, the set sharing the `-H` term.
    pub which_right_event: Vec<usize>,
    pub wlong_quad: Mat<f64>,
    pub wlong_event: Mat<f64>,
    pub wlong_quad2: Mat<f64>,
    pub fun_forms: Vec<Vec<usize>>,
    pub any_event: bool,
    pub any_interval: bool,
}

impl JointModelInput {
    /// Validate the bundle and build the prepared view.
    ///
    /// # Errors
    ///
    /// Returns `JointInputError` on any shape disagreement, non-finite value,
    /// or malformed index set. Nothing is truncated or padded.
    pub fn prepare(&self) -> Result<PreparedJointInput<'_>, JointInputError> {
        let n_quad = self.id_quad.len();
        if n_quad == 0 {
            return Err(JointInputError::EmptyQuadratureGrid);
        }
        if self.log_pwk.len() != n_quad {
            return Err(JointInputError::QuadratureLengthMismatch {
                name: "log_pwk",
                len: self.log_pwk.len(),
                expected: n_quad,
            });
        }
        if self.log_pwk.iter().any(|w| !w.is_finite()) {
            return Err(JointInputError::NonFinite { name: "log_pwk" });
        }

        let id_quad = to_zero_based(&self.id_quad, "id_quad")?;
        let groups = GroupIndex::from_sorted(&id_quad)?;
        let n_subjects = groups.n_groups();

        let which_event = index_set(&self.which_event, "which_event", n_subjects)?;
        let which_right = index_set(&self.which_right, "which_right", n_subjects)?;
        let which_left = index_set(&self.which_left, "which_left", n_subjects)?;
        let which_interval = index_set(&self.which_interval, "which_interval", n_subjects)?;
        let mut which_right_event = which_event.clone();
        which_right_event.extend_from_slice(&which_right);

        let any_event = !which_event.is_empty();
        let any_interval = !which_interval.is_empty();

        check_quad_matrix(&self.w0_quad, "w0_quad", n_quad)?;
        check_quad_matrix(&self.w_quad, "w_quad", n_quad)?;
        check_subject_matrix(&self.w0_event, "w0_event", n_subjects)?;
        check_subject_matrix(&self.w_event, "w_event", n_subjects)?;
        check_columns(self.w0_event.ncols(), self.w0_quad.ncols(), "w0_event")?;
        check_columns(self.w_event.ncols(), self.w_quad.ncols(), "w_event")?;
        if any_interval {
            if self.log_pwk2.len() != n_quad {
                return Err(JointInputError::QuadratureLengthMismatch {
                    name: "log_pwk2",
                    len: self.log_pwk2.len(),
                    expected: n_quad,
                });
            }
            if self.log_pwk2.iter().any(|w| !w.is_finite()) {
                return Err(JointInputError::NonFinite { name: "log_pwk2" });
            }
            check_quad_matrix(&self.w0_quad2, "w0_quad2", n_quad)?;
            check_quad_matrix(&self.w_quad2, "w_quad2", n_quad)?;
            check_columns(self.w0_quad2.ncols(), self.w0_quad.ncols(), "w0_quad2")?;
            check_columns(self.w_quad2.ncols(), self.w_quad.ncols(), "w_quad2")?;
        }

        if self.w_bar.nrows() != 1 || self.w_bar.ncols() != self.w_quad.ncols() {
            return Err(JointInputError::AveragingRowMismatch {
                rows: self.w_bar.nrows(),
                cols: self.w_bar.ncols(),
                expected: self.w_quad.ncols(),
            });
        }
        if !matrix_is_finite(&self.w_bar) {
            return Err(JointInputError::NonFinite { name: "w_bar" });
        }

        if self.wlong_quad.is_empty() {
            return Err(JointInputError::EmptyLongCollection);
        }
        if self.wlong_event.len() != self.wlong_quad.len()
            || (any_interval && self.wlong_quad2.len() != self.wlong_quad.len())
        {
            return Err(JointInputError::RaggedLongCollection);
        }
        for block in &self.wlong_quad {
            check_quad_matrix(block, "wlong_quad", n_quad)?;
        }
        for block in &self.wlong_event {
            check_subject_matrix(block, "wlong_event", n_subjects)?;
        }
        let wlong_quad = cbind_columns(&self.wlong_quad);
        let wlong_event = cbind_columns(&self.wlong_event);
        check_columns(wlong_event.ncols(), wlong_quad.ncols(), "wlong_event")?;
        let wlong_quad2 = if any_interval {
            for block in &self.wlong_quad2 {
                check_quad_matrix(block, "wlong_quad2", n_quad)?;
            }
            let combined = cbind_columns(&self.wlong_quad2);
            check_columns(combined.ncols(), wlong_quad.ncols(), "wlong_quad2")?;
            combined
        } else {
            Mat::<f64>::zeros(0, wlong_quad.ncols())
        };

        let mut fun_forms = Vec::with_capacity(self.fun_forms.len());
        for outcome_forms in &self.fun_forms {
            let converted = to_zero_based(outcome_forms, "fun_forms")?;
            for &index in &converted {
                if index >= wlong_quad.ncols() {
                    return Err(JointInputError::FunFormOutOfRange {
                        index: index + 1,
                        width: wlong_quad.ncols(),
                    });
                }
            }
            fun_forms.push(converted);
        }

        Ok(PreparedJointInput {
            input: self,
            groups,
            n_subjects,
            which_event,
            which_right,
            which_left,
            which_interval,
            which_right_event,
            wlong_quad,
            wlong_event,
            wlong_quad2,
            fun_forms,
            any_event,
            any_interval,
        })
    }
}

fn to_zero_based(indices: &[usize], name: &'static str) -> Result<Vec<usize>, JointInputError> {
    indices
        .iter()
        .map(|&index| {
            if index == 0 {
                Err(JointInputError::ZeroIndex { name })
            } else {
                Ok(index - 1)
            }
        })
        .collect()
}

fn index_set(
    indices: &[usize],
    name: &'static str,
    n_subjects: usize,
) -> Result<Vec<usize>, JointInputError> {
    let converted = to_zero_based(indices, name)?;
    for &index in &converted {
        if index >= n_subjects {
            return Err(JointInputError::IndexOutOfRange {
                name,
                index: index + 1,
                subjects: n_subjects,
            });
        }
    }
    Ok(converted)
}

fn check_quad_matrix(
    matrix: &Mat<f64>,
    name: &'static str,
    n_quad: usize,
) -> Result<(), JointInputError> {
    if matrix.nrows() != n_quad {
        return Err(JointInputError::QuadratureRowMismatch {
            name,
            rows: matrix.nrows(),
            expected: n_quad,
        });
    }
    if !matrix_is_finite(matrix) {
        return Err(JointInputError::NonFinite { name });
    }
    Ok(())
}

fn check_subject_matrix(
    matrix: &Mat<f64>,
    name: &'static str,
    n_subjects: usize,
) -> Result<(), JointInputError> {
    if matrix.nrows() != n_subjects {
        return Err(JointInputError::SubjectRowMismatch {
            name,
            rows: matrix.nrows(),
            expected: n_subjects,
        });
    }
    if !matrix_is_finite(matrix) {
        return Err(JointInputError::NonFinite { name });
    }
    Ok(())
}

const fn check_columns(
    cols: usize,
    expected: usize,
    name: &'static str,
) -> Result<(), JointInputError> {
    if cols == expected {
        Ok(())
    } else {
        Err(JointInputError::ColumnMismatch {
            name,
            cols,
            expected,
        })
    }
}
