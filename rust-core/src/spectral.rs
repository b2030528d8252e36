//! Spectral weight solver: PCA and LDA over feature matrices.
//!
//! Feature matrices have one sample per row. PCA pools every matrix it is
//! given and ranks the directions of largest variance. LDA takes one matrix
//! per class and ranks the directions that best separate the class means
//! relative to the spread within each class.
//!
//! The generalized problem `S_B v = λ S_W v` is solved by whitening with the
//! Cholesky factor of `S_W`, so the reduced problem stays symmetric and
//! `SymmetricEigen` applies. Degenerate input is rejected before any
//! decomposition runs.
//!
//! An optional pre-reduction matrix (columns are axes in feature space) is
//! applied to every row before scatter computation; reported eigenvectors are
//! mapped back to feature space.

use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::Classifier;
use crate::error::ConfigError;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Within-class scatter is singular when its smallest eigenvalue is at
    /// most this fraction of its largest.
    pub singularity_tolerance: f64,
    /// Project onto this many top PCA axes of the pooled data before LDA.
    pub pre_reduction_axes: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            singularity_tolerance: 1e-10,
            pre_reduction_axes: None,
        }
    }
}

// ============================================================================
// MATRIX HELPERS
// ============================================================================

fn check_columns(matrices: &[&DMatrix<f64>]) -> Result<usize, ConfigError> {
    let Some(first) = matrices.first() else {
        return Err(ConfigError::EmptyInput);
    };
    let cols = first.ncols();
    for m in matrices {
        if m.ncols() != cols {
            return Err(ConfigError::DimensionMismatch {
                expected: cols,
                got: m.ncols(),
            });
        }
    }
    Ok(cols)
}

/// Row-wise concatenation.
fn stack(matrices: &[&DMatrix<f64>], cols: usize) -> DMatrix<f64> {
    let rows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let mut out = DMatrix::zeros(rows, cols);
    let mut r = 0;
    for m in matrices {
        out.rows_mut(r, m.nrows()).copy_from(*m);
        r += m.nrows();
    }
    out
}

fn column_means(m: &DMatrix<f64>) -> DVector<f64> {
    if m.nrows() == 0 {
        return DVector::zeros(m.ncols());
    }
    m.row_mean().transpose()
}

/// Subtract the column means from every row.
fn center(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mean = column_means(m);
    let mut out = m.clone();
    for j in 0..out.ncols() {
        let mu = mean[j];
        for v in out.column_mut(j).iter_mut() {
            *v -= mu;
        }
    }
    out
}

fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Eigenpairs sorted by eigenvalue, descending.
fn sorted_eigen(m: DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eigen = SymmetricEigen::new(m);
    let n = eigen.eigenvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
    let mut vectors = DMatrix::zeros(eigen.eigenvectors.nrows(), n);
    for (dst, &src) in order.iter().enumerate() {
        vectors.set_column(dst, &eigen.eigenvectors.column(src));
    }
    (values, vectors)
}

// ============================================================================
// SCATTER MATRICES
// ============================================================================

/// Sum over classes of each class' centered `XᵀX`.
pub fn within_class_scatter(classes: &[&DMatrix<f64>]) -> Result<DMatrix<f64>, ConfigError> {
    let cols = check_columns(classes)?;
    let mut sw = DMatrix::zeros(cols, cols);
    for (class, m) in classes.iter().enumerate() {
        if m.nrows() == 0 {
            return Err(ConfigError::EmptyClass { class });
        }
        let c = center(m);
        sw += c.transpose() * &c;
    }
    Ok(symmetrize(&sw))
}

/// Sum over classes of `n_c (μ_c − μ)(μ_c − μ)ᵀ`, μ the pooled mean.
pub fn between_class_scatter(classes: &[&DMatrix<f64>]) -> Result<DMatrix<f64>, ConfigError> {
    let cols = check_columns(classes)?;
    if let Some(class) = classes.iter().position(|m| m.nrows() == 0) {
        return Err(ConfigError::EmptyClass { class });
    }
    let grand = column_means(&stack(classes, cols));
    let mut sb = DMatrix::zeros(cols, cols);
    for m in classes {
        let d = column_means(m) - &grand;
        sb += (&d * d.transpose()) * m.nrows() as f64;
    }
    Ok(symmetrize(&sb))
}

// ============================================================================
// SOLVER OUTPUT
// ============================================================================

/// Which analysis produced a set of axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Pca,
    Lda,
}

/// Ranked eigen-axes. Column `i` of `eigenvectors` pairs with `eigenvalues[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralAxes {
    pub method: Method,
    /// Descending.
    pub eigenvalues: DVector<f64>,
    /// Unit-length columns in feature space.
    pub eigenvectors: DMatrix<f64>,
}

impl SpectralAxes {
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Axis `i` as a weight vector.
    pub fn axis(&self, i: usize) -> Result<DVector<f64>, ConfigError> {
        if i >= self.eigenvectors.ncols() {
            return Err(ConfigError::AxisOutOfRange {
                axis: i,
                available: self.eigenvectors.ncols(),
            });
        }
        Ok(self.eigenvectors.column(i).into_owned())
    }

    /// First `k` axes as columns.
    pub fn top_axes(&self, k: usize) -> Result<DMatrix<f64>, ConfigError> {
        if k > self.eigenvectors.ncols() {
            return Err(ConfigError::AxisOutOfRange {
                axis: k,
                available: self.eigenvectors.ncols(),
            });
        }
        Ok(self.eigenvectors.columns(0, k).into_owned())
    }

    /// Share of the total eigenvalue mass per axis. `None` when the total is zero.
    pub fn variance_explained(&self) -> Option<Vec<f64>> {
        let total: f64 = self.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        Some(self.eigenvalues.iter().map(|v| v.max(0.0) / total).collect())
    }

    /// Running sum of [`variance_explained`](Self::variance_explained).
    pub fn cumulative_variance_explained(&self) -> Option<Vec<f64>> {
        let ratios = self.variance_explained()?;
        let mut acc = 0.0;
        Some(
            ratios
                .into_iter()
                .map(|r| {
                    acc += r;
                    acc
                })
                .collect(),
        )
    }

    /// Scalar projection onto axis `i`, with no bands attached.
    pub fn to_projection(&self, name: impl Into<String>, i: usize) -> Result<Classifier, ConfigError> {
        let w = self.axis(i)?;
        Classifier::fixed_weights(name, w.iter().copied().collect())
    }

    /// Scalar classifier on axis `i` split at `threshold`.
    ///
    /// Projections on the `accept` side of the threshold are accepted, the
    /// other side rejected. A projection exactly at the threshold is punted.
    pub fn to_classifier(
        &self,
        name: impl Into<String>,
        i: usize,
        threshold: f64,
        accept: AcceptSide,
    ) -> Result<Classifier, ConfigError> {
        let c = self.to_projection(name, i)?;
        match accept {
            AcceptSide::Below => c.accept_below(threshold)?.reject_above(threshold),
            AcceptSide::Above => c.accept_above(threshold)?.reject_below(threshold),
        }
    }
}

/// Which side of a threshold a materialized axis classifier accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptSide {
    Below,
    Above,
}

// ============================================================================
// SOLVER
// ============================================================================

/// PCA / LDA solver with optional pre-reduction.
#[derive(Debug, Clone, Default)]
pub struct SpectralWeightSolver {
    config: SolverConfig,
    pre_reduction: Option<DMatrix<f64>>,
}

impl SpectralWeightSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            pre_reduction: None,
        }
    }

    /// Explicit reduction matrix (feature dim × k). Overrides
    /// `pre_reduction_axes`.
    pub fn with_pre_reduction(mut self, reduction: DMatrix<f64>) -> Self {
        self.pre_reduction = Some(reduction);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn reduce(&self, m: &DMatrix<f64>, r: &DMatrix<f64>) -> Result<DMatrix<f64>, ConfigError> {
        if m.ncols() != r.nrows() {
            return Err(ConfigError::DimensionMismatch {
                expected: r.nrows(),
                got: m.ncols(),
            });
        }
        Ok(m * r)
    }

    /// Reduction to use for these inputs, if any.
    fn reduction_for(&self, inputs: &[&DMatrix<f64>]) -> Result<Option<DMatrix<f64>>, ConfigError> {
        if let Some(r) = &self.pre_reduction {
            return Ok(Some(r.clone()));
        }
        match self.config.pre_reduction_axes {
            Some(k) => {
                let pca = Self::pca_unreduced(inputs)?;
                Ok(Some(pca.top_axes(k)?))
            }
            None => Ok(None),
        }
    }

    fn pca_unreduced(matrices: &[&DMatrix<f64>]) -> Result<SpectralAxes, ConfigError> {
        let cols = check_columns(matrices)?;
        let pooled = stack(matrices, cols);
        let n = pooled.nrows();
        if n == 0 {
            return Err(ConfigError::EmptyInput);
        }
        let c = center(&pooled);
        let cov = symmetrize(&((c.transpose() * &c) / (n.max(2) - 1) as f64));
        let (eigenvalues, eigenvectors) = sorted_eigen(cov);
        Ok(SpectralAxes {
            method: Method::Pca,
            eigenvalues,
            eigenvectors,
        })
    }

    /// Principal axes of the pooled matrices.
    pub fn pca(&self, matrices: &[&DMatrix<f64>]) -> Result<SpectralAxes, ConfigError> {
        check_columns(matrices)?;
        let axes = match &self.pre_reduction {
            Some(r) => {
                let reduced = matrices
                    .iter()
                    .map(|m| self.reduce(m, r))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&DMatrix<f64>> = reduced.iter().collect();
                let mut axes = Self::pca_unreduced(&refs)?;
                axes.eigenvectors = normalize_columns(r * &axes.eigenvectors);
                axes
            }
            None => Self::pca_unreduced(matrices)?,
        };
        if let Some(ratios) = axes.variance_explained() {
            info!(
                axes = axes.len(),
                top_ratio = ratios.first().copied().unwrap_or(0.0),
                "pca solved"
            );
        }
        Ok(axes)
    }

    /// Discriminant axes for at least two classes, one matrix per class.
    pub fn lda(&self, classes: &[&DMatrix<f64>]) -> Result<SpectralAxes, ConfigError> {
        if classes.len() < 2 {
            return Err(ConfigError::TooFewClasses { got: classes.len() });
        }
        check_columns(classes)?;
        if let Some(class) = classes.iter().position(|m| m.nrows() == 0) {
            return Err(ConfigError::EmptyClass { class });
        }

        let reduction = self.reduction_for(classes)?;
        let reduced: Vec<DMatrix<f64>> = match &reduction {
            Some(r) => classes
                .iter()
                .map(|m| self.reduce(m, r))
                .collect::<Result<_, _>>()?,
            None => classes.iter().map(|m| (*m).clone()).collect(),
        };
        let refs: Vec<&DMatrix<f64>> = reduced.iter().collect();

        let sw = within_class_scatter(&refs)?;
        let sb = between_class_scatter(&refs)?;
        self.check_nonsingular(&sw)?;

        let (eigenvalues, w) = whitened_eigen(sw, &sb)?;
        let eigenvectors = match &reduction {
            Some(r) => normalize_columns(r * w),
            None => w,
        };

        info!(
            classes = classes.len(),
            dims = eigenvectors.nrows(),
            top_eigenvalue = eigenvalues.iter().next().copied().unwrap_or(0.0),
            "lda solved"
        );
        Ok(SpectralAxes {
            method: Method::Lda,
            eigenvalues,
            eigenvectors,
        })
    }

    fn check_nonsingular(&self, sw: &DMatrix<f64>) -> Result<(), ConfigError> {
        let values = SymmetricEigen::new(sw.clone()).eigenvalues;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        if max.is_nan() || max <= 0.0 || min <= self.config.singularity_tolerance * max {
            return Err(ConfigError::SingularScatter {
                min_eigenvalue: min,
                max_eigenvalue: max,
            });
        }
        Ok(())
    }
}

/// Solve `S_B v = λ S_W v` via `L⁻¹ S_B L⁻ᵀ`, `S_W = L Lᵀ`.
fn whitened_eigen(
    sw: DMatrix<f64>,
    sb: &DMatrix<f64>,
) -> Result<(DVector<f64>, DMatrix<f64>), ConfigError> {
    let singular = |sw: &DMatrix<f64>| ConfigError::SingularScatter {
        min_eigenvalue: sw.diagonal().min(),
        max_eigenvalue: sw.diagonal().max(),
    };
    let chol = Cholesky::new(sw.clone()).ok_or_else(|| singular(&sw))?;
    let l = chol.l();

    let a = l.solve_lower_triangular(sb).ok_or_else(|| singular(&sw))?;
    let m = l
        .solve_lower_triangular(&a.transpose())
        .ok_or_else(|| singular(&sw))?
        .transpose();

    let (values, w) = sorted_eigen(symmetrize(&m));
    let v = l
        .transpose()
        .solve_upper_triangular(&w)
        .ok_or_else(|| singular(&sw))?;
    Ok((values, normalize_columns(v)))
}

fn normalize_columns(mut m: DMatrix<f64>) -> DMatrix<f64> {
    for mut col in m.column_iter_mut() {
        let norm = col.norm();
        if norm > 0.0 {
            col /= norm;
        }
    }
    m
}
