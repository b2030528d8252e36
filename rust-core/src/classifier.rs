//! Single-test classifiers and the three-way verdict algebra.
//!
//! A classifier pairs a feature function with up to four threshold bands.
//! Every construction strategy (closure, fixed weight vector, projection onto
//! solver axes) produces the same struct; they differ only in how the feature
//! function is built.
//!
//! Decision order for one dimension:
//! - below `reject_below` or above `reject_above` → Reject
//! - else above `accept_above` or below `accept_below` → Accept
//! - else → Pass
//!
//! Vector features are decided per dimension, then combined: all Accept gives
//! Accept, all Reject gives Reject, anything else is Pass.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{WakeSample, FEATURE_LEN};

/// Outcome of one classifier on one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Accept,
    Reject,
    /// No commitment; the sample is punted to the next stage.
    Pass,
}

impl Verdict {
    /// AND-style combination across vector dimensions.
    pub fn combine(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
        let mut iter = verdicts.into_iter();
        let Some(first) = iter.next() else {
            return Verdict::Pass;
        };
        if first == Verdict::Pass {
            return Verdict::Pass;
        }
        if iter.all(|v| v == first) {
            first
        } else {
            Verdict::Pass
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accept => "ACCEPT",
            Verdict::Reject => "REJECT",
            Verdict::Pass => "PASS",
        };
        f.write_str(s)
    }
}

/// Output of a feature function.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl FeatureValue {
    pub fn len(&self) -> usize {
        match self {
            FeatureValue::Scalar(_) => 1,
            FeatureValue::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            FeatureValue::Scalar(v) => std::slice::from_ref(v),
            FeatureValue::Vector(v) => v,
        }
    }
}

/// Threshold values for one band, one entry per feature dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold(Vec<f64>);

impl From<f64> for Threshold {
    fn from(v: f64) -> Self {
        Threshold(vec![v])
    }
}

impl From<Vec<f64>> for Threshold {
    fn from(v: Vec<f64>) -> Self {
        Threshold(v)
    }
}

impl From<&[f64]> for Threshold {
    fn from(v: &[f64]) -> Self {
        Threshold(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Threshold {
    fn from(v: [f64; N]) -> Self {
        Threshold(v.to_vec())
    }
}

/// The four optional bands. Unset bands never trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bands {
    pub reject_below: Option<Vec<f64>>,
    pub reject_above: Option<Vec<f64>>,
    pub accept_below: Option<Vec<f64>>,
    pub accept_above: Option<Vec<f64>>,
}

impl Bands {
    fn decide_dim(&self, dim: usize, value: f64) -> Verdict {
        let at = |band: &Option<Vec<f64>>| band.as_ref().map(|b| b[dim]);
        if at(&self.reject_below).is_some_and(|t| value < t)
            || at(&self.reject_above).is_some_and(|t| value > t)
        {
            Verdict::Reject
        } else if at(&self.accept_above).is_some_and(|t| value > t)
            || at(&self.accept_below).is_some_and(|t| value < t)
        {
            Verdict::Accept
        } else {
            Verdict::Pass
        }
    }
}

/// Feature function shared between clones of a classifier.
pub type FeatureFn = Arc<dyn Fn(&WakeSample) -> FeatureValue + Send + Sync>;

/// One named test over wake samples.
#[derive(Clone)]
pub struct Classifier {
    name: String,
    dim: usize,
    feature: FeatureFn,
    bands: Bands,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("name", &self.name)
            .field("dim", &self.dim)
            .field("bands", &self.bands)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Scalar test from a closure.
    pub fn scalar<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&WakeSample) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dim: 1,
            feature: Arc::new(move |s| FeatureValue::Scalar(f(s))),
            bands: Bands::default(),
        }
    }

    /// Vector test of fixed dimension from a closure.
    pub fn vector<F>(name: impl Into<String>, dim: usize, f: F) -> Self
    where
        F: Fn(&WakeSample) -> Vec<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dim,
            feature: Arc::new(move |s| FeatureValue::Vector(f(s))),
            bands: Bands::default(),
        }
    }

    /// Scalar test: dot product of the feature vector with `weights`.
    pub fn fixed_weights(name: impl Into<String>, weights: Vec<f64>) -> Result<Self, ConfigError> {
        if weights.len() != FEATURE_LEN {
            return Err(ConfigError::WeightLength {
                expected: FEATURE_LEN,
                got: weights.len(),
            });
        }
        Ok(Self::scalar(name, move |s| {
            s.feature_vector()
                .iter()
                .zip(weights.iter())
                .map(|(a, b)| a * b)
                .sum()
        }))
    }

    /// Vector test: projection of the feature vector onto each column of `axes`.
    pub fn projection(name: impl Into<String>, axes: DMatrix<f64>) -> Result<Self, ConfigError> {
        if axes.nrows() != FEATURE_LEN {
            return Err(ConfigError::WeightLength {
                expected: FEATURE_LEN,
                got: axes.nrows(),
            });
        }
        let dim = axes.ncols();
        Ok(Self::vector(name, dim, move |s| {
            let x = DVector::from_row_slice(&s.feature_vector());
            (axes.transpose() * x).iter().copied().collect()
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn bands(&self) -> &Bands {
        &self.bands
    }

    fn checked(&self, field: &'static str, t: Threshold) -> Result<Vec<f64>, ConfigError> {
        if t.0.len() != self.dim {
            return Err(ConfigError::ThresholdLength {
                classifier: self.name.clone(),
                field,
                expected: self.dim,
                got: t.0.len(),
            });
        }
        Ok(t.0)
    }

    pub fn reject_below(mut self, t: impl Into<Threshold>) -> Result<Self, ConfigError> {
        self.bands.reject_below = Some(self.checked("reject_below", t.into())?);
        Ok(self)
    }

    pub fn reject_above(mut self, t: impl Into<Threshold>) -> Result<Self, ConfigError> {
        self.bands.reject_above = Some(self.checked("reject_above", t.into())?);
        Ok(self)
    }

    pub fn accept_below(mut self, t: impl Into<Threshold>) -> Result<Self, ConfigError> {
        self.bands.accept_below = Some(self.checked("accept_below", t.into())?);
        Ok(self)
    }

    pub fn accept_above(mut self, t: impl Into<Threshold>) -> Result<Self, ConfigError> {
        self.bands.accept_above = Some(self.checked("accept_above", t.into())?);
        Ok(self)
    }

    /// Feature value for one sample.
    pub fn evaluate(&self, sample: &WakeSample) -> FeatureValue {
        (self.feature)(sample)
    }

    /// Verdict for an already-computed feature value.
    pub fn decide(&self, value: &FeatureValue) -> Result<Verdict, ConfigError> {
        let values = value.as_slice();
        if values.len() != self.dim {
            return Err(ConfigError::FeatureLength {
                classifier: self.name.clone(),
                expected: self.dim,
                got: values.len(),
            });
        }
        Ok(Verdict::combine(
            values
                .iter()
                .enumerate()
                .map(|(dim, v)| self.bands.decide_dim(dim, *v)),
        ))
    }

    /// Evaluate and decide in one step.
    pub fn classify(&self, sample: &WakeSample) -> Result<Verdict, ConfigError> {
        self.decide(&self.evaluate(sample))
    }
}
