//! In-memory collections of decoded samples and the query layer over them.
//!
//! Samples are held behind `Arc` so derived subsets (filter results, cascade
//! working sets) share them read-only. Auxiliary labels such as "used in
//! training" are kept beside the samples, keyed by position. Sample ids are
//! not unique once independently decoded sets are combined, so nothing in a
//! set is looked up by id.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decoder::{decode_source, DecodeSummary, DecoderConfig};
use crate::error::Result;
use crate::types::{BatterySample, WakeSample, FEATURE_LEN};

// ============================================================================
// PREDICATES
// ============================================================================

/// One selectable attribute of a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Confirmed(bool),
    Full(bool),
    TriggerY(bool),
    TriggerZ(bool),
    SuperY(bool),
    DoubleClick(bool),
    BadFifo(bool),
    HasTimestamp(bool),
    HasBattery(bool),
    /// Marked as part of a training set.
    Training(bool),
    Int1Flags(u8),
    Int2Flags(u8),
    /// Substring of the source log name.
    NameContains(String),
}

impl Predicate {
    fn holds(&self, sample: &WakeSample, training: bool) -> bool {
        match self {
            Predicate::Confirmed(v) => sample.confirmed == *v,
            Predicate::Full(v) => sample.is_full() == *v,
            Predicate::TriggerY(v) => sample.trigger_y() == *v,
            Predicate::TriggerZ(v) => sample.trigger_z() == *v,
            Predicate::SuperY(v) => sample.is_super_y() == *v,
            Predicate::DoubleClick(v) => sample.double_click == *v,
            Predicate::BadFifo(v) => sample.bad_fifo == *v,
            Predicate::HasTimestamp(v) => sample.timestamp.is_some() == *v,
            Predicate::HasBattery(v) => sample.battery_volts.is_some() == *v,
            Predicate::Training(v) => training == *v,
            Predicate::Int1Flags(f) => sample.int1_flags == *f,
            Predicate::Int2Flags(f) => sample.int2_flags == *f,
            Predicate::NameContains(s) => sample.source.contains(s.as_str()),
        }
    }
}

/// How the predicates of a filter combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Combine {
    #[default]
    All,
    Any,
}

/// A combined selection over samples.
///
/// An empty predicate list selects every sample in either mode; `reverse`
/// negates the whole combined result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
    pub combine: Combine,
    pub reverse: bool,
}

impl Filter {
    /// Selects everything.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Every predicate must hold.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            predicates: predicates.into_iter().collect(),
            combine: Combine::All,
            reverse: false,
        }
    }

    /// At least one predicate must hold.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            predicates: predicates.into_iter().collect(),
            combine: Combine::Any,
            reverse: false,
        }
    }

    pub fn only(predicate: Predicate) -> Self {
        Self::all([predicate])
    }

    /// Negate the whole filter.
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    fn matches(&self, sample: &WakeSample, training: bool) -> bool {
        let hit = if self.predicates.is_empty() {
            true
        } else {
            match self.combine {
                Combine::All => self.predicates.iter().all(|p| p.holds(sample, training)),
                Combine::Any => self.predicates.iter().any(|p| p.holds(sample, training)),
            }
        };
        hit != self.reverse
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Aggregate counters over a sample set, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleSetSummary {
    pub total: usize,
    pub confirmed: usize,
    pub unconfirmed: usize,
    pub full: usize,
    pub partial: usize,
    pub trigger_y: usize,
    pub trigger_z: usize,
    pub super_y: usize,
    pub double_click: usize,
    pub training: usize,
    pub battery_samples: usize,
    pub total_wake_time_ms: u64,
}

// ============================================================================
// SAMPLE SET
// ============================================================================

/// Decoded wake and battery samples from one or more logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    wake: Vec<Arc<WakeSample>>,
    battery: Vec<BatterySample>,
    /// Parallel to `wake`.
    training: Vec<bool>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(wake: Vec<WakeSample>, battery: Vec<BatterySample>) -> Self {
        let training = vec![false; wake.len()];
        Self {
            wake: wake.into_iter().map(Arc::new).collect(),
            battery,
            training,
        }
    }

    /// Set sharing the given samples, with no battery records.
    pub fn from_shared(wake: Vec<Arc<WakeSample>>) -> Self {
        let training = vec![false; wake.len()];
        Self {
            wake,
            battery: Vec::new(),
            training,
        }
    }

    /// Decode named buffers in order, with non-overlapping sample ids.
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a [u8])>,
        config: &DecoderConfig,
    ) -> (Self, Vec<DecodeSummary>) {
        let mut set = SampleSet::new();
        let mut summaries = Vec::new();
        let mut next_id = 0;
        for (name, bytes) in sources {
            let decoded = decode_source(name, bytes, config, next_id);
            next_id = decoded.summary.next_id;
            set.combine(SampleSet::from_parts(decoded.wake, decoded.battery));
            summaries.push(decoded.summary);
        }
        (set, summaries)
    }

    /// Read and decode a whole log file, ids starting at `first_id`.
    pub fn from_file(
        path: impl AsRef<Path>,
        config: &DecoderConfig,
        first_id: u64,
    ) -> Result<(Self, DecodeSummary)> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path.to_string_lossy();
        let decoded = decode_source(&name, &bytes, config, first_id);
        debug!(
            source = %name,
            wake = decoded.wake.len(),
            battery = decoded.battery.len(),
            "decoded log file"
        );
        Ok((
            SampleSet::from_parts(decoded.wake, decoded.battery),
            decoded.summary,
        ))
    }

    pub fn len(&self) -> usize {
        self.wake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wake.is_empty()
    }

    pub fn samples(&self) -> &[Arc<WakeSample>] {
        &self.wake
    }

    pub fn battery(&self) -> &[BatterySample] {
        &self.battery
    }

    /// First sample carrying `id`. Ids repeat across combined sources.
    pub fn get(&self, id: u64) -> Option<&Arc<WakeSample>> {
        self.wake.iter().find(|s| s.id == id)
    }

    /// Mark the samples at the given positions as used in training.
    /// Out-of-range positions are ignored.
    pub fn mark_training(&mut self, positions: impl IntoIterator<Item = usize>) {
        for i in positions {
            if let Some(flag) = self.training.get_mut(i) {
                *flag = true;
            }
        }
    }

    /// Mark every sample the filter selects. Returns how many matched.
    pub fn mark_training_where(&mut self, filter: &Filter) -> usize {
        let hits: Vec<usize> = self.positions(filter).collect();
        let n = hits.len();
        self.mark_training(hits);
        n
    }

    pub fn clear_training(&mut self) {
        self.training.iter_mut().for_each(|flag| *flag = false);
    }

    pub fn is_training(&self, position: usize) -> bool {
        self.training.get(position).copied().unwrap_or(false)
    }

    /// Positions of the selected samples, in insertion order.
    pub fn positions<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = usize> + 'a {
        self.wake
            .iter()
            .enumerate()
            .filter(move |(i, s)| filter.matches(s, self.is_training(*i)))
            .map(|(i, _)| i)
    }

    /// Lazily select samples, in insertion order.
    pub fn filter<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a Arc<WakeSample>> + 'a {
        self.positions(filter).map(move |i| &self.wake[i])
    }

    /// Shared-sample subset; battery records are not carried over.
    pub fn subset(&self, filter: &Filter) -> SampleSet {
        let (wake, training): (Vec<_>, Vec<_>) = self
            .positions(filter)
            .map(|i| (Arc::clone(&self.wake[i]), self.is_training(i)))
            .unzip();
        SampleSet {
            wake,
            battery: Vec::new(),
            training,
        }
    }

    /// One row per selected sample, 96 columns, in filter order.
    pub fn feature_matrix(&self, filter: &Filter) -> DMatrix<f64> {
        let rows: Vec<[f64; FEATURE_LEN]> =
            self.filter(filter).map(|s| s.feature_vector()).collect();
        DMatrix::from_fn(rows.len(), FEATURE_LEN, |r, c| rows[r][c])
    }

    /// Append another set. No de-duplication.
    pub fn combine(&mut self, other: SampleSet) {
        let training: Vec<bool> = (0..other.wake.len()).map(|i| other.is_training(i)).collect();
        self.training.resize(self.wake.len(), false);
        self.wake.extend(other.wake);
        self.battery.extend(other.battery);
        self.training.extend(training);
    }

    /// Remove the `n` samples with the highest score, in place.
    ///
    /// `score` receives the feature matrix of the whole set and returns one
    /// score per row. Returns the removed samples, highest score first.
    pub fn remove_outliers<F>(&mut self, n: usize, score: F) -> Vec<Arc<WakeSample>>
    where
        F: Fn(&DMatrix<f64>) -> Vec<f64>,
    {
        if n == 0 || self.wake.is_empty() {
            return Vec::new();
        }
        let scores = score(&self.feature_matrix(&Filter::everything()));
        let mut order: Vec<usize> = (0..self.wake.len()).collect();
        order.sort_by(|&a, &b| {
            let sa = scores.get(a).copied().unwrap_or(f64::NEG_INFINITY);
            let sb = scores.get(b).copied().unwrap_or(f64::NEG_INFINITY);
            sb.total_cmp(&sa)
        });

        let doomed: BTreeSet<usize> = order.iter().take(n).copied().collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for &idx in order.iter().take(n) {
            let sample = &self.wake[idx];
            info!(
                sample_id = sample.id,
                source = %sample.source,
                score = scores.get(idx).copied().unwrap_or(f64::NAN),
                "removing outlier"
            );
            removed.push(Arc::clone(sample));
        }

        let (wake, training): (Vec<_>, Vec<_>) = std::mem::take(&mut self.wake)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(i, s)| (s, self.is_training(i)))
            .unzip();
        self.wake = wake;
        self.training = training;
        removed
    }

    /// Aggregate counters over all samples.
    pub fn summary(&self) -> SampleSetSummary {
        let mut out = SampleSetSummary {
            total: self.wake.len(),
            battery_samples: self.battery.len(),
            ..SampleSetSummary::default()
        };
        for (i, s) in self.wake.iter().enumerate() {
            if s.confirmed {
                out.confirmed += 1;
            } else {
                out.unconfirmed += 1;
            }
            if s.is_full() {
                out.full += 1;
            } else {
                out.partial += 1;
            }
            out.trigger_y += s.trigger_y() as usize;
            out.trigger_z += s.trigger_z() as usize;
            out.super_y += s.is_super_y() as usize;
            out.double_click += s.double_click as usize;
            out.training += self.is_training(i) as usize;
            out.total_wake_time_ms += s.wake_time_ms as u64;
        }
        out
    }
}

/// Euclidean distance of each row from the column means.
pub fn distance_from_mean(matrix: &DMatrix<f64>) -> Vec<f64> {
    if matrix.nrows() == 0 {
        return Vec::new();
    }
    let mean = matrix.row_mean();
    matrix
        .row_iter()
        .map(|row| (row - &mean).norm())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::int_flags;
    use crate::types::test_support::{constant_sample, ramp_sample};
    use crate::types::Triplet;

    fn mixed_set() -> SampleSet {
        let mut a = ramp_sample(0, true);
        a.int1_flags = int_flags::YH;
        let mut b = ramp_sample(1, false);
        b.int1_flags = int_flags::ZH;
        b.triplets[0] = None;
        let mut c = ramp_sample(2, true);
        c.int2_flags = int_flags::SUPER;
        c.source = Arc::from("logs/desk_2016.bin");
        let d = ramp_sample(3, false);
        SampleSet::from_parts(vec![a, b, c, d], vec![BatterySample::new(1, 3.0)])
    }

    fn ids<'a>(it: impl Iterator<Item = &'a Arc<WakeSample>>) -> Vec<u64> {
        it.map(|s| s.id).collect()
    }

    #[test]
    fn test_filter_all_any_reverse() {
        let set = mixed_set();
        let f = Filter::all([Predicate::Confirmed(true), Predicate::SuperY(false)]);
        assert_eq!(ids(set.filter(&f)), vec![0]);

        let f = Filter::any([Predicate::TriggerY(true), Predicate::TriggerZ(true)]);
        assert_eq!(ids(set.filter(&f)), vec![0, 1]);

        let f = f.reversed();
        assert_eq!(ids(set.filter(&f)), vec![2, 3]);
    }

    #[test]
    fn test_filter_empty_selects_everything() {
        let set = mixed_set();
        assert_eq!(ids(set.filter(&Filter::everything())), vec![0, 1, 2, 3]);
        assert_eq!(set.filter(&Filter::everything().reversed()).count(), 0);
    }

    #[test]
    fn test_filter_name_and_full() {
        let set = mixed_set();
        let f = Filter::only(Predicate::NameContains("desk".into()));
        assert_eq!(ids(set.filter(&f)), vec![2]);
        let f = Filter::only(Predicate::Full(false));
        assert_eq!(ids(set.filter(&f)), vec![1]);
    }

    #[test]
    fn test_training_labels_live_beside_samples() {
        let mut set = mixed_set();
        set.mark_training([1, 3]);
        let f = Filter::only(Predicate::Training(true));
        assert_eq!(ids(set.filter(&f)), vec![1, 3]);
        assert_eq!(set.summary().training, 2);

        let sub = set.subset(&Filter::only(Predicate::Confirmed(false)));
        assert!(sub.is_training(0));
        assert!(sub.is_training(1));
        assert!(sub.battery().is_empty());

        let sub = set.subset(&Filter::only(Predicate::Confirmed(true)));
        assert!(!sub.is_training(0));
        assert!(!sub.is_training(1));
    }

    #[test]
    fn test_training_labels_survive_duplicate_ids() {
        let mut set = mixed_set();
        set.combine(mixed_set());
        // Ids 0..4 now appear twice; only the second copy of id 1 is marked.
        set.mark_training([5]);
        let f = Filter::only(Predicate::Training(true));
        assert_eq!(set.positions(&f).collect::<Vec<_>>(), vec![5]);
        assert_eq!(set.summary().training, 1);
        assert!(!set.is_training(1));

        let mut other = mixed_set();
        other.mark_training([0]);
        set.combine(other);
        assert_eq!(set.positions(&f).collect::<Vec<_>>(), vec![5, 8]);
    }

    #[test]
    fn test_mark_training_where() {
        let mut set = mixed_set();
        assert_eq!(set.mark_training_where(&Filter::only(Predicate::Confirmed(true))), 2);
        assert_eq!(ids(set.filter(&Filter::only(Predicate::Training(true)))), vec![0, 2]);
        set.clear_training();
        assert_eq!(set.summary().training, 0);
    }

    #[test]
    fn test_feature_matrix_order_and_shape() {
        let set = mixed_set();
        let m = set.feature_matrix(&Filter::only(Predicate::Confirmed(false)));
        assert_eq!(m.shape(), (2, FEATURE_LEN));
        // Row 0 is sample 1 whose first slot is absent.
        assert_eq!(m[(0, 0)], 0.0);
        assert_eq!(m[(1, 5)], 5.0);
    }

    #[test]
    fn test_combine_keeps_duplicates() {
        let mut a = mixed_set();
        let b = mixed_set();
        a.combine(b);
        assert_eq!(a.len(), 8);
        assert_eq!(a.battery().len(), 2);
    }

    #[test]
    fn test_remove_outliers() {
        let mut set = SampleSet::from_parts(
            vec![
                constant_sample(0, true, Triplet::new(1, 1, 1)),
                constant_sample(1, true, Triplet::new(90, -90, 90)),
                constant_sample(2, false, Triplet::new(2, 1, 1)),
                constant_sample(3, false, Triplet::new(1, 2, 1)),
            ],
            Vec::new(),
        );
        set.mark_training([1]);
        let removed = set.remove_outliers(1, distance_from_mean);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, 1);
        assert_eq!(ids(set.samples().iter()), vec![0, 2, 3]);
        assert_eq!(set.summary().training, 0);
    }

    #[test]
    fn test_summary() {
        let s = mixed_set().summary();
        assert_eq!(s.total, 4);
        assert_eq!(s.confirmed, 2);
        assert_eq!(s.unconfirmed, 2);
        assert_eq!(s.partial, 1);
        assert_eq!(s.trigger_y, 1);
        assert_eq!(s.trigger_z, 1);
        assert_eq!(s.super_y, 1);
        assert_eq!(s.battery_samples, 1);
        assert_eq!(s.total_wake_time_ms, 4000);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut set = mixed_set();
        set.mark_training([2]);
        let json = serde_json::to_string(&set).unwrap();
        let back: SampleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
