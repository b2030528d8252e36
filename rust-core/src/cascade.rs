//! Cascade of classifiers over a working sample set.
//!
//! Each stage sees only the samples every earlier stage punted. A run never
//! mutates counters incrementally: it produces one immutable
//! [`CascadeReport`] from scratch, and the pipeline keeps the latest one.
//!
//! Design note: a pipeline is itself usable as a stage. Its verdict for a
//! sample is the verdict of whichever inner stage committed on it, or Pass
//! when none did. Verdicts travel by position in the input, never by sample
//! id: combined sets routinely hold several samples with the same id.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::classifier::{Classifier, Verdict};
use crate::confusion::{ConfusionMatrix, Percent};
use crate::error::ConfigError;
use crate::sample_set::SampleSet;
use crate::types::WakeSample;

/// One step of a cascade.
#[derive(Debug, Clone)]
pub enum Stage {
    Test(Classifier),
    Nested(CascadePipeline),
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Test(c) => c.name(),
            Stage::Nested(p) => p.name(),
        }
    }

    /// Per-sample verdicts, aligned with `input.samples()`.
    fn verdicts(&self, input: &SampleSet) -> Result<Vec<Verdict>, ConfigError> {
        match self {
            Stage::Test(c) => input.samples().iter().map(|s| c.classify(s)).collect(),
            Stage::Nested(p) => {
                let report = p.evaluate(input)?;
                Ok(report.verdicts.into_iter().map(|(_, v)| v).collect())
            }
        }
    }
}

impl From<Classifier> for Stage {
    fn from(c: Classifier) -> Self {
        Stage::Test(c)
    }
}

impl From<CascadePipeline> for Stage {
    fn from(p: CascadePipeline) -> Self {
        Stage::Nested(p)
    }
}

/// Result of one stage on its working set.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    /// Confirmed and unconfirmed counts of this stage's input.
    pub input_confirmed: usize,
    pub input_unconfirmed: usize,
    pub matrix: ConfusionMatrix,
    /// `(sample id, verdict)` in working-set order.
    pub verdicts: Vec<(u64, Verdict)>,
    /// Samples handed to the next stage.
    pub punted: SampleSet,
}

impl StageReport {
    pub fn is_conserved(&self) -> bool {
        self.matrix
            .is_conserved(self.input_confirmed, self.input_unconfirmed)
    }
}

/// Result of a full cascade run.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub name: String,
    pub input_confirmed: usize,
    pub input_unconfirmed: usize,
    pub stages: Vec<StageReport>,
    /// Accepted and rejected summed over stages; punted is the final working set.
    pub aggregate: ConfusionMatrix,
    /// `(sample id, final verdict)` aligned with the input samples.
    pub verdicts: Vec<(u64, Verdict)>,
    /// Samples no stage committed on.
    pub punted: SampleSet,
}

impl CascadeReport {
    pub fn is_conserved(&self) -> bool {
        self.aggregate
            .is_conserved(self.input_confirmed, self.input_unconfirmed)
            && self.stages.iter().all(StageReport::is_conserved)
    }

    /// Final verdict of the input sample at `position`.
    pub fn verdict_at(&self, position: usize) -> Option<Verdict> {
        self.verdicts.get(position).map(|(_, v)| *v)
    }

    /// Final verdict of the first input sample carrying `id`.
    pub fn verdict_for(&self, id: u64) -> Option<Verdict> {
        self.verdicts
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, v)| *v)
    }
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cascade '{}': {} confirmed, {} unconfirmed",
            self.name, self.input_confirmed, self.input_unconfirmed
        )?;
        for (i, stage) in self.stages.iter().enumerate() {
            let m = &stage.matrix;
            writeln!(
                f,
                "  [{i}] {:<24} in {:>5}  TA {}  FA {}  punt {}",
                stage.name,
                stage.input_confirmed + stage.input_unconfirmed,
                Percent(m.true_accept_rate()),
                Percent(m.false_accept_rate()),
                Percent(m.punt_rate()),
            )?;
        }
        write!(f, "{}", self.aggregate)
    }
}

fn class_counts(set: &SampleSet) -> (usize, usize) {
    let confirmed = set.samples().iter().filter(|s| s.confirmed).count();
    (confirmed, set.len() - confirmed)
}

/// Ordered classifier stages plus the input they run against.
#[derive(Debug, Clone)]
pub struct CascadePipeline {
    name: String,
    stages: Vec<Stage>,
    input: SampleSet,
    report: Option<CascadeReport>,
}

impl CascadePipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            input: SampleSet::new(),
            report: None,
        }
    }

    /// Append a stage, builder style.
    pub fn with_stage(mut self, stage: impl Into<Stage>) -> Self {
        self.push(stage);
        self
    }

    pub fn with_input(mut self, input: SampleSet) -> Self {
        self.set_input(input);
        self
    }

    pub fn push(&mut self, stage: impl Into<Stage>) {
        self.stages.push(stage.into());
        self.report = None;
    }

    /// Replace the input set. Invalidates the last report.
    pub fn set_input(&mut self, input: SampleSet) {
        self.input = input;
        self.report = None;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn input(&self) -> &SampleSet {
        &self.input
    }

    /// Latest report, if `run` has completed since the last change.
    pub fn report(&self) -> Option<&CascadeReport> {
        self.report.as_ref()
    }

    /// Recompute every stage against the pipeline's input.
    pub fn run(&mut self) -> Result<&CascadeReport, ConfigError> {
        self.report = None;
        let report = self.evaluate(&self.input)?;
        Ok(self.report.insert(report))
    }

    /// Run the stages against any set without touching pipeline state.
    pub fn evaluate(&self, input: &SampleSet) -> Result<CascadeReport, ConfigError> {
        let (input_confirmed, input_unconfirmed) = class_counts(input);
        let mut working = SampleSet::from_shared(input.samples().to_vec());
        // Input position of each working-set sample.
        let mut positions: Vec<usize> = (0..input.len()).collect();
        let mut final_verdicts = vec![Verdict::Pass; input.len()];
        let mut aggregate = ConfusionMatrix::default();
        let mut stages = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let (stage_confirmed, stage_unconfirmed) = class_counts(&working);
            let verdicts = stage.verdicts(&working)?;

            let mut matrix = ConfusionMatrix::default();
            let mut punted: Vec<Arc<WakeSample>> = Vec::new();
            let mut punted_positions = Vec::new();
            let mut tagged = Vec::with_capacity(verdicts.len());
            for ((sample, &pos), verdict) in working.samples().iter().zip(&positions).zip(verdicts) {
                matrix.record(sample, verdict);
                tagged.push((sample.id, verdict));
                match verdict {
                    Verdict::Pass => {
                        punted.push(Arc::clone(sample));
                        punted_positions.push(pos);
                    }
                    committed => final_verdicts[pos] = committed,
                }
            }
            positions = punted_positions;

            debug!(
                cascade = %self.name,
                stage = stage.name(),
                accepted = matrix.confirmed.accepted.count + matrix.unconfirmed.accepted.count,
                rejected = matrix.confirmed.rejected.count + matrix.unconfirmed.rejected.count,
                punted = punted.len(),
                "stage evaluated"
            );

            aggregate.confirmed.accepted += matrix.confirmed.accepted;
            aggregate.confirmed.rejected += matrix.confirmed.rejected;
            aggregate.unconfirmed.accepted += matrix.unconfirmed.accepted;
            aggregate.unconfirmed.rejected += matrix.unconfirmed.rejected;

            working = SampleSet::from_shared(punted);
            stages.push(StageReport {
                name: stage.name().to_string(),
                input_confirmed: stage_confirmed,
                input_unconfirmed: stage_unconfirmed,
                matrix,
                verdicts: tagged,
                punted: working.clone(),
            });
        }

        for sample in working.samples() {
            aggregate.record(sample, Verdict::Pass);
        }

        let verdicts = input
            .samples()
            .iter()
            .zip(final_verdicts)
            .map(|(s, v)| (s.id, v))
            .collect();

        Ok(CascadeReport {
            name: self.name.clone(),
            input_confirmed,
            input_unconfirmed,
            stages,
            aggregate,
            verdicts,
            punted: working,
        })
    }
}
