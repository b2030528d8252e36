//! The gesture filter bank shipped on the device, as a cascade.
//!
//! Replaying logged bursts through these stages shows how the current
//! firmware would have treated them, which is the baseline any newly tuned
//! classifier is compared against. Stage order matches the firmware: the
//! first filter that fires decides, and anything left over is rejected.
//!
//! All sums are running sums over the 32 right-aligned slots, absent readings
//! counting as zero.

use crate::cascade::CascadePipeline;
use crate::classifier::Classifier;
use crate::error::ConfigError;
use crate::types::{Axis, Triplet, WakeSample, FEATURE_LEN, FIFO_DEPTH};

/// Tilt limit on the x axis for the last reading.
pub const MAX_TILT: i32 = 20;
/// Threshold for "almost vertical" in the tilt check.
pub const ALMOST_VERT: i32 = 28;
/// Threshold for "facing down" in the tilt check.
pub const DOWN_FACING: i32 = -4;

/// Accept when the fixed-weight product is at most this value.
pub const LDA_TRIAL_THRESHOLD: f64 = 25.0;

const LDA_X: [i32; FIFO_DEPTH] = [
    -30016, -30661, -30179, -27877, -23630, -20212, -12017, -8861, //
    -5510, 577, 6209, 7392, 9054, 7678, 7319, 8224, //
    7939, 7455, 6935, 6789, 8249, 8703, 7452, 7072, //
    6200, 4933, 4454, 3960, 2818, 1994, 1483, 1181,
];

const LDA_Y: [i32; FIFO_DEPTH] = [
    -34925, -33675, -33377, -22390, -3779, 6250, 1045, -3870, //
    -9206, -8196, -2424, 5249, 6834, 6834, 4639, 952, //
    -2033, -1282, -1047, 1318, 4617, 9497, 14704, 21472, //
    27724, 34921, 41498, 47327, 51105, 53223, 53910, 54068,
];

const LDA_Z: [i32; FIFO_DEPTH] = [
    -65536, -58825, -48157, -37355, -26243, -18223, -10954, -12248, //
    -12829, -13958, -15638, -12840, -7622, -118, 8230, 8693, //
    7215, 1548, -4679, -11067, -15311, -17857, -19015, -18543, //
    -17899, -15486, -12543, -8835, -6134, -2247, 473, 3403,
];

/// Wrist turned outwards or tilted sideways at the end of the burst.
pub fn is_tilted_down(t: Triplet) -> bool {
    let (x, y, z) = (t.x as i32, t.y as i32, t.z as i32);
    x.abs() > MAX_TILT
        || (z <= ALMOST_VERT && y <= DOWN_FACING)
        || (z <= DOWN_FACING && y <= ALMOST_VERT)
}

fn last(s: &WakeSample) -> Triplet {
    s.last_reading().unwrap_or_default()
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// The 96 fixed weights, x block then y block then z block.
pub fn lda_trial_weights() -> Vec<f64> {
    let mut w = Vec::with_capacity(FEATURE_LEN);
    for block in [&LDA_X, &LDA_Y, &LDA_Z] {
        w.extend(block.iter().map(|&v| v as f64));
    }
    w
}

/// The fixed-weight linear filter: accept at or below the threshold, reject above.
pub fn lda_trial() -> Result<Classifier, ConfigError> {
    // Products of integer readings and integer weights are integral.
    Classifier::fixed_weights("lda trial", lda_trial_weights())?
        .reject_above(LDA_TRIAL_THRESHOLD)?
        .accept_below(LDA_TRIAL_THRESHOLD + 1.0)
}

/// The shipped filter bank.
pub fn firmware_cascade() -> Result<CascadePipeline, ConfigError> {
    build(false)
}

/// The shipped filter bank with the fixed-weight filter enabled after the tilt check.
pub fn firmware_cascade_with_lda() -> Result<CascadePipeline, ConfigError> {
    build(true)
}

fn build(with_lda: bool) -> Result<CascadePipeline, ConfigError> {
    let mut p = CascadePipeline::new("firmware");

    p.push(Classifier::scalar("tilt down", |s| flag(is_tilted_down(last(s)))).reject_above(0.5)?);

    if with_lda {
        p.push(lda_trial()?);
    }

    p.push(
        Classifier::scalar("y turn arm", |s| s.cumulative(Axis::Y)[9].abs() as f64)
            .accept_above(239.0)?,
    );
    p.push(Classifier::scalar("y not deliberate", |s| last(s).y as f64).reject_below(-5.0)?);
    p.push(
        Classifier::scalar("z sum slope", |s| {
            let z = s.cumulative(Axis::Z);
            (z[31] - z[20] - z[11]) as f64
        })
        .accept_above(109.0)?,
    );
    p.push(
        Classifier::scalar("x turn arm", |s| s.cumulative(Axis::X)[5].abs() as f64)
            .accept_above(119.0)?,
    );
    p.push(
        Classifier::scalar("xy turn arm", |s| {
            (s.cumulative(Axis::Y)[9].abs() + s.cumulative(Axis::X)[5].abs()) as f64
        })
        .accept_above(140.0)?,
    );
    p.push(Classifier::scalar("y facing inwards", |s| last(s).y as f64).accept_above(3.0)?);
    p.push(
        Classifier::scalar("y overshoot", |s| {
            let y = s.cumulative(Axis::Y);
            flag(y[31] - y[26] > 20 || y[31] - y[22] > 40)
        })
        .accept_above(0.5)?,
    );
    p.push(Classifier::scalar("default reject", |_| 0.0).reject_above(-1.0)?);

    Ok(p)
}
