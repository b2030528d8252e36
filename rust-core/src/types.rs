//! Core data types for the wake sensor log toolkit.
//!
//! This module defines the decoded records that flow from the stream decoder
//! into sample sets, classifiers and the spectral solver. Decoded samples are
//! immutable: everything a caller might want to attach to them (training
//! labels, verdicts) lives beside them, never inside.
//!
//! Design principle: Types should make intent obvious. An absent reading is
//! `None`, never a zero that could be mistaken for a real measurement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Number of accelerometer triplets held by the sensor FIFO.
pub const FIFO_DEPTH: usize = 32;

/// Length of the flattened feature vector (32 x, then 32 y, then 32 z).
pub const FEATURE_LEN: usize = FIFO_DEPTH * 3;

/// Milliseconds per firmware wake tick.
pub const MS_PER_TICK: u32 = 1;

/// Interrupt source register bits, bit 0 first: xl, xh, yl, yh, zl, zh, ia, super.
pub mod int_flags {
    pub const XL: u8 = 1 << 0;
    pub const XH: u8 = 1 << 1;
    pub const YL: u8 = 1 << 2;
    pub const YH: u8 = 1 << 3;
    pub const ZL: u8 = 1 << 4;
    pub const ZH: u8 = 1 << 5;
    pub const IA: u8 = 1 << 6;
    /// Set by firmware when the wake came from the "super Y" interrupt path.
    pub const SUPER: u8 = 1 << 7;

    pub const Y_ANY: u8 = YL | YH;
    pub const Z_ANY: u8 = ZL | ZH;
}

// ============================================================================
// ACCELEROMETER READINGS
// ============================================================================

/// One accelerometer reading, raw signed 8-bit counts per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Triplet {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

impl Triplet {
    pub fn new(x: i8, y: i8, z: i8) -> Self {
        Self { x, y, z }
    }

    /// Component for one axis.
    pub fn axis(&self, axis: Axis) -> i8 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// A FIFO slot. `None` marks a reading missing from a short burst.
pub type Reading = Option<Triplet>;

/// Accelerometer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Offset of this axis' block within the feature vector.
    pub fn feature_offset(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => FIFO_DEPTH,
            Axis::Z => 2 * FIFO_DEPTH,
        }
    }
}

// ============================================================================
// WAKE SAMPLE
// ============================================================================

/// One motion-triggered burst as logged by the device.
///
/// Constructed only by the stream decoder when a well-formed end marker
/// closes a burst. Readings are right-aligned: if the FIFO held fewer than
/// 32 readings, the missing ones are `None` at the front so the most recent
/// reading is always at index 31.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeSample {
    /// Identifier assigned by the decoder that produced this sample.
    pub id: u64,

    /// Name of the log this sample was decoded from.
    pub source: Arc<str>,

    /// Exactly 32 FIFO slots, oldest first.
    pub triplets: [Reading; FIFO_DEPTH],

    /// Human-confirmed real wake gesture.
    pub confirmed: bool,

    /// How long the device stayed awake after this burst (0 if not tracked).
    pub wake_time_ms: u32,

    /// Seconds since epoch; `None` when the header carried 0 (logs written
    /// before the clock was set). Negative values are kept as-is.
    pub timestamp: Option<i64>,

    /// Raw INT1 source register.
    pub int1_flags: u8,

    /// Raw INT2 source register.
    pub int2_flags: u8,

    /// Battery voltage at log time, newer log formats only.
    pub battery_volts: Option<f32>,

    /// A double-click marker appeared inside this burst.
    pub double_click: bool,

    /// A bad-FIFO marker appeared inside this burst.
    pub bad_fifo: bool,
}

impl WakeSample {
    /// True when every FIFO slot holds a reading.
    pub fn is_full(&self) -> bool {
        self.triplets.iter().all(Option::is_some)
    }

    /// Number of readings actually captured.
    pub fn depth(&self) -> usize {
        self.triplets.iter().filter(|r| r.is_some()).count()
    }

    /// Woken by a plain Y interrupt.
    pub fn trigger_y(&self) -> bool {
        !self.is_super_y() && self.int1_flags & int_flags::Y_ANY != 0
    }

    /// Woken by a plain Z interrupt.
    pub fn trigger_z(&self) -> bool {
        !self.is_super_y() && self.int1_flags & int_flags::Z_ANY != 0
    }

    /// Woken by the super-Y path. Excludes both plain triggers.
    pub fn is_super_y(&self) -> bool {
        self.int2_flags & int_flags::SUPER != 0
    }

    /// Reading values for one axis with absent slots as 0.
    pub fn axis_values(&self, axis: Axis) -> [i32; FIFO_DEPTH] {
        let mut out = [0i32; FIFO_DEPTH];
        for (slot, reading) in out.iter_mut().zip(self.triplets.iter()) {
            if let Some(t) = reading {
                *slot = t.axis(axis) as i32;
            }
        }
        out
    }

    /// Running sums along one axis, as computed by the on-device filters.
    pub fn cumulative(&self, axis: Axis) -> [i32; FIFO_DEPTH] {
        let mut sums = self.axis_values(axis);
        for i in 1..FIFO_DEPTH {
            sums[i] += sums[i - 1];
        }
        sums
    }

    /// Most recent reading, if any was captured.
    pub fn last_reading(&self) -> Option<Triplet> {
        self.triplets[FIFO_DEPTH - 1]
    }

    /// Flattened 96-length feature vector (x block, y block, z block).
    ///
    /// Absent readings count as 0 here and only here; the sample itself keeps
    /// them as `None`.
    pub fn feature_vector(&self) -> [f64; FEATURE_LEN] {
        let mut v = [0.0f64; FEATURE_LEN];
        for axis in Axis::ALL {
            let base = axis.feature_offset();
            for (i, value) in self.axis_values(axis).iter().enumerate() {
                v[base + i] = *value as f64;
            }
        }
        v
    }
}

// ============================================================================
// BATTERY SAMPLE
// ============================================================================

/// A battery voltage record interleaved in the same log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatterySample {
    /// Seconds since epoch.
    pub timestamp: i64,
    /// Battery voltage in volts.
    pub volts: f32,
}

impl BatterySample {
    pub fn new(timestamp: i64, volts: f32) -> Self {
        Self { timestamp, volts }
    }
}

/// Decoded record, in log order.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Wake(WakeSample),
    Battery(BatterySample),
}

impl Record {
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Record::Wake(w) => w.timestamp,
            Record::Battery(b) => Some(b.timestamp),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_full_and_depth() {
        let mut s = ramp_sample(1, true);
        assert!(s.is_full());
        assert_eq!(s.depth(), 32);

        s.triplets[0] = None;
        s.triplets[1] = None;
        assert!(!s.is_full());
        assert_eq!(s.depth(), 30);
    }

    #[test]
    fn test_trigger_flags_exclusive_with_super() {
        let mut s = ramp_sample(1, true);
        s.int1_flags = int_flags::YH | int_flags::ZL;
        assert!(s.trigger_y());
        assert!(s.trigger_z());
        assert!(!s.is_super_y());

        s.int2_flags = int_flags::SUPER;
        assert!(s.is_super_y());
        assert!(!s.trigger_y());
        assert!(!s.trigger_z());
    }

    #[test]
    fn test_feature_vector_layout_and_absent_as_zero() {
        let mut s = ramp_sample(1, true);
        s.triplets[0] = None;
        let v = s.feature_vector();
        assert_eq!(v.len(), FEATURE_LEN);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[5], 5.0);
        assert_eq!(v[FIFO_DEPTH + 5], -5.0);
        assert_eq!(v[2 * FIFO_DEPTH + 5], 2.0);
        // Sample itself still carries the absent marker.
        assert!(s.triplets[0].is_none());
    }

    #[test]
    fn test_cumulative_sums() {
        let s = constant_sample(1, true, Triplet::new(2, -1, 3));
        let cx = s.cumulative(Axis::X);
        let cy = s.cumulative(Axis::Y);
        assert_eq!(cx[0], 2);
        assert_eq!(cx[31], 64);
        assert_eq!(cy[9], -10);
    }

    #[test]
    fn test_record_timestamp() {
        let b = Record::Battery(BatterySample::new(42, 3.1));
        assert_eq!(b.timestamp(), Some(42));
        let mut s = ramp_sample(1, false);
        s.timestamp = None;
        assert_eq!(Record::Wake(s).timestamp(), None);
    }
}
