//! Binary log format of the wake sensor.
//!
//! Pure (de)serialization of the fixed record shapes the firmware appends to
//! flash. Nothing here searches for markers or recovers from noise; that is
//! the stream decoder's job.
//!
//! All multi-byte fields are little-endian.
//!
//! # Wake burst
//!
//! ```text
//! ┌──────────┬───────────┬──────┬──────┬───────────┬────────────┬─────────┬─────────────┬──────────┐
//! │ 77 77 77 │ CC or EE  │ int1 │ int2 │ timestamp │ wake_ticks │ [vbatt] │ xyz × 1..32 │ 7F 7F 7F │
//! │ 3 bytes  │ 1 byte    │ 1    │ 1    │ i32       │ u32        │ 1 byte  │ 3 bytes each│ 3 bytes  │
//! └──────────┴───────────┴──────┴──────┴───────────┴────────────┴─────────┴─────────────┴──────────┘
//! ```
//!
//! The battery byte is present only when `timestamp` is at or after the
//! format cutover.
//!
//! # Battery record
//!
//! ```text
//! ┌──────────┬───────────┬──────────┐
//! │ 66 66 66 │ timestamp │ raw_volt │
//! │ 3 bytes  │ u32       │ u8       │
//! └──────────┴───────────┴──────────┘
//! ```
//!
//! Voltage is `(2048 + 4 × raw) / 1024` volts for both record kinds.

use crate::error::CodecError;
use crate::types::{BatterySample, Triplet, WakeSample, MS_PER_TICK};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Marker length in bytes (all markers are three identical bytes).
pub const MARKER_LEN: usize = 3;

/// Start of a wake burst.
pub const PRIMARY_START: [u8; MARKER_LEN] = [0x77; MARKER_LEN];

/// Start of a battery record.
pub const BATTERY_START: [u8; MARKER_LEN] = [0x66; MARKER_LEN];

/// End of a wake burst.
pub const END_MARKER: [u8; MARKER_LEN] = [0x7F; MARKER_LEN];

/// Double-click marker, may appear between triplets.
pub const DOUBLE_CLICK_MARKER: [u8; MARKER_LEN] = [0x7E; MARKER_LEN];

/// Bad-FIFO marker, may appear between triplets.
///
/// Best-effort: the exact pattern written by older firmware is unconfirmed.
pub const BAD_FIFO_MARKER: [u8; MARKER_LEN] = [0x7D; MARKER_LEN];

/// Payload bytes following a double-click marker (click source register).
pub const DOUBLE_CLICK_PAYLOAD: usize = 1;

/// Payload bytes following a bad-FIFO marker (reported FIFO depth).
pub const BAD_FIFO_PAYLOAD: usize = 1;

/// Erased flash filler.
pub const PADDING_BYTE: u8 = 0xFF;

/// Confirmed flag byte.
pub const CONFIRMED_BYTE: u8 = 0xCC;

/// Unconfirmed flag byte.
pub const UNCONFIRMED_BYTE: u8 = 0xEE;

/// First timestamp whose burst header carries a battery byte (2016-03-01 UTC).
pub const BATTERY_FORMAT_CUTOVER: i32 = 1_456_790_400;

/// Decode a raw battery byte to volts.
#[inline]
pub fn volts_from_raw(raw: u8) -> f32 {
    (2048.0 + 4.0 * raw as f32) / 1024.0
}

/// Encode volts to the nearest raw battery byte, saturating.
#[inline]
pub fn raw_from_volts(volts: f32) -> u8 {
    let raw = ((volts * 1024.0 - 2048.0) / 4.0).round();
    raw.clamp(0.0, 255.0) as u8
}

#[inline]
fn need(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        Err(CodecError::Truncated {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

// ============================================================================
// BURST HEADER (11 or 12 bytes)
// ============================================================================

/// Header following the primary start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstHeader {
    pub confirmed: bool,
    pub int1: u8,
    pub int2: u8,
    pub timestamp: i32,
    pub wake_ticks: u32,
    /// Raw battery byte; only written when `timestamp` is past the cutover.
    pub battery_raw: Option<u8>,
}

impl BurstHeader {
    /// Fixed part of the header.
    pub const BASE_SIZE: usize = 11;

    /// Header size for a given timestamp and cutover.
    #[inline]
    pub fn size_for(timestamp: i32, cutover: i32) -> usize {
        if timestamp >= cutover {
            Self::BASE_SIZE + 1
        } else {
            Self::BASE_SIZE
        }
    }

    /// Wake duration in milliseconds.
    #[inline]
    pub fn wake_time_ms(&self) -> u32 {
        self.wake_ticks.saturating_mul(MS_PER_TICK)
    }

    /// Write header to buffer. Returns bytes written.
    pub fn write_to(&self, out: &mut Vec<u8>, cutover: i32) -> usize {
        out.push(if self.confirmed {
            CONFIRMED_BYTE
        } else {
            UNCONFIRMED_BYTE
        });
        out.push(self.int1);
        out.push(self.int2);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.wake_ticks.to_le_bytes());
        if self.timestamp >= cutover {
            out.push(self.battery_raw.unwrap_or(0));
        }
        Self::size_for(self.timestamp, cutover)
    }

    /// Read header from buffer. Returns the header and bytes consumed.
    pub fn read_from(buf: &[u8], cutover: i32) -> Result<(Self, usize), CodecError> {
        need(buf, Self::BASE_SIZE)?;
        let confirmed = match buf[0] {
            CONFIRMED_BYTE => true,
            UNCONFIRMED_BYTE => false,
            other => return Err(CodecError::InvalidConfirmedByte(other)),
        };
        let timestamp = i32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
        let wake_ticks = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]);
        let size = Self::size_for(timestamp, cutover);
        need(buf, size)?;
        let battery_raw = (size > Self::BASE_SIZE).then(|| buf[Self::BASE_SIZE]);

        Ok((
            Self {
                confirmed,
                int1: buf[1],
                int2: buf[2],
                timestamp,
                wake_ticks,
                battery_raw,
            },
            size,
        ))
    }
}

// ============================================================================
// ACCEL TRIPLET (3 bytes)
// ============================================================================

pub const TRIPLET_SIZE: usize = 3;

#[inline]
pub fn write_triplet(t: &Triplet, out: &mut Vec<u8>) -> usize {
    out.extend_from_slice(&[t.x as u8, t.y as u8, t.z as u8]);
    TRIPLET_SIZE
}

#[inline]
pub fn read_triplet(buf: &[u8]) -> Result<Triplet, CodecError> {
    need(buf, TRIPLET_SIZE)?;
    Ok(Triplet::new(buf[0] as i8, buf[1] as i8, buf[2] as i8))
}

// ============================================================================
// BATTERY RECORD (5 bytes)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryRecord {
    pub timestamp: u32,
    pub raw_volt: u8,
}

impl BatteryRecord {
    pub const SIZE: usize = 5;

    #[inline]
    pub fn volts(&self) -> f32 {
        volts_from_raw(self.raw_volt)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(self.raw_volt);
        Self::SIZE
    }

    pub fn read_from(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, Self::SIZE)?;
        Ok(Self {
            timestamp: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            raw_volt: buf[4],
        })
    }
}

// ============================================================================
// FRAME WRITER
// ============================================================================

/// Builds log byte streams, for fixtures and for re-encoding decoded samples.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buffer: Vec<u8>,
    cutover: i32,
    records: u64,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::with_cutover(BATTERY_FORMAT_CUTOVER)
    }

    /// Writer for a log using a non-default battery format cutover.
    pub fn with_cutover(cutover: i32) -> Self {
        Self {
            buffer: Vec::new(),
            cutover,
            records: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Number of complete records written.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Write a complete wake burst: start marker, header, triplets, end marker.
    pub fn write_burst(&mut self, header: &BurstHeader, triplets: &[Triplet]) -> &mut Self {
        self.buffer.extend_from_slice(&PRIMARY_START);
        header.write_to(&mut self.buffer, self.cutover);
        for t in triplets {
            write_triplet(t, &mut self.buffer);
        }
        self.buffer.extend_from_slice(&END_MARKER);
        self.records += 1;
        self
    }

    /// Write a battery record with its start marker.
    pub fn write_battery(&mut self, record: &BatteryRecord) -> &mut Self {
        self.buffer.extend_from_slice(&BATTERY_START);
        record.write_to(&mut self.buffer);
        self.records += 1;
        self
    }

    /// Re-encode a decoded sample, sub-markers included.
    ///
    /// Absent readings are not written. The decoder pads them back.
    pub fn write_sample(&mut self, sample: &WakeSample) -> &mut Self {
        let header = BurstHeader {
            confirmed: sample.confirmed,
            int1: sample.int1_flags,
            int2: sample.int2_flags,
            timestamp: sample.timestamp.map_or(0, |t| t as i32),
            wake_ticks: sample.wake_time_ms / MS_PER_TICK,
            battery_raw: sample.battery_volts.map(raw_from_volts),
        };
        self.buffer.extend_from_slice(&PRIMARY_START);
        header.write_to(&mut self.buffer, self.cutover);
        if sample.double_click {
            self.buffer.extend_from_slice(&DOUBLE_CLICK_MARKER);
            self.buffer.extend(std::iter::repeat(0u8).take(DOUBLE_CLICK_PAYLOAD));
        }
        if sample.bad_fifo {
            self.buffer.extend_from_slice(&BAD_FIFO_MARKER);
            self.buffer.extend(std::iter::repeat(0u8).take(BAD_FIFO_PAYLOAD));
        }
        for t in sample.triplets.iter().flatten() {
            write_triplet(t, &mut self.buffer);
        }
        self.buffer.extend_from_slice(&END_MARKER);
        self.records += 1;
        self
    }

    /// Re-encode a battery sample.
    pub fn write_battery_sample(&mut self, sample: &BatterySample) -> &mut Self {
        self.write_battery(&BatteryRecord {
            timestamp: sample.timestamp as u32,
            raw_volt: raw_from_volts(sample.volts),
        })
    }

    /// Append raw bytes (noise, partial records, sub-markers).
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Append erased-flash filler.
    pub fn write_padding(&mut self, count: usize) -> &mut Self {
        self.buffer
            .extend(std::iter::repeat(PADDING_BYTE).take(count));
        self
    }
}

// ============================================================================
// BYTE CURSOR (zero-copy reads)
// ============================================================================

/// Zero-copy cursor over a finite log buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes.
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.position.min(self.buffer.len())..]
    }

    /// Look at the next `n` bytes without consuming them.
    #[inline]
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        let rest = self.rest();
        (rest.len() >= n).then(|| &rest[..n])
    }

    /// Consume one byte.
    #[inline]
    pub fn next_byte(&mut self) -> Option<u8> {
        let b = *self.buffer.get(self.position)?;
        self.position += 1;
        Some(b)
    }

    /// Consume `n` bytes. Returns `None` without advancing if fewer remain.
    #[inline]
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.peek(n)?;
        self.position += n;
        Some(slice)
    }

    /// Move to an absolute offset, clamped to the end.
    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.buffer.len());
    }

    /// Advance by `n` bytes, clamped to the end.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.position = (self.position + n).min(self.buffer.len());
    }
}

// ============================================================================
// TESTS
// ============================================================================
