//! Resynchronizing decoder for wake sensor logs.
//!
//! Scans a finite byte buffer for start markers, assembles wake bursts and
//! battery records, and keeps going past noise, padding and malformed bursts.
//!
//! Error scope:
//! - A malformed burst (bad header, too many triplets) is recorded as a
//!   diagnostic and the search resumes.
//! - Exceeding the resync budget or running out of input mid-record ends the
//!   source; everything decoded before that point is kept.
//! - Timestamp ordering anomalies are recorded, never fatal. Device clocks
//!   are known to reset.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CodecError, DecodeError, FramingError, TruncationError};
use crate::types::{BatterySample, Record, Triplet, WakeSample, FIFO_DEPTH};
use crate::wire::{
    read_triplet, volts_from_raw, BatteryRecord, BurstHeader, ByteCursor, BAD_FIFO_MARKER,
    BAD_FIFO_PAYLOAD, BATTERY_FORMAT_CUTOVER, BATTERY_START, DOUBLE_CLICK_MARKER,
    DOUBLE_CLICK_PAYLOAD, END_MARKER, MARKER_LEN, PADDING_BYTE, PRIMARY_START, TRIPLET_SIZE,
};

/// Parameters for the resync search and format detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Non-marker bytes a single search may skip before the source is abandoned.
    pub max_skip: usize,

    /// Consecutive padding bytes tolerated for free. Longer runs count
    /// toward `max_skip`.
    pub max_padding_run: usize,

    /// First timestamp whose burst header carries a battery byte.
    pub battery_format_cutover: i32,

    /// Recognize the bad-FIFO sub-marker inside bursts.
    pub recognize_bad_fifo_marker: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_skip: 2048,
            max_padding_run: 256 * 1024,
            battery_format_cutover: BATTERY_FORMAT_CUTOVER,
            recognize_bad_fifo_marker: true,
        }
    }
}

/// Which start marker a search matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Primary,
    Battery,
}

/// Timestamp ordering problem between consecutive records of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingAnomaly {
    /// Same timestamp as the previous record.
    Duplicate { timestamp: i64 },
    /// Earlier than the previous record.
    Regression { previous: i64, timestamp: i64 },
}

/// Non-fatal event observed while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A partially matched start marker was broken by a mismatching byte.
    PartialMarkerDiscarded {
        offset: usize,
        marker: MarkerKind,
        progress: usize,
    },
    /// A burst closed with zero triplets.
    EmptyBurst { offset: usize },
    /// A burst was dropped; decoding resumed at the next marker.
    BurstDiscarded(FramingError),
    /// A record was emitted out of timestamp order.
    Ordering {
        offset: usize,
        sample_id: Option<u64>,
        anomaly: OrderingAnomaly,
    },
}

/// Outcome of decoding one source, apart from the records themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeSummary {
    pub source: Arc<str>,
    pub diagnostics: Vec<Diagnostic>,
    /// Why decoding stopped early, if it did.
    pub termination: Option<DecodeError>,
    /// First id not handed out; pass it to the next decoder.
    pub next_id: u64,
    pub bytes_consumed: usize,
    pub wake_count: usize,
    pub battery_count: usize,
}

impl DecodeSummary {
    /// Ordering anomalies only.
    pub fn ordering_anomalies(&self) -> impl Iterator<Item = &OrderingAnomaly> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Ordering { anomaly, .. } => Some(anomaly),
            _ => None,
        })
    }

    /// Bursts dropped for framing errors.
    pub fn discarded_bursts(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::BurstDiscarded(_)))
            .count()
    }
}

/// All records of one source plus its summary.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub wake: Vec<WakeSample>,
    pub battery: Vec<BatterySample>,
    pub summary: DecodeSummary,
}

/// Decode a whole buffer, handing out ids from `first_id`.
pub fn decode_source(
    source: &str,
    bytes: &[u8],
    config: &DecoderConfig,
    first_id: u64,
) -> DecodedSource {
    let mut decoder = StreamDecoder::new(source, bytes, config.clone()).with_first_id(first_id);
    let mut wake = Vec::new();
    let mut battery = Vec::new();
    for record in decoder.by_ref() {
        match record {
            Record::Wake(w) => wake.push(w),
            Record::Battery(b) => battery.push(b),
        }
    }
    DecodedSource {
        wake,
        battery,
        summary: decoder.finish(),
    }
}

/// Stateful scanner over one byte source.
///
/// Iterates over decoded [`Record`]s in log order. Must run single-threaded
/// per source; independent sources can be decoded in parallel.
pub struct StreamDecoder<'a> {
    cursor: ByteCursor<'a>,
    config: DecoderConfig,
    source: Arc<str>,
    next_id: u64,
    last_timestamp: Option<i64>,
    diagnostics: Vec<Diagnostic>,
    termination: Option<DecodeError>,
    finished: bool,
    wake_count: usize,
    battery_count: usize,
}

impl<'a> StreamDecoder<'a> {
    pub fn new(source: &str, bytes: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            cursor: ByteCursor::new(bytes),
            config,
            source: Arc::from(source),
            next_id: 0,
            last_timestamp: None,
            diagnostics: Vec::new(),
            termination: None,
            finished: false,
            wake_count: 0,
            battery_count: 0,
        }
    }

    /// Start the id counter at `first_id`.
    pub fn with_first_id(mut self, first_id: u64) -> Self {
        self.next_id = first_id;
        self
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Consume the decoder and report how decoding went.
    pub fn finish(self) -> DecodeSummary {
        DecodeSummary {
            source: self.source,
            diagnostics: self.diagnostics,
            termination: self.termination,
            next_id: self.next_id,
            bytes_consumed: self.cursor.position(),
            wake_count: self.wake_count,
            battery_count: self.battery_count,
        }
    }

    fn terminate(&mut self, error: DecodeError) {
        warn!(source = %self.source, %error, "decoding stopped");
        self.termination = Some(error);
        self.finished = true;
    }

    fn truncation(&self, offset: usize, needed: usize) -> TruncationError {
        TruncationError {
            offset,
            needed,
            available: self.cursor.remaining(),
        }
    }

    fn discard_burst(&mut self, error: FramingError) {
        warn!(source = %self.source, %error, "burst discarded");
        self.diagnostics.push(Diagnostic::BurstDiscarded(error));
    }

    /// Scan forward to the next complete start marker.
    ///
    /// Returns the marker kind and the offset of its first byte, or `None`
    /// on a clean end of input.
    fn resync(&mut self) -> Result<Option<(MarkerKind, usize)>, DecodeError> {
        let budget = self.config.max_skip;
        let mut primary = 0usize;
        let mut battery = 0usize;
        let mut skipped = 0usize;
        let mut padding_run = 0usize;

        loop {
            let offset = self.cursor.position();
            let Some(byte) = self.cursor.next_byte() else {
                let progress = primary.max(battery);
                if progress > 0 {
                    return Err(TruncationError {
                        offset,
                        needed: MARKER_LEN - progress,
                        available: 0,
                    }
                    .into());
                }
                return Ok(None);
            };

            let prev = (primary, battery);
            primary = if byte == PRIMARY_START[primary] { primary + 1 } else { 0 };
            battery = if byte == BATTERY_START[battery] { battery + 1 } else { 0 };

            for (marker, before, after) in [
                (MarkerKind::Primary, prev.0, primary),
                (MarkerKind::Battery, prev.1, battery),
            ] {
                if before > 0 && after == 0 {
                    debug!(offset, ?marker, progress = before, "partial marker discarded");
                    self.diagnostics.push(Diagnostic::PartialMarkerDiscarded {
                        offset,
                        marker,
                        progress: before,
                    });
                    skipped += before;
                }
            }

            if byte == PADDING_BYTE {
                padding_run += 1;
                if padding_run > self.config.max_padding_run {
                    skipped += 1;
                }
            } else {
                padding_run = 0;
                if primary == 0 && battery == 0 {
                    skipped += 1;
                }
            }

            if skipped > budget {
                return Err(FramingError::SkipBudgetExceeded {
                    offset,
                    skipped,
                    budget,
                }
                .into());
            }

            if primary == MARKER_LEN {
                return Ok(Some((MarkerKind::Primary, offset + 1 - MARKER_LEN)));
            }
            if battery == MARKER_LEN {
                return Ok(Some((MarkerKind::Battery, offset + 1 - MARKER_LEN)));
            }
        }
    }

    /// Decode a burst whose start marker began at `marker_offset`.
    ///
    /// `Ok(None)` means the burst was dropped (empty or malformed) and the
    /// search should continue.
    fn read_burst(&mut self, marker_offset: usize) -> Result<Option<WakeSample>, TruncationError> {
        let header_offset = self.cursor.position();
        let header = match BurstHeader::read_from(
            self.cursor.rest(),
            self.config.battery_format_cutover,
        ) {
            Ok((header, used)) => {
                self.cursor.advance(used);
                header
            }
            Err(CodecError::Truncated { needed, .. }) => {
                return Err(self.truncation(header_offset, needed));
            }
            Err(source) => {
                self.discard_burst(FramingError::InvalidHeader {
                    offset: marker_offset,
                    source,
                });
                // The marker may have started one byte late inside a longer run.
                self.cursor.set_position(marker_offset + 1);
                return Ok(None);
            }
        };

        let mut readings: Vec<Triplet> = Vec::with_capacity(FIFO_DEPTH);
        let mut double_click = false;
        let mut bad_fifo = false;

        loop {
            let offset = self.cursor.position();
            let Some(next) = self.cursor.peek(MARKER_LEN) else {
                return Err(self.truncation(offset, MARKER_LEN));
            };

            if next == END_MARKER {
                self.cursor.advance(MARKER_LEN);
                break;
            }
            if next == DOUBLE_CLICK_MARKER {
                self.skip_sub_marker(DOUBLE_CLICK_PAYLOAD)?;
                double_click = true;
                continue;
            }
            if self.config.recognize_bad_fifo_marker && next == BAD_FIFO_MARKER {
                self.skip_sub_marker(BAD_FIFO_PAYLOAD)?;
                bad_fifo = true;
                continue;
            }

            if readings.len() == FIFO_DEPTH {
                self.discard_burst(FramingError::TooManyTriplets {
                    offset: marker_offset,
                    max: FIFO_DEPTH,
                });
                return Ok(None);
            }
            let triplet = read_triplet(next).map_err(|_| self.truncation(offset, TRIPLET_SIZE))?;
            readings.push(triplet);
            self.cursor.advance(TRIPLET_SIZE);
        }

        if readings.is_empty() {
            debug!(source = %self.source, offset = marker_offset, "empty burst dropped");
            self.diagnostics.push(Diagnostic::EmptyBurst {
                offset: marker_offset,
            });
            return Ok(None);
        }

        let mut triplets = [None; FIFO_DEPTH];
        let first = FIFO_DEPTH - readings.len();
        for (slot, t) in triplets[first..].iter_mut().zip(readings) {
            *slot = Some(t);
        }

        let id = self.next_id;
        self.next_id += 1;
        let timestamp = (header.timestamp != 0).then_some(header.timestamp as i64);
        self.check_order(marker_offset, Some(id), timestamp);

        Ok(Some(WakeSample {
            id,
            source: Arc::clone(&self.source),
            triplets,
            confirmed: header.confirmed,
            wake_time_ms: header.wake_time_ms(),
            timestamp,
            int1_flags: header.int1,
            int2_flags: header.int2,
            battery_volts: header.battery_raw.map(volts_from_raw),
            double_click,
            bad_fifo,
        }))
    }

    fn skip_sub_marker(&mut self, payload: usize) -> Result<(), TruncationError> {
        let offset = self.cursor.position();
        match self.cursor.take(MARKER_LEN + payload) {
            Some(_) => Ok(()),
            None => Err(self.truncation(offset, MARKER_LEN + payload)),
        }
    }

    fn read_battery(&mut self, marker_offset: usize) -> Result<BatterySample, TruncationError> {
        let offset = self.cursor.position();
        let record = BatteryRecord::read_from(self.cursor.rest())
            .map_err(|_| self.truncation(offset, BatteryRecord::SIZE))?;
        self.cursor.advance(BatteryRecord::SIZE);

        let sample = BatterySample::new(record.timestamp as i64, record.volts());
        self.check_order(marker_offset, None, Some(sample.timestamp));
        Ok(sample)
    }

    fn check_order(&mut self, offset: usize, sample_id: Option<u64>, timestamp: Option<i64>) {
        let Some(timestamp) = timestamp else {
            return;
        };
        if let Some(previous) = self.last_timestamp {
            let anomaly = if timestamp == previous {
                Some(OrderingAnomaly::Duplicate { timestamp })
            } else if timestamp < previous {
                Some(OrderingAnomaly::Regression {
                    previous,
                    timestamp,
                })
            } else {
                None
            };
            if let Some(anomaly) = anomaly {
                warn!(source = %self.source, offset, ?sample_id, ?anomaly, "timestamp out of order");
                self.diagnostics.push(Diagnostic::Ordering {
                    offset,
                    sample_id,
                    anomaly,
                });
            }
        }
        self.last_timestamp = Some(timestamp);
    }
}

impl Iterator for StreamDecoder<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while !self.finished {
            let (kind, marker_offset) = match self.resync() {
                Ok(Some(found)) => found,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(error) => {
                    self.terminate(error);
                    return None;
                }
            };

            match kind {
                MarkerKind::Primary => match self.read_burst(marker_offset) {
                    Ok(Some(sample)) => {
                        self.wake_count += 1;
                        return Some(Record::Wake(sample));
                    }
                    Ok(None) => continue,
                    Err(error) => self.terminate(error.into()),
                },
                MarkerKind::Battery => match self.read_battery(marker_offset) {
                    Ok(sample) => {
                        self.battery_count += 1;
                        return Some(Record::Battery(sample));
                    }
                    Err(error) => self.terminate(error.into()),
                },
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{BatteryRecord, FrameWriter, CONFIRMED_BYTE};

    fn header(timestamp: i32) -> BurstHeader {
        BurstHeader {
            confirmed: true,
            int1: 0x0C,
            int2: 0x00,
            timestamp,
            wake_ticks: 2500,
            battery_raw: None,
        }
    }

    fn triplets(n: usize) -> Vec<Triplet> {
        (0..n)
            .map(|i| Triplet::new(i as i8, -(i as i8), 10))
            .collect()
    }

    fn decode(bytes: &[u8]) -> DecodedSource {
        decode_source("unit.bin", bytes, &DecoderConfig::default(), 0)
    }

    #[test]
    fn test_full_burst_roundtrip() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(32));
        let out = decode(w.as_bytes());

        assert_eq!(out.wake.len(), 1);
        let s = &out.wake[0];
        assert!(s.is_full());
        assert!(s.confirmed);
        assert_eq!(s.timestamp, Some(1_000));
        assert_eq!(s.wake_time_ms, 2500);
        assert_eq!(s.int1_flags, 0x0C);
        assert_eq!(s.battery_volts, None);
        assert_eq!(s.triplets[31], Some(Triplet::new(31, -31, 10)));
        assert!(out.summary.termination.is_none());
        assert_eq!(out.summary.next_id, 1);
    }

    #[test]
    fn test_short_burst_left_padded() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(5));
        let out = decode(w.as_bytes());

        let s = &out.wake[0];
        assert!(!s.is_full());
        assert!(s.triplets[..27].iter().all(Option::is_none));
        assert_eq!(s.triplets[27], Some(Triplet::new(0, 0, 10)));
        assert_eq!(s.triplets[31], Some(Triplet::new(4, -4, 10)));
    }

    #[test]
    fn test_empty_burst_dropped() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &[]);
        w.write_burst(&header(1_001), &triplets(3));
        let out = decode(w.as_bytes());

        assert_eq!(out.wake.len(), 1);
        assert!(out
            .summary
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::EmptyBurst { .. })));
    }

    #[test]
    fn test_too_many_triplets_discards_burst_only() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(33));
        w.write_burst(&header(1_001), &triplets(32));
        let out = decode(w.as_bytes());

        assert_eq!(out.wake.len(), 1);
        assert_eq!(out.wake[0].timestamp, Some(1_001));
        assert_eq!(out.summary.discarded_bursts(), 1);
        assert!(out.summary.termination.is_none());
    }

    #[test]
    fn test_battery_record_interleaved() {
        let mut w = FrameWriter::new();
        w.write_battery(&BatteryRecord {
            timestamp: 500,
            raw_volt: 100,
        });
        w.write_burst(&header(600), &triplets(32));
        let out = decode(w.as_bytes());

        assert_eq!(out.battery.len(), 1);
        assert_eq!(out.battery[0].timestamp, 500);
        assert_eq!(out.wake.len(), 1);
        assert_eq!(out.summary.battery_count, 1);
    }

    #[test]
    fn test_battery_byte_after_cutover() {
        let mut w = FrameWriter::new();
        let mut h = header(BATTERY_FORMAT_CUTOVER + 60);
        h.battery_raw = Some(128);
        w.write_burst(&h, &triplets(32));
        let out = decode(w.as_bytes());
        assert_eq!(out.wake[0].battery_volts, Some(volts_from_raw(128)));
    }

    #[test]
    fn test_zero_timestamp_is_absent() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(0), &triplets(32));
        let out = decode(w.as_bytes());
        assert_eq!(out.wake[0].timestamp, None);
    }

    #[test]
    fn test_negative_timestamp_survives_reencode() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(-5), &triplets(32));
        let out = decode(w.as_bytes());
        assert_eq!(out.wake[0].timestamp, Some(-5));

        let mut again = FrameWriter::new();
        again.write_sample(&out.wake[0]);
        assert_eq!(again.as_bytes(), w.as_bytes());
    }

    #[test]
    fn test_sub_markers_do_not_end_burst() {
        let mut w = FrameWriter::new();
        w.write_raw(&PRIMARY_START);
        let mut body = Vec::new();
        header(1_000).write_to(&mut body, BATTERY_FORMAT_CUTOVER);
        w.write_raw(&body);
        w.write_raw(&[1, 2, 3]);
        w.write_raw(&DOUBLE_CLICK_MARKER).write_raw(&[0x20]);
        w.write_raw(&[4, 5, 6]);
        w.write_raw(&BAD_FIFO_MARKER).write_raw(&[0x1F]);
        w.write_raw(&[7, 8, 9]);
        w.write_raw(&END_MARKER);
        let out = decode(w.as_bytes());

        let s = &out.wake[0];
        assert_eq!(s.depth(), 3);
        assert!(s.double_click);
        assert!(s.bad_fifo);
        assert_eq!(s.triplets[31], Some(Triplet::new(7, 8, 9)));
    }

    #[test]
    fn test_bad_fifo_recognition_optional() {
        let mut bytes = PRIMARY_START.to_vec();
        header(1_000).write_to(&mut bytes, BATTERY_FORMAT_CUTOVER);
        bytes.extend_from_slice(&BAD_FIFO_MARKER);
        bytes.extend_from_slice(&[0x1F, 0x1F, 0x1F]);
        bytes.extend_from_slice(&END_MARKER);

        let config = DecoderConfig {
            recognize_bad_fifo_marker: false,
            ..DecoderConfig::default()
        };
        let out = decode_source("unit.bin", &bytes, &config, 0);
        let s = &out.wake[0];
        assert!(!s.bad_fifo);
        assert_eq!(s.depth(), 2);
    }

    #[test]
    fn test_resync_over_garbage_and_partial_markers() {
        let mut w = FrameWriter::new();
        w.write_raw(&[0x00, 0x77, 0x77, 0x13, 0x66, 0x42]);
        w.write_padding(64);
        w.write_burst(&header(1_000), &triplets(32));
        let out = decode(w.as_bytes());

        assert_eq!(out.wake.len(), 1);
        let discarded: Vec<_> = out
            .summary
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::PartialMarkerDiscarded { .. }))
            .collect();
        assert_eq!(discarded.len(), 2);
    }

    #[test]
    fn test_skip_budget_boundary() {
        let config = DecoderConfig {
            max_skip: 16,
            ..DecoderConfig::default()
        };
        let mut ok = FrameWriter::new();
        ok.write_raw(&[0x00; 16]).write_burst(&header(1_000), &triplets(32));
        let out = decode_source("ok.bin", ok.as_bytes(), &config, 0);
        assert_eq!(out.wake.len(), 1);

        let mut bad = FrameWriter::new();
        bad.write_raw(&[0x00; 17]).write_burst(&header(1_000), &triplets(32));
        let out = decode_source("bad.bin", bad.as_bytes(), &config, 0);
        assert!(out.wake.is_empty());
        assert!(matches!(
            out.summary.termination,
            Some(DecodeError::Framing(FramingError::SkipBudgetExceeded { skipped: 17, budget: 16, .. }))
        ));
    }

    #[test]
    fn test_padding_run_limit_counts_toward_budget() {
        let config = DecoderConfig {
            max_skip: 4,
            max_padding_run: 8,
            ..DecoderConfig::default()
        };
        let mut w = FrameWriter::new();
        w.write_padding(12).write_burst(&header(1_000), &triplets(32));
        assert_eq!(decode_source("a", w.as_bytes(), &config, 0).wake.len(), 1);

        let mut w = FrameWriter::new();
        w.write_padding(13).write_burst(&header(1_000), &triplets(32));
        let out = decode_source("b", w.as_bytes(), &config, 0);
        assert!(out.wake.is_empty());
        assert!(out.summary.termination.is_some());
    }

    #[test]
    fn test_truncated_burst_keeps_earlier_samples() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(32));
        w.write_burst(&header(1_001), &triplets(32));
        let bytes = w.as_bytes();
        let cut = &bytes[..bytes.len() - 10];
        let out = decode(cut);

        assert_eq!(out.wake.len(), 1);
        assert!(matches!(out.summary.termination, Some(DecodeError::Truncated(_))));
    }

    #[test]
    fn test_truncated_marker_at_end() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(4));
        w.write_raw(&[0x77, 0x77]);
        let out = decode(w.as_bytes());
        assert_eq!(out.wake.len(), 1);
        assert!(matches!(
            out.summary.termination,
            Some(DecodeError::Truncated(TruncationError { needed: 1, .. }))
        ));
    }

    #[test]
    fn test_invalid_header_rescans_inside_marker_run() {
        // Four 0x77 bytes: the first match fails on the header, the shifted one succeeds.
        let mut bytes = vec![0x77];
        let mut w = FrameWriter::new();
        w.write_burst(&header(1_000), &triplets(2));
        bytes.extend_from_slice(w.as_bytes());
        let out = decode(&bytes);

        assert_eq!(out.wake.len(), 1);
        assert_eq!(out.summary.discarded_bursts(), 1);
        assert_eq!(bytes[4], CONFIRMED_BYTE);
    }

    #[test]
    fn test_ordering_anomalies_recorded_not_fatal() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(2_000), &triplets(32));
        w.write_burst(&header(2_000), &triplets(32));
        w.write_burst(&header(1_000), &triplets(32));
        let out = decode(w.as_bytes());

        assert_eq!(out.wake.len(), 3);
        let anomalies: Vec<_> = out.summary.ordering_anomalies().copied().collect();
        assert_eq!(
            anomalies,
            vec![
                OrderingAnomaly::Duplicate { timestamp: 2_000 },
                OrderingAnomaly::Regression {
                    previous: 2_000,
                    timestamp: 1_000
                },
            ]
        );
    }

    #[test]
    fn test_ids_continue_from_first_id() {
        let mut w = FrameWriter::new();
        w.write_burst(&header(1), &triplets(1));
        w.write_burst(&header(2), &triplets(1));
        let out = decode_source("ids", w.as_bytes(), &DecoderConfig::default(), 40);
        let ids: Vec<u64> = out.wake.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![40, 41]);
        assert_eq!(out.summary.next_id, 42);
    }
}
