/// Stress testing for the decoder and cascade.
///
/// These tests feed large, hostile or pathological inputs that real flash
/// dumps occasionally contain: erased sectors, marker storms, random noise,
/// and very long sessions decoded from several threads at once.

#[cfg(test)]
mod stress_tests {
    use proptest::prelude::*;

    use crate::cascade::CascadePipeline;
    use crate::classifier::Classifier;
    use crate::decoder::{decode_source, DecoderConfig, StreamDecoder};
    use crate::error::{DecodeError, FramingError};
    use crate::firmware;
    use crate::sample_set::SampleSet;
    use crate::types::*;
    use crate::wire::{BatteryRecord, BurstHeader, FrameWriter, PRIMARY_START};

    fn burst_header(k: usize) -> BurstHeader {
        BurstHeader {
            confirmed: k % 3 == 0,
            int1: if k % 2 == 0 { 0x08 } else { 0x20 },
            int2: 0,
            timestamp: 1_420_000_000 + k as i32,
            wake_ticks: 1000 + k as u32,
            battery_raw: None,
        }
    }

    fn readings(k: usize, n: usize) -> Vec<Triplet> {
        (0..n)
            .map(|i| Triplet::new((k % 11) as i8 - 5, (i % 13) as i8 - 6, 20))
            .collect()
    }

    /// A long session log with varied burst depths, noise and padding.
    fn long_log(bursts: usize) -> Vec<u8> {
        let mut w = FrameWriter::new();
        for k in 0..bursts {
            let depth = 1 + k % FIFO_DEPTH;
            w.write_burst(&burst_header(k), &readings(k, depth));
            match k % 4 {
                0 => {
                    w.write_padding(64);
                }
                1 => {
                    w.write_raw(&[0x01, 0x77, 0x77, 0x02, 0x66]);
                }
                2 => {
                    w.write_battery(&BatteryRecord {
                        timestamp: 1_420_000_000 + k as u32,
                        raw_volt: (k % 256) as u8,
                    });
                }
                _ => {}
            }
        }
        w.into_bytes()
    }

    // ============================================================================
    // CATEGORY 1: VOLUME
    // ============================================================================

    /// Ten thousand bursts decode with nothing lost and ids dense.
    #[test]
    fn stress_ten_thousand_bursts() {
        let log = long_log(10_000);
        let out = decode_source("long.bin", &log, &DecoderConfig::default(), 0);

        assert_eq!(out.wake.len(), 10_000);
        assert_eq!(out.battery.len(), 2_500);
        assert!(out.summary.termination.is_none());
        assert_eq!(out.summary.bytes_consumed, log.len());
        assert_eq!(out.summary.next_id, 10_000);
        for (k, s) in out.wake.iter().enumerate() {
            assert_eq!(s.id, k as u64);
            assert_eq!(s.depth(), 1 + k % FIFO_DEPTH);
        }
    }

    /// Independent sources decode in parallel and merge to the sequential result.
    #[test]
    fn stress_parallel_sources() {
        let logs: Vec<Vec<u8>> = (0..8).map(|i| long_log(500 + i * 50)).collect();
        let config = DecoderConfig::default();

        let mut first_ids = Vec::new();
        let mut next = 0u64;
        for i in 0..logs.len() {
            first_ids.push(next);
            next += 500 + i as u64 * 50;
        }

        let parallel: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = logs
                .iter()
                .zip(&first_ids)
                .enumerate()
                .map(|(i, (log, &first))| {
                    let config = &config;
                    scope.spawn(move || decode_source(&format!("log{i}.bin"), log, config, first))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        let mut merged = SampleSet::new();
        for d in parallel {
            merged.combine(SampleSet::from_parts(d.wake, d.battery));
        }

        let sources: Vec<(String, &[u8])> = logs
            .iter()
            .enumerate()
            .map(|(i, l)| (format!("log{i}.bin"), l.as_slice()))
            .collect();
        let (sequential, _) = SampleSet::from_sources(
            sources.iter().map(|(n, b)| (n.as_str(), *b)),
            &config,
        );
        assert_eq!(merged, sequential);
    }

    // ============================================================================
    // CATEGORY 2: PATHOLOGICAL INPUT
    // ============================================================================

    /// An erased sector far longer than the padding allowance ends the source.
    #[test]
    fn stress_erased_flash() {
        let config = DecoderConfig {
            max_padding_run: 4096,
            max_skip: 128,
            ..DecoderConfig::default()
        };
        let mut w = FrameWriter::new();
        w.write_burst(&burst_header(0), &readings(0, 32))
            .write_padding(4096 + 128)
            .write_burst(&burst_header(1), &readings(1, 32));
        let out = decode_source("erased.bin", w.as_bytes(), &config, 0);
        assert_eq!(out.wake.len(), 2);

        let mut w = FrameWriter::new();
        w.write_burst(&burst_header(0), &readings(0, 32))
            .write_padding(4096 + 129)
            .write_burst(&burst_header(1), &readings(1, 32));
        let out = decode_source("erased.bin", w.as_bytes(), &config, 0);
        assert_eq!(out.wake.len(), 1);
        assert!(matches!(
            out.summary.termination,
            Some(DecodeError::Framing(FramingError::SkipBudgetExceeded { .. }))
        ));
    }

    /// A storm of start-marker bytes never yields a sample and never hangs.
    #[test]
    fn stress_marker_storm() {
        let log = vec![PRIMARY_START[0]; 50_000];
        let out = decode_source("storm.bin", &log, &DecoderConfig::default(), 0);
        assert!(out.wake.is_empty());
        assert!(out.summary.termination.is_some());
        assert!(out.summary.discarded_bursts() > 0);
    }

    /// Alternating partial markers of both kinds are tolerated up to the budget.
    #[test]
    fn stress_interleaved_partial_markers() {
        let mut w = FrameWriter::new();
        for _ in 0..200 {
            w.write_raw(&[0x77, 0x77, 0x66, 0x66, 0x00]);
        }
        w.write_burst(&burst_header(0), &readings(0, 8));
        let config = DecoderConfig {
            max_skip: 1_000_000,
            ..DecoderConfig::default()
        };
        let out = decode_source("partials.bin", w.as_bytes(), &config, 0);
        assert_eq!(out.wake.len(), 1);
        assert!(out.summary.diagnostics.len() >= 400);
    }

    proptest! {
        /// Arbitrary bytes never panic, and whatever comes out is well formed.
        #[test]
        fn prop_random_bytes_decode_safely(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
            let mut decoder = StreamDecoder::new("fuzz.bin", &bytes, DecoderConfig::default());
            let mut wake = 0usize;
            for record in decoder.by_ref() {
                if let Record::Wake(s) = record {
                    prop_assert!(s.depth() >= 1);
                    prop_assert!(s.triplets[FIFO_DEPTH - 1].is_some());
                    wake += 1;
                }
            }
            let summary = decoder.finish();
            prop_assert_eq!(summary.wake_count, wake);
            prop_assert!(summary.bytes_consumed <= bytes.len());
        }

        /// Valid bursts survive random noise inserted between them.
        #[test]
        fn prop_noise_between_bursts(gaps in prop::collection::vec(
            prop::collection::vec(0u8..0x60, 0..64), 1..20)
        ) {
            let mut w = FrameWriter::new();
            for (k, gap) in gaps.iter().enumerate() {
                w.write_raw(gap)
                    .write_padding(k % 3)
                    .write_burst(&burst_header(k), &readings(k, 1 + k % FIFO_DEPTH));
            }
            let out = decode_source("noisy.bin", w.as_bytes(), &DecoderConfig::default(), 0);
            prop_assert_eq!(out.wake.len(), gaps.len());
            prop_assert!(out.summary.termination.is_none());
        }
    }

    // ============================================================================
    // CATEGORY 3: DEEP CASCADES
    // ============================================================================

    /// Deeply nested pipelines still conserve every sample at every level.
    #[test]
    fn stress_deeply_nested_cascade() {
        let log = long_log(2_000);
        let out = decode_source("long.bin", &log, &DecoderConfig::default(), 0);
        let set = SampleSet::from_parts(out.wake, out.battery);

        let mut inner = firmware::firmware_cascade().unwrap();
        for depth in 0..30 {
            let cut = (depth % 7) as f64 - 3.0;
            inner = CascadePipeline::new(format!("level {depth}"))
                .with_stage(
                    Classifier::scalar("last y", |s| s.last_reading().unwrap_or_default().y as f64)
                        .accept_above(cut + 3.0)
                        .unwrap()
                        .reject_below(cut - 3.0)
                        .unwrap(),
                )
                .with_stage(inner);
        }
        let mut outer = inner.with_input(set.clone());
        let report = outer.run().unwrap();

        assert!(report.is_conserved());
        assert_eq!(report.aggregate.total(), set.len());
        assert_eq!(report.punted.len(), 0);
    }

    /// Repeated runs never accumulate state.
    #[test]
    fn stress_repeated_runs_are_identical() {
        let log = long_log(1_000);
        let out = decode_source("long.bin", &log, &DecoderConfig::default(), 0);
        let mut p = firmware::firmware_cascade_with_lda()
            .unwrap()
            .with_input(SampleSet::from_parts(out.wake, out.battery));

        let first = p.run().unwrap().aggregate;
        for _ in 0..20 {
            assert_eq!(p.run().unwrap().aggregate, first);
        }
    }
}
