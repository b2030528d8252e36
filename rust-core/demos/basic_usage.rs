/// Basic usage: build a small log, decode it, select samples and replay the firmware filters.
use wake_tuner::wire::{BurstHeader, FrameWriter};
use wake_tuner::{firmware, DecoderConfig, Filter, Predicate, SampleSet, Triplet};

fn main() -> wake_tuner::Result<()> {
    println!("=== Wake Tuner: Basic Usage Example ===\n");

    // A synthetic log: wrist turns (confirmed) and bumps (unconfirmed), with
    // some flash noise between records.
    let mut log = FrameWriter::new();
    for k in 0..12i32 {
        let confirmed = k % 3 != 0;
        let header = BurstHeader {
            confirmed,
            int1: 0x08,
            int2: 0,
            timestamp: 1_400_000_000 + k * 90,
            wake_ticks: 4_000,
            battery_raw: None,
        };
        let readings: Vec<Triplet> = (0..32)
            .map(|i| {
                let y = if confirmed && i > 18 { 30 } else { (i % 5) as i8 - 2 };
                Triplet::new((k % 4) as i8, y, 18)
            })
            .collect();
        log.write_raw(&[0x12, 0x34]).write_burst(&header, &readings).write_padding(8);
    }

    let (set, summaries) =
        SampleSet::from_sources([("demo.bin", log.as_bytes())], &DecoderConfig::default());
    let summary = &summaries[0];
    println!(
        "Decoded {} wake bursts from {} bytes ({} diagnostics)",
        summary.wake_count,
        summary.bytes_consumed,
        summary.diagnostics.len()
    );

    let stats = set.summary();
    println!(
        "  confirmed: {}  unconfirmed: {}  full: {}  y-triggered: {}",
        stats.confirmed, stats.unconfirmed, stats.full, stats.trigger_y
    );

    // Feature matrix of confirmed full bursts.
    let confirmed = Filter::all([Predicate::Confirmed(true), Predicate::Full(true)]);
    let matrix = set.feature_matrix(&confirmed);
    println!("  confirmed feature matrix: {} x {}\n", matrix.nrows(), matrix.ncols());

    // Replay through the shipped filter bank.
    let mut cascade = firmware::firmware_cascade()?.with_input(set);
    let report = cascade.run()?;
    println!("{report}");

    Ok(())
}
