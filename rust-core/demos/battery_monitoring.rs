/// Battery monitoring: read battery records and per-burst voltages from a newer-format log.
use wake_tuner::wire::{BatteryRecord, BurstHeader, FrameWriter, BATTERY_FORMAT_CUTOVER};
use wake_tuner::{DecoderConfig, Filter, Predicate, SampleSet, Triplet};

fn main() {
    println!("=== Wake Tuner: Battery Monitoring Example ===\n");

    // Logs written after the format cutover carry a battery byte in every
    // burst header, plus standalone battery records.
    let start = BATTERY_FORMAT_CUTOVER + 3_600;
    let mut log = FrameWriter::new();
    for hour in 0..24i32 {
        let raw = 200u8.saturating_sub(hour as u8 * 3);
        log.write_battery(&BatteryRecord {
            timestamp: (start + hour * 3_600) as u32,
            raw_volt: raw,
        });
        let header = BurstHeader {
            confirmed: hour % 2 == 0,
            int1: 0x20,
            int2: 0,
            timestamp: start + hour * 3_600 + 60,
            wake_ticks: 2_500,
            battery_raw: Some(raw.saturating_sub(1)),
        };
        log.write_burst(&header, &[Triplet::new(0, 5, 20); 32]);
    }

    let (set, _) = SampleSet::from_sources([("battery.bin", log.as_bytes())], &DecoderConfig::default());

    println!("Battery records: {}", set.battery().len());
    for b in set.battery().iter().step_by(6) {
        println!("  t={}  {:.3} V", b.timestamp, b.volts);
    }

    let with_battery = Filter::only(Predicate::HasBattery(true));
    let volts: Vec<f32> = set
        .filter(&with_battery)
        .filter_map(|s| s.battery_volts)
        .collect();
    if let (Some(first), Some(last)) = (volts.first(), volts.last()) {
        println!(
            "\nBurst-header voltage: {:.3} V -> {:.3} V over {} bursts",
            first,
            last,
            volts.len()
        );
    }

    let summary = set.summary();
    println!("Total wake time: {} ms", summary.total_wake_time_ms);
}
