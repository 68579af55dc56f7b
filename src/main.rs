//! Demo binary: runs the full detection and analysis pipeline on a synthetic
//! recording and prints a JSON summary.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use rusty_ephys::detector;
use rusty_ephys::runner::CancelToken;
use rusty_ephys::source::BufferSource;
use rusty_ephys::train::{classify, ThresholdRange};
use rusty_ephys::{average, correlation, isi, synth};

fn main() {
    let rate = 10_000u32;
    let mut rng = StdRng::seed_from_u64(42);

    // 10 s of noise with 40 injected pulses of alternating size
    let mut samples = synth::noise(10 * rate as usize, 4.0, &mut rng);
    for k in 0..40usize {
        let amplitude = if k % 2 == 0 { 700 } else { 1100 };
        synth::inject_pulse(&mut samples, 2000 + k * 2400, amplitude, 8);
    }
    let source = BufferSource::build(vec![samples], rate).expect("valid synthetic recording");

    let spikes = detector::detect(&source, 0).expect("in-memory reads cannot fail");
    let ranges = [
        ThresholdRange::new(500, 900),
        ThresholdRange::new(900, 1300),
    ];
    let trains = classify(&spikes, &ranges);

    let token = CancelToken::new();
    let autocorrelations =
        correlation::autocorrelation_all(&trains, &token).expect("not cancelled");
    let cross = correlation::cross_correlation_all(&trains, &token).expect("not cancelled");
    let isis = isi::isi_all(&trains, &token).expect("not cancelled");
    let averages =
        average::average_spike_all(&source, 0, &trains, &token).expect("in-memory reads");

    let summary = json!({
        "sample_rate": rate,
        "num_spikes": spikes.len(),
        "train_sizes": trains.iter().map(|train| train.len()).collect::<Vec<_>>(),
        "autocorrelation_totals": autocorrelations
            .iter()
            .map(|hist| hist.iter().sum::<u32>())
            .collect::<Vec<_>>(),
        "cross_correlation_totals": cross
            .iter()
            .map(|row| row.iter().map(|hist| hist.iter().sum::<u32>()).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
        "isi_totals": isis
            .iter()
            .map(|hist| hist.iter().map(|(_, count)| count).sum::<u32>())
            .collect::<Vec<_>>(),
        "average_spike_counts": averages
            .iter()
            .map(|average| average.spike_count)
            .collect::<Vec<_>>(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("serializable summary")
    );
}
