//! Benchmark for the mel feature pipeline.
//!
//! Generates synthetic speech-like audio at 22.05kHz and times each stage
//! of `wav2mel` and `mel2wav` on its own, then the full round trip.
//!
//! Run with: cargo run --profile perf --bin bench_features

use std::time::{Duration, Instant};

use glowtts_audio::audio::{magnitude, wav2mel_batch, GriffinLim, SilenceTrimmer};
use glowtts_audio::{AudioConfig, AudioFeatureEngine, AudioSignal};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn generate_test_audio(duration_secs: f64, sample_rate: u32) -> Vec<f32> {
    let num_samples = (duration_secs * sample_rate as f64) as usize;
    let mut samples = Vec::with_capacity(num_samples);

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let pitch = 140.0 + 30.0 * (2.0 * std::f32::consts::PI * 0.7 * t).sin();
        let voiced = (2.0 * std::f32::consts::PI * pitch * t).sin() * 0.4;
        let formant = (2.0 * std::f32::consts::PI * 900.0 * t).sin() * 0.2;
        let syllables = (2.0 * std::f32::consts::PI * 3.0 * t).sin().max(0.0);
        samples.push((voiced + formant) * syllables);
    }
    samples
}

fn bench<F: FnMut() -> R, R>(name: &str, iterations: usize, mut f: F) -> Duration {
    // Warmup
    std::hint::black_box(f());

    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;

    println!(
        "  {:<40} {:>8.2}ms  ({} iters, {:.2}ms total)",
        name,
        per_iter.as_secs_f64() * 1000.0,
        iterations,
        elapsed.as_secs_f64() * 1000.0,
    );
    per_iter
}

fn main() -> glowtts_audio::Result<()> {
    let config = AudioConfig::default();
    let sample_rate = config.sample_rate;
    let duration_secs = 8.0;

    println!("Generating test audio: {duration_secs}s @ {sample_rate}Hz...");
    let signal = AudioSignal::new(generate_test_audio(duration_secs, sample_rate), sample_rate);
    println!("  {} samples\n", signal.len());

    let started = Instant::now();
    let engine = AudioFeatureEngine::new(config.clone())?;
    println!(
        "Engine setup (plans, filterbank, pseudo-inverse): {:.2}ms\n",
        started.elapsed().as_secs_f64() * 1000.0
    );

    let iters = 10;
    println!("=== wav2mel stages ({iters} iterations each) ===\n");

    let transform = engine.transform();
    let t_stft = bench("stft", iters, || transform.forward(signal.samples()));

    let linear = magnitude(&transform.forward(signal.samples())?);
    let t_mel = bench("linear_to_mel", iters, || engine.projector().linear_to_mel(&linear));

    let amp = engine.projector().linear_to_mel(&linear)?;
    let t_db = bench("amp_to_db", iters, || engine.scaler().amp_to_db(&amp));

    let db = engine.scaler().amp_to_db(&amp)?;
    let t_norm = bench("normalize", iters, || engine.normalizer().normalize(&db));

    let trimmer = SilenceTrimmer::from_config(&config)?;
    bench("trim (60 dB)", iters, || {
        trimmer.trim(signal.samples(), 60.0, 0.01, 0.1).map(|s| s.len())
    });

    bench("wav2mel (full)", iters, || engine.wav2mel(&signal));

    println!("\n=== mel2wav stages ===\n");

    let normalized = engine.wav2mel(&signal)?;
    bench("mel_to_linear", iters, || engine.projector().mel_to_linear(&amp));

    let spectrum = transform.forward(signal.samples())?;
    bench("istft", iters, || transform.inverse(&spectrum));

    let gl_iters = config.griffin_lim_iters;
    let recovered = engine.projector().mel_to_linear(&amp)?;
    bench(&format!("griffin_lim ({gl_iters} iters)"), 2, || {
        GriffinLim::new(gl_iters, 1.0).reconstruct(transform, &recovered, &mut StdRng::seed_from_u64(0))
    });

    bench("mel2wav (full)", 2, || {
        engine.mel2wav_with_rng(&normalized, gl_iters, 1.0, &mut StdRng::seed_from_u64(0))
    });

    println!("\n=== Batch ===\n");

    let batch: Vec<AudioSignal> = (0..16).map(|_| signal.clone()).collect();
    let t_serial = bench("wav2mel x16 (serial)", 2, || {
        batch.iter().map(|s| engine.wav2mel(s)).collect::<Vec<_>>()
    });
    let t_parallel = bench("wav2mel_batch x16 (rayon)", 2, || wav2mel_batch(&engine, &batch));
    println!(
        "\n  speedup: {:.2}x",
        t_serial.as_secs_f64() / t_parallel.as_secs_f64()
    );

    println!("\n=== wav2mel breakdown ===\n");
    let total = t_stft + t_mel + t_db + t_norm;
    let pcts = [
        ("stft", t_stft),
        ("linear_to_mel", t_mel),
        ("amp_to_db", t_db),
        ("normalize", t_norm),
    ];
    for (name, t) in &pcts {
        let pct = t.as_secs_f64() / total.as_secs_f64() * 100.0;
        println!(
            "  {:<40} {:>5.1}%  ({:.2}ms)",
            name,
            pct,
            t.as_secs_f64() * 1000.0
        );
    }

    Ok(())
}
