//! Multi-Rate Pipeline Demo
//!
//! Two sources at very different rates (a 1 kHz noise signal and a 10 Hz
//! counter) feeding one consumer through time-aligned windows: every cycle
//! the consumer receives 100 noise samples and 1 counter sample covering the
//! same 100 ms of real time.
//!
//! Run with: cargo run --bin multi_rate_pipeline

use std::time::Duration;

use components::{LogConsumer, MockSource, MockSourceConfig, Waveform};
use contracts::WindowSpec;
use pipeline::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut pipeline = Pipeline::new(PipelineConfig::default());

    let noise = pipeline.add_source(Box::new(MockSource::new(
        "noise",
        MockSourceConfig {
            sample_rate_hz: 1000.0,
            chunk_samples: 100,
            ..Default::default()
        },
        Waveform::Noise { seed: 42 },
    )))?;
    let ticks = pipeline.add_source(Box::new(MockSource::new(
        "ticks",
        MockSourceConfig {
            sample_rate_hz: 10.0,
            chunk_samples: 1,
            ..Default::default()
        },
        Waveform::Counter,
    )))?;

    let noise_raw = pipeline.add_provider(noise, Vec::new())?;
    let ticks_raw = pipeline.add_provider(ticks, Vec::new())?;

    pipeline.add_consumer(
        Box::new(LogConsumer::new("aligned_log")),
        &[noise_raw, ticks_raw],
        WindowSpec::Seconds(0.1),
        WindowSpec::none(),
    )?;

    pipeline.start()?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    pipeline.stop().await?;

    tracing::info!(cycles = pipeline.stats().cycles_run, "Demo finished");
    Ok(())
}
