//! Mock Pipeline Demo
//!
//! A sine source feeding a min/max transformer, with a logging consumer on
//! the features and a file consumer dumping the raw signal. No hardware
//! required.
//!
//! Run with: cargo run --bin mock_pipeline

use std::time::Duration;

use components::{FileConsumer, LogConsumer, MinMax, MockSource};
use contracts::{OptionValue, WindowSpec};
use pipeline::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting mock pipeline demo");

    let mut pipeline = Pipeline::new(PipelineConfig::default());

    // ==== Stage 1: source and its provider ====
    let sine = pipeline.add_source(Box::new(MockSource::sine("sine", 100.0, 2.0)))?;
    let raw = pipeline.add_provider(sine, vec!["level".to_string()])?;

    // ==== Stage 2: min/max features over 100 ms windows ====
    let features = pipeline.add_transformer(
        Box::new(MinMax::new("minmax")),
        &[raw],
        WindowSpec::Seconds(0.1),
        WindowSpec::none(),
    )?;

    // ==== Stage 3: consumers ====
    let logger = LogConsumer::new("feature_log");
    pipeline.add_consumer(
        Box::new(logger),
        &[features],
        WindowSpec::Samples(1),
        WindowSpec::none(),
    )?;

    let mut dump = FileConsumer::new("raw_dump");
    dump.options_mut().set(
        "path",
        OptionValue::Text("./output/sine_raw.tsv".to_string()),
    )?;
    dump.options_mut().set("truncate", OptionValue::Bool(true))?;
    pipeline.add_consumer(
        Box::new(dump),
        &[raw],
        WindowSpec::Seconds(0.1),
        WindowSpec::none(),
    )?;

    // ==== Stage 4: run for five seconds ====
    pipeline.start()?;
    tracing::info!("Pipeline running for 5 seconds");
    tokio::time::sleep(Duration::from_secs(5)).await;
    pipeline.stop().await?;

    let stats = pipeline.stats();
    tracing::info!(
        cycles_run = stats.cycles_run,
        cycles_skipped = stats.cycles_skipped,
        "Demo finished"
    );
    Ok(())
}
