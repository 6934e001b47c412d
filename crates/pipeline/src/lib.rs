//! # Pipeline
//!
//! Scheduling engine: one task per processing component, one acquisition
//! thread per source, all decoupled through provider ring buffers.
//!
//! Responsibilities:
//! - Graph registry: sources, providers, transformers, consumers
//! - Lifecycle: start / stop / invalidate with a shared epoch
//! - Buffer sizing from the registered window demands
//! - Per-component error policy (disable, skip cycle, fatal abort)
//!
//! ## Usage Example
//!
//! ```ignore
//! use pipeline::{Pipeline, PipelineConfig};
//! use contracts::WindowSpec;
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::default());
//! let imu = pipeline.add_source(Box::new(imu_source))?;
//! let imu_raw = pipeline.add_provider(imu, Vec::new())?;
//! let features = pipeline.add_transformer(
//!     Box::new(min_max),
//!     &[imu_raw],
//!     WindowSpec::Seconds(0.1),
//!     WindowSpec::none(),
//! )?;
//! pipeline.add_consumer(Box::new(logger), &[features], WindowSpec::Samples(1), WindowSpec::none())?;
//!
//! pipeline.start()?;
//! tokio::time::sleep(run_duration).await;
//! pipeline.stop().await?;
//! ```

mod events;
mod orchestrator;
mod runner;
mod source;
mod stats;

pub use events::{PipelineEvent, StopReason};
pub use orchestrator::{
    Epoch, Pipeline, PipelineConfig, PipelineState, ProviderKey, SourceKey,
};
pub use stats::{RunStats, StatsSnapshot};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        Consumer, PipelineError, SampleType, SignalSource, SourceCallback, SourceShape, Stream,
        Transformer, WindowSpec,
    };

    use crate::{Pipeline, PipelineConfig, PipelineState};

    /// Source double: pushes an incrementing ramp at a fixed cadence until
    /// stopped
    struct RampSource {
        id: String,
        shape: SourceShape,
        chunk: usize,
        interval: Duration,
        listening: Arc<AtomicBool>,
        fail_connect: bool,
    }

    impl RampSource {
        fn new(id: &str, rate: f64, chunk: usize) -> Self {
            Self {
                id: id.to_string(),
                shape: SourceShape {
                    sample_rate: rate,
                    dim: 1,
                    kind: SampleType::F32,
                },
                chunk,
                interval: Duration::from_millis(2),
                listening: Arc::new(AtomicBool::new(false)),
                fail_connect: false,
            }
        }
    }

    impl SignalSource for RampSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn shape(&self) -> SourceShape {
            self.shape
        }

        fn connect(&mut self) -> Result<(), PipelineError> {
            if self.fail_connect {
                return Err(PipelineError::source_error(&self.id, "device missing"));
            }
            Ok(())
        }

        fn listen(&self, callback: SourceCallback) {
            if self.listening.swap(true, Ordering::SeqCst) {
                return;
            }
            let listening = Arc::clone(&self.listening);
            let shape = self.shape;
            let chunk = self.chunk;
            let interval = self.interval;
            std::thread::spawn(move || {
                let mut next = 0f32;
                while listening.load(Ordering::Relaxed) {
                    let values: Vec<f32> = (0..chunk)
                        .map(|i| next + i as f32)
                        .collect();
                    next += chunk as f32;
                    let stream = Stream::from_parts(
                        chunk,
                        1,
                        shape.sample_rate,
                        contracts::SampleData::F32(values),
                    )
                    .expect("test chunk shape");
                    callback(stream);
                    std::thread::sleep(interval);
                }
            });
        }

        fn stop(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::Relaxed)
        }
    }

    /// Transformer double: doubles every value
    struct Doubler {
        name: String,
    }

    impl Transformer for Doubler {
        fn name(&self) -> &str {
            &self.name
        }

        fn output_dim(&mut self, inputs: &[Stream]) -> Result<usize, PipelineError> {
            Ok(inputs[0].dim())
        }

        fn output_kind(&mut self, _inputs: &[Stream]) -> Result<SampleType, PipelineError> {
            Ok(SampleType::F32)
        }

        fn output_num(&mut self, input_num: usize) -> usize {
            input_num
        }

        fn transform(
            &mut self,
            inputs: &[Stream],
            output: &mut Stream,
        ) -> Result<(), PipelineError> {
            let src = inputs[0].as_f32()?;
            let dst = output.as_f32_mut()?;
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s * 2.0;
            }
            Ok(())
        }
    }

    /// Consumer double: collects every delivered window
    #[derive(Clone)]
    struct Collector {
        name: String,
        windows: Arc<Mutex<Vec<Vec<f32>>>>,
        left: Arc<AtomicU32>,
    }

    impl Collector {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                windows: Arc::new(Mutex::new(Vec::new())),
                left: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl Consumer for Collector {
        fn name(&self) -> &str {
            &self.name
        }

        fn consume(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
            let values = inputs[0].as_f32()?.to_vec();
            self.windows.lock().expect("collector lock").push(values);
            Ok(())
        }

        fn leave(&mut self) -> Result<(), PipelineError> {
            self.left.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    /// Config with enough buffer headroom that a faster-than-real-time
    /// test source cannot lap a briefly descheduled consumer
    fn roomy_config() -> PipelineConfig {
        PipelineConfig {
            buffer_size_s: 30.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_source_to_consumer_flow() {
        let mut pipeline = Pipeline::new(roomy_config());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let provider = pipeline.add_provider(source, Vec::new()).unwrap();

        let collector = Collector::new("collect");
        let windows = Arc::clone(&collector.windows);
        pipeline
            .add_consumer(
                Box::new(collector.clone()),
                &[provider],
                WindowSpec::Samples(10),
                WindowSpec::none(),
            )
            .unwrap();

        pipeline.start().unwrap();
        assert!(
            wait_for(
                || windows.lock().expect("lock").len() >= 3,
                Duration::from_secs(2)
            )
            .await
        );
        pipeline.stop().await.unwrap();

        let collected = windows.lock().expect("lock");
        // ramp is continuous across window boundaries
        assert_eq!(collected[0][0], 0.0);
        assert_eq!(collected[1][0], 10.0);
        assert_eq!(collector.left.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transformer_chain() {
        let mut pipeline = Pipeline::new(roomy_config());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let provider = pipeline.add_provider(source, Vec::new()).unwrap();
        let doubled = pipeline
            .add_transformer(
                Box::new(Doubler {
                    name: "double".into(),
                }),
                &[provider],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();

        let collector = Collector::new("collect");
        let windows = Arc::clone(&collector.windows);
        pipeline
            .add_consumer(
                Box::new(collector),
                &[doubled],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();

        pipeline.start().unwrap();
        assert!(
            wait_for(
                || windows.lock().expect("lock").len() >= 2,
                Duration::from_secs(2)
            )
            .await
        );
        pipeline.stop().await.unwrap();

        let collected = windows.lock().expect("lock");
        assert_eq!(collected[0], vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[tokio::test]
    async fn test_graph_frozen_after_start() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let provider = pipeline.add_provider(source, Vec::new()).unwrap();
        pipeline
            .add_consumer(
                Box::new(Collector::new("c")),
                &[provider],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();
        pipeline.start().unwrap();

        let err = pipeline
            .add_source(Box::new(RampSource::new("late", 10.0, 1)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Lifecycle { .. }));

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop_and_no_restart() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let _provider = pipeline.add_provider(source, Vec::new()).unwrap();
        pipeline.start().unwrap();

        pipeline.stop().await.unwrap();
        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        let err = pipeline.start().unwrap_err();
        assert!(matches!(err, PipelineError::Lifecycle { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_resets_registry() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let _ = pipeline.add_provider(source, Vec::new()).unwrap();
        pipeline.start().unwrap();
        pipeline.stop().await.unwrap();

        pipeline.invalidate().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Building);
        // same id is free again after invalidation
        pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
    }

    #[tokio::test]
    async fn test_foreign_provider_key_rejected() {
        let mut other = Pipeline::new(PipelineConfig::default());
        let other_source = other
            .add_source(Box::new(RampSource::new("other", 100.0, 10)))
            .unwrap();
        let foreign = other.add_provider(other_source, Vec::new()).unwrap();

        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let err = pipeline
            .add_consumer(
                Box::new(Collector::new("c")),
                &[foreign],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let err = pipeline
            .add_source(Box::new(RampSource::new("ramp", 50.0, 5)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_mismatched_window_durations_rejected() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let fast = pipeline
            .add_source(Box::new(RampSource::new("fast", 100.0, 10)))
            .unwrap();
        let slow = pipeline
            .add_source(Box::new(RampSource::new("slow", 10.0, 1)))
            .unwrap();
        let fast_p = pipeline.add_provider(fast, Vec::new()).unwrap();
        let slow_p = pipeline.add_provider(slow, Vec::new()).unwrap();

        // 10 samples is 0.1s on the fast input but 1s on the slow one
        let err = pipeline
            .add_consumer(
                Box::new(Collector::new("c")),
                &[fast_p, slow_p],
                WindowSpec::Samples(10),
                WindowSpec::none(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));

        // the seconds form resolves per rate and is accepted
        pipeline
            .add_consumer(
                Box::new(Collector::new("c2")),
                &[fast_p, slow_p],
                WindowSpec::Seconds(0.5),
                WindowSpec::none(),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_source_connect_disables_branch_only() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());

        let mut broken = RampSource::new("broken", 100.0, 10);
        broken.fail_connect = true;
        let broken_key = pipeline.add_source(Box::new(broken)).unwrap();
        let broken_p = pipeline.add_provider(broken_key, Vec::new()).unwrap();

        let good = pipeline
            .add_source(Box::new(RampSource::new("good", 100.0, 10)))
            .unwrap();
        let good_p = pipeline.add_provider(good, Vec::new()).unwrap();

        let starved = Collector::new("starved");
        let fed = Collector::new("fed");
        let fed_windows = Arc::clone(&fed.windows);
        pipeline
            .add_consumer(
                Box::new(starved),
                &[broken_p],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();
        pipeline
            .add_consumer(
                Box::new(fed),
                &[good_p],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();

        pipeline.start().unwrap();
        assert!(
            wait_for(
                || fed_windows.lock().expect("lock").len() >= 2,
                Duration::from_secs(2)
            )
            .await
        );
        assert!(pipeline.stats().source_errors >= 1);
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_enter_failure_disables_single_component() {
        struct RejectingConsumer;
        impl Consumer for RejectingConsumer {
            fn name(&self) -> &str {
                "reject"
            }
            fn enter(&mut self, _inputs: &[Stream]) -> Result<(), PipelineError> {
                Err(PipelineError::validation("reject", "bad shape"))
            }
            fn consume(&mut self, _inputs: &[Stream]) -> Result<(), PipelineError> {
                Ok(())
            }
        }

        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 100.0, 10)))
            .unwrap();
        let provider = pipeline.add_provider(source, Vec::new()).unwrap();
        pipeline
            .add_consumer(
                Box::new(RejectingConsumer),
                &[provider],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();

        let fed = Collector::new("fed");
        let fed_windows = Arc::clone(&fed.windows);
        pipeline
            .add_consumer(
                Box::new(fed),
                &[provider],
                WindowSpec::Samples(5),
                WindowSpec::none(),
            )
            .unwrap();

        pipeline.start().unwrap();
        assert!(
            wait_for(
                || fed_windows.lock().expect("lock").len() >= 1,
                Duration::from_secs(2)
            )
            .await
        );
        assert_eq!(pipeline.stats().components_disabled, 1);
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_joins_within_grace() {
        let mut config = PipelineConfig::default();
        config.grace = Duration::from_millis(500);
        let mut pipeline = Pipeline::new(config);
        let source = pipeline
            .add_source(Box::new(RampSource::new("ramp", 1000.0, 100)))
            .unwrap();
        let provider = pipeline.add_provider(source, Vec::new()).unwrap();
        pipeline
            .add_consumer(
                Box::new(Collector::new("c")),
                &[provider],
                WindowSpec::Samples(50),
                WindowSpec::none(),
            )
            .unwrap();
        pipeline.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        pipeline.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
}
