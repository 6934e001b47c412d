//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Source -> provider -> transformer -> consumer data flow
//! - Window ordering, overlap and overrun guarantees under load
//! - Lifecycle behavior: idempotent stop, bounded shutdown, no restart

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    use contracts::{
        Consumer, PipelineError, SampleData, SampleType, SignalSource, SourceCallback,
        SourceShape, Stream,
    };

    /// Consumer double collecting every window per input
    #[derive(Clone)]
    pub struct CollectConsumer {
        name: String,
        pub windows: Arc<Mutex<Vec<Vec<Vec<f32>>>>>,
        pub left: Arc<AtomicBool>,
    }

    impl CollectConsumer {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                windows: Arc::new(Mutex::new(Vec::new())),
                left: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn window_count(&self) -> usize {
            self.windows.lock().expect("collector lock").len()
        }
    }

    impl Consumer for CollectConsumer {
        fn name(&self) -> &str {
            &self.name
        }

        fn consume(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
            let cycle: Vec<Vec<f32>> = inputs
                .iter()
                .map(|input| {
                    (0..input.data().len())
                        .map(|i| input.data().element_as_f64(i).unwrap_or(f64::NAN) as f32)
                        .collect()
                })
                .collect();
            self.windows.lock().expect("collector lock").push(cycle);
            Ok(())
        }

        fn leave(&mut self) -> Result<(), PipelineError> {
            self.left.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Source double that pushes without pacing until signaled and exposes
    /// its thread handle, so shutdown tests can prove the thread exited
    pub struct FloodSource {
        id: String,
        listening: Arc<AtomicBool>,
        pub thread: Arc<Mutex<Option<JoinHandle<()>>>>,
    }

    impl FloodSource {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                listening: Arc::new(AtomicBool::new(false)),
                thread: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl SignalSource for FloodSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn shape(&self) -> SourceShape {
            SourceShape {
                sample_rate: 1000.0,
                dim: 1,
                kind: SampleType::F32,
            }
        }

        fn connect(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn listen(&self, callback: SourceCallback) {
            if self.listening.swap(true, Ordering::SeqCst) {
                return;
            }
            let listening = Arc::clone(&self.listening);
            let handle = std::thread::spawn(move || {
                let mut index = 0u64;
                while listening.load(Ordering::Relaxed) {
                    let values: Vec<f32> = (0..100).map(|i| (index + i) as f32).collect();
                    let stream =
                        Stream::from_parts(100, 1, 1000.0, SampleData::F32(values))
                            .expect("flood chunk");
                    callback(stream);
                    index += 100;
                    std::thread::yield_now();
                }
            });
            *self.thread.lock().expect("thread slot") = Some(handle);
        }

        fn stop(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::Relaxed)
        }
    }

    pub async fn wait_for<F: Fn() -> bool>(condition: F, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        condition()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use components::{MinMax, MockSource, MockSourceConfig, Waveform};
    use contracts::{OptionValue, WindowSpec};
    use pipeline::{Pipeline, PipelineConfig, PipelineState};

    use crate::support::{wait_for, CollectConsumer, FloodSource};

    /// Scripted [5, 1, 3] input, min-only: every output window is [1]
    #[tokio::test]
    async fn test_min_max_golden_min_only() {
        let mut p = Pipeline::new(PipelineConfig::default());
        let source = p
            .add_source(Box::new(MockSource::new(
                "script",
                MockSourceConfig {
                    sample_rate_hz: 300.0,
                    chunk_samples: 3,
                    ..Default::default()
                },
                Waveform::Script(vec![5.0, 1.0, 3.0]),
            )))
            .unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();

        let mut minmax = MinMax::new("minmax");
        minmax
            .options_mut()
            .set("max", OptionValue::Bool(false))
            .unwrap();
        let features = p
            .add_transformer(
                Box::new(minmax),
                &[raw],
                WindowSpec::Samples(3),
                WindowSpec::none(),
            )
            .unwrap();

        let collector = CollectConsumer::new("collect");
        let handle = collector.clone();
        p.add_consumer(
            Box::new(collector),
            &[features],
            WindowSpec::Samples(1),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(wait_for(|| handle.window_count() >= 3, Duration::from_secs(2)).await);
        p.stop().await.unwrap();

        let windows = handle.windows.lock().expect("lock");
        for cycle in windows.iter().take(3) {
            assert_eq!(cycle[0], vec![1.0]);
        }
        assert!(handle.left.load(Ordering::SeqCst));
    }

    /// Min and max together interleave as [min, max]
    #[tokio::test]
    async fn test_min_max_golden_both() {
        let mut p = Pipeline::new(PipelineConfig::default());
        let source = p
            .add_source(Box::new(MockSource::new(
                "script",
                MockSourceConfig {
                    sample_rate_hz: 300.0,
                    chunk_samples: 3,
                    ..Default::default()
                },
                Waveform::Script(vec![5.0, 1.0, 3.0]),
            )))
            .unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();
        let features = p
            .add_transformer(
                Box::new(MinMax::new("minmax")),
                &[raw],
                WindowSpec::Samples(3),
                WindowSpec::none(),
            )
            .unwrap();

        let collector = CollectConsumer::new("collect");
        let handle = collector.clone();
        p.add_consumer(
            Box::new(collector),
            &[features],
            WindowSpec::Samples(1),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(wait_for(|| handle.window_count() >= 2, Duration::from_secs(2)).await);
        p.stop().await.unwrap();

        let windows = handle.windows.lock().expect("lock");
        assert_eq!(windows[0][0], vec![1.0, 5.0]);
    }

    /// Consecutive windows of one consumer share exactly `overlap` samples
    #[tokio::test]
    async fn test_overlap_between_consecutive_windows() {
        let mut p = Pipeline::new(PipelineConfig::default());
        let source = p
            .add_source(Box::new(MockSource::counter("counter", 500.0)))
            .unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();

        let collector = CollectConsumer::new("collect");
        let handle = collector.clone();
        p.add_consumer(
            Box::new(collector),
            &[raw],
            WindowSpec::Samples(6),
            WindowSpec::Samples(2),
        )
        .unwrap();

        p.start().unwrap();
        assert!(wait_for(|| handle.window_count() >= 4, Duration::from_secs(2)).await);
        p.stop().await.unwrap();

        let windows = handle.windows.lock().expect("lock");
        for pair in windows.windows(2).take(3) {
            let previous = &pair[0][0];
            let current = &pair[1][0];
            assert_eq!(&previous[4..], &current[..2]);
            // and the counter is gapless across the advance
            assert_eq!(current[0], previous[0] + 4.0);
        }
    }

    /// Two sources at different rates, one consumer: windows at the same
    /// cycle cover the same real-world interval
    #[tokio::test]
    async fn test_multi_rate_alignment() {
        let mut p = Pipeline::new(PipelineConfig::default());
        let fast = p
            .add_source(Box::new(MockSource::counter("fast", 100.0)))
            .unwrap();
        let slow = p
            .add_source(Box::new(MockSource::new(
                "slow",
                MockSourceConfig {
                    sample_rate_hz: 10.0,
                    chunk_samples: 1,
                    ..Default::default()
                },
                Waveform::Counter,
            )))
            .unwrap();
        let fast_p = p.add_provider(fast, Vec::new()).unwrap();
        let slow_p = p.add_provider(slow, Vec::new()).unwrap();

        let collector = CollectConsumer::new("collect");
        let handle = collector.clone();
        p.add_consumer(
            Box::new(collector),
            &[fast_p, slow_p],
            WindowSpec::Seconds(0.2),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(wait_for(|| handle.window_count() >= 2, Duration::from_secs(5)).await);
        p.stop().await.unwrap();

        let windows = handle.windows.lock().expect("lock");
        let first_cycle = &windows[0];
        // 0.2s resolves to 20 samples at 100 Hz and 2 samples at 10 Hz
        assert_eq!(first_cycle[0].len(), 20);
        assert_eq!(first_cycle[1].len(), 2);
        // both start at their sample index 0, i.e. the shared epoch
        assert_eq!(first_cycle[0][0], 0.0);
        assert_eq!(first_cycle[1][0], 0.0);
        // second cycle starts one window later on both inputs
        assert_eq!(windows[1][0][0], 20.0);
        assert_eq!(windows[1][1][0], 2.0);
    }

    /// Stop is idempotent and a stopped pipeline refuses to restart
    #[tokio::test]
    async fn test_stop_idempotent_and_final() {
        let mut p = Pipeline::new(PipelineConfig::default());
        let source = p
            .add_source(Box::new(MockSource::sine("sine", 100.0, 2.0)))
            .unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();
        let collector = CollectConsumer::new("collect");
        p.add_consumer(
            Box::new(collector),
            &[raw],
            WindowSpec::Samples(10),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        p.stop().await.unwrap();
        p.stop().await.unwrap();
        assert_eq!(p.state(), PipelineState::Stopped);
        assert!(p.start().is_err());
    }

    /// Shutdown bound: a source that pushes indefinitely until signaled
    /// must not keep the pipeline from stopping within the grace period
    #[tokio::test]
    async fn test_shutdown_bound_under_flooding_source() {
        let config = PipelineConfig {
            grace: Duration::from_millis(800),
            ..Default::default()
        };
        let mut p = Pipeline::new(config);

        let flood = FloodSource::new("flood");
        let thread = std::sync::Arc::clone(&flood.thread);
        let source = p.add_source(Box::new(flood)).unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();

        let collector = CollectConsumer::new("collect");
        let handle = collector.clone();
        p.add_consumer(
            Box::new(collector),
            &[raw],
            WindowSpec::Samples(100),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(wait_for(|| handle.window_count() >= 1, Duration::from_secs(2)).await);

        let started = std::time::Instant::now();
        p.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        // the acquisition thread observed the signal and exited
        assert!(
            wait_for(
                || {
                    thread
                        .lock()
                        .expect("thread slot")
                        .as_ref()
                        .map(|h| h.is_finished())
                        .unwrap_or(false)
                },
                Duration::from_secs(1)
            )
            .await
        );
    }

    /// A consumer that cannot keep up loses data but keeps receiving the
    /// newest windows, and the loss is observable
    #[tokio::test]
    async fn test_slow_consumer_overruns_but_survives() {
        let config = PipelineConfig {
            // tiny buffer so the flood laps slow readers quickly
            buffer_size_s: 0.05,
            ..Default::default()
        };
        let mut p = Pipeline::new(config);
        let flood = FloodSource::new("flood");
        let source = p.add_source(Box::new(flood)).unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();

        struct SlowConsumer {
            seen: std::sync::Arc<std::sync::atomic::AtomicU64>,
        }
        impl contracts::Consumer for SlowConsumer {
            fn name(&self) -> &str {
                "slow"
            }
            fn consume(&mut self, _inputs: &[contracts::Stream]) -> Result<(), contracts::PipelineError> {
                self.seen.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(Duration::from_millis(20));
                Ok(())
            }
        }

        let seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        p.add_consumer(
            Box::new(SlowConsumer {
                seen: std::sync::Arc::clone(&seen),
            }),
            &[raw],
            WindowSpec::Samples(10),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(
            wait_for(
                || seen.load(Ordering::Relaxed) >= 5,
                Duration::from_secs(3)
            )
            .await
        );

        let snapshot = p.provider_snapshot(raw).expect("provider snapshot");
        p.stop().await.unwrap();
        assert!(snapshot.overrun_events > 0, "expected overruns, got none");
    }
}

#[cfg(test)]
mod file_consumer_e2e {
    use std::time::Duration;

    use components::{FileConsumer, MockSource, MockSourceConfig, Waveform};
    use contracts::{OptionValue, WindowSpec};
    use pipeline::{Pipeline, PipelineConfig};

    use crate::support::wait_for;

    #[tokio::test]
    async fn test_samples_end_up_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.tsv");

        let mut p = Pipeline::new(PipelineConfig::default());
        let source = p
            .add_source(Box::new(MockSource::new(
                "counter",
                MockSourceConfig {
                    sample_rate_hz: 200.0,
                    chunk_samples: 20,
                    ..Default::default()
                },
                Waveform::Counter,
            )))
            .unwrap();
        let raw = p.add_provider(source, Vec::new()).unwrap();

        let mut consumer = FileConsumer::new("file");
        consumer
            .options_mut()
            .set("path", OptionValue::Text(path.display().to_string()))
            .unwrap();
        p.add_consumer(
            Box::new(consumer),
            &[raw],
            WindowSpec::Samples(20),
            WindowSpec::none(),
        )
        .unwrap();

        p.start().unwrap();
        assert!(
            wait_for(
                || {
                    std::fs::read_to_string(&path)
                        .map(|c| c.lines().count() >= 41)
                        .unwrap_or(false)
                },
                Duration::from_secs(3)
            )
            .await
        );
        p.stop().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("# {"));
        // first data row: window time 0, counter value 0
        assert!(lines[1].starts_with("0.000000\t0"));
        // rows keep strict sample order
        assert!(lines[2].starts_with("0.005000\t1"));
    }
}

#[cfg(test)]
mod blueprint_e2e {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_full_blueprint_parses_and_validates() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[settings]
buffer_size_s = 2.0
grace_s = 1.0

[[sources]]
id = "imu"
kind = "sine"
sample_rate_hz = 100.0
dim = 3

[sources.options]
frequency_hz = 2.0

[[sources]]
id = "audio_level"
kind = "noise"
sample_rate_hz = 1000.0

[sources.options]
seed = 42

[[transformers]]
id = "imu_minmax"
kind = "min_max"
inputs = ["imu"]
frame = 0.1

[[transformers]]
id = "imu_min_only"
kind = "selector"
inputs = ["imu_minmax"]
frame = 1

[transformers.options]
channels = [0, 2, 4]

[[consumers]]
id = "log"
kind = "log"
inputs = ["imu_min_only"]
frame = 1

[[consumers]]
id = "dump"
kind = "file"
inputs = ["audio_level"]
frame = 0.1

[consumers.options]
path = "/tmp/audio_level.tsv"
"#,
            ConfigFormat::Toml,
        )
        .expect("blueprint loads");

        assert_eq!(blueprint.sources.len(), 2);
        assert_eq!(blueprint.transformers.len(), 2);
        assert_eq!(blueprint.consumers.len(), 2);
        let built = components::build_transformer(&blueprint.transformers[1]).unwrap();
        assert_eq!(built.name(), "imu_min_only");
    }
}
