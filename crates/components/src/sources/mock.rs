//! Mock signal sources
//!
//! Generate deterministic (or seeded) waveforms on a dedicated thread,
//! without any hardware. Used for development, demos and tests; the unpaced
//! mode pushes as fast as possible and only stops when signaled, which is
//! what shutdown tests need.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use contracts::{
    PipelineError, SampleData, SampleType, SignalSource, SourceCallback, SourceShape, Stream,
};

/// Generated waveform
#[derive(Debug, Clone)]
pub enum Waveform {
    /// `amplitude * sin(2*pi*f*t)`, phase-shifted per channel
    Sine { frequency_hz: f64, amplitude: f64 },
    /// Monotonic sample index
    Counter,
    /// Seeded uniform noise in [-1, 1)
    Noise { seed: u64 },
    /// Fixed sequence, repeated; one value per sample, all channels equal
    Script(Vec<f64>),
}

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Sample rate in Hz
    pub sample_rate_hz: f64,
    /// Channels per sample
    pub dim: usize,
    /// Element kind; must be numeric
    pub kind: SampleType,
    /// Samples per pushed chunk
    pub chunk_samples: usize,
    /// Sleep between chunks to approximate real time; unpaced sources push
    /// in a tight loop until stopped
    pub paced: bool,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            dim: 1,
            kind: SampleType::F32,
            chunk_samples: 10,
            paced: true,
        }
    }
}

/// Thread-backed mock source
pub struct MockSource {
    id: String,
    config: MockSourceConfig,
    waveform: Waveform,
    listening: Arc<AtomicBool>,
}

impl MockSource {
    pub fn new(id: impl Into<String>, config: MockSourceConfig, waveform: Waveform) -> Self {
        Self {
            id: id.into(),
            config,
            waveform,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sine source with default shape
    pub fn sine(id: impl Into<String>, sample_rate_hz: f64, frequency_hz: f64) -> Self {
        Self::new(
            id,
            MockSourceConfig {
                sample_rate_hz,
                ..Default::default()
            },
            Waveform::Sine {
                frequency_hz,
                amplitude: 1.0,
            },
        )
    }

    /// Counter source with default shape
    pub fn counter(id: impl Into<String>, sample_rate_hz: f64) -> Self {
        Self::new(
            id,
            MockSourceConfig {
                sample_rate_hz,
                ..Default::default()
            },
            Waveform::Counter,
        )
    }

    fn value_at(waveform: &Waveform, rng: &mut StdRng, index: u64, channel: usize, rate: f64) -> f64 {
        match waveform {
            Waveform::Sine {
                frequency_hz,
                amplitude,
            } => {
                let t = index as f64 / rate;
                let phase = channel as f64 * std::f64::consts::FRAC_PI_4;
                amplitude * (2.0 * std::f64::consts::PI * frequency_hz * t + phase).sin()
            }
            Waveform::Counter => index as f64,
            Waveform::Noise { .. } => rng.random_range(-1.0..1.0),
            Waveform::Script(values) => values[(index % values.len() as u64) as usize],
        }
    }
}

impl SignalSource for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn shape(&self) -> SourceShape {
        SourceShape {
            sample_rate: self.config.sample_rate_hz,
            dim: self.config.dim,
            kind: self.config.kind,
        }
    }

    fn connect(&mut self) -> Result<(), PipelineError> {
        if !self.config.kind.is_numeric() {
            return Err(PipelineError::source_error(
                &self.id,
                format!("mock source cannot generate {} samples", self.config.kind),
            ));
        }
        if let Waveform::Script(values) = &self.waveform {
            if values.is_empty() {
                return Err(PipelineError::source_error(&self.id, "empty script"));
            }
        }
        if self.config.chunk_samples == 0 {
            return Err(PipelineError::source_error(&self.id, "chunk of 0 samples"));
        }
        Ok(())
    }

    fn listen(&self, callback: SourceCallback) {
        // Idempotent: a second listen must not start another thread
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let id = self.id.clone();
        let config = self.config.clone();
        let waveform = self.waveform.clone();
        let listening = Arc::clone(&self.listening);

        let seed = match waveform {
            Waveform::Noise { seed } => seed,
            _ => 0,
        };
        let interval =
            Duration::from_secs_f64(config.chunk_samples as f64 / config.sample_rate_hz);

        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut index: u64 = 0;

            debug!(
                source = %id,
                rate = config.sample_rate_hz,
                dim = config.dim,
                chunk = config.chunk_samples,
                paced = config.paced,
                "mock source started"
            );

            while listening.load(Ordering::Relaxed) {
                let mut data =
                    SampleData::zeroed(config.kind, config.chunk_samples * config.dim);
                for s in 0..config.chunk_samples {
                    for d in 0..config.dim {
                        let value = MockSource::value_at(
                            &waveform,
                            &mut rng,
                            index + s as u64,
                            d,
                            config.sample_rate_hz,
                        );
                        if let Err(e) = write_numeric(&mut data, s * config.dim + d, value) {
                            warn!(source = %id, error = %e, "sample generation failed");
                            return;
                        }
                    }
                }
                let stream = match Stream::from_parts(
                    config.chunk_samples,
                    config.dim,
                    config.sample_rate_hz,
                    data,
                ) {
                    Ok(mut stream) => {
                        stream.set_time(index as f64 / config.sample_rate_hz);
                        stream
                    }
                    Err(e) => {
                        warn!(source = %id, error = %e, "chunk assembly failed");
                        return;
                    }
                };
                callback(stream);
                trace!(source = %id, index, "mock chunk pushed");

                index += config.chunk_samples as u64;
                if config.paced {
                    thread::sleep(interval);
                }
            }

            debug!(source = %id, "mock source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

fn write_numeric(data: &mut SampleData, idx: usize, value: f64) -> Result<(), PipelineError> {
    match data {
        SampleData::U8(v) => v[idx] = value as u8,
        SampleData::I16(v) => v[idx] = value as i16,
        SampleData::I32(v) => v[idx] = value as i32,
        SampleData::I64(v) => v[idx] = value as i64,
        SampleData::F32(v) => v[idx] = value as f32,
        SampleData::F64(v) => v[idx] = value,
        SampleData::Bool(v) => v[idx] = value != 0.0,
        other => {
            return Err(PipelineError::UnsupportedKind {
                kind: other.kind(),
                operation: "numeric generation",
            })
        }
    }
    Ok(())
}
