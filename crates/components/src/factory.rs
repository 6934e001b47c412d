//! Blueprint factory - closed lookup from spec kinds to components
//!
//! Each kind maps to exactly one constructor; option maps are applied
//! through the component's own option bag, so unknown options fail with a
//! validation error instead of being dropped.

use contracts::{
    Consumer, ConsumerKind, ConsumerSpec, OptionValue, Options, PipelineError, SignalSource,
    SourceKind, SourceSpec, Transformer, TransformerKind, TransformerSpec,
};

use crate::consumers::{FileConsumer, LogConsumer};
use crate::sources::{MockSource, MockSourceConfig, Waveform};
use crate::transformers::{MinMax, Selector};

/// Build a signal source from its spec
pub fn build_source(spec: &SourceSpec) -> Result<Box<dyn SignalSource>, PipelineError> {
    if !(spec.sample_rate_hz.is_finite() && spec.sample_rate_hz > 0.0) {
        return Err(PipelineError::config_validation(
            format!("sources[{}].sample_rate_hz", spec.id),
            format!("must be > 0, got {}", spec.sample_rate_hz),
        ));
    }
    if !spec.sample_type.is_numeric() {
        return Err(PipelineError::config_validation(
            format!("sources[{}].sample_type", spec.id),
            format!("mock sources cannot generate '{}'", spec.sample_type),
        ));
    }

    let waveform = match spec.kind {
        SourceKind::Sine => {
            let mut options = Options::new(spec.id.clone())
                .define("frequency_hz", OptionValue::Float(1.0), "sine frequency")
                .define("amplitude", OptionValue::Float(1.0), "sine amplitude");
            options.apply(&spec.options)?;
            Waveform::Sine {
                frequency_hz: options.get_float("frequency_hz")?,
                amplitude: options.get_float("amplitude")?,
            }
        }
        SourceKind::Counter => {
            let mut options = Options::new(spec.id.clone());
            options.apply(&spec.options)?;
            Waveform::Counter
        }
        SourceKind::Noise => {
            let mut options = Options::new(spec.id.clone()).define(
                "seed",
                OptionValue::Int(0),
                "random seed",
            );
            options.apply(&spec.options)?;
            Waveform::Noise {
                seed: options.get_int("seed")? as u64,
            }
        }
    };

    let chunk_samples = spec
        .chunk_samples
        .unwrap_or_else(|| ((spec.sample_rate_hz / 10.0).ceil() as usize).max(1));
    let config = MockSourceConfig {
        sample_rate_hz: spec.sample_rate_hz,
        dim: spec.dim,
        kind: spec.sample_type,
        chunk_samples,
        paced: true,
    };
    Ok(Box::new(MockSource::new(spec.id.clone(), config, waveform)))
}

/// Build a transformer from its spec
pub fn build_transformer(spec: &TransformerSpec) -> Result<Box<dyn Transformer>, PipelineError> {
    match spec.kind {
        TransformerKind::MinMax => {
            let mut component = MinMax::new(spec.id.clone());
            component.options_mut().apply(&spec.options)?;
            Ok(Box::new(component))
        }
        TransformerKind::Selector => {
            let mut component = Selector::new(spec.id.clone());
            component.options_mut().apply(&spec.options)?;
            Ok(Box::new(component))
        }
    }
}

/// Build a consumer from its spec
pub fn build_consumer(spec: &ConsumerSpec) -> Result<Box<dyn Consumer>, PipelineError> {
    match spec.kind {
        ConsumerKind::Log => {
            let mut component = LogConsumer::new(spec.id.clone());
            component.options_mut().apply(&spec.options)?;
            Ok(Box::new(component))
        }
        ConsumerKind::File => {
            let mut component = FileConsumer::new(spec.id.clone());
            component.options_mut().apply(&spec.options)?;
            Ok(Box::new(component))
        }
    }
}
