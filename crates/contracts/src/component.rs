//! Component contracts - traits implemented by collaborators
//!
//! The engine schedules three kinds of nodes: signal sources feeding
//! providers, transformers producing a derived stream, and consumers
//! producing side effects. All scheduling and synchronization stays in the
//! engine; implementations only see aligned windows.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{PipelineError, SampleType, Stream};

/// Fixed shape of a signal source's output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceShape {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Channels per sample
    pub dim: usize,
    /// Element kind
    pub kind: SampleType,
}

/// Callback a source uses to hand freshly acquired chunks to its provider
///
/// Shared across contexts, hence `Arc`; the source thread calls it at its
/// own cadence.
pub type SourceCallback = Arc<dyn Fn(Stream) + Send + Sync>;

/// Signal source - the acquisition boundary
///
/// Runs on a dedicated thread owned by the implementation. `connect` is
/// called before the first push, `stop` on shutdown; repeated `listen` calls
/// must be idempotent. Acquisition failures are surfaced as
/// [`PipelineError::Source`] so the orchestrator can halt the affected
/// branch without taking down the rest of the graph.
pub trait SignalSource: Send + Sync {
    /// Unique source id
    fn id(&self) -> &str;

    /// Declared output shape
    fn shape(&self) -> SourceShape;

    /// Acquire the underlying device; must precede the first push
    fn connect(&mut self) -> Result<(), PipelineError>;

    /// Start producing; each acquired chunk goes through `callback`
    fn listen(&self, callback: SourceCallback);

    /// Stop producing and release the device
    fn stop(&self);

    /// Whether the acquisition thread is currently running
    fn is_listening(&self) -> bool;
}

/// Transformer - consumes aligned input windows, fills one output stream
///
/// Shape negotiation happens once, against zeroed prototype windows of the
/// resolved input shapes, before any data flows: the negotiated output
/// stream is allocated a single time and refilled every cycle.
///
/// Errors returned from `transform` skip the current cycle only;
/// [`PipelineError::FatalAbort`] stops the component.
pub trait Transformer: Send {
    /// Component name used in logs and errors
    fn name(&self) -> &str;

    /// Channels of the output stream, given the input windows
    fn output_dim(&mut self, inputs: &[Stream]) -> Result<usize, PipelineError>;

    /// Element kind of the output stream
    fn output_kind(&mut self, inputs: &[Stream]) -> Result<SampleType, PipelineError>;

    /// Bytes per output element; derived from the kind unless overridden
    fn output_bytes(&mut self, inputs: &[Stream]) -> Result<usize, PipelineError> {
        Ok(self.output_kind(inputs)?.size_of())
    }

    /// Output samples produced per cycle, given input samples of the first
    /// upstream window
    fn output_num(&mut self, input_num: usize) -> usize;

    /// Label the output channels; the default keeps generated labels
    fn define_output_labels(&mut self, inputs: &[Stream], output: &mut Stream) {
        let _ = (inputs, output);
    }

    /// One-time validation and setup before the first cycle
    ///
    /// A failure here disables this component only.
    fn enter(&mut self, inputs: &[Stream], output: &mut Stream) -> Result<(), PipelineError> {
        let _ = (inputs, output);
        Ok(())
    }

    /// Produce one output window from the aligned input windows
    fn transform(&mut self, inputs: &[Stream], output: &mut Stream)
        -> Result<(), PipelineError>;

    /// Teardown, called exactly once after the last cycle
    fn leave(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Consumer - consumes aligned input windows for a side effect
pub trait Consumer: Send {
    /// Component name used in logs and errors
    fn name(&self) -> &str;

    /// One-time validation and setup before the first cycle
    fn enter(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
        let _ = inputs;
        Ok(())
    }

    /// Handle one cycle's aligned input windows
    fn consume(&mut self, inputs: &[Stream]) -> Result<(), PipelineError>;

    /// Teardown, called exactly once after the last cycle
    fn leave(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}
