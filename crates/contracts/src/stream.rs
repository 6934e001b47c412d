//! Stream - typed, fixed-shape sample buffer
//!
//! The unit of data exchange between providers and processing components:
//! `num` samples of `dim` channels at a fixed sample rate, with per-channel
//! labels and a start time relative to the pipeline epoch.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{PipelineError, SampleData, SampleType};

/// Typed, multi-channel sample buffer
///
/// Shape (`num`, `dim`, kind, rate) is fixed once allocated; only the sample
/// values and the start time change over the buffer's life. A stream is
/// mutated by exactly one producer and handed off by value or immutable
/// reference, never mutated after handoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    num: usize,
    dim: usize,
    sample_rate: f64,
    /// Start time of the first sample, seconds since the pipeline epoch
    time: f64,
    data: SampleData,
    labels: Vec<String>,
    labels_fixed: bool,
}

impl Stream {
    /// Default prefix for generated channel labels
    pub const LABEL_PREFIX: &'static str = "ch";

    /// Allocate a zeroed stream of the given shape
    pub fn new(
        num: usize,
        dim: usize,
        sample_rate: f64,
        kind: SampleType,
    ) -> Result<Self, PipelineError> {
        let len = check_shape(num, dim, sample_rate)?;
        Ok(Self {
            num,
            dim,
            sample_rate,
            time: 0.0,
            data: SampleData::zeroed(kind, len),
            labels: default_labels(dim),
            labels_fixed: false,
        })
    }

    /// Build a stream around existing sample storage
    ///
    /// `data.len()` must equal `num * dim`.
    pub fn from_parts(
        num: usize,
        dim: usize,
        sample_rate: f64,
        data: SampleData,
    ) -> Result<Self, PipelineError> {
        let len = check_shape(num, dim, sample_rate)?;
        if data.len() != len {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "storage of {} elements does not fit shape {num}x{dim}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            num,
            dim,
            sample_rate,
            time: 0.0,
            data,
            labels: default_labels(dim),
            labels_fixed: false,
        })
    }

    /// Number of samples
    pub fn num(&self) -> usize {
        self.num
    }

    /// Number of channels per sample
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Element kind
    pub fn kind(&self) -> SampleType {
        self.data.kind()
    }

    /// Width of one element in bytes
    pub fn sample_bytes(&self) -> usize {
        self.kind().size_of()
    }

    /// Covered duration in seconds
    pub fn duration(&self) -> f64 {
        self.num as f64 / self.sample_rate
    }

    /// Start time of the first sample, seconds since the pipeline epoch
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Set the start time (producer only)
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Backing sample storage
    pub fn data(&self) -> &SampleData {
        &self.data
    }

    /// Mutable backing sample storage (single producer only)
    pub fn data_mut(&mut self) -> &mut SampleData {
        &mut self.data
    }

    /// Per-channel labels, always of length `dim`
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Set channel labels, once
    ///
    /// A wrong-length set is ignored with a warning and the generated default
    /// labels remain in place; the same happens when labels were already
    /// fixed by an earlier call.
    pub fn set_labels(&mut self, labels: Vec<String>) {
        if self.labels_fixed {
            warn!(dim = self.dim, "stream labels already set, ignoring");
            return;
        }
        if labels.len() != self.dim {
            warn!(
                expected = self.dim,
                got = labels.len(),
                "label count does not match channel count, keeping defaults"
            );
            return;
        }
        self.labels = labels;
        self.labels_fixed = true;
    }
}

macro_rules! delegate_accessors {
    ($($ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        impl Stream {
            $(
                /// Typed view over the backing storage; fails on kind mismatch
                pub fn $as_ref(&self) -> Result<&[$ty], PipelineError> {
                    self.data.$as_ref()
                }

                /// Typed mutable view; fails on kind mismatch
                pub fn $as_mut(&mut self) -> Result<&mut [$ty], PipelineError> {
                    self.data.$as_mut()
                }
            )*
        }
    };
}

delegate_accessors! {
    u8, as_u8, as_u8_mut;
    i16, as_i16, as_i16_mut;
    i32, as_i32, as_i32_mut;
    i64, as_i64, as_i64_mut;
    f32, as_f32, as_f32_mut;
    f64, as_f64, as_f64_mut;
    bool, as_bool, as_bool_mut;
    char, as_char, as_char_mut;
    String, as_str_slice, as_str_slice_mut;
}

fn check_shape(num: usize, dim: usize, sample_rate: f64) -> Result<usize, PipelineError> {
    if dim == 0 {
        return Err(PipelineError::ShapeMismatch {
            message: "stream dimension must be at least 1".into(),
        });
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(PipelineError::ShapeMismatch {
            message: format!("sample rate must be positive, got {sample_rate}"),
        });
    }
    num.checked_mul(dim).ok_or_else(|| PipelineError::ShapeMismatch {
        message: format!("stream shape {num}x{dim} overflows"),
    })
}

fn default_labels(dim: usize) -> Vec<String> {
    (0..dim)
        .map(|i| format!("{}{i}", Stream::LABEL_PREFIX))
        .collect()
}
