//! Window sizing - frame and overlap specifications
//!
//! Components declare how much input they need per cycle either in samples
//! at the upstream provider's rate, or in seconds. Seconds are the portable
//! form: one `Seconds` spec resolves to a different sample count on each
//! provider, covering the same real-world interval everywhere.

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Frame or overlap length
///
/// Serialized untagged: integers read as samples, floats as seconds
/// (`frame = 32` vs `frame = 0.1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSpec {
    /// Length in samples at the provider's own rate
    Samples(usize),
    /// Length in seconds, resolved per provider rate
    Seconds(f64),
}

impl WindowSpec {
    /// Zero-length spec, the default overlap
    pub const fn none() -> Self {
        Self::Samples(0)
    }

    /// Resolve to a sample count at the given rate
    ///
    /// Zero is a valid result (empty overlap); callers enforce frame > 0.
    pub fn resolve(self, sample_rate: f64) -> Result<usize, PipelineError> {
        match self {
            Self::Samples(n) => Ok(n),
            Self::Seconds(s) => {
                if !(s.is_finite() && s >= 0.0) {
                    return Err(PipelineError::ShapeMismatch {
                        message: format!("window seconds must be finite and >= 0, got {s}"),
                    });
                }
                Ok((s * sample_rate).round() as usize)
            }
        }
    }

    /// Covered duration in seconds at the given rate
    pub fn duration(self, sample_rate: f64) -> Result<f64, PipelineError> {
        Ok(self.resolve(sample_rate)? as f64 / sample_rate)
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::none()
    }
}
