//! PipelineBlueprint - declarative pipeline description
//!
//! Parsed from TOML/JSON by the config loader and assembled into a running
//! graph by the CLI. Component kinds are closed enumerations resolved by an
//! explicit lookup; an unknown kind is a parse error, never a silent
//! fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{OptionValue, SampleType, WindowSpec};

/// Blueprint schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline description: global settings, sources, processing graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// Schema version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Global engine settings
    #[serde(default)]
    pub settings: PipelineSettings,

    /// Signal source definitions
    pub sources: Vec<SourceSpec>,

    /// Transformer definitions
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,

    /// Consumer definitions
    #[serde(default)]
    pub consumers: Vec<ConsumerSpec>,
}

/// Global engine settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    /// Provider buffer length in seconds; must cover the largest window
    #[serde(default = "default_buffer_size_s")]
    #[validate(range(min = 0.1, max = 3600.0))]
    pub buffer_size_s: f64,

    /// Shutdown grace period in seconds before tasks are abandoned
    #[serde(default = "default_grace_s")]
    #[validate(range(min = 0.1, max = 600.0))]
    pub grace_s: f64,

    /// Prometheus exporter port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Stop the whole pipeline when any source fails, instead of halting
    /// only the affected branch
    #[serde(default)]
    pub stop_on_source_error: bool,
}

fn default_buffer_size_s() -> f64 {
    2.0
}

fn default_grace_s() -> f64 {
    2.0
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            buffer_size_s: default_buffer_size_s(),
            grace_s: default_grace_s(),
            metrics_port: None,
            stop_on_source_error: false,
        }
    }
}

/// Built-in source kinds (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sine,
    Counter,
    Noise,
}

/// One signal source definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Unique id; also names the source's provider
    pub id: String,

    /// Source kind
    pub kind: SourceKind,

    /// Sample rate in Hz, must be > 0
    pub sample_rate_hz: f64,

    /// Channels per sample
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Element kind
    #[serde(default)]
    pub sample_type: SampleType,

    /// Samples per pushed chunk (default: one tenth of a second)
    #[serde(default)]
    pub chunk_samples: Option<usize>,

    /// Kind-specific options
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

fn default_dim() -> usize {
    1
}

/// Built-in transformer kinds (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerKind {
    MinMax,
    Selector,
}

/// One transformer definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSpec {
    /// Unique id; also names the transformer's output provider
    pub id: String,

    /// Transformer kind
    pub kind: TransformerKind,

    /// Upstream ids (source or transformer ids)
    pub inputs: Vec<String>,

    /// Window length per cycle
    pub frame: WindowSpec,

    /// Samples shared between consecutive windows
    #[serde(default)]
    pub overlap: WindowSpec,

    /// Kind-specific options
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

/// Built-in consumer kinds (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    Log,
    File,
}

/// One consumer definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerSpec {
    /// Unique id
    pub id: String,

    /// Consumer kind
    pub kind: ConsumerKind,

    /// Upstream ids (source or transformer ids)
    pub inputs: Vec<String>,

    /// Window length per cycle
    pub frame: WindowSpec,

    /// Samples shared between consecutive windows
    #[serde(default)]
    pub overlap: WindowSpec,

    /// Kind-specific options
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}
