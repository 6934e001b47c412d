//! # Contracts
//!
//! Frozen interface contracts, defining inter-crate data structures and
//! traits. All engine and collaborator crates depend only on this crate;
//! reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All streams carry a start time in seconds (f64) relative to the shared
//!   pipeline epoch fixed at start
//! - Sample indices are monotonic per provider; time = index / rate

mod blueprint;
mod component;
mod component_id;
mod error;
mod options;
mod sample;
mod stream;
mod window;

pub use blueprint::*;
pub use component::{Consumer, SignalSource, SourceCallback, SourceShape, Transformer};
pub use component_id::ComponentId;
pub use error::PipelineError;
pub use options::{OptionEntry, OptionValue, Options};
pub use sample::{SampleData, SampleType};
pub use stream::Stream;
pub use window::WindowSpec;
