//! # Components
//!
//! Collaborator implementations built against the public contracts only:
//! mock signal sources, window transformers and side-effect consumers, plus
//! the factory resolving blueprint kinds to concrete components.
//!
//! No scheduling or synchronization logic lives here; components see aligned
//! windows and nothing else.

pub mod consumers;
pub mod factory;
pub mod sources;
pub mod transformers;

pub use consumers::{FileConsumer, LogConsumer};
pub use factory::{build_consumer, build_source, build_transformer};
pub use sources::{MockSource, MockSourceConfig, Waveform};
pub use transformers::{MinMax, Selector};
