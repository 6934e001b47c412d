//! Signal source implementations

mod mock;

pub use mock::{MockSource, MockSourceConfig, Waveform};
