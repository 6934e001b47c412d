//! Consumer implementations

mod file;
mod log;

pub use file::FileConsumer;
pub use log::LogConsumer;
