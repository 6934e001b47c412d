//! # Buffering
//!
//! Circular stream buffers decoupling producer and consumer cadences.
//!
//! Responsibilities:
//! - Single-writer, multi-reader ring per provider
//! - Blocking windowed reads with per-reader cursor, frame and overlap
//! - Overwrite-oldest overrun policy with per-reader loss accounting
//! - Cooperative cancellation via `close()`
//!
//! ## Usage Example
//!
//! ```ignore
//! use buffering::StreamProvider;
//! use contracts::{SampleType, SourceShape};
//!
//! let provider = StreamProvider::new("imu", shape, Vec::new())?;
//! let mut reader = provider.register_reader(32, 8)?;
//! provider.allocate(2048)?;
//!
//! // writer side, any thread
//! provider.push(&chunk)?;
//!
//! // reader side, one task per consumer
//! while let Ok(window) = reader.next_window().await {
//!     process(&window.stream);
//! }
//! ```

mod provider;
mod ring;

pub use provider::{ProviderSnapshot, ReaderHandle, StreamProvider, Window};
