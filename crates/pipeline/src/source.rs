//! Source driver - wires a SignalSource to its provider
//!
//! The source runs on its own thread and hands chunks to the provider
//! through a callback; acquisition failures surface as events so the
//! orchestrator can react without touching other branches.

use std::sync::Arc;

use tracing::{debug, warn};

use buffering::StreamProvider;
use contracts::{ComponentId, PipelineError, SignalSource, SourceCallback, Stream};

use crate::events::PipelineEvent;
use crate::stats::RunStats;

/// Connect the source and start pushing into the provider
pub(crate) fn start_source(
    source: &mut dyn SignalSource,
    provider: StreamProvider,
    events: async_channel::Sender<PipelineEvent>,
    stats: Arc<RunStats>,
) -> Result<(), PipelineError> {
    source.connect()?;

    let id: ComponentId = source.id().into();
    debug!(source = %id, "source connected");

    let callback_id = id.clone();
    let callback: SourceCallback = Arc::new(move |chunk: Stream| {
        match provider.push(&chunk) {
            Ok(()) => {}
            // Shutdown race: the source thread may still be flushing a chunk
            // while the provider is already closed.
            Err(PipelineError::Closed { .. }) => {}
            Err(e) => {
                warn!(source = %callback_id, error = %e, "chunk dropped");
                stats.record_source_error();
                let _ = events.try_send(PipelineEvent::SourceError {
                    id: callback_id.clone(),
                    message: e.to_string(),
                });
            }
        }
    });
    source.listen(callback);
    Ok(())
}
