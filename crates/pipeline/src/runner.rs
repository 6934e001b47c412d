//! Component runners - one task per processing component
//!
//! Each runner drives the component state machine: windows are gathered from
//! every upstream reader (the single blocking point), the component is
//! invoked once per cycle, and `leave` runs exactly once on the way out,
//! whatever ended the loop.
//!
//! Error policy per cycle: a recoverable error logs and skips the cycle
//! (nothing is pushed downstream, the previous output content stays); a
//! fatal error ends the component; a closed upstream ends the branch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, error, info, warn};

use buffering::{ReaderHandle, StreamProvider};
use contracts::{ComponentId, Consumer, PipelineError, Stream, Transformer};

use crate::events::{PipelineEvent, StopReason};
use crate::stats::RunStats;

/// Everything a runner task needs besides the component itself
pub(crate) struct StageContext {
    pub id: ComponentId,
    pub readers: Vec<ReaderHandle>,
    pub events: async_channel::Sender<PipelineEvent>,
    pub stopping: Arc<AtomicBool>,
    pub stats: Arc<RunStats>,
}

pub(crate) async fn run_transformer(
    mut component: Box<dyn Transformer>,
    mut ctx: StageContext,
    mut output_stream: Stream,
    output: StreamProvider,
) {
    let reason = transformer_loop(component.as_mut(), &mut ctx, &mut output_stream, &output).await;

    if reason == StopReason::InputsClosed {
        // Exhaustion cascades downstream; a fatal abort deliberately does
        // not, so dependents keep blocking until the pipeline stops.
        output.close();
    }
    if let Err(e) = component.leave() {
        warn!(component = %ctx.id, error = %e, "leave hook failed");
    }
    finish(ctx, reason);
}

pub(crate) async fn run_consumer(mut component: Box<dyn Consumer>, mut ctx: StageContext) {
    let reason = consumer_loop(component.as_mut(), &mut ctx).await;
    if let Err(e) = component.leave() {
        warn!(component = %ctx.id, error = %e, "leave hook failed");
    }
    finish(ctx, reason);
}

async fn transformer_loop(
    component: &mut dyn Transformer,
    ctx: &mut StageContext,
    output_stream: &mut Stream,
    output: &StreamProvider,
) -> StopReason {
    let mut inputs: Vec<Stream> = Vec::with_capacity(ctx.readers.len());
    loop {
        inputs.clear();
        match gather_windows(ctx, &mut inputs).await {
            Ok(()) => {}
            Err(reason) => return reason,
        }

        let started = Instant::now();
        match component.transform(&inputs, output_stream) {
            Ok(()) => {
                output_stream.set_time(inputs[0].time());
                if let Err(e) = output.push(output_stream) {
                    return match e {
                        PipelineError::Closed { .. } => StopReason::Cancelled,
                        other => {
                            error!(component = %ctx.id, error = %other, "output push failed");
                            StopReason::Failed(other.to_string())
                        }
                    };
                }
                record_cycle(ctx, started);
            }
            Err(e) if e.is_fatal() => {
                error!(component = %ctx.id, error = %e, "fatal abort");
                return StopReason::Fatal(e.to_string());
            }
            Err(e) => skip_cycle(ctx, &e),
        }
    }
}

async fn consumer_loop(component: &mut dyn Consumer, ctx: &mut StageContext) -> StopReason {
    let mut inputs: Vec<Stream> = Vec::with_capacity(ctx.readers.len());
    loop {
        inputs.clear();
        match gather_windows(ctx, &mut inputs).await {
            Ok(()) => {}
            Err(reason) => return reason,
        }

        let started = Instant::now();
        match component.consume(&inputs) {
            Ok(()) => record_cycle(ctx, started),
            Err(e) if e.is_fatal() => {
                error!(component = %ctx.id, error = %e, "fatal abort");
                return StopReason::Fatal(e.to_string());
            }
            Err(e) => skip_cycle(ctx, &e),
        }
    }
}

/// Block until one aligned window per upstream is available
///
/// The stop flag is observed both before parking and after waking up.
async fn gather_windows(ctx: &mut StageContext, inputs: &mut Vec<Stream>) -> Result<(), StopReason> {
    if ctx.stopping.load(Ordering::Acquire) {
        return Err(StopReason::Cancelled);
    }
    for reader in &mut ctx.readers {
        match reader.next_window().await {
            Ok(window) => inputs.push(window.stream),
            Err(PipelineError::Closed { provider }) => {
                if ctx.stopping.load(Ordering::Acquire) {
                    return Err(StopReason::Cancelled);
                }
                info!(component = %ctx.id, provider = %provider, "upstream exhausted");
                return Err(StopReason::InputsClosed);
            }
            Err(e) => {
                error!(component = %ctx.id, error = %e, "window read failed");
                return Err(StopReason::Failed(e.to_string()));
            }
        }
    }
    Ok(())
}

fn record_cycle(ctx: &StageContext, started: Instant) {
    ctx.stats.record_cycle();
    histogram!("pipeline_cycle_duration_ms", "component" => ctx.id.to_string())
        .record(started.elapsed().as_secs_f64() * 1000.0);
}

fn skip_cycle(ctx: &StageContext, error: &PipelineError) {
    warn!(component = %ctx.id, error = %error, "cycle failed, skipping");
    ctx.stats.record_skipped_cycle();
    metrics::counter!("pipeline_cycles_skipped_total", "component" => ctx.id.to_string())
        .increment(1);
}

fn finish(ctx: StageContext, reason: StopReason) {
    ctx.stats.record_stopped();
    debug!(component = %ctx.id, reason = reason.as_str(), "component stopped");
    let _ = ctx.events.try_send(PipelineEvent::ComponentStopped {
        id: ctx.id,
        reason,
    });
}
