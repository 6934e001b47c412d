//! Pipeline - registry and lifecycle controller
//!
//! An explicit context object: register sources, providers, transformers and
//! consumers while building, then `start()` spawns one task per processing
//! component and one acquisition thread per source, all anchored to a shared
//! epoch. `stop()` cancels cooperatively and joins within a grace period.
//! A stopped pipeline cannot be restarted; `invalidate()` resets the
//! registry for reuse.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use buffering::{ProviderSnapshot, ReaderHandle, StreamProvider};
use contracts::{
    ComponentId, Consumer, PipelineError, PipelineSettings, SignalSource, SourceShape, Stream,
    Transformer, WindowSpec,
};

use crate::events::PipelineEvent;
use crate::runner::{run_consumer, run_transformer, StageContext};
use crate::source::start_source;
use crate::stats::{RunStats, StatsSnapshot};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Provider buffer length in seconds
    pub buffer_size_s: f64,
    /// Grace period for joining tasks on stop
    pub grace: Duration,
    /// Stop everything when any source fails, instead of only its branch
    pub stop_on_source_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size_s: 2.0,
            grace: Duration::from_secs(2),
            stop_on_source_error: false,
        }
    }
}

impl PipelineConfig {
    /// Build from parsed blueprint settings
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            buffer_size_s: settings.buffer_size_s,
            grace: Duration::from_secs_f64(settings.grace_s),
            stop_on_source_error: settings.stop_on_source_error,
        }
    }
}

/// Handle to a registered source, scoped to one pipeline instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceKey {
    graph: u64,
    index: usize,
}

/// Handle to a registered provider, scoped to one pipeline instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderKey {
    graph: u64,
    index: usize,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Building,
    Running,
    Stopped,
}

/// Shared wall-clock / monotonic anchor fixed at start
#[derive(Debug, Clone, Copy)]
pub struct Epoch {
    pub monotonic: Instant,
    pub wall: SystemTime,
}

struct SourceEntry {
    source: Box<dyn SignalSource>,
    provider: Option<usize>,
}

enum ProviderOrigin {
    Source,
    Stage(usize),
}

struct ProviderEntry {
    provider: StreamProvider,
    origin: ProviderOrigin,
}

enum StageComponent {
    Transformer {
        component: Box<dyn Transformer>,
        template: Stream,
        output: usize,
    },
    Consumer {
        component: Box<dyn Consumer>,
    },
}

struct StageEntry {
    id: ComponentId,
    component: Option<StageComponent>,
    inputs: Vec<usize>,
    /// Frame per input, resolved to samples at that provider's rate
    frames: Vec<usize>,
    /// Overlap per input, resolved likewise
    overlaps: Vec<usize>,
}

/// Registry and lifecycle controller for one pipeline graph
pub struct Pipeline {
    graph_id: u64,
    config: PipelineConfig,
    state: PipelineState,
    sources: Vec<SourceEntry>,
    providers: Vec<ProviderEntry>,
    stages: Vec<StageEntry>,
    tasks: Vec<(ComponentId, JoinHandle<()>)>,
    monitor: Option<JoinHandle<()>>,
    events_tx: async_channel::Sender<PipelineEvent>,
    events_rx: Option<async_channel::Receiver<PipelineEvent>>,
    stopping: Arc<AtomicBool>,
    stats: Arc<RunStats>,
    epoch: Option<Epoch>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let (events_tx, events_rx) = async_channel::unbounded();
        Self {
            graph_id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state: PipelineState::Building,
            sources: Vec::new(),
            providers: Vec::new(),
            stages: Vec::new(),
            tasks: Vec::new(),
            monitor: None,
            events_tx,
            events_rx: Some(events_rx),
            stopping: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RunStats::new()),
            epoch: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Epoch of the current run, once started
    pub fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    /// Run counters of the current (or finished) run
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Counters of one provider
    pub fn provider_snapshot(&self, key: ProviderKey) -> Option<ProviderSnapshot> {
        if key.graph != self.graph_id {
            return None;
        }
        self.providers.get(key.index).map(|p| p.provider.snapshot())
    }

    /// Register a signal source
    pub fn add_source(
        &mut self,
        source: Box<dyn SignalSource>,
    ) -> Result<SourceKey, PipelineError> {
        self.ensure_building("add_source")?;
        let id = source.id().to_string();
        if self.id_in_use(&id) {
            return Err(PipelineError::validation(
                &id,
                "duplicate component id",
            ));
        }
        self.sources.push(SourceEntry {
            source,
            provider: None,
        });
        Ok(SourceKey {
            graph: self.graph_id,
            index: self.sources.len() - 1,
        })
    }

    /// Create the provider fed by a registered source
    ///
    /// One provider per source; empty `labels` generate defaults.
    pub fn add_provider(
        &mut self,
        source: SourceKey,
        labels: Vec<String>,
    ) -> Result<ProviderKey, PipelineError> {
        self.ensure_building("add_provider")?;
        if source.graph != self.graph_id {
            return Err(PipelineError::validation(
                "pipeline",
                "source key belongs to a different pipeline instance",
            ));
        }
        let entry = self.sources.get(source.index).ok_or_else(|| {
            PipelineError::validation("pipeline", format!("unknown source index {}", source.index))
        })?;
        if entry.provider.is_some() {
            return Err(PipelineError::validation(
                entry.source.id(),
                "source already has a provider",
            ));
        }
        let provider =
            StreamProvider::new(entry.source.id(), entry.source.shape(), labels)?;
        self.providers.push(ProviderEntry {
            provider,
            origin: ProviderOrigin::Source,
        });
        let index = self.providers.len() - 1;
        self.sources[source.index].provider = Some(index);
        Ok(ProviderKey {
            graph: self.graph_id,
            index,
        })
    }

    /// Register a transformer reading from `inputs`
    ///
    /// Output shape is negotiated immediately against zeroed prototype
    /// windows, and the transformer's output provider is returned so further
    /// components can chain on it.
    #[instrument(name = "pipeline_add_transformer", skip_all, fields(component = component.name()))]
    pub fn add_transformer(
        &mut self,
        mut component: Box<dyn Transformer>,
        inputs: &[ProviderKey],
        frame: WindowSpec,
        overlap: WindowSpec,
    ) -> Result<ProviderKey, PipelineError> {
        self.ensure_building("add_transformer")?;
        let id = component.name().to_string();
        let (input_indices, frames, overlaps) = self.resolve_stage(&id, inputs, frame, overlap)?;

        let prototypes = self.prototype_inputs(&input_indices, &frames)?;
        let out_kind = component.output_kind(&prototypes)?;
        let out_dim = component.output_dim(&prototypes)?;
        if out_dim == 0 {
            return Err(PipelineError::validation(&id, "output dimension is 0"));
        }
        let out_num = component.output_num(frames[0]);
        if out_num == 0 {
            return Err(PipelineError::validation(&id, "output sample count is 0"));
        }

        // The first input paces the cycle: output rate preserves real time
        // across the step the reader advances per cycle.
        let in_rate = self.providers[input_indices[0]].provider.shape().sample_rate;
        let step_s = (frames[0] - overlaps[0]) as f64 / in_rate;
        let out_rate = out_num as f64 / step_s;

        let mut template = Stream::new(out_num, out_dim, out_rate, out_kind)?;
        component.define_output_labels(&prototypes, &mut template);

        let provider = StreamProvider::new(
            id.as_str(),
            SourceShape {
                sample_rate: out_rate,
                dim: out_dim,
                kind: out_kind,
            },
            template.labels().to_vec(),
        )?;
        debug!(
            component = %id,
            out_rate,
            out_dim,
            out_num,
            kind = %out_kind,
            "output shape negotiated"
        );

        self.providers.push(ProviderEntry {
            provider,
            origin: ProviderOrigin::Stage(self.stages.len()),
        });
        let output = self.providers.len() - 1;
        self.stages.push(StageEntry {
            id: id.into(),
            component: Some(StageComponent::Transformer {
                component,
                template,
                output,
            }),
            inputs: input_indices,
            frames,
            overlaps,
        });
        Ok(ProviderKey {
            graph: self.graph_id,
            index: output,
        })
    }

    /// Register a consumer reading from `inputs`
    pub fn add_consumer(
        &mut self,
        component: Box<dyn Consumer>,
        inputs: &[ProviderKey],
        frame: WindowSpec,
        overlap: WindowSpec,
    ) -> Result<(), PipelineError> {
        self.ensure_building("add_consumer")?;
        let id = component.name().to_string();
        let (input_indices, frames, overlaps) = self.resolve_stage(&id, inputs, frame, overlap)?;
        self.stages.push(StageEntry {
            id: id.into(),
            component: Some(StageComponent::Consumer { component }),
            inputs: input_indices,
            frames,
            overlaps,
        });
        Ok(())
    }

    /// Validate the graph, size the buffers, enter every component, then
    /// spawn one task per component and start every source
    ///
    /// A component failing validation in `enter` is disabled and logged;
    /// the rest of the graph still runs.
    #[instrument(name = "pipeline_start", skip(self))]
    pub fn start(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Building => {}
            PipelineState::Running => {
                return Err(PipelineError::lifecycle("pipeline is already running"))
            }
            PipelineState::Stopped => {
                return Err(PipelineError::lifecycle(
                    "a stopped pipeline cannot be restarted; invalidate() it first",
                ))
            }
        }
        self.validate_graph()?;
        self.size_and_allocate()?;

        self.epoch = Some(Epoch {
            monotonic: Instant::now(),
            wall: SystemTime::now(),
        });

        self.enter_and_spawn();
        self.spawn_monitor();

        let mut connect_errors = Vec::new();
        for entry in &mut self.sources {
            let Some(provider_index) = entry.provider else {
                warn!(source = entry.source.id(), "source has no provider, skipping");
                continue;
            };
            let provider = self.providers[provider_index].provider.clone();
            if let Err(e) = start_source(
                entry.source.as_mut(),
                provider,
                self.events_tx.clone(),
                Arc::clone(&self.stats),
            ) {
                error!(source = entry.source.id(), error = %e, "source failed to connect");
                self.stats.record_source_error();
                let _ = self.events_tx.try_send(PipelineEvent::SourceError {
                    id: entry.source.id().into(),
                    message: e.to_string(),
                });
                connect_errors.push(e);
            }
        }
        if self.config.stop_on_source_error {
            if let Some(first) = connect_errors.into_iter().next() {
                self.state = PipelineState::Running;
                return Err(first);
            }
        }

        self.state = PipelineState::Running;
        info!(
            sources = self.sources.len(),
            providers = self.providers.len(),
            components = self.stages.len(),
            "pipeline started"
        );
        Ok(())
    }

    /// Cancel all components and sources, join tasks within the grace period
    ///
    /// Idempotent; calling `stop` on a pipeline that is not running is a
    /// no-op.
    #[instrument(name = "pipeline_stop", skip(self))]
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Running {
            debug!("stop on a non-running pipeline is a no-op");
            return Ok(());
        }
        info!("stopping pipeline");
        self.stopping.store(true, Ordering::Release);

        for entry in &self.sources {
            entry.source.stop();
        }
        for entry in &self.providers {
            entry.provider.close();
        }

        let deadline = Instant::now() + self.config.grace;
        let tasks: Vec<_> = self.tasks.drain(..).collect();
        for (id, mut handle) in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_error)) => {
                    error!(component = %id, error = %join_error, "component task panicked");
                }
                Err(_) => {
                    error!(
                        component = %id,
                        grace_ms = self.config.grace.as_millis() as u64,
                        "component did not stop within grace period, abandoning"
                    );
                    handle.abort();
                }
            }
        }

        // Let the monitor drain and exit once all event senders are gone.
        let (replacement_tx, _replacement_rx) = async_channel::unbounded();
        drop(std::mem::replace(&mut self.events_tx, replacement_tx));
        if let Some(mut monitor) = self.monitor.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining.max(Duration::from_millis(50)), &mut monitor)
                .await
                .is_err()
            {
                monitor.abort();
            }
        }

        self.state = PipelineState::Stopped;
        let stats = self.stats.snapshot();
        info!(
            cycles_run = stats.cycles_run,
            cycles_skipped = stats.cycles_skipped,
            components_stopped = stats.components_stopped,
            "pipeline stopped"
        );
        Ok(())
    }

    /// Clear all registrations and return to the buildable state
    ///
    /// Rejected while running; the fresh registry gets a new key scope, so
    /// handles from the previous graph are no longer valid.
    pub fn invalidate(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::lifecycle(
                "cannot invalidate a running pipeline, stop it first",
            ));
        }
        let (events_tx, events_rx) = async_channel::unbounded();
        self.graph_id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        self.sources.clear();
        self.providers.clear();
        self.stages.clear();
        self.tasks.clear();
        self.monitor = None;
        self.events_tx = events_tx;
        self.events_rx = Some(events_rx);
        self.stopping = Arc::new(AtomicBool::new(false));
        self.stats = Arc::new(RunStats::new());
        self.epoch = None;
        self.state = PipelineState::Building;
        debug!("pipeline invalidated");
        Ok(())
    }

    fn ensure_building(&self, operation: &str) -> Result<(), PipelineError> {
        if self.state != PipelineState::Building {
            return Err(PipelineError::lifecycle(format!(
                "{operation} rejected: the graph cannot change after start()"
            )));
        }
        Ok(())
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.sources.iter().any(|s| s.source.id() == id)
            || self.stages.iter().any(|s| s.id == *id)
    }

    /// Common input validation for transformers and consumers
    fn resolve_stage(
        &self,
        id: &str,
        inputs: &[ProviderKey],
        frame: WindowSpec,
        overlap: WindowSpec,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>), PipelineError> {
        if self.id_in_use(id) {
            return Err(PipelineError::validation(id, "duplicate component id"));
        }
        if inputs.is_empty() {
            return Err(PipelineError::validation(id, "at least one input required"));
        }
        let mut indices = Vec::with_capacity(inputs.len());
        let mut frames = Vec::with_capacity(inputs.len());
        let mut overlaps = Vec::with_capacity(inputs.len());
        let mut duration = None;
        for key in inputs {
            if key.graph != self.graph_id {
                return Err(PipelineError::validation(
                    id,
                    "input provider was not registered with this pipeline",
                ));
            }
            let entry = self.providers.get(key.index).ok_or_else(|| {
                PipelineError::validation(id, format!("unknown provider index {}", key.index))
            })?;
            let rate = entry.provider.shape().sample_rate;
            let frame_samples = frame.resolve(rate)?;
            let overlap_samples = overlap.resolve(rate)?;
            if frame_samples == 0 {
                return Err(PipelineError::validation(
                    id,
                    format!("frame resolves to 0 samples at {rate} Hz"),
                ));
            }
            if overlap_samples >= frame_samples {
                return Err(PipelineError::validation(
                    id,
                    format!("overlap {overlap_samples} must be smaller than frame {frame_samples}"),
                ));
            }
            // All inputs must cover the same real-world interval per cycle,
            // otherwise windows drift apart over time.
            let this_duration = frame_samples as f64 / rate;
            match duration {
                None => duration = Some(this_duration),
                Some(d) if (d - this_duration).abs() > d * 1e-6 => {
                    return Err(PipelineError::validation(
                        id,
                        format!(
                            "window durations diverge across inputs: {d}s vs {this_duration}s"
                        ),
                    ));
                }
                Some(_) => {}
            }
            indices.push(key.index);
            frames.push(frame_samples);
            overlaps.push(overlap_samples);
        }
        Ok((indices, frames, overlaps))
    }

    /// Zeroed input windows of the resolved shapes, for negotiation/enter
    fn prototype_inputs(
        &self,
        inputs: &[usize],
        frames: &[usize],
    ) -> Result<Vec<Stream>, PipelineError> {
        inputs
            .iter()
            .zip(frames)
            .map(|(index, frame)| {
                let provider = &self.providers[*index].provider;
                let shape = provider.shape();
                let mut stream = Stream::new(*frame, shape.dim, shape.sample_rate, shape.kind)?;
                stream.set_labels(provider.labels().to_vec());
                Ok(stream)
            })
            .collect()
    }

    /// Re-validates at start what registration already enforced
    fn validate_graph(&self) -> Result<(), PipelineError> {
        for (index, stage) in self.stages.iter().enumerate() {
            for input in &stage.inputs {
                let Some(entry) = self.providers.get(*input) else {
                    return Err(PipelineError::validation(
                        stage.id.as_str(),
                        "input provider missing from registry",
                    ));
                };
                // Edges only point at providers that existed when the stage
                // was added, so a forward edge means a corrupted graph.
                if let ProviderOrigin::Stage(origin) = entry.origin {
                    if origin >= index {
                        return Err(PipelineError::validation(
                            stage.id.as_str(),
                            "graph is not a DAG",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Buffer sizing: the configured seconds, but never less than twice the
    /// largest window any reader needs
    fn size_and_allocate(&mut self) -> Result<(), PipelineError> {
        let mut required = vec![0usize; self.providers.len()];
        for stage in &self.stages {
            for ((input, frame), overlap) in
                stage.inputs.iter().zip(&stage.frames).zip(&stage.overlaps)
            {
                required[*input] = required[*input].max(2 * (frame + overlap));
            }
        }
        for (entry, required) in self.providers.iter().zip(required) {
            let rate = entry.provider.shape().sample_rate;
            let configured = (self.config.buffer_size_s * rate).ceil() as usize;
            entry.provider.allocate(configured.max(required).max(1))?;
        }
        Ok(())
    }

    /// Enter every component against prototype windows and spawn the tasks
    /// of those that validated
    fn enter_and_spawn(&mut self) {
        for stage_index in 0..self.stages.len() {
            let stage = &mut self.stages[stage_index];
            let Some(component) = stage.component.take() else {
                continue;
            };
            let id = stage.id.clone();
            let inputs = stage.inputs.clone();
            let frames = stage.frames.clone();
            let overlaps = stage.overlaps.clone();

            let prototypes = match self.prototype_inputs(&inputs, &frames) {
                Ok(p) => p,
                Err(e) => {
                    self.disable(&id, e);
                    continue;
                }
            };

            match component {
                StageComponent::Transformer {
                    mut component,
                    mut template,
                    output,
                } => {
                    if let Err(e) = component.enter(&prototypes, &mut template) {
                        self.disable(&id, e);
                        continue;
                    }
                    let readers = match self.register_readers(&inputs, &frames, &overlaps) {
                        Ok(r) => r,
                        Err(e) => {
                            self.disable(&id, e);
                            continue;
                        }
                    };
                    let ctx = self.stage_context(id.clone(), readers);
                    let provider = self.providers[output].provider.clone();
                    let handle =
                        tokio::spawn(run_transformer(component, ctx, template, provider));
                    self.tasks.push((id, handle));
                }
                StageComponent::Consumer { mut component } => {
                    if let Err(e) = component.enter(&prototypes) {
                        self.disable(&id, e);
                        continue;
                    }
                    let readers = match self.register_readers(&inputs, &frames, &overlaps) {
                        Ok(r) => r,
                        Err(e) => {
                            self.disable(&id, e);
                            continue;
                        }
                    };
                    let ctx = self.stage_context(id.clone(), readers);
                    let handle = tokio::spawn(run_consumer(component, ctx));
                    self.tasks.push((id, handle));
                }
            }
        }
    }

    fn register_readers(
        &self,
        inputs: &[usize],
        frames: &[usize],
        overlaps: &[usize],
    ) -> Result<Vec<ReaderHandle>, PipelineError> {
        inputs
            .iter()
            .zip(frames)
            .zip(overlaps)
            .map(|((input, frame), overlap)| {
                self.providers[*input]
                    .provider
                    .register_reader(*frame, *overlap)
            })
            .collect()
    }

    fn stage_context(&self, id: ComponentId, readers: Vec<ReaderHandle>) -> StageContext {
        StageContext {
            id,
            readers,
            events: self.events_tx.clone(),
            stopping: Arc::clone(&self.stopping),
            stats: Arc::clone(&self.stats),
        }
    }

    fn disable(&self, id: &ComponentId, error: PipelineError) {
        error!(component = %id, error = %error, "component disabled");
        self.stats.record_disabled();
        let _ = self.events_tx.try_send(PipelineEvent::ComponentDisabled {
            id: id.clone(),
            message: error.to_string(),
        });
    }

    fn spawn_monitor(&mut self) {
        let Some(events_rx) = self.events_rx.take() else {
            return;
        };
        let stopping = Arc::clone(&self.stopping);
        let stop_on_source_error = self.config.stop_on_source_error;
        let providers: Vec<StreamProvider> =
            self.providers.iter().map(|p| p.provider.clone()).collect();

        self.monitor = Some(tokio::spawn(async move {
            while let Ok(event) = events_rx.recv().await {
                match event {
                    PipelineEvent::SourceError { id, message } => {
                        error!(source = %id, message = %message, "source error");
                        if stop_on_source_error && !stopping.swap(true, Ordering::AcqRel) {
                            warn!(
                                providers = providers.len(),
                                "source error is configured as fatal, closing all providers"
                            );
                            for provider in &providers {
                                provider.close();
                            }
                        }
                    }
                    PipelineEvent::ComponentDisabled { id, message } => {
                        warn!(component = %id, message = %message, "component disabled");
                    }
                    PipelineEvent::ComponentStopped { id, reason } => {
                        debug!(component = %id, reason = reason.as_str(), "component stopped");
                    }
                }
            }
        }));
    }
}
