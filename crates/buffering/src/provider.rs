//! StreamProvider - single-writer, multi-reader circular stream buffer
//!
//! Decouples the producing cadence (a source or an upstream transformer)
//! from any number of consuming cadences. The writer never blocks; when the
//! ring is full it overwrites the oldest samples and the affected readers
//! are flagged as overrun on their next read. Each reader owns an
//! independent cursor and wait handle, so a slow reader never stalls the
//! writer or its siblings. The only blocking operation in the whole engine
//! is [`ReaderHandle::next_window`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use metrics::counter;
use slab::Slab;
use tokio::sync::Notify;
use tracing::{debug, warn};

use contracts::{ComponentId, PipelineError, SampleData, SourceShape, Stream};

use crate::ring::SampleRing;

/// One delivered read window
#[derive(Debug)]
pub struct Window {
    /// Exactly `frame` samples, strictly time-ordered
    pub stream: Stream,
    /// Samples were lost for this reader since the previous window
    pub overrun: bool,
}

struct ReaderSlot {
    frame: usize,
    overlap: usize,
    /// Absolute index of the first sample of the next window
    next: u64,
    notify: Arc<Notify>,
    overrun_events: u64,
    lost_samples: u64,
}

struct ProviderState {
    ring: Option<SampleRing>,
    readers: Slab<ReaderSlot>,
}

struct Inner {
    id: ComponentId,
    shape: SourceShape,
    labels: Vec<String>,
    state: Mutex<ProviderState>,
    closed: AtomicBool,
    pushed_samples: AtomicU64,
    delivered_windows: AtomicU64,
    overrun_events: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        // A panicked component task cannot leave the cursor math half-done:
        // every mutation below is a single assignment or ring copy, so the
        // state is still usable after poisoning.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Circular-buffer wrapper around a single data source
///
/// Cheap to clone; all clones share the same ring.
#[derive(Clone)]
pub struct StreamProvider {
    inner: Arc<Inner>,
}

impl StreamProvider {
    /// Create an unallocated provider
    ///
    /// Capacity is assigned later via [`StreamProvider::allocate`], once all
    /// reader window demands are known. Empty `labels` generate defaults.
    pub fn new(
        id: impl Into<ComponentId>,
        shape: SourceShape,
        labels: Vec<String>,
    ) -> Result<Self, PipelineError> {
        let id = id.into();
        if shape.dim == 0 {
            return Err(PipelineError::validation(
                id.as_str(),
                "provider dimension must be at least 1",
            ));
        }
        if !(shape.sample_rate.is_finite() && shape.sample_rate > 0.0) {
            return Err(PipelineError::validation(
                id.as_str(),
                format!("provider sample rate must be positive, got {}", shape.sample_rate),
            ));
        }
        let labels = if labels.is_empty() {
            (0..shape.dim)
                .map(|i| format!("{}{i}", Stream::LABEL_PREFIX))
                .collect()
        } else if labels.len() == shape.dim {
            labels
        } else {
            return Err(PipelineError::validation(
                id.as_str(),
                format!("{} labels for {} channels", labels.len(), shape.dim),
            ));
        };
        Ok(Self {
            inner: Arc::new(Inner {
                id,
                shape,
                labels,
                state: Mutex::new(ProviderState {
                    ring: None,
                    readers: Slab::new(),
                }),
                closed: AtomicBool::new(false),
                pushed_samples: AtomicU64::new(0),
                delivered_windows: AtomicU64::new(0),
                overrun_events: AtomicU64::new(0),
            }),
        })
    }

    pub fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    pub fn shape(&self) -> SourceShape {
        self.inner.shape
    }

    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }

    /// Size the ring, once
    ///
    /// Must exceed the largest registered reader window.
    pub fn allocate(&self, capacity_samples: usize) -> Result<(), PipelineError> {
        let mut state = self.inner.lock();
        if state.ring.is_some() {
            return Err(PipelineError::lifecycle(format!(
                "provider '{}' is already allocated",
                self.inner.id
            )));
        }
        let needed = state
            .readers
            .iter()
            .map(|(_, r)| r.frame + r.overlap)
            .max()
            .unwrap_or(0);
        if capacity_samples == 0 || capacity_samples < needed {
            return Err(PipelineError::validation(
                self.inner.id.as_str(),
                format!(
                    "capacity {capacity_samples} cannot satisfy largest reader window {needed}"
                ),
            ));
        }
        state.ring = Some(SampleRing::new(
            self.inner.shape.kind,
            self.inner.shape.dim,
            capacity_samples,
        ));
        debug!(provider = %self.inner.id, capacity_samples, "provider allocated");
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        self.inner.lock().ring.is_some()
    }

    /// Capacity in samples, once allocated
    pub fn capacity(&self) -> Option<usize> {
        self.inner.lock().ring.as_ref().map(SampleRing::capacity)
    }

    /// Largest `frame + overlap` across registered readers
    pub fn max_reader_window(&self) -> usize {
        self.inner
            .lock()
            .readers
            .iter()
            .map(|(_, r)| r.frame + r.overlap)
            .max()
            .unwrap_or(0)
    }

    /// Register an independent windowed reader
    ///
    /// `frame` and `overlap` are in samples at this provider's rate and are
    /// fixed for the reader's lifetime; `overlap < frame` is required.
    pub fn register_reader(
        &self,
        frame: usize,
        overlap: usize,
    ) -> Result<ReaderHandle, PipelineError> {
        if frame == 0 {
            return Err(PipelineError::validation(
                self.inner.id.as_str(),
                "reader frame must be at least 1 sample",
            ));
        }
        if overlap >= frame {
            return Err(PipelineError::validation(
                self.inner.id.as_str(),
                format!("overlap {overlap} must be smaller than frame {frame}"),
            ));
        }
        let notify = Arc::new(Notify::new());
        let mut state = self.inner.lock();
        if let Some(ring) = &state.ring {
            if frame + overlap > ring.capacity() {
                return Err(PipelineError::validation(
                    self.inner.id.as_str(),
                    format!(
                        "window {} exceeds allocated capacity {}",
                        frame + overlap,
                        ring.capacity()
                    ),
                ));
            }
        }
        let key = state.readers.insert(ReaderSlot {
            frame,
            overlap,
            next: 0,
            notify: Arc::clone(&notify),
            overrun_events: 0,
            lost_samples: 0,
        });
        Ok(ReaderHandle {
            inner: Arc::clone(&self.inner),
            key,
            frame,
            overlap,
            notify,
        })
    }

    /// Append freshly produced samples; never blocks
    ///
    /// On a full ring the oldest samples are overwritten; lagging readers
    /// observe the loss as an overrun on their next read.
    pub fn push(&self, chunk: &Stream) -> Result<(), PipelineError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PipelineError::Closed {
                provider: self.inner.id.to_string(),
            });
        }
        if chunk.dim() != self.inner.shape.dim {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "chunk dim {} pushed to provider '{}' with dim {}",
                    chunk.dim(),
                    self.inner.id,
                    self.inner.shape.dim
                ),
            });
        }
        if chunk.kind() != self.inner.shape.kind {
            return Err(PipelineError::TypeMismatch {
                expected: self.inner.shape.kind,
                actual: chunk.kind(),
            });
        }
        let waiters: Vec<Arc<Notify>>;
        {
            let mut state = self.inner.lock();
            let Some(ring) = state.ring.as_mut() else {
                return Err(PipelineError::lifecycle(format!(
                    "push to provider '{}' before allocation",
                    self.inner.id
                )));
            };
            ring.write(chunk.data(), chunk.num())?;
            waiters = state.readers.iter().map(|(_, r)| Arc::clone(&r.notify)).collect();
        }
        self.inner
            .pushed_samples
            .fetch_add(chunk.num() as u64, Ordering::Relaxed);
        counter!("pipeline_samples_pushed_total", "provider" => self.inner.id.to_string())
            .increment(chunk.num() as u64);
        for notify in waiters {
            notify.notify_one();
        }
        Ok(())
    }

    /// Signal end-of-stream; idempotent
    ///
    /// Parked readers wake with [`PipelineError::Closed`] once no further
    /// full window is available.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let state = self.inner.lock();
        for (_, reader) in state.readers.iter() {
            reader.notify.notify_one();
        }
        debug!(provider = %self.inner.id, "provider closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Total samples written since allocation
    pub fn head(&self) -> u64 {
        self.inner
            .lock()
            .ring
            .as_ref()
            .map(SampleRing::head)
            .unwrap_or(0)
    }

    /// Counters for diagnostics
    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            pushed_samples: self.inner.pushed_samples.load(Ordering::Relaxed),
            delivered_windows: self.inner.delivered_windows.load(Ordering::Relaxed),
            overrun_events: self.inner.overrun_events.load(Ordering::Relaxed),
            readers: self.inner.lock().readers.len(),
        }
    }
}

/// Provider counter snapshot
#[derive(Debug, Clone, Default)]
pub struct ProviderSnapshot {
    pub pushed_samples: u64,
    pub delivered_windows: u64,
    pub overrun_events: u64,
    pub readers: usize,
}

/// Independent windowed read cursor over one provider
///
/// Dropping the handle unregisters the reader.
pub struct ReaderHandle {
    inner: Arc<Inner>,
    key: usize,
    frame: usize,
    overlap: usize,
    notify: Arc<Notify>,
}

impl ReaderHandle {
    pub fn provider_id(&self) -> &ComponentId {
        &self.inner.id
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Samples lost to overruns so far
    pub fn lost_samples(&self) -> u64 {
        self.inner
            .lock()
            .readers
            .get(self.key)
            .map(|r| r.lost_samples)
            .unwrap_or(0)
    }

    /// Wait for and return the next window of exactly `frame` samples
    ///
    /// Consecutive windows advance by `frame - overlap` samples, so the
    /// trailing `overlap` samples of one window reappear verbatim at the
    /// start of the next. Returns [`PipelineError::Closed`] once the
    /// provider is closed and no further full window can be formed; a
    /// partial window is never delivered.
    pub async fn next_window(&mut self) -> Result<Window, PipelineError> {
        loop {
            if let Some(window) = self.try_take()? {
                return Ok(window);
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(PipelineError::Closed {
                    provider: self.inner.id.to_string(),
                });
            }
            self.notify.notified().await;
        }
    }

    fn try_take(&mut self) -> Result<Option<Window>, PipelineError> {
        let shape = self.inner.shape;
        let mut state = self.inner.lock();
        let ProviderState { ring, readers } = &mut *state;
        let Some(ring) = ring.as_mut() else {
            return Err(PipelineError::lifecycle(format!(
                "read from provider '{}' before allocation",
                self.inner.id
            )));
        };
        let Some(slot) = readers.get_mut(self.key) else {
            return Err(PipelineError::lifecycle(format!(
                "reader {} of provider '{}' is gone",
                self.key, self.inner.id
            )));
        };

        let mut pos = slot.next;
        let mut overrun = false;
        let mut lost = 0;
        if pos < ring.oldest() {
            // Fell behind the writer: skip to the newest complete window.
            let target = ring
                .head()
                .saturating_sub(self.frame as u64)
                .max(ring.oldest());
            lost = target - pos;
            pos = target;
            overrun = true;
        }

        if ring.head() < pos + self.frame as u64 {
            return Ok(None);
        }
        if overrun {
            slot.overrun_events += 1;
            slot.lost_samples += lost;
        }

        let mut out = SampleData::zeroed(shape.kind, self.frame * shape.dim);
        ring.read(pos, self.frame, &mut out)?;
        slot.next = pos + (self.frame - self.overlap) as u64;
        drop(state);

        if overrun {
            self.inner.overrun_events.fetch_add(1, Ordering::Relaxed);
            counter!("pipeline_reader_overruns_total", "provider" => self.inner.id.to_string())
                .increment(1);
            warn!(
                provider = %self.inner.id,
                reader = self.key,
                "reader fell behind, skipped to newest window"
            );
        }
        self.inner.delivered_windows.fetch_add(1, Ordering::Relaxed);
        counter!("pipeline_windows_delivered_total", "provider" => self.inner.id.to_string())
            .increment(1);

        let mut stream = Stream::from_parts(self.frame, shape.dim, shape.sample_rate, out)?;
        stream.set_time(pos as f64 / shape.sample_rate);
        stream.set_labels(self.inner.labels.clone());
        Ok(Some(Window { stream, overrun }))
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if state.readers.contains(self.key) {
            state.readers.remove(self.key);
        }
    }
}
