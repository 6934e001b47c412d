//! Fixed-capacity sample ring with a monotonic head index.
//!
//! Pure data structure, no synchronization: the provider wraps it in a lock.
//! Positions are absolute sample indices since allocation; the ring retains
//! the most recent `capacity` samples and the writer overwrites the oldest
//! on wraparound.

use contracts::{PipelineError, SampleData, SampleType};

pub(crate) struct SampleRing {
    data: SampleData,
    capacity: usize,
    dim: usize,
    head: u64,
}

impl SampleRing {
    pub(crate) fn new(kind: SampleType, dim: usize, capacity: usize) -> Self {
        SampleRing {
            data: SampleData::zeroed(kind, capacity * dim),
            capacity,
            dim,
            head: 0,
        }
    }

    /// Total samples written since allocation
    pub(crate) fn head(&self) -> u64 {
        self.head
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest absolute sample index still retained
    pub(crate) fn oldest(&self) -> u64 {
        self.head.saturating_sub(self.capacity as u64)
    }

    /// Append `num` samples, overwriting the oldest on wraparound
    pub(crate) fn write(&mut self, chunk: &SampleData, num: usize) -> Result<(), PipelineError> {
        if chunk.len() != num * self.dim {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "chunk of {} elements does not hold {num} samples x {} channels",
                    chunk.len(),
                    self.dim
                ),
            });
        }
        // A chunk larger than the ring keeps only its tail
        let (mut src, mut remaining) = (0usize, num);
        if num > self.capacity {
            src = num - self.capacity;
            self.head += src as u64;
            remaining = self.capacity;
        }
        while remaining > 0 {
            let pos = (self.head % self.capacity as u64) as usize;
            let n = remaining.min(self.capacity - pos);
            self.data
                .copy_from(pos * self.dim, chunk, src * self.dim, n * self.dim)?;
            self.head += n as u64;
            src += n;
            remaining -= n;
        }
        Ok(())
    }

    /// Copy `num` samples starting at absolute index `start` into `out`
    ///
    /// The range must lie within the retained window.
    pub(crate) fn read(
        &self,
        start: u64,
        num: usize,
        out: &mut SampleData,
    ) -> Result<(), PipelineError> {
        if start < self.oldest() || start + num as u64 > self.head {
            return Err(PipelineError::ShapeMismatch {
                message: format!(
                    "read {start}..{} outside retained range {}..{}",
                    start + num as u64,
                    self.oldest(),
                    self.head
                ),
            });
        }
        let mut copied = 0usize;
        while copied < num {
            let pos = ((start + copied as u64) % self.capacity as u64) as usize;
            let n = (num - copied).min(self.capacity - pos);
            out.copy_from(copied * self.dim, &self.data, pos * self.dim, n * self.dim)?;
            copied += n;
        }
        Ok(())
    }
}
