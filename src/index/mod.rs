//! Persistent per-chunk depth buffers and windowed range queries.
//!
//! A [`CoverageIndex`] stores one buffer per `(chromosome, chunk_index)`,
//! each exactly one chunk wide. Contributions are merged with saturating
//! addition, so any ordering or batching of the same fragments yields the
//! same stored depths. Merging is not idempotent: feeding a file twice
//! doubles its depth.
//!
//! # Implementations
//!
//! - [`MemoryIndex`] - buffers held in a map behind an async lock
//! - [`LocalIndex`] - one file per chunk under a root directory

mod local;
mod memory;

pub use local::LocalIndex;
pub use memory::MemoryIndex;

use crate::coverage::{ChunkSize, Depth, DepthRegion};
use crate::types::{Aggregate, Region, WindowedDepth};
use crate::{Error, Result};
use async_trait::async_trait;

/// Upper bound on the number of windows a single query may return.
pub const MAX_WINDOWS: u64 = 1_000_000;

/// Storage for accumulated chunk buffers.
#[async_trait]
pub trait CoverageIndex: Send + Sync {
    /// Chunk width every stored buffer was built with.
    fn chunk_size(&self) -> ChunkSize;

    /// Add a chunk-aligned region into the stored buffer for its chunk,
    /// creating a zero buffer first if none exists.
    async fn merge_chunk(&self, chunk: DepthRegion) -> Result<()>;

    /// Stored buffer for a chunk, if any contribution reached it.
    async fn chunk(&self, chromosome: &str, chunk_index: u64) -> Result<Option<DepthRegion>>;

    /// Sorted indices of stored chunks on `chromosome`.
    async fn chunk_indices(&self, chromosome: &str) -> Result<Vec<u64>>;

    /// Sorted names of chromosomes with at least one stored chunk.
    async fn chromosomes(&self) -> Result<Vec<String>>;

    /// True once an ingest run over the whole source has been recorded.
    async fn is_complete(&self) -> Result<bool>;

    /// Record that the source has been fully merged.
    async fn mark_complete(&self) -> Result<()>;

    /// Drop every stored chunk and the completion mark.
    async fn clear(&self) -> Result<()>;

    /// Depth over `region`, one aggregated value per `window_size` positions.
    ///
    /// Chunks with no stored buffer read as zero depth. The final window is
    /// shorter when the region length is not a multiple of `window_size`.
    async fn query(
        &self,
        region: &Region,
        window_size: u64,
        aggregate: Aggregate,
    ) -> Result<WindowedDepth> {
        if window_size == 0 {
            return Err(Error::InvalidInput(
                "window size must be positive".to_string(),
            ));
        }

        let chromosome = region.reference_name.as_str();
        let indices = self.chunk_indices(chromosome).await?;
        let Some(&last_stored) = indices.last() else {
            return Err(Error::NotFound(format!(
                "reference sequence not found: {}",
                chromosome
            )));
        };

        let chunk_size = self.chunk_size();
        let start = region.start.unwrap_or(0);
        let end = region
            .end
            .unwrap_or_else(|| chunk_size.chunk_start(last_stored.saturating_add(1)));

        if start >= end {
            return Err(Error::InvalidRange(format!(
                "start {} must be less than end {}",
                start, end
            )));
        }

        if (end - start).div_ceil(window_size) > MAX_WINDOWS {
            return Err(Error::InvalidRange(format!(
                "query would return more than {} windows",
                MAX_WINDOWS
            )));
        }

        let mut windows = Windows::new(window_size, aggregate);
        let first_chunk = chunk_size.chunk_of(start);
        let last_chunk = chunk_size.chunk_of(end - 1);

        // Only stored chunks are visited; gaps between them stream as zeros.
        let skip = indices.partition_point(|&index| index < first_chunk);
        let mut cursor = start;

        for &chunk_index in indices[skip..].iter().take_while(|&&index| index <= last_chunk) {
            let from = start.max(chunk_size.chunk_start(chunk_index));
            let to = end.min(chunk_size.chunk_start(chunk_index.saturating_add(1)));
            windows.push_zeros(from - cursor);

            match self.chunk(chromosome, chunk_index).await? {
                Some(buffer) => {
                    for position in from..to {
                        let offset = (position - buffer.position) as usize;
                        windows.push(buffer.values.get(offset).copied().unwrap_or(0));
                    }
                }
                None => windows.push_zeros(to - from),
            }
            cursor = to;
        }

        windows.push_zeros(end - cursor);

        Ok(WindowedDepth {
            start,
            end,
            window_size,
            aggregate,
            values: windows.finish(),
        })
    }
}

/// Rejects regions that do not fit inside their own chunk.
pub(crate) fn check_chunk(chunk: &DepthRegion, chunk_size: ChunkSize) -> Result<()> {
    if chunk.chromosome.is_empty() {
        return Err(Error::InvalidInput("chunk has no chromosome".to_string()));
    }

    if !chunk.is_chunk_aligned(chunk_size) {
        return Err(Error::InvalidInput(format!(
            "region {}:{} (size {}) does not fit chunk {} of size {}",
            chunk.chromosome,
            chunk.position,
            chunk.size(),
            chunk.chunk_index,
            chunk_size
        )));
    }

    Ok(())
}

/// Streams per-position depths into fixed-width windows.
struct Windows {
    size: u64,
    aggregate: Aggregate,
    filled: u64,
    sum: u64,
    max: Depth,
    values: Vec<f64>,
}

impl Windows {
    fn new(size: u64, aggregate: Aggregate) -> Self {
        Self {
            size,
            aggregate,
            filled: 0,
            sum: 0,
            max: 0,
            values: Vec::new(),
        }
    }

    fn push(&mut self, depth: Depth) {
        self.sum += u64::from(depth);
        self.max = self.max.max(depth);
        self.filled += 1;
        if self.filled == self.size {
            self.emit();
        }
    }

    fn push_zeros(&mut self, mut count: u64) {
        while count > 0 {
            let take = count.min(self.size - self.filled);
            self.filled += take;
            count -= take;
            if self.filled == self.size {
                self.emit();
            }
        }
    }

    fn emit(&mut self) {
        let value = match self.aggregate {
            Aggregate::Mean => self.sum as f64 / self.filled as f64,
            Aggregate::Max => f64::from(self.max),
        };
        self.values.push(value);
        self.filled = 0;
        self.sum = 0;
        self.max = 0;
    }

    fn finish(mut self) -> Vec<f64> {
        if self.filled > 0 {
            self.emit();
        }
        self.values
    }
}
