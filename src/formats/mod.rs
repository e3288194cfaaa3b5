//! Alignment file readers that feed a coverage index.
//!
//! # Supported Formats
//!
//! - [`BamIngest`] - BAM files, read with noodles
//!
//! Readers turn records into [`Alignment`](crate::coverage::Alignment)s,
//! accumulate them in bounded batches, and flush each batch's chunk buffers
//! into a [`CoverageIndex`](crate::index::CoverageIndex).

mod bam;

pub use bam::{BamIngest, alignment_from_record};

use crate::coverage::{ChunkSize, DepthPolicy, ReadFilter};

/// Knobs shared by all ingest paths.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_size: ChunkSize,
    pub policy: DepthPolicy,
    pub filter: ReadFilter,
    /// Records accumulated before a flush into the index.
    pub batch_size: usize,
    /// Worker threads for per-batch accumulation; 0 lets rayon decide.
    pub threads: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            policy: DepthPolicy::default(),
            filter: ReadFilter::default(),
            batch_size: 100_000,
            threads: 0,
        }
    }
}

/// Counters reported after an ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: u64,
    pub filtered: u64,
    pub unplaced: u64,
    pub chunks_flushed: u64,
}
