//! Per-read depth arrays and their chunk-aligned accumulation.
//!
//! An aligned read flows through four stages:
//!
//! - [`reference_span`] - reference length consumed by the read's CIGAR
//! - [`build_depth`] - one [`DepthRegion`] covering that span
//! - [`split_into_chunks`] - one fragment per fixed-size genome chunk touched
//! - [`update`] / [`Accumulator`] - additive merge into per-chunk buffers
//!
//! All coordinates are 0-based. Chunk `c` covers
//! `[c * chunk_size, (c + 1) * chunk_size)`.

mod accumulate;
mod alignment;
mod depth;
mod span;
mod split;

pub use accumulate::{Accumulator, accumulate_parallel, update};
pub use alignment::{Alignment, MAX_OP_LEN, ReadFilter, parse_ops};
pub use depth::build_depth;
pub use span::{consumes_reference, reference_span};
pub use split::{split_into_chunks, split_region};

use crate::{Error, Result};
use noodles::sam::alignment::record::cigar::op::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;

/// Depth counter. Increments and merges saturate at `u16::MAX`.
pub type Depth = u16;

pub const DEFAULT_CHUNK_SIZE: u64 = 1000;

/// Width of one genome chunk. Fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize(NonZeroU64);

impl ChunkSize {
    pub fn new(size: u64) -> Result<Self> {
        NonZeroU64::new(size)
            .map(Self)
            .ok_or_else(|| Error::InvalidConfig("chunk size must be positive".to_string()))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Chunk index containing `position`.
    pub fn chunk_of(self, position: u64) -> u64 {
        position / self.get()
    }

    /// First position of chunk `chunk_index`, clamped to `u64::MAX`.
    pub fn chunk_start(self, chunk_index: u64) -> u64 {
        chunk_index.saturating_mul(self.get())
    }

    /// Last position (inclusive) of chunk `chunk_index`, clamped to `u64::MAX`.
    pub fn chunk_last(self, chunk_index: u64) -> u64 {
        self.chunk_start(chunk_index).saturating_add(self.get() - 1)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        const DEFAULT: NonZeroU64 = match NonZeroU64::new(DEFAULT_CHUNK_SIZE) {
            Some(size) => size,
            None => panic!("default chunk size is zero"),
        };
        Self(DEFAULT)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which reference-consuming bases count as covered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DepthPolicy {
    /// Every reference-consuming base (M, =, X, D, N) counts.
    #[default]
    Span,
    /// Only aligned bases (M, =, X) count; deletions and skips stay at zero.
    Aligned,
}

impl DepthPolicy {
    pub fn counts(self, kind: Kind) -> bool {
        match self {
            DepthPolicy::Span => consumes_reference(kind),
            DepthPolicy::Aligned => matches!(
                kind,
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch
            ),
        }
    }
}

/// Identity of a persistent chunk buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub chromosome: String,
    pub chunk_index: u64,
}

impl ChunkKey {
    pub fn new(chromosome: impl Into<String>, chunk_index: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            chunk_index,
        }
    }
}

/// A run of per-position depths starting at `position` on `chromosome`.
///
/// `values[i]` is the depth at `position + i`. An empty `values` is the
/// "no coverage" sentinel; check [`DepthRegion::is_empty`] before reading it.
/// `chunk_index` is only meaningful for chunk-aligned regions, i.e. those
/// returned by the splitter or held as chunk buffers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepthRegion {
    pub chromosome: String,
    pub position: u64,
    pub chunk_index: u64,
    pub values: Vec<Depth>,
}

impl DepthRegion {
    pub fn new(
        chromosome: impl Into<String>,
        position: u64,
        chunk_index: u64,
        values: Vec<Depth>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            chunk_index,
            values,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Zero-filled persistent buffer spanning exactly one chunk.
    pub fn chunk_buffer(chromosome: impl Into<String>, chunk_index: u64, chunk_size: ChunkSize) -> Self {
        Self::new(
            chromosome,
            chunk_size.chunk_start(chunk_index),
            chunk_index,
            vec![0; chunk_size.get() as usize],
        )
    }

    pub fn size(&self) -> u64 {
        self.values.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last covered position (inclusive), `None` for the empty sentinel.
    pub fn last_position(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.position.saturating_add(self.size() - 1))
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.chromosome.clone(), self.chunk_index)
    }

    /// True when the region lies entirely inside chunk `chunk_index`.
    pub fn is_chunk_aligned(&self, chunk_size: ChunkSize) -> bool {
        match self.last_position() {
            Some(last) => {
                self.position >= chunk_size.chunk_start(self.chunk_index)
                    && last <= chunk_size.chunk_last(self.chunk_index)
            }
            None => true,
        }
    }

    pub fn total_depth(&self) -> u64 {
        self.values.iter().map(|&v| u64::from(v)).sum()
    }
}
