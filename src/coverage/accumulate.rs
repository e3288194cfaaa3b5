use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::{Alignment, ChunkKey, ChunkSize, DepthPolicy, DepthRegion, split_into_chunks};

/// Add `fragment` into `dest`, the buffer for chunk `chunk_index`.
///
/// Only positions where the fragment overlaps the chunk are touched. Addition
/// saturates at `u16::MAX`. Applying the same fragment twice counts it twice.
///
/// # Panics
///
/// Panics if `dest` holds fewer than `chunk_size` values and the overlap
/// reaches past its end. The caller must pair a fragment with the buffer of
/// the same chromosome and chunk.
pub fn update(fragment: &DepthRegion, chunk_index: u64, dest: &mut DepthRegion, chunk_size: ChunkSize) {
    let Some(fragment_last) = fragment.last_position() else {
        return;
    };

    let dest_offset = chunk_size.chunk_start(chunk_index);
    let start = fragment.position.max(dest_offset);
    let end = fragment_last.min(chunk_size.chunk_last(chunk_index));
    if start > end {
        return;
    }

    let src = &fragment.values
        [(start - fragment.position) as usize..=(end - fragment.position) as usize];
    let dst = &mut dest.values[(start - dest_offset) as usize..=(end - dest_offset) as usize];

    for (d, &s) in dst.iter_mut().zip(src) {
        *d = d.saturating_add(s);
    }
}

/// Per-chunk depth buffers, created on first contribution.
#[derive(Debug, Clone)]
pub struct Accumulator {
    chunk_size: ChunkSize,
    policy: DepthPolicy,
    chunks: HashMap<ChunkKey, DepthRegion>,
}

impl Accumulator {
    pub fn new(chunk_size: ChunkSize, policy: DepthPolicy) -> Self {
        Self {
            chunk_size,
            policy,
            chunks: HashMap::new(),
        }
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Split one read and add every fragment. Returns the fragment count.
    pub fn add_alignment(&mut self, alignment: &Alignment) -> usize {
        let fragments = split_into_chunks(alignment, self.chunk_size, self.policy);
        for fragment in &fragments {
            self.add_fragment(fragment);
        }
        fragments.len()
    }

    /// Add one chunk-aligned fragment into the buffer for its chunk.
    pub fn add_fragment(&mut self, fragment: &DepthRegion) {
        if fragment.is_empty() {
            return;
        }

        let chunk_size = self.chunk_size;
        let buffer = self.chunks.entry(fragment.key()).or_insert_with(|| {
            DepthRegion::chunk_buffer(fragment.chromosome.clone(), fragment.chunk_index, chunk_size)
        });
        update(fragment, fragment.chunk_index, buffer, chunk_size);
    }

    /// Fold `other` into `self`, summing buffers that share a chunk.
    pub fn merge(mut self, other: Accumulator) -> Accumulator {
        if other.chunks.len() > self.chunks.len() {
            return other.merge(self);
        }

        for (key, buffer) in other.chunks {
            match self.chunks.entry(key) {
                Entry::Occupied(mut entry) => {
                    let chunk_index = buffer.chunk_index;
                    update(&buffer, chunk_index, entry.get_mut(), self.chunk_size);
                }
                Entry::Vacant(entry) => {
                    entry.insert(buffer);
                }
            }
        }

        self
    }

    pub fn get(&self, key: &ChunkKey) -> Option<&DepthRegion> {
        self.chunks.get(key)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk buffers ordered by chromosome, then chunk index.
    pub fn into_chunks(self) -> Vec<DepthRegion> {
        let mut chunks: Vec<_> = self.chunks.into_values().collect();
        chunks.sort_by(|a, b| {
            (a.chromosome.as_str(), a.chunk_index).cmp(&(b.chromosome.as_str(), b.chunk_index))
        });
        chunks
    }
}

/// Accumulate a batch of reads in parallel on the current rayon pool.
///
/// Each task folds into its own [`Accumulator`]; partial results are merged
/// pairwise, so no buffer ever has two writers.
pub fn accumulate_parallel(
    alignments: &[Alignment],
    chunk_size: ChunkSize,
    policy: DepthPolicy,
) -> Accumulator {
    alignments
        .par_iter()
        .fold(
            || Accumulator::new(chunk_size, policy),
            |mut acc, alignment| {
                acc.add_alignment(alignment);
                acc
            },
        )
        .reduce(|| Accumulator::new(chunk_size, policy), Accumulator::merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::parse_ops;

    fn chunk_size() -> ChunkSize {
        ChunkSize::new(1000).unwrap()
    }

    fn chunk3_fragment() -> DepthRegion {
        let alignment = Alignment::mapped("chr1", 2800, parse_ops("500M"));
        split_into_chunks(&alignment, chunk_size(), DepthPolicy::Span)
            .pop()
            .unwrap()
    }

    #[test]
    fn test_update_into_zero_buffer() {
        let fragment = chunk3_fragment();
        let mut buffer = DepthRegion::chunk_buffer("chr1", 3, chunk_size());

        update(&fragment, 3, &mut buffer, chunk_size());

        assert_eq!(&buffer.values[..300], fragment.values.as_slice());
        assert!(buffer.values[300..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_update_is_commutative() {
        let a = DepthRegion::new("chr1", 3000, 3, vec![1; 300]);
        let b = DepthRegion::new("chr1", 3100, 3, vec![2; 500]);

        let mut ab = DepthRegion::chunk_buffer("chr1", 3, chunk_size());
        update(&a, 3, &mut ab, chunk_size());
        update(&b, 3, &mut ab, chunk_size());

        let mut ba = DepthRegion::chunk_buffer("chr1", 3, chunk_size());
        update(&b, 3, &mut ba, chunk_size());
        update(&a, 3, &mut ba, chunk_size());

        assert_eq!(ab, ba);
        assert_eq!(ab.values[150], 3);
    }

    #[test]
    fn test_update_is_not_idempotent() {
        let fragment = chunk3_fragment();
        let mut buffer = DepthRegion::chunk_buffer("chr1", 3, chunk_size());

        update(&fragment, 3, &mut buffer, chunk_size());
        update(&fragment, 3, &mut buffer, chunk_size());

        assert!(buffer.values[..300].iter().all(|&v| v == 2));
        assert!(buffer.values[300..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_update_saturates() {
        let mut buffer = DepthRegion::chunk_buffer("chr1", 0, chunk_size());
        buffer.values[0] = u16::MAX - 1;

        let fragment = DepthRegion::new("chr1", 0, 0, vec![5]);
        update(&fragment, 0, &mut buffer, chunk_size());

        assert_eq!(buffer.values[0], u16::MAX);
    }

    #[test]
    fn test_update_clips_to_chunk() {
        // A fragment reaching into chunk 4 only writes its chunk-3 part.
        let fragment = DepthRegion::new("chr1", 3990, 3, vec![1; 20]);
        let mut buffer = DepthRegion::chunk_buffer("chr1", 3, chunk_size());

        update(&fragment, 3, &mut buffer, chunk_size());

        assert_eq!(buffer.total_depth(), 10);
        assert_eq!(buffer.values[999], 1);
    }

    #[test]
    #[should_panic]
    fn test_update_undersized_buffer_panics() {
        let fragment = DepthRegion::new("chr1", 3500, 3, vec![1; 10]);
        let mut buffer = DepthRegion::new("chr1", 3000, 3, vec![0; 100]);
        update(&fragment, 3, &mut buffer, chunk_size());
    }

    #[test]
    fn test_accumulator_creates_buffers_lazily() {
        let mut acc = Accumulator::new(chunk_size(), DepthPolicy::Span);
        assert!(acc.is_empty());

        let applied = acc.add_alignment(&Alignment::mapped("chr1", 2800, parse_ops("500M")));
        assert_eq!(applied, 2);
        assert_eq!(acc.len(), 2);

        let chunk2 = acc.get(&ChunkKey::new("chr1", 2)).unwrap();
        assert_eq!(chunk2.size(), 1000);
        assert_eq!(chunk2.position, 2000);
        assert_eq!(chunk2.total_depth(), 200);

        acc.add_alignment(&Alignment::unmapped());
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let reads = vec![
            Alignment::mapped("chr1", 2800, parse_ops("500M")),
            Alignment::mapped("chr1", 2950, parse_ops("100M")),
            Alignment::mapped("chr2", 10, parse_ops("5S50M")),
            Alignment::mapped("chr1", 3200, parse_ops("10M5D10M")),
        ];

        let mut sequential = Accumulator::new(chunk_size(), DepthPolicy::Span);
        for read in &reads {
            sequential.add_alignment(read);
        }

        let mut left = Accumulator::new(chunk_size(), DepthPolicy::Span);
        let mut right = Accumulator::new(chunk_size(), DepthPolicy::Span);
        left.add_alignment(&reads[3]);
        left.add_alignment(&reads[0]);
        right.add_alignment(&reads[2]);
        right.add_alignment(&reads[1]);

        assert_eq!(right.merge(left).into_chunks(), sequential.into_chunks());
    }

    #[test]
    fn test_accumulate_parallel() {
        let reads: Vec<Alignment> = (0..200)
            .map(|i| Alignment::mapped("chr1", i * 37, parse_ops("150M")))
            .collect();

        let mut sequential = Accumulator::new(chunk_size(), DepthPolicy::Span);
        for read in &reads {
            sequential.add_alignment(read);
        }

        let parallel = accumulate_parallel(&reads, chunk_size(), DepthPolicy::Span);
        let chunks = parallel.into_chunks();
        let total: u64 = chunks.iter().map(DepthRegion::total_depth).sum();

        assert_eq!(total, 200 * 150);
        assert_eq!(chunks, sequential.into_chunks());
    }
}
