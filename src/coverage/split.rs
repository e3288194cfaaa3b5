use super::{Alignment, ChunkSize, DepthPolicy, DepthRegion, build_depth};

/// Depth fragments for one read, one per chunk it touches, in ascending
/// chunk order.
pub fn split_into_chunks(
    alignment: &Alignment,
    chunk_size: ChunkSize,
    policy: DepthPolicy,
) -> Vec<DepthRegion> {
    split_region(build_depth(alignment, policy), chunk_size)
}

/// Cut a depth region at chunk boundaries.
///
/// A region inside a single chunk is returned as-is with its `chunk_index`
/// set. Otherwise each chunk's overlap is copied into its own fragment, and
/// fragments whose depths sum to zero are dropped.
pub fn split_region(mut region: DepthRegion, chunk_size: ChunkSize) -> Vec<DepthRegion> {
    let Some(last) = region.last_position() else {
        return Vec::new();
    };

    let start_chunk = chunk_size.chunk_of(region.position);
    let end_chunk = chunk_size.chunk_of(last);

    if start_chunk == end_chunk {
        region.chunk_index = start_chunk;
        return vec![region];
    }

    (start_chunk..=end_chunk)
        .filter_map(|chunk_index| {
            let start = region.position.max(chunk_size.chunk_start(chunk_index));
            let end = last.min(chunk_size.chunk_last(chunk_index));

            let from = (start - region.position) as usize;
            let to = (end - region.position) as usize;
            let values = region.values[from..=to].to_vec();

            let total: u64 = values.iter().map(|&v| u64::from(v)).sum();
            (total > 0).then(|| {
                DepthRegion::new(region.chromosome.clone(), start, chunk_index, values)
            })
        })
        .collect()
}
