use super::{IngestOptions, IngestStats};
use crate::coverage::{Alignment, DepthRegion, accumulate_parallel};
use crate::index::CoverageIndex;
use crate::{Error, Result};
use noodles::bam;
use noodles::sam;
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub struct BamIngest;

impl BamIngest {
    /// Read every record of a BAM file and merge its depth into `index`.
    ///
    /// Decoding and accumulation run on a blocking thread. Each batch's chunk
    /// buffers are handed over through a bounded channel, so at most a couple
    /// of batches are in flight at once.
    pub async fn ingest(
        bam_path: &Path,
        index: &dyn CoverageIndex,
        options: &IngestOptions,
    ) -> Result<IngestStats> {
        if options.chunk_size != index.chunk_size() {
            return Err(Error::InvalidConfig(format!(
                "ingest chunk size {} does not match index chunk size {}",
                options.chunk_size,
                index.chunk_size()
            )));
        }

        let (tx, mut rx) = mpsc::channel::<Vec<DepthRegion>>(2);
        let reader = tokio::task::spawn_blocking({
            let path = bam_path.to_path_buf();
            let options = options.clone();
            move || read_batches(path, options, tx)
        });

        while let Some(chunks) = rx.recv().await {
            for chunk in chunks {
                index.merge_chunk(chunk).await?;
            }
        }

        let stats = reader
            .await
            .map_err(|e| Error::Internal(format!("BAM reader task failed: {}", e)))??;

        tracing::info!(
            path = %bam_path.display(),
            records = stats.records,
            filtered = stats.filtered,
            unplaced = stats.unplaced,
            chunks = stats.chunks_flushed,
            "ingested BAM file"
        );

        Ok(stats)
    }

    /// Bring `index` to a fully ingested state for `bam_path`.
    ///
    /// Returns `None` when the index already carries the completion mark.
    /// Chunks left behind by an interrupted run are cleared first, since
    /// merging is additive. The mark is written only after the whole file
    /// has been merged.
    pub async fn ingest_once(
        bam_path: &Path,
        index: &dyn CoverageIndex,
        options: &IngestOptions,
    ) -> Result<Option<IngestStats>> {
        if index.is_complete().await? {
            tracing::info!(path = %bam_path.display(), "reusing complete coverage index");
            return Ok(None);
        }

        if !index.chromosomes().await?.is_empty() {
            tracing::warn!(
                path = %bam_path.display(),
                "discarding partial coverage index from an interrupted ingest"
            );
            index.clear().await?;
        }

        let stats = Self::ingest(bam_path, index, options).await?;
        index.mark_complete().await?;
        Ok(Some(stats))
    }
}

fn read_batches(
    path: PathBuf,
    options: IngestOptions,
    tx: mpsc::Sender<Vec<DepthRegion>>,
) -> Result<IngestStats> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .map_err(|e| Error::Internal(format!("failed to build thread pool: {}", e)))?;

    let file = std::fs::File::open(&path)
        .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;

    // bam::io::Reader::new wraps the file in BGZF internally - don't double-wrap
    let mut reader = bam::io::Reader::new(file);
    let header = reader
        .read_header()
        .map_err(|e| Error::Internal(format!("failed to read BAM header: {}", e)))?;

    let batch_size = options.batch_size.max(1);
    let mut stats = IngestStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    for result in reader.records() {
        let record =
            result.map_err(|e| Error::Internal(format!("failed to read BAM record: {}", e)))?;
        stats.records += 1;

        let alignment = alignment_from_record(&record, &header);
        if !options.filter.accepts(&alignment) {
            stats.filtered += 1;
            continue;
        }
        if alignment.placement().is_none() {
            stats.unplaced += 1;
            continue;
        }

        batch.push(alignment);
        if batch.len() >= batch_size {
            flush(&pool, &mut batch, &options, &tx, &mut stats)?;
        }
    }

    if !batch.is_empty() {
        flush(&pool, &mut batch, &options, &tx, &mut stats)?;
    }

    Ok(stats)
}

fn flush(
    pool: &ThreadPool,
    batch: &mut Vec<Alignment>,
    options: &IngestOptions,
    tx: &mpsc::Sender<Vec<DepthRegion>>,
    stats: &mut IngestStats,
) -> Result<()> {
    let accumulator = pool.install(|| {
        accumulate_parallel(&batch[..], options.chunk_size, options.policy)
    });
    batch.clear();

    let chunks = accumulator.into_chunks();
    stats.chunks_flushed += chunks.len() as u64;
    tracing::debug!(chunks = chunks.len(), "flushing batch");

    tx.blocking_send(chunks)
        .map_err(|_| Error::Internal("coverage index stopped accepting chunks".to_string()))
}

/// Convert a BAM record into an [`Alignment`].
///
/// The 1-based BAM alignment start becomes a 0-based start. CIGAR operations
/// that fail to decode are skipped rather than failing the record.
pub fn alignment_from_record(record: &bam::Record, header: &sam::Header) -> Alignment {
    let reference_name = record
        .reference_sequence_id()
        .and_then(|id| id.ok())
        .and_then(|id| header.reference_sequences().get_index(id))
        .map(|(name, _)| name.to_string());

    let start = record
        .alignment_start()
        .and_then(|position| position.ok())
        .map(|position| (usize::from(position) - 1) as u64);

    let ops = record
        .cigar()
        .iter()
        .filter_map(|op| match op {
            Ok(op) => Some(op),
            Err(e) => {
                tracing::debug!("skipping malformed CIGAR op: {}", e);
                None
            }
        })
        .collect();

    Alignment {
        reference_name,
        start,
        ops,
        flags: record.flags(),
        mapping_quality: record.mapping_quality().map(|q| q.get()),
    }
}
