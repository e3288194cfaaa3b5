use super::{CoverageIndex, check_chunk};
use crate::coverage::{ChunkSize, DepthRegion, update};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const METADATA_FILE: &str = "index.json";
const CHUNK_EXT: &str = "depth";
const HEADER_LEN: usize = 8 + 4;

#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    #[serde(rename = "chunkSize")]
    chunk_size: u64,
    /// Set only after a whole source file has been merged.
    #[serde(default)]
    complete: bool,
}

/// Chunk buffers stored as `<root>/<chromosome>/<chunk_index>.depth`.
///
/// Each file is a little-endian `u64` start position and `u32` length,
/// followed by that many `u16` depths. The chunk size and the completion
/// mark are recorded in `index.json`; the chunk size is checked on open,
/// since chunk boundaries depend on it.
pub struct LocalIndex {
    root: PathBuf,
    chunk_size: ChunkSize,
    write_lock: Mutex<()>,
}

impl LocalIndex {
    pub async fn open(root: PathBuf, chunk_size: ChunkSize) -> Result<Self> {
        fs::create_dir_all(&root).await?;

        let index = Self {
            root,
            chunk_size,
            write_lock: Mutex::new(()),
        };

        match index.read_metadata().await? {
            Some(metadata) if metadata.chunk_size != chunk_size.get() => {
                return Err(Error::InvalidConfig(format!(
                    "index at {} uses chunk size {}, not {}",
                    index.root.display(),
                    metadata.chunk_size,
                    chunk_size
                )));
            }
            Some(_) => {}
            None => index.write_metadata(false).await?,
        }

        Ok(index)
    }

    async fn read_metadata(&self) -> Result<Option<IndexMetadata>> {
        let path = self.root.join(METADATA_FILE);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| Error::Internal(format!("failed to read {}: {}", path.display(), e)))
    }

    async fn write_metadata(&self, complete: bool) -> Result<()> {
        let metadata = IndexMetadata {
            chunk_size: self.chunk_size.get(),
            complete,
        };
        let raw = serde_json::to_vec(&metadata)
            .map_err(|e| Error::Internal(format!("failed to encode metadata: {}", e)))?;

        let path = self.root.join(METADATA_FILE);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chromosome_dir(&self, chromosome: &str) -> Result<PathBuf> {
        if chromosome.is_empty()
            || chromosome.starts_with('.')
            || chromosome.contains(['/', '\\'])
        {
            return Err(Error::InvalidInput(format!(
                "chromosome name cannot be stored: {:?}",
                chromosome
            )));
        }
        Ok(self.root.join(chromosome))
    }

    fn chunk_path(&self, chromosome: &str, chunk_index: u64) -> Result<PathBuf> {
        Ok(self
            .chromosome_dir(chromosome)?
            .join(format!("{}.{}", chunk_index, CHUNK_EXT)))
    }

    async fn read_chunk(&self, chromosome: &str, chunk_index: u64) -> Result<Option<DepthRegion>> {
        let path = self.chunk_path(chromosome, chunk_index)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let chunk = decode_chunk(chromosome, chunk_index, Bytes::from(raw))?;
        if chunk.position != self.chunk_size.chunk_start(chunk_index)
            || chunk.size() != self.chunk_size.get()
        {
            return Err(Error::Internal(format!(
                "chunk file {} does not match chunk size {}",
                path.display(),
                self.chunk_size
            )));
        }

        Ok(Some(chunk))
    }
}

#[async_trait]
impl CoverageIndex for LocalIndex {
    fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    async fn merge_chunk(&self, chunk: DepthRegion) -> Result<()> {
        check_chunk(&chunk, self.chunk_size)?;
        if chunk.is_empty() {
            return Ok(());
        }

        let path = self.chunk_path(&chunk.chromosome, chunk.chunk_index)?;

        // Read-modify-write must not interleave with another merge.
        let _guard = self.write_lock.lock().await;

        let mut buffer = match self.read_chunk(&chunk.chromosome, chunk.chunk_index).await? {
            Some(buffer) => buffer,
            None => DepthRegion::chunk_buffer(
                chunk.chromosome.clone(),
                chunk.chunk_index,
                self.chunk_size,
            ),
        };
        update(&chunk, chunk.chunk_index, &mut buffer, self.chunk_size);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension(format!("{}.tmp", CHUNK_EXT));
        fs::write(&tmp, encode_chunk(&buffer)).await?;
        fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn chunk(&self, chromosome: &str, chunk_index: u64) -> Result<Option<DepthRegion>> {
        self.read_chunk(chromosome, chunk_index).await
    }

    async fn chunk_indices(&self, chromosome: &str) -> Result<Vec<u64>> {
        let dir = self.chromosome_dir(chromosome)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CHUNK_EXT) {
                continue;
            }
            if let Some(index) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    async fn chromosomes(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn is_complete(&self) -> Result<bool> {
        Ok(self
            .read_metadata()
            .await?
            .is_some_and(|metadata| metadata.complete))
    }

    async fn mark_complete(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_metadata(true).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        // Unmark before deleting chunks.
        self.write_metadata(false).await?;

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            }
        }
        Ok(())
    }
}

pub(crate) fn encode_chunk(chunk: &DepthRegion) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + chunk.values.len() * 2);
    buf.put_u64_le(chunk.position);
    buf.put_u32_le(chunk.values.len() as u32);
    for &depth in &chunk.values {
        buf.put_u16_le(depth);
    }
    buf.freeze()
}

pub(crate) fn decode_chunk(chromosome: &str, chunk_index: u64, mut buf: Bytes) -> Result<DepthRegion> {
    if buf.remaining() < HEADER_LEN {
        return Err(Error::Internal(format!(
            "chunk {}:{} is truncated",
            chromosome, chunk_index
        )));
    }

    let position = buf.get_u64_le();
    let len = buf.get_u32_le() as usize;
    if buf.remaining() != len * 2 {
        return Err(Error::Internal(format!(
            "chunk {}:{} holds {} bytes of depth, expected {}",
            chromosome,
            chunk_index,
            buf.remaining(),
            len * 2
        )));
    }

    let values = (0..len).map(|_| buf.get_u16_le()).collect();
    Ok(DepthRegion::new(chromosome, position, chunk_index, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{Alignment, DepthPolicy, parse_ops, split_into_chunks};
    use crate::types::{Aggregate, Region};

    fn chunk_size() -> ChunkSize {
        ChunkSize::new(100).unwrap()
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let chunk = DepthRegion::new("chr1", 100, 1, vec![3, 0, 7]);
        let encoded = encode_chunk(&chunk);
        assert_eq!(encoded.len(), HEADER_LEN + 6);

        let decoded = decode_chunk("chr1", 1, encoded.clone()).unwrap();
        assert_eq!(decoded, chunk);

        let short = encoded.slice(..encoded.len() - 1);
        assert!(decode_chunk("chr1", 1, short).is_err());
        assert!(decode_chunk("chr1", 1, Bytes::from_static(&[0; 4])).is_err());
    }

    #[tokio::test]
    async fn test_merge_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sample");

        {
            let index = LocalIndex::open(root.clone(), chunk_size()).await.unwrap();
            let read = Alignment::mapped("chr1", 180, parse_ops("50M"));
            for fragment in split_into_chunks(&read, chunk_size(), DepthPolicy::Span) {
                index.merge_chunk(fragment).await.unwrap();
            }
            // Second contribution to chunk 2 is added, not replaced.
            index
                .merge_chunk(DepthRegion::new("chr1", 200, 2, vec![1; 10]))
                .await
                .unwrap();
        }

        let index = LocalIndex::open(root, chunk_size()).await.unwrap();
        assert_eq!(index.chromosomes().await.unwrap(), vec!["chr1".to_string()]);
        assert_eq!(index.chunk_indices("chr1").await.unwrap(), vec![1, 2]);

        let chunk = index.chunk("chr1", 2).await.unwrap().unwrap();
        assert_eq!(chunk.position, 200);
        assert_eq!(chunk.size(), 100);
        assert_eq!(&chunk.values[..12], &[2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1]);
        assert_eq!(chunk.values[30], 0);

        let region = Region::new("chr1", Some(180), Some(230));
        let result = index.query(&region, 10, Aggregate::Max).await.unwrap();
        assert_eq!(result.values, vec![1.0, 1.0, 2.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_completion_mark_persists() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sample");

        {
            let index = LocalIndex::open(root.clone(), chunk_size()).await.unwrap();
            index
                .merge_chunk(DepthRegion::new("chr1", 0, 0, vec![4; 10]))
                .await
                .unwrap();
            assert!(!index.is_complete().await.unwrap());
        }

        // Chunks without the mark are a partial ingest.
        let index = LocalIndex::open(root.clone(), chunk_size()).await.unwrap();
        assert!(!index.is_complete().await.unwrap());
        index.mark_complete().await.unwrap();

        let index = LocalIndex::open(root, chunk_size()).await.unwrap();
        assert!(index.is_complete().await.unwrap());

        index.clear().await.unwrap();
        assert!(!index.is_complete().await.unwrap());
        assert!(index.chromosomes().await.unwrap().is_empty());
        assert!(index.chunk("chr1", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_rejects_other_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        LocalIndex::open(root.clone(), chunk_size()).await.unwrap();
        let reopened = LocalIndex::open(root, ChunkSize::new(250).unwrap()).await;
        assert!(matches!(reopened, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_like_chromosome() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::open(dir.path().to_path_buf(), chunk_size())
            .await
            .unwrap();

        let chunk = DepthRegion::new("../evil", 0, 0, vec![1]);
        assert!(matches!(
            index.merge_chunk(chunk).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(index.chromosomes().await.unwrap().is_empty());
    }
}
