use super::{CoverageIndex, check_chunk};
use crate::Result;
use crate::coverage::{ChunkKey, ChunkSize, DepthRegion, update};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

pub struct MemoryIndex {
    chunk_size: ChunkSize,
    chunks: RwLock<HashMap<ChunkKey, DepthRegion>>,
    complete: AtomicBool,
}

impl MemoryIndex {
    pub fn new(chunk_size: ChunkSize) -> Self {
        Self {
            chunk_size,
            chunks: RwLock::new(HashMap::new()),
            complete: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }
}

#[async_trait]
impl CoverageIndex for MemoryIndex {
    fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    async fn merge_chunk(&self, chunk: DepthRegion) -> Result<()> {
        check_chunk(&chunk, self.chunk_size)?;
        if chunk.is_empty() {
            return Ok(());
        }

        let chunk_size = self.chunk_size;
        let mut chunks = self.chunks.write().await;
        let buffer = chunks.entry(chunk.key()).or_insert_with(|| {
            DepthRegion::chunk_buffer(chunk.chromosome.clone(), chunk.chunk_index, chunk_size)
        });
        update(&chunk, chunk.chunk_index, buffer, chunk_size);

        Ok(())
    }

    async fn chunk(&self, chromosome: &str, chunk_index: u64) -> Result<Option<DepthRegion>> {
        let key = ChunkKey::new(chromosome, chunk_index);
        Ok(self.chunks.read().await.get(&key).cloned())
    }

    async fn chunk_indices(&self, chromosome: &str) -> Result<Vec<u64>> {
        let chunks = self.chunks.read().await;
        let mut indices: Vec<u64> = chunks
            .keys()
            .filter(|key| key.chromosome == chromosome)
            .map(|key| key.chunk_index)
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    async fn chromosomes(&self) -> Result<Vec<String>> {
        let chunks = self.chunks.read().await;
        let mut names: Vec<String> = chunks.keys().map(|key| key.chromosome.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn is_complete(&self) -> Result<bool> {
        Ok(self.complete.load(Ordering::Acquire))
    }

    async fn mark_complete(&self) -> Result<()> {
        self.complete.store(true, Ordering::Release);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        self.complete.store(false, Ordering::Release);
        chunks.clear();
        Ok(())
    }
}
