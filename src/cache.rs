use crate::cache_entry::{CacheChunkEntry, CacheRequest};
use crate::config::CacheConfig;
use crate::processor::ObfuscationResponse;
use crate::region_pool::RegionFilePool;
use crate::serializer::AsyncChunkSerializer;
use crate::simple_cache::SimpleCache;
use crate::types::{ChunkCacheKey, Result};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// Two-tier chunk cache: a bounded in-memory map in front of an optional
/// on-disk region store.
///
/// Lookups go memory, then disk (promoting hits back into memory), then the
/// caller's recompute closure. Entries evicted from memory by size or age are
/// written back to disk, except when the eviction fires on the thread that
/// built the cache: write-back blocks under queue pressure, and that thread
/// runs game logic.
pub struct ObfuscationCache {
    memory: SimpleCache<ChunkCacheKey, CacheChunkEntry>,
    serializer: Option<Arc<AsyncChunkSerializer>>,
    pool: Arc<RegionFilePool>,
}

impl ObfuscationCache {
    pub fn new(config: &CacheConfig) -> Self {
        let pool = Arc::new(RegionFilePool::new(config.max_open_region_files));
        let serializer = config.disk_enabled.then(|| {
            Arc::new(AsyncChunkSerializer::new(
                pool.clone(),
                config.disk_directory.clone(),
                config.max_pending_disk_tasks,
            ))
        });

        let expire_after = Duration::from_millis(config.memory_expire_ms);
        let memory = match &serializer {
            Some(serializer) => {
                let writer = serializer.clone();
                let game_thread = std::thread::current().id();
                SimpleCache::with_listener(
                    config.memory_max_chunks,
                    expire_after,
                    move |_key: &ChunkCacheKey, entry: CacheChunkEntry, cause| {
                        if cause.was_evicted() && !on_thread(game_thread) {
                            writer.write(entry);
                        }
                    },
                )
            }
            None => SimpleCache::new(config.memory_max_chunks, expire_after),
        };

        Self {
            memory,
            serializer,
            pool,
        }
    }

    /// Resolves a request through both tiers. A stored entry only counts as a
    /// hit when its hash prefix matches the request; a stale or corrupt entry
    /// reads as a miss and is overwritten by the recomputed result. The
    /// recompute future only runs on a full miss.
    pub async fn get<F, Fut>(&self, request: &CacheRequest, recompute: F) -> Result<ObfuscationResponse>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<ObfuscationResponse>>,
    {
        let memory_entry = self.memory.get(&request.key);
        if let Some(entry) = &memory_entry {
            if entry.is_valid(request) {
                if let Some(response) = entry.to_result(request.min_y) {
                    return Ok(response);
                }
            }
            // A stale or corrupt memory entry goes straight to recompute:
            // the disk copy cannot be fresher than what memory held.
        } else if let Some(serializer) = &self.serializer {
            if let Ok(Some(entry)) = serializer.read(request.key.clone()).await {
                if entry.is_valid(request) {
                    if let Some(response) = entry.to_result(request.min_y) {
                        self.memory.put(request.key.clone(), entry);
                        return Ok(response);
                    }
                }
            }
        }

        let response = recompute().await?;
        let entry = CacheChunkEntry::create(request, &response)?;
        self.memory.put(request.key.clone(), entry);
        Ok(response)
    }

    /// Drops a chunk from the memory tier. The removal is deliberate, so the
    /// entry is not written back; a stale disk copy is harmless because its
    /// hash will no longer match.
    pub fn invalidate(&self, key: &ChunkCacheKey) {
        self.memory.invalidate(key);
    }

    /// Sweeps expired memory entries, writing them back to disk.
    pub fn cleanup(&self) {
        self.memory.cleanup();
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Flushes the memory tier to disk, shuts the serializer down (draining
    /// its queued writes), and closes every region file handle.
    pub fn close(&self) {
        if let Some(serializer) = &self.serializer {
            for (_, entry) in self.memory.drain() {
                serializer.write(entry);
            }
            serializer.close();
        } else {
            self.memory.drain();
        }
        self.pool.clear();
    }
}

impl Drop for ObfuscationCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn on_thread(id: ThreadId) -> bool {
    std::thread::current().id() == id
}
