use crate::cache::ObfuscationCache;
use crate::cache_entry::CacheRequest;
use crate::chunk::{ChunkData, NeighborChunks, NoNeighbors};
use crate::error::OreveilError;
use crate::packet::ChunkPacketAccessor;
use crate::processor::ObfuscationProcessor;
use crate::types::{ChunkCacheKey, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Loads the already-decoded neighbor chunks of a request so border blocks
/// can be occlusion-tested. Resolving to `None` (fetch failed, chunks not
/// loaded) is always safe: unknown borders count as occluding.
pub trait NeighborFetcher: Send + Sync {
    fn fetch(&self, key: &ChunkCacheKey) -> BoxFuture<'static, Option<NeighborChunks>>;
}

/// Fetcher for hosts that never supply neighbors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolatedChunks;

impl NeighborFetcher for IsolatedChunks {
    fn fetch(&self, _key: &ChunkCacheKey) -> BoxFuture<'static, Option<NeighborChunks>> {
        Box::pin(async { None })
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Front door of the whole system. Takes an outgoing chunk packet, resolves
/// it through the cache or the processor on a runtime worker, and hands the
/// rewritten packet back. The submitting thread never decodes, processes, or
/// waits on disk.
pub struct ObfuscationPipeline {
    processor: Arc<ObfuscationProcessor>,
    cache: Arc<ObfuscationCache>,
    fetcher: Arc<dyn NeighborFetcher>,
    /// Namespace for content hashes, derived from the system hash. Changing
    /// the config or version changes this and thereby orphans every stored
    /// entry at once.
    system_namespace: Uuid,
    runtime: Handle,
    timeout: Duration,
}

impl ObfuscationPipeline {
    pub fn new(
        processor: Arc<ObfuscationProcessor>,
        cache: Arc<ObfuscationCache>,
        fetcher: Arc<dyn NeighborFetcher>,
        system_hash: [u8; 16],
        runtime: Handle,
    ) -> Self {
        Self {
            processor,
            cache,
            fetcher,
            system_namespace: Uuid::from_bytes(system_hash),
            runtime,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 16-byte identity of one packet's section payload under the current
    /// system configuration.
    pub fn content_hash(&self, section_bytes: &[u8]) -> [u8; 16] {
        *Uuid::new_v3(&self.system_namespace, section_bytes).as_bytes()
    }

    /// Queues one packet for obfuscation and returns immediately. The
    /// receiver resolves to the rewritten packet, or to `Timeout` when
    /// processing overruns the deadline.
    pub fn submit<P>(&self, packet: P) -> oneshot::Receiver<Result<P>>
    where
        P: ChunkPacketAccessor + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let processor = self.processor.clone();
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        let namespace = self.system_namespace;
        let timeout = self.timeout;

        self.runtime.spawn(async move {
            // Spawned separately so an elapsed deadline only detaches the
            // caller; the computation runs to completion and still lands in
            // the cache.
            let work = tokio::spawn(run(processor, cache, fetcher, namespace, packet));
            let result = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(OreveilError::ProcessingError(
                    "Obfuscation task panicked".to_owned(),
                )),
                Err(_) => Err(OreveilError::Timeout),
            };
            let _ = tx.send(result);
        });
        rx
    }

    /// Submits and awaits in one call.
    pub async fn process<P>(&self, packet: P) -> Result<P>
    where
        P: ChunkPacketAccessor + 'static,
    {
        self.submit(packet).await.map_err(|_| {
            OreveilError::ProcessingError("Obfuscation task dropped its result".to_owned())
        })?
    }

    /// Drops a chunk from the memory cache, forcing the next packet for it
    /// to be recomputed. Called when the server edits blocks in the chunk.
    pub fn invalidate(&self, key: &ChunkCacheKey) {
        self.cache.invalidate(key);
    }

    /// Flushes and shuts down the cache tiers.
    pub fn close(&self) {
        self.cache.close();
    }
}

async fn run<P: ChunkPacketAccessor>(
    processor: Arc<ObfuscationProcessor>,
    cache: Arc<ObfuscationCache>,
    fetcher: Arc<dyn NeighborFetcher>,
    namespace: Uuid,
    mut packet: P,
) -> Result<P> {
    let key = packet.cache_key();
    let request = CacheRequest {
        key: key.clone(),
        hash: *Uuid::new_v3(&namespace, packet.section_bytes()).as_bytes(),
        min_y: packet.world_height().min_y,
    };

    let response = cache
        .get(&request, || async {
            let chunk = ChunkData::read(
                packet.chunk_x(),
                packet.chunk_z(),
                packet.world_height(),
                packet.section_mask(),
                packet.section_bytes(),
                packet.with_word_count(),
            )?;
            match fetcher.fetch(&key).await {
                Some(neighbors) => processor.process(&chunk, &neighbors),
                None => processor.process(&chunk, &NoNeighbors),
            }
        })
        .await?;

    packet.apply(&response);
    Ok(packet)
}
