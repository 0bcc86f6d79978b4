mod common;

use common::*;
use futures::future::BoxFuture;
use oreveil::chunk::{ChunkData, NeighborChunks};
use oreveil::packet::ChunkPacketAccessor;
use oreveil::pipeline::{IsolatedChunks, NeighborFetcher};
use oreveil::types::{BlockPos, ChunkCacheKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct CountingFetcher(AtomicUsize);

impl NeighborFetcher for CountingFetcher {
    fn fetch(&self, _key: &ChunkCacheKey) -> BoxFuture<'static, Option<NeighborChunks>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { None })
    }
}

#[tokio::test]
async fn test_end_to_end_obfuscation() {
    let dir = tempdir().unwrap();
    let pipeline = build_pipeline(&test_config(dir.path()), Arc::new(IsolatedChunks));

    let packet = packet_with_blocks(&[
        (8, 8, 8, ORE),        // buried
        (4, 4, 4, ORE),        // exposed to the air above it
        (4, 5, 4, AIR),
        (10, 10, 10, CHEST_ORE),
        (12, 20, 12, PROX),    // inside the proximity height range
        (12, 4, 12, PROX),     // below it
        (0, 8, 8, ORE),        // at the chunk border, neighbors unknown
    ]);
    assert!(packet.block_entities.contains(&BlockPos::new(10, 10, 10)));

    let processed = pipeline.process(packet).await.unwrap();

    // Enclosed ores read as plain stone.
    assert_eq!(block_at(&processed, 8, 8, 8), STONE);
    assert_eq!(block_at(&processed, 10, 10, 10), STONE);
    // An ore with a visible face is left alone.
    assert_eq!(block_at(&processed, 4, 4, 4), ORE);
    assert_eq!(block_at(&processed, 4, 5, 4), AIR);
    // Unknown neighbors hide a border ore rather than leak it.
    assert_eq!(block_at(&processed, 0, 8, 8), STONE);

    // The proximity block in range is substituted and reported; the one
    // outside the range is untouched.
    assert_eq!(block_at(&processed, 12, 20, 12), STONE);
    assert_eq!(block_at(&processed, 12, 4, 12), PROX);
    assert_eq!(processed.proximity, vec![BlockPos::new(12, 20, 12)]);

    // The replaced chest ore's block entity data is gone from the packet.
    assert!(processed.block_entities.is_empty());
}

struct FixedNeighbors(NeighborChunks);

impl NeighborFetcher for FixedNeighbors {
    fn fetch(&self, _key: &ChunkCacheKey) -> BoxFuture<'static, Option<NeighborChunks>> {
        let neighbors = self.0.clone();
        Box::pin(async move { Some(neighbors) })
    }
}

#[tokio::test]
async fn test_border_ore_with_solid_neighbor_is_hidden() {
    let dir = tempdir().unwrap();

    // Chunk (-1, 0) is all stone, so the border ore at local x 0 is enclosed.
    let neighbor = packet_with_blocks(&[]);
    let neighbor = ChunkData::read(
        -1,
        0,
        world_height(),
        neighbor.section_mask,
        &neighbor.section_bytes,
        true,
    )
    .unwrap();
    let fetcher = Arc::new(FixedNeighbors(NeighborChunks::new(vec![neighbor])));
    let pipeline = build_pipeline(&test_config(dir.path()), fetcher);

    let processed = pipeline
        .process(packet_with_blocks(&[(0, 8, 8, ORE)]))
        .await
        .unwrap();
    assert_eq!(block_at(&processed, 0, 8, 8), STONE);
}

#[tokio::test]
async fn test_identical_resubmit_is_served_from_memory() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
    let pipeline = build_pipeline(&test_config(dir.path()), fetcher.clone());

    let first = pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    let second = pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();

    assert_eq!(first.section_bytes, second.section_bytes);
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_changed_chunk_content_misses_cache() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
    let pipeline = build_pipeline(&test_config(dir.path()), fetcher.clone());

    pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    // One block changed, so the content hash no longer matches.
    pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE), (9, 8, 8, ORE)]))
        .await
        .unwrap();
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_restart_reuses_disk_cache() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));

    let pipeline = build_pipeline(&config, fetcher.clone());
    let before = pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    pipeline.close();

    // A fresh pipeline over the same directory serves the chunk from disk
    // without recomputing.
    let pipeline = build_pipeline(&config, fetcher.clone());
    let after = pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    assert_eq!(before.section_bytes, after.section_bytes);
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_version_bump_invalidates_disk_cache() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));

    let pipeline = build_pipeline(&config, fetcher.clone());
    pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    pipeline.close();

    let mut upgraded = config;
    upgraded.version = "1.0.1-test".to_owned();
    let pipeline = build_pipeline(&upgraded, fetcher.clone());
    pipeline
        .process(packet_with_blocks(&[(8, 8, 8, ORE)]))
        .await
        .unwrap();
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidation_after_block_edit() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.cache.disk_enabled = false;
    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
    let pipeline = build_pipeline(&config, fetcher.clone());

    let packet = packet_with_blocks(&[(8, 8, 8, ORE)]);
    let key = packet.cache_key();
    pipeline.process(packet.clone()).await.unwrap();
    pipeline.invalidate(&key);
    pipeline.process(packet).await.unwrap();
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 2);
}
