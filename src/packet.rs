use crate::processor::ObfuscationResponse;
use crate::types::{BlockPos, ChunkCacheKey, WorldHeight};
use std::collections::HashSet;

/// Host-side view of one outgoing chunk packet. The pipeline only ever talks
/// to packets through this trait, so each server version plugs in its own
/// packet layout. Accessors cross thread boundaries: the processing task
/// borrows them on a runtime worker, so implementations must be shareable.
pub trait ChunkPacketAccessor: Send + Sync {
    fn world(&self) -> &str;
    fn chunk_x(&self) -> i32;
    fn chunk_z(&self) -> i32;
    fn world_height(&self) -> WorldHeight;
    /// Bit i set means section i (from the world bottom) is present.
    fn section_mask(&self) -> u64;
    /// Whether each section carries a word-count prefix before its data
    /// words. Differs between protocol versions.
    fn with_word_count(&self) -> bool;
    /// The concatenated serialized sections, exactly as they would go on the
    /// wire. This is the byte string that gets content-hashed.
    fn section_bytes(&self) -> &[u8];
    /// Replaces the section bytes with the obfuscated ones and strips block
    /// entity data at every replaced position.
    fn apply(&mut self, response: &ObfuscationResponse);

    fn cache_key(&self) -> ChunkCacheKey {
        ChunkCacheKey::new(self.world(), self.chunk_x(), self.chunk_z())
    }
}

/// Self-contained packet used by the embedding shims and by tests.
#[derive(Debug, Clone)]
pub struct ChunkPacket {
    pub world: String,
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub height: WorldHeight,
    pub section_mask: u64,
    pub with_word_count: bool,
    pub section_bytes: Vec<u8>,
    pub block_entities: HashSet<BlockPos>,
    /// Filled in by `apply`: positions the host's proximity hider tracks.
    pub proximity: Vec<BlockPos>,
}

impl ChunkPacketAccessor for ChunkPacket {
    fn world(&self) -> &str {
        &self.world
    }

    fn chunk_x(&self) -> i32 {
        self.chunk_x
    }

    fn chunk_z(&self) -> i32 {
        self.chunk_z
    }

    fn world_height(&self) -> WorldHeight {
        self.height
    }

    fn section_mask(&self) -> u64 {
        self.section_mask
    }

    fn with_word_count(&self) -> bool {
        self.with_word_count
    }

    fn section_bytes(&self) -> &[u8] {
        &self.section_bytes
    }

    fn apply(&mut self, response: &ObfuscationResponse) {
        self.section_bytes = response.data.clone();
        self.block_entities
            .retain(|pos| !response.block_entities.contains(pos));
        self.proximity = response.proximity.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_swaps_bytes_and_strips_block_entities() {
        let kept = BlockPos::new(1, 2, 3);
        let replaced = BlockPos::new(4, 5, 6);
        let mut packet = ChunkPacket {
            world: "overworld".to_owned(),
            chunk_x: 0,
            chunk_z: 0,
            height: WorldHeight::new(-64, 384),
            section_mask: 0b11,
            with_word_count: true,
            section_bytes: vec![1, 2, 3],
            block_entities: [kept, replaced].into_iter().collect(),
            proximity: Vec::new(),
        };

        let mut hidden = HashSet::new();
        hidden.insert(replaced);
        packet.apply(&ObfuscationResponse {
            data: vec![9, 9, 9],
            block_entities: hidden,
            proximity: vec![BlockPos::new(7, 8, 9)],
        });

        assert_eq!(packet.section_bytes, vec![9, 9, 9]);
        assert_eq!(packet.proximity, vec![BlockPos::new(7, 8, 9)]);
        assert!(packet.block_entities.contains(&kept));
        assert!(!packet.block_entities.contains(&replaced));
    }

    #[test]
    fn test_packet_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChunkPacket>();
        assert_send_sync::<Box<dyn ChunkPacketAccessor>>();
    }

    #[test]
    fn test_cache_key() {
        let packet = ChunkPacket {
            world: "nether".to_owned(),
            chunk_x: 40,
            chunk_z: -3,
            height: WorldHeight::new(0, 256),
            section_mask: 0,
            with_word_count: false,
            section_bytes: Vec::new(),
            block_entities: HashSet::new(),
            proximity: Vec::new(),
        };
        assert_eq!(packet.cache_key(), ChunkCacheKey::new("nether", 40, -3));
    }
}
