use oreveil::buffer::PacketBuffer;
use oreveil::chunk::ChunkData;
use oreveil::config::{
    BlockRegistry, HiddenBlock, OreveilConfig, ProximityBlock, ReplacementLayer, WeightedBlock,
};
use oreveil::packet::ChunkPacket;
use oreveil::pipeline::{NeighborFetcher, ObfuscationPipeline};
use oreveil::section::ChunkSection;
use oreveil::types::{BlockPos, WorldHeight};
use oreveil::{ObfuscationCache, ObfuscationProcessor};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

pub const AIR: u32 = 0;
pub const STONE: u32 = 1;
pub const ORE: u32 = 2;
pub const CHEST_ORE: u32 = 3;
pub const PROX: u32 = 4;

pub fn world_height() -> WorldHeight {
    WorldHeight::new(0, 32)
}

/// Hides ORE and CHEST_ORE behind stone; reports PROX in y 16..=31.
pub fn test_config(dir: &Path) -> OreveilConfig {
    let mut config = OreveilConfig::new("1.0.0-test");
    config.cache.disk_directory = dir.to_path_buf();
    config.obfuscation.hidden.push(HiddenBlock {
        id: ORE,
        block_entity: false,
    });
    config.obfuscation.hidden.push(HiddenBlock {
        id: CHEST_ORE,
        block_entity: true,
    });
    config.obfuscation.proximity.push(ProximityBlock {
        id: PROX,
        min_y: 16,
        max_y: 31,
        use_block_below: false,
        block_entity: false,
    });
    let stone_layer = ReplacementLayer {
        min_y: 0,
        max_y: 31,
        weights: vec![WeightedBlock {
            id: STONE,
            weight: 1.0,
        }],
    };
    config.obfuscation.replacements.push(stone_layer.clone());
    config.obfuscation.proximity_replacements.push(stone_layer);
    config
}

pub fn build_pipeline(
    config: &OreveilConfig,
    fetcher: Arc<dyn NeighborFetcher>,
) -> ObfuscationPipeline {
    let registry = BlockRegistry {
        total_states: 16,
        occluding: vec![STONE, ORE, CHEST_ORE, PROX],
        allow_for_use_block_below: vec![],
    };
    let processor = Arc::new(ObfuscationProcessor::new(
        Arc::new(config.build_flag_table(&registry, world_height())),
        config.hidden_sampler().unwrap(),
        config.proximity_sampler().unwrap(),
    ));
    let cache = Arc::new(ObfuscationCache::new(&config.cache));
    ObfuscationPipeline::new(
        processor,
        cache,
        fetcher,
        config.system_hash().unwrap(),
        Handle::current(),
    )
}

/// Two all-stone sections for chunk (0, 0), with the given local overrides.
pub fn packet_with_blocks(blocks: &[(usize, i32, usize, u32)]) -> ChunkPacket {
    let mut sections = [ChunkSection::single_value(STONE), ChunkSection::single_value(STONE)];
    let mut block_entities = HashSet::new();
    for &(x, y, z, id) in blocks {
        sections[(y >> 4) as usize]
            .set_block_state(x, (y & 15) as usize, z, id)
            .unwrap();
        if id == CHEST_ORE {
            block_entities.insert(BlockPos::new(x as i32, y, z as i32));
        }
    }

    let mut buffer = PacketBuffer::new();
    for section in &sections {
        section.write(&mut buffer, true);
    }
    ChunkPacket {
        world: "overworld".to_owned(),
        chunk_x: 0,
        chunk_z: 0,
        height: world_height(),
        section_mask: 0b11,
        with_word_count: true,
        section_bytes: buffer.into_inner(),
        block_entities,
        proximity: Vec::new(),
    }
}

pub fn block_at(packet: &ChunkPacket, x: usize, y: i32, z: usize) -> u32 {
    let chunk = ChunkData::read(
        packet.chunk_x,
        packet.chunk_z,
        packet.height,
        packet.section_mask,
        &packet.section_bytes,
        packet.with_word_count,
    )
    .unwrap();
    chunk.get_block_state(x, y, z).unwrap()
}
