use crate::chunk::{ChunkData, NeighborProvider};
use crate::flags::{BlockFlagTable, FLAG_BLOCK_ENTITY, FLAG_OBFUSCATE, FLAG_OCCLUDING, FLAG_USE_BLOCK_BELOW};
use crate::sampler::LayeredSampler;
use crate::types::{BlockPos, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// The rewritten section payload plus the side lists the outer packet layer
/// needs: block-entity positions whose metadata must be stripped, and
/// positions handed to the proximity-hiding collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationResponse {
    pub data: Vec<u8>,
    pub block_entities: HashSet<BlockPos>,
    pub proximity: Vec<BlockPos>,
}

/// Walks a decoded chunk block-by-block, hiding flagged blocks behind
/// substitutes drawn from the height-appropriate sampler. Shares one
/// immutable flag table and sampler set across all invocations.
pub struct ObfuscationProcessor {
    flags: Arc<BlockFlagTable>,
    hidden: LayeredSampler,
    proximity: LayeredSampler,
}

impl ObfuscationProcessor {
    pub fn new(flags: Arc<BlockFlagTable>, hidden: LayeredSampler, proximity: LayeredSampler) -> Self {
        Self {
            flags,
            hidden,
            proximity,
        }
    }

    /// Processes one decoded chunk. Reads always come from the unmodified
    /// input so earlier substitutions never feed later occlusion tests; the
    /// rewritten copy is encoded at the end. Any decode error aborts the
    /// whole chunk so a partial result is never cached.
    pub fn process(
        &self,
        chunk: &ChunkData,
        neighbors: &dyn NeighborProvider,
    ) -> Result<ObfuscationResponse> {
        let mut output = chunk.clone();
        let mut block_entities = HashSet::new();
        let mut proximity = Vec::new();
        let mut rng = rand::thread_rng();

        let height = chunk.height();
        let base_x = chunk.chunk_x() * 16;
        let base_z = chunk.chunk_z() * 16;

        for section_index in chunk.present_sections() {
            let section_base_y = height.min_y + (section_index as i32) * 16;
            for local_y in 0..16 {
                let y = section_base_y + local_y;
                for z in 0..16usize {
                    for x in 0..16usize {
                        let id = match chunk.get_block_state(x, y, z) {
                            Some(id) => id,
                            None => continue,
                        };
                        let flags = self.flags.get(id);
                        if flags.is_empty() {
                            continue;
                        }

                        let mut replacement = None;
                        if flags.contains(FLAG_OBFUSCATE) {
                            // The fully-enclosed rule: a visible ore face is
                            // never hidden.
                            if self.fully_enclosed(chunk, neighbors, x, y, z) {
                                replacement = self.hidden.sample_at(y, &mut rng);
                            }
                        }
                        // Proximity handling for any block the enclosure
                        // branch left in place, including dual-flagged ones.
                        if replacement.is_none() && flags.proximity_applies(y) {
                            let pos = BlockPos::new(base_x + x as i32, y, base_z + z as i32);
                            proximity.push(pos);
                            replacement = if flags.contains(FLAG_USE_BLOCK_BELOW) {
                                Some(self.block_below(chunk, x, y, z))
                            } else {
                                self.proximity.sample_at(y, &mut rng)
                            };
                        }

                        if let Some(new_id) = replacement {
                            if new_id != id {
                                output.set_block_state(x, y, z, new_id)?;
                            }
                            if flags.contains(FLAG_BLOCK_ENTITY) {
                                block_entities
                                    .insert(BlockPos::new(base_x + x as i32, y, base_z + z as i32));
                            }
                        }
                    }
                }
            }
        }

        Ok(ObfuscationResponse {
            data: output.write(),
            block_entities,
            proximity,
        })
    }

    /// All six axis-adjacent neighbors occluding. Horizontal neighbors
    /// outside the chunk resolve through the neighbor accessor; unknown
    /// resolves as occluding so a border ore stays hidden rather than leaks.
    /// Out-of-world-height neighbors are non-occluding.
    fn fully_enclosed(
        &self,
        chunk: &ChunkData,
        neighbors: &dyn NeighborProvider,
        x: usize,
        y: i32,
        z: usize,
    ) -> bool {
        let offsets: [(i32, i32, i32); 6] = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];
        for (dx, dy, dz) in offsets {
            let ny = y + dy;
            if dy != 0 && !chunk.height().contains(ny) {
                return false;
            }
            let nx = x as i32 + dx;
            let nz = z as i32 + dz;
            let id = if (0..16).contains(&nx) && (0..16).contains(&nz) {
                chunk.get_block_state(nx as usize, ny, nz as usize)
            } else {
                let world_x = chunk.chunk_x() * 16 + nx;
                let world_z = chunk.chunk_z() * 16 + nz;
                match neighbors.block_state_at(world_x, ny, world_z) {
                    None => continue, // unknown counts as occluding
                    id => id,
                }
            };
            match id {
                Some(id) if self.flags.get(id).contains(FLAG_OCCLUDING) => {}
                _ => return false,
            }
        }
        true
    }

    /// Scans downward from `y - 1` for the first block usable as a
    /// substitute. Falls back to air at the world bottom.
    fn block_below(&self, chunk: &ChunkData, x: usize, y: i32, z: usize) -> u32 {
        let mut scan_y = y - 1;
        while scan_y >= chunk.height().min_y {
            if let Some(id) = chunk.get_block_state(x, scan_y, z) {
                if self.flags.get(id).usable_as_below() {
                    return id;
                }
            }
            scan_y -= 1;
        }
        0
    }
}
