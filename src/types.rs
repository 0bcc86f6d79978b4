use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::OreveilError>;

/// Identity of one chunk column for every cache and lookup operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkCacheKey {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl ChunkCacheKey {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// Region coordinates of the 32x32-chunk container this chunk falls into.
    pub fn region_x(&self) -> i32 {
        self.x >> 5
    }

    pub fn region_z(&self) -> i32 {
        self.z >> 5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Vertical extent of a world. `min_y` may be negative; `height` is always a
/// multiple of 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldHeight {
    pub min_y: i32,
    pub height: u32,
}

impl WorldHeight {
    pub fn new(min_y: i32, height: u32) -> Self {
        Self { min_y, height }
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32 - 1
    }

    pub fn contains(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y()
    }

    pub fn section_count(&self) -> usize {
        (self.height as usize) / 16
    }
}

/// Packs a world position into one 32-bit word relative to its chunk origin:
/// bits [0..12) local y, [12..16) local x, [16..20) local z. Only valid for
/// positions inside the owning chunk's 16x16 column and height range.
pub fn pack_local_pos(pos: BlockPos, min_y: i32) -> u32 {
    let local_y = (pos.y - min_y) as u32 & 0xFFF;
    let local_x = (pos.x & 15) as u32;
    let local_z = (pos.z & 15) as u32;
    local_y | (local_x << 12) | (local_z << 16)
}

/// Reconstructs a world position packed by [`pack_local_pos`] against the
/// owning chunk's origin.
pub fn unpack_local_pos(packed: u32, chunk_x: i32, chunk_z: i32, min_y: i32) -> BlockPos {
    let local_y = (packed & 0xFFF) as i32;
    let local_x = ((packed >> 12) & 15) as i32;
    let local_z = ((packed >> 16) & 15) as i32;
    BlockPos::new(chunk_x * 16 + local_x, min_y + local_y, chunk_z * 16 + local_z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_coordinates() {
        let key = ChunkCacheKey::new("world", 33, -1);
        assert_eq!(key.region_x(), 1);
        assert_eq!(key.region_z(), -1);

        let key = ChunkCacheKey::new("world", -33, 31);
        assert_eq!(key.region_x(), -2);
        assert_eq!(key.region_z(), 0);
    }

    #[test]
    fn test_pack_local_pos_round_trip() {
        let min_y = -64;
        let positions = vec![
            BlockPos::new(32, -64, -16),
            BlockPos::new(47, 319, -1),
            BlockPos::new(40, 0, -9),
        ];
        for pos in positions {
            let packed = pack_local_pos(pos, min_y);
            assert_eq!(unpack_local_pos(packed, 2, -1, min_y), pos);
        }
    }

    #[test]
    fn test_world_height() {
        let height = WorldHeight::new(-64, 384);
        assert_eq!(height.max_y(), 319);
        assert_eq!(height.section_count(), 24);
        assert!(height.contains(-64));
        assert!(height.contains(319));
        assert!(!height.contains(320));
        assert!(!height.contains(-65));
    }
}
