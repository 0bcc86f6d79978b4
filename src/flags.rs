use crate::types::WorldHeight;

/// Per-block-state bit flags plus the packed proximity height range.
///
/// Layout: bits [0..6) flags, [16..32) min y, [32..48) max y (both i16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockFlags(u64);

pub const FLAG_OBFUSCATE: u64 = 1 << 0;
pub const FLAG_PROXIMITY: u64 = 1 << 1;
pub const FLAG_BLOCK_ENTITY: u64 = 1 << 2;
pub const FLAG_USE_BLOCK_BELOW: u64 = 1 << 3;
pub const FLAG_ALLOW_FOR_USE_BLOCK_BELOW: u64 = 1 << 4;
pub const FLAG_OCCLUDING: u64 = 1 << 5;

/// Flags that make a block interesting to the processor. OCCLUDING and
/// ALLOW_FOR_USE_BLOCK_BELOW are passive properties and excluded, so plain
/// stone still counts as "empty" on the hot skip path.
const ACTIVE_MASK: u64 =
    FLAG_OBFUSCATE | FLAG_PROXIMITY | FLAG_BLOCK_ENTITY | FLAG_USE_BLOCK_BELOW;

impl BlockFlags {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    /// True when no active flag is set; the common case, checked first for
    /// every block.
    pub fn is_empty(&self) -> bool {
        self.0 & ACTIVE_MASK == 0
    }

    fn with(self, flag: u64) -> Self {
        Self(self.0 | flag)
    }

    fn with_range(self, min_y: i32, max_y: i32) -> Self {
        let min = (min_y as i16 as u16) as u64;
        let max = (max_y as i16 as u16) as u64;
        Self((self.0 & 0xFFFF) | (min << 16) | (max << 32))
    }

    fn range(&self) -> (i32, i32) {
        let min = ((self.0 >> 16) & 0xFFFF) as u16 as i16 as i32;
        let max = ((self.0 >> 32) & 0xFFFF) as u16 as i16 as i32;
        (min, max)
    }

    /// Whether the PROXIMITY bit is asserted for this specific height.
    pub fn proximity_applies(&self, y: i32) -> bool {
        if !self.contains(FLAG_PROXIMITY) {
            return false;
        }
        let (min, max) = self.range();
        y >= min && y <= max
    }

    /// Whether this block may be picked by the use-block-below scan.
    pub fn usable_as_below(&self) -> bool {
        self.is_empty() || self.contains(FLAG_ALLOW_FOR_USE_BLOCK_BELOW)
    }
}

/// Dense array of [`BlockFlags`] indexed by global block-state id. Built once
/// per configuration load, read-only afterward, shared by all processor
/// invocations. A plain array, not a map: the id space is dense and this
/// lookup is the hottest in the processor.
#[derive(Debug, Clone)]
pub struct BlockFlagTable {
    flags: Vec<BlockFlags>,
}

impl BlockFlagTable {
    pub fn builder(total_states: usize) -> BlockFlagTableBuilder {
        BlockFlagTableBuilder {
            flags: vec![BlockFlags::empty(); total_states],
        }
    }

    pub fn get(&self, id: u32) -> BlockFlags {
        self.flags
            .get(id as usize)
            .copied()
            .unwrap_or_else(BlockFlags::empty)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

pub struct BlockFlagTableBuilder {
    flags: Vec<BlockFlags>,
}

impl BlockFlagTableBuilder {
    fn set(&mut self, id: u32, flag: u64) -> &mut Self {
        if let Some(entry) = self.flags.get_mut(id as usize) {
            *entry = entry.with(flag);
        }
        self
    }

    pub fn occluding(&mut self, id: u32) -> &mut Self {
        self.set(id, FLAG_OCCLUDING)
    }

    pub fn obfuscate(&mut self, id: u32) -> &mut Self {
        self.set(id, FLAG_OBFUSCATE)
    }

    pub fn block_entity(&mut self, id: u32) -> &mut Self {
        self.set(id, FLAG_BLOCK_ENTITY)
    }

    pub fn allow_for_use_block_below(&mut self, id: u32) -> &mut Self {
        self.set(id, FLAG_ALLOW_FOR_USE_BLOCK_BELOW)
    }

    pub fn proximity(
        &mut self,
        id: u32,
        height: WorldHeight,
        min_y: i32,
        max_y: i32,
        use_block_below: bool,
    ) -> &mut Self {
        let min_y = min_y.max(height.min_y);
        let max_y = max_y.min(height.max_y());
        if let Some(entry) = self.flags.get_mut(id as usize) {
            *entry = entry.with(FLAG_PROXIMITY).with_range(min_y, max_y);
            if use_block_below {
                *entry = entry.with(FLAG_USE_BLOCK_BELOW);
            }
        }
        self
    }

    pub fn build(self) -> BlockFlagTable {
        BlockFlagTable { flags: self.flags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_the_default() {
        let table = BlockFlagTable::builder(16).build();
        assert!(table.get(3).is_empty());
        assert!(table.get(999).is_empty());
    }

    #[test]
    fn test_occluding_blocks_stay_empty() {
        let mut builder = BlockFlagTable::builder(16);
        builder.occluding(1);
        let table = builder.build();
        assert!(table.get(1).is_empty());
        assert!(table.get(1).contains(FLAG_OCCLUDING));
    }

    #[test]
    fn test_obfuscate_flag() {
        let mut builder = BlockFlagTable::builder(16);
        builder.obfuscate(5).block_entity(5);
        let table = builder.build();
        let flags = table.get(5);
        assert!(!flags.is_empty());
        assert!(flags.contains(FLAG_OBFUSCATE));
        assert!(flags.contains(FLAG_BLOCK_ENTITY));
        assert!(!flags.contains(FLAG_PROXIMITY));
    }

    #[test]
    fn test_proximity_height_gating() {
        let height = WorldHeight::new(-64, 384);
        let mut builder = BlockFlagTable::builder(16);
        builder.proximity(7, height, -32, 100, true);
        let table = builder.build();
        let flags = table.get(7);

        assert!(flags.proximity_applies(-32));
        assert!(flags.proximity_applies(0));
        assert!(flags.proximity_applies(100));
        assert!(!flags.proximity_applies(-33));
        assert!(!flags.proximity_applies(101));
        assert!(flags.contains(FLAG_USE_BLOCK_BELOW));
    }

    #[test]
    fn test_proximity_range_clamped_to_world() {
        let height = WorldHeight::new(-64, 384);
        let mut builder = BlockFlagTable::builder(16);
        builder.proximity(7, height, i32::MIN, i32::MAX, false);
        let table = builder.build();
        let flags = table.get(7);
        assert!(flags.proximity_applies(-64));
        assert!(flags.proximity_applies(319));
        assert!(!flags.contains(FLAG_USE_BLOCK_BELOW));
    }

    #[test]
    fn test_usable_as_below() {
        let mut builder = BlockFlagTable::builder(16);
        builder.occluding(1);
        builder.obfuscate(2);
        builder.obfuscate(3).allow_for_use_block_below(3);
        let table = builder.build();

        assert!(table.get(1).usable_as_below());
        assert!(!table.get(2).usable_as_below());
        assert!(table.get(3).usable_as_below());
    }
}
