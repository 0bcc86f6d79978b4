use crate::buffer::PacketBuffer;
use crate::error::OreveilError;
use crate::section::ChunkSection;
use crate::types::{Result, WorldHeight};

/// A decoded chunk column: the present sections of one 16xNx16 column, in
/// ascending order, as carried by the chunk data packet's block-section
/// payload.
#[derive(Debug, Clone)]
pub struct ChunkData {
    chunk_x: i32,
    chunk_z: i32,
    height: WorldHeight,
    section_mask: u64,
    sections: Vec<Option<ChunkSection>>,
    with_word_count: bool,
}

impl ChunkData {
    /// Decodes the block-section payload of one chunk packet. Bit `i` of
    /// `section_mask` marks whether section `i` (counted up from the world
    /// bottom) is present in `bytes`.
    pub fn read(
        chunk_x: i32,
        chunk_z: i32,
        height: WorldHeight,
        section_mask: u64,
        bytes: &[u8],
        with_word_count: bool,
    ) -> Result<Self> {
        let section_count = height.section_count();
        let mut buffer = PacketBuffer::from_bytes(bytes.to_vec());
        let mut sections = Vec::with_capacity(section_count);

        for i in 0..section_count {
            if section_mask & (1 << i) != 0 {
                sections.push(Some(ChunkSection::read(&mut buffer, with_word_count)?));
            } else {
                sections.push(None);
            }
        }

        if buffer.remaining() != 0 {
            return Err(OreveilError::CodecError(format!(
                "{} trailing bytes after the last present section",
                buffer.remaining()
            )));
        }

        Ok(Self {
            chunk_x,
            chunk_z,
            height,
            section_mask,
            sections,
            with_word_count,
        })
    }

    /// Re-encodes every present section, in order, into one byte buffer.
    pub fn write(&self) -> Vec<u8> {
        let mut buffer = PacketBuffer::new();
        for section in self.sections.iter().flatten() {
            section.write(&mut buffer, self.with_word_count);
        }
        buffer.into_inner()
    }

    pub fn chunk_x(&self) -> i32 {
        self.chunk_x
    }

    pub fn chunk_z(&self) -> i32 {
        self.chunk_z
    }

    pub fn height(&self) -> WorldHeight {
        self.height
    }

    pub fn section_mask(&self) -> u64 {
        self.section_mask
    }

    pub fn section(&self, index: usize) -> Option<&ChunkSection> {
        self.sections.get(index).and_then(|s| s.as_ref())
    }

    /// Present section indices, ascending.
    pub fn present_sections(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.sections.len()).filter(|i| self.sections[*i].is_some())
    }

    /// Block state at local x/z (0..16) and world y. Absent sections read as
    /// air; `None` only outside the world height range.
    pub fn get_block_state(&self, x: usize, y: i32, z: usize) -> Option<u32> {
        if !self.height.contains(y) {
            return None;
        }
        let section_index = ((y - self.height.min_y) >> 4) as usize;
        match &self.sections[section_index] {
            None => Some(0),
            Some(section) => section
                .get_block_state(x, (y - self.height.min_y) as usize & 15, z)
                .ok(),
        }
    }

    /// Writes a block state at local x/z and world y. Only present sections
    /// are writable; the processor only ever writes where it has read.
    pub fn set_block_state(&mut self, x: usize, y: i32, z: usize, id: u32) -> Result<u32> {
        if !self.height.contains(y) {
            return Err(OreveilError::CodecError(format!(
                "y {} outside world height",
                y
            )));
        }
        let section_index = ((y - self.height.min_y) >> 4) as usize;
        match &mut self.sections[section_index] {
            None => Err(OreveilError::CodecError(format!(
                "Section {} is not present",
                section_index
            ))),
            Some(section) => section.set_block_state(x, (y - self.height.min_y) as usize & 15, z, id),
        }
    }
}

/// Resolves block states in the four edge-sharing neighbor chunks for the
/// occlusion test at chunk borders. Coordinates are world block coordinates;
/// `None` means unknown (outside the provided radius).
pub trait NeighborProvider {
    fn block_state_at(&self, x: i32, y: i32, z: i32) -> Option<u32>;
}

/// The neighbor chunks attached to a request. Missing entries stay unknown.
#[derive(Debug, Clone, Default)]
pub struct NeighborChunks {
    chunks: Vec<ChunkData>,
}

impl NeighborChunks {
    pub fn new(chunks: Vec<ChunkData>) -> Self {
        Self { chunks }
    }
}

impl NeighborProvider for NeighborChunks {
    fn block_state_at(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        let chunk_x = x >> 4;
        let chunk_z = z >> 4;
        self.chunks
            .iter()
            .find(|chunk| chunk.chunk_x() == chunk_x && chunk.chunk_z() == chunk_z)
            .and_then(|chunk| chunk.get_block_state((x & 15) as usize, y, (z & 15) as usize))
    }
}

/// Used when the neighbor fetch failed or was skipped: everything unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNeighbors;

impl NeighborProvider for NoNeighbors {
    fn block_state_at(&self, _x: i32, _y: i32, _z: i32) -> Option<u32> {
        None
    }
}
