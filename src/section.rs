use crate::buffer::PacketBuffer;
use crate::error::OreveilError;
use crate::packed_array::BitPackedArray;
use crate::palette::Palette;
use crate::types::Result;

/// Logical entries in one 16x16x16 section.
pub const SECTION_VOLUME: usize = 4096;

/// Indirect palettes never drop below this width once grown.
const MIN_INDIRECT_BITS: u8 = 4;
/// Above this width the dictionary is abandoned for direct global ids.
const MAX_INDIRECT_BITS: u8 = 8;
const MIN_DIRECT_BITS: u8 = 9;

fn direct_bits_for(id: u32) -> u8 {
    let needed = (32 - id.leading_zeros()).max(1) as u8;
    needed.max(MIN_DIRECT_BITS)
}

/// One decoded 16x16x16 section: palette, packed storage and the running
/// non-air block count. Wire layout per the section format:
/// `u8 bitsPerEntry | palette body | [varint wordCount] | wordCount x u64`,
/// where a zero width means a single-value palette (one varint id, no
/// storage) and widths above 8 mean direct global ids (no dictionary).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSection {
    bits_per_entry: u8,
    palette: Palette,
    data: Option<BitPackedArray>,
    block_count: u16,
}

impl ChunkSection {
    /// A section whose 4096 entries are all the given id.
    pub fn single_value(id: u32) -> Self {
        Self {
            bits_per_entry: 0,
            palette: Palette::SingleValue(id),
            data: None,
            block_count: if id == 0 { 0 } else { SECTION_VOLUME as u16 },
        }
    }

    fn index(x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < 16 && y < 16 && z < 16);
        (y << 8) | (z << 4) | x
    }

    /// Decodes one section. `with_word_count` selects the protocol revision
    /// that prefixes the packed array with its own length; a prefix that
    /// disagrees with the expected word count is a hard decode error.
    pub fn read(buffer: &mut PacketBuffer, with_word_count: bool) -> Result<Self> {
        let bits_per_entry = buffer.read_u8()?;

        if bits_per_entry == 0 {
            let id = buffer.read_varint()? as u32;
            return Ok(Self::single_value(id));
        }

        let palette = if bits_per_entry <= MAX_INDIRECT_BITS {
            let count = buffer.read_varint()?;
            if count <= 0 || count > (1 << bits_per_entry) {
                return Err(OreveilError::CodecError(format!(
                    "Palette of {} entries cannot be addressed with {} bits",
                    count, bits_per_entry
                )));
            }
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(buffer.read_varint()? as u32);
            }
            Palette::Indirect(entries)
        } else {
            Palette::Direct
        };

        let expected_words = BitPackedArray::word_count(SECTION_VOLUME, bits_per_entry as usize);
        if with_word_count {
            let declared = buffer.read_varint()?;
            if declared as usize != expected_words {
                return Err(OreveilError::CodecError(format!(
                    "Packed array declares {} words, expected {}",
                    declared, expected_words
                )));
            }
        }

        let mut words = Vec::with_capacity(expected_words);
        for _ in 0..expected_words {
            words.push(buffer.read_u64()?);
        }
        let data = BitPackedArray::from_words(bits_per_entry as usize, SECTION_VOLUME, words)?;

        // Validate every stored index and establish the non-air count.
        let mut block_count = 0u16;
        for index in 0..SECTION_VOLUME {
            let stored = data.get(index);
            let id = palette.id_at(stored).ok_or_else(|| {
                OreveilError::CodecError(format!(
                    "Palette index {} out of range (palette has {} entries)",
                    stored,
                    palette.len()
                ))
            })?;
            if id != 0 {
                block_count += 1;
            }
        }

        Ok(Self {
            bits_per_entry,
            palette,
            data: Some(data),
            block_count,
        })
    }

    /// Re-encodes the section. Decoding the output reproduces the same dense
    /// array even when the palette choice differs from the original.
    pub fn write(&self, buffer: &mut PacketBuffer, with_word_count: bool) {
        match &self.palette {
            Palette::SingleValue(id) => {
                buffer.write_u8(0);
                buffer.write_varint(*id as i32);
                return;
            }
            Palette::Indirect(entries) => {
                buffer.write_u8(self.bits_per_entry);
                buffer.write_varint(entries.len() as i32);
                for entry in entries {
                    buffer.write_varint(*entry as i32);
                }
            }
            Palette::Direct => {
                buffer.write_u8(self.bits_per_entry);
            }
        }

        if let Some(data) = &self.data {
            if with_word_count {
                buffer.write_varint(data.words().len() as i32);
            }
            for word in data.words() {
                buffer.write_u64(*word);
            }
        }
    }

    pub fn get_block_state(&self, x: usize, y: usize, z: usize) -> Result<u32> {
        match &self.data {
            None => self.palette.id_at(0).ok_or_else(|| {
                OreveilError::CodecError("Single-value palette without id".to_owned())
            }),
            Some(data) => {
                let stored = data.get(Self::index(x, y, z));
                self.palette.id_at(stored).ok_or_else(|| {
                    OreveilError::CodecError(format!("Palette index {} out of range", stored))
                })
            }
        }
    }

    /// Stores a block-state id, growing the palette when it cannot represent
    /// the id yet. Returns the previous id at the position.
    pub fn set_block_state(&mut self, x: usize, y: usize, z: usize, id: u32) -> Result<u32> {
        let previous = self.get_block_state(x, y, z)?;
        if previous == id {
            return Ok(previous);
        }

        self.ensure_representable(id)?;

        let stored = self.palette.index_of(id).ok_or_else(|| {
            OreveilError::CodecError(format!("Palette cannot represent id {} after growth", id))
        })?;
        if let Some(data) = &mut self.data {
            data.set(Self::index(x, y, z), stored);
        }

        if previous != 0 && id == 0 {
            self.block_count -= 1;
        } else if previous == 0 && id != 0 {
            self.block_count += 1;
        }
        Ok(previous)
    }

    /// Grows palette and storage until `id` is representable. Growth is
    /// monotonic: the width never shrinks within one decode/modify/encode
    /// cycle, and never drops below 4 once grown.
    fn ensure_representable(&mut self, id: u32) -> Result<()> {
        match &mut self.palette {
            Palette::SingleValue(value) => {
                if *value == id {
                    return Ok(());
                }
                let old = *value;
                self.rebuild(MIN_INDIRECT_BITS, Palette::Indirect(vec![old, id]))
            }
            Palette::Indirect(entries) => {
                if entries.contains(&id) {
                    return Ok(());
                }
                if entries.len() < (1usize << self.bits_per_entry) {
                    entries.push(id);
                    return Ok(());
                }
                let grown_bits = (self.bits_per_entry + 1).max(MIN_INDIRECT_BITS);
                if grown_bits > MAX_INDIRECT_BITS {
                    let widest = entries.iter().copied().max().unwrap_or(0).max(id);
                    self.rebuild(direct_bits_for(widest), Palette::Direct)
                } else {
                    let mut grown = entries.clone();
                    grown.push(id);
                    self.rebuild(grown_bits, Palette::Indirect(grown))
                }
            }
            Palette::Direct => {
                if (id as u64) < (1u64 << self.bits_per_entry) {
                    return Ok(());
                }
                self.rebuild(direct_bits_for(id), Palette::Direct)
            }
        }
    }

    /// Full O(4096) re-translation of every logical value from the old
    /// palette into `new_palette` at `new_bits` width.
    fn rebuild(&mut self, new_bits: u8, new_palette: Palette) -> Result<()> {
        let mut data = BitPackedArray::new(new_bits as usize, SECTION_VOLUME);
        for index in 0..SECTION_VOLUME {
            let id = match &self.data {
                None => match &self.palette {
                    Palette::SingleValue(value) => *value,
                    _ => 0,
                },
                Some(old) => self.palette.id_at(old.get(index)).ok_or_else(|| {
                    OreveilError::CodecError("Palette index out of range during rebuild".to_owned())
                })?,
            };
            let stored = new_palette.index_of(id).ok_or_else(|| {
                OreveilError::CodecError(format!("New palette cannot represent id {}", id))
            })?;
            data.set(index, stored);
        }
        self.bits_per_entry = new_bits;
        self.palette = new_palette;
        self.data = Some(data);
        Ok(())
    }

    /// Non-air (id != 0) entries. A section at zero may be omitted from
    /// structures that track whether it is worth sending.
    pub fn block_count(&self) -> u16 {
        self.block_count
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.bits_per_entry
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_with_distinct_ids(count: u32) -> ChunkSection {
        let mut section = ChunkSection::single_value(0);
        for i in 0..SECTION_VOLUME {
            section
                .set_block_state(i & 15, (i >> 8) & 15, (i >> 4) & 15, (i as u32) % count)
                .unwrap();
        }
        section
    }

    fn round_trip(section: &ChunkSection, with_word_count: bool) -> ChunkSection {
        let mut buffer = PacketBuffer::new();
        section.write(&mut buffer, with_word_count);
        let mut read_buffer = PacketBuffer::from_bytes(buffer.into_inner());
        let decoded = ChunkSection::read(&mut read_buffer, with_word_count).unwrap();
        assert_eq!(read_buffer.remaining(), 0);
        decoded
    }

    fn assert_same_blocks(a: &ChunkSection, b: &ChunkSection) {
        for y in 0..16 {
            for z in 0..16 {
                for x in 0..16 {
                    assert_eq!(
                        a.get_block_state(x, y, z).unwrap(),
                        b.get_block_state(x, y, z).unwrap()
                    );
                }
            }
        }
    }

    #[test]
    fn test_round_trip_across_palette_modes() {
        // 1 id: single-value; 2..=16: indirect; 257: direct.
        for count in [1, 2, 15, 16, 257] {
            let section = section_with_distinct_ids(count);
            for with_word_count in [false, true] {
                let decoded = round_trip(&section, with_word_count);
                assert_same_blocks(&section, &decoded);
                assert_eq!(decoded.block_count(), section.block_count());
            }
        }
    }

    #[test]
    fn test_single_value_round_trip() {
        let section = ChunkSection::single_value(42);
        let decoded = round_trip(&section, true);
        assert_eq!(decoded.get_block_state(3, 7, 11).unwrap(), 42);
        assert_eq!(decoded.block_count(), 4096);
        assert_eq!(decoded.bits_per_entry(), 0);
    }

    #[test]
    fn test_growth_to_direct_preserves_values() {
        let mut section = ChunkSection::single_value(0);
        // 256 distinct ids fill an 8-bit indirect palette.
        for i in 0..256 {
            section.set_block_state(i & 15, 0, (i >> 4) & 15, i as u32).unwrap();
        }
        assert!(matches!(section.palette(), Palette::Indirect(_)));

        // The 257th forces the switch to direct mode.
        section.set_block_state(0, 15, 0, 1000).unwrap();
        assert!(matches!(section.palette(), Palette::Direct));
        assert!(section.bits_per_entry() >= 9);

        for i in 0..256 {
            assert_eq!(
                section.get_block_state(i & 15, 0, (i >> 4) & 15).unwrap(),
                i as u32
            );
        }
        assert_eq!(section.get_block_state(0, 15, 0).unwrap(), 1000);
    }

    #[test]
    fn test_indirect_width_never_drops_below_four() {
        let mut section = ChunkSection::single_value(0);
        section.set_block_state(0, 0, 0, 5).unwrap();
        assert_eq!(section.bits_per_entry(), MIN_INDIRECT_BITS);

        // Setting the lone non-air block back to air keeps the grown width.
        section.set_block_state(0, 0, 0, 0).unwrap();
        assert_eq!(section.bits_per_entry(), MIN_INDIRECT_BITS);
        assert!(section.is_empty());
    }

    #[test]
    fn test_block_count_bookkeeping() {
        let mut section = ChunkSection::single_value(0);
        assert!(section.is_empty());
        section.set_block_state(1, 2, 3, 9).unwrap();
        section.set_block_state(4, 5, 6, 9).unwrap();
        assert_eq!(section.block_count(), 2);
        section.set_block_state(1, 2, 3, 0).unwrap();
        assert_eq!(section.block_count(), 1);
        // Overwriting non-air with non-air leaves the count alone.
        section.set_block_state(4, 5, 6, 7).unwrap();
        assert_eq!(section.block_count(), 1);
    }

    #[test]
    fn test_word_count_mismatch_is_decode_error() {
        let section = section_with_distinct_ids(2);
        let mut buffer = PacketBuffer::new();
        section.write(&mut buffer, false);

        // Splice a wrong word count in by hand: bits byte, palette, then count.
        let encoded = buffer.into_inner();
        let mut tampered = PacketBuffer::new();
        let mut reader = PacketBuffer::from_bytes(encoded);
        let bits = reader.read_u8().unwrap();
        tampered.write_u8(bits);
        let palette_len = reader.read_varint().unwrap();
        tampered.write_varint(palette_len);
        for _ in 0..palette_len {
            tampered.write_varint(reader.read_varint().unwrap());
        }
        tampered.write_varint(9999);
        tampered.write_bytes_raw(reader.read_bytes(reader.remaining()).unwrap());

        let mut read_buffer = PacketBuffer::from_bytes(tampered.into_inner());
        assert!(matches!(
            ChunkSection::read(&mut read_buffer, true),
            Err(OreveilError::CodecError(_))
        ));
    }

    #[test]
    fn test_out_of_range_palette_index_is_decode_error() {
        // 4-bit storage with a 2-entry palette; store index 3 somewhere.
        let mut buffer = PacketBuffer::new();
        buffer.write_u8(4);
        buffer.write_varint(2);
        buffer.write_varint(0);
        buffer.write_varint(7);
        let mut words = vec![0u64; BitPackedArray::word_count(SECTION_VOLUME, 4)];
        words[0] = 3;
        for word in words {
            buffer.write_u64(word);
        }

        let mut read_buffer = PacketBuffer::from_bytes(buffer.into_inner());
        assert!(matches!(
            ChunkSection::read(&mut read_buffer, false),
            Err(OreveilError::CodecError(_))
        ));
    }

    #[test]
    fn test_oversized_palette_count_is_decode_error() {
        let mut buffer = PacketBuffer::new();
        buffer.write_u8(4);
        buffer.write_varint(17);
        let mut read_buffer = PacketBuffer::from_bytes(buffer.into_inner());
        assert!(ChunkSection::read(&mut read_buffer, false).is_err());
    }
}
