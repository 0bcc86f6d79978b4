/// Mapping between per-section storage indices and global block-state ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Palette {
    /// Every entry in the section is this one id; no packed array exists.
    SingleValue(u32),
    /// Dictionary of global ids; storage holds dictionary indices.
    Indirect(Vec<u32>),
    /// Storage holds global ids directly.
    Direct,
}

impl Palette {
    /// Storage index for a global id, if the palette can represent it.
    pub fn index_of(&self, id: u32) -> Option<u64> {
        match self {
            Palette::SingleValue(value) => {
                if *value == id {
                    Some(0)
                } else {
                    None
                }
            }
            Palette::Indirect(entries) => entries
                .iter()
                .position(|&entry| entry == id)
                .map(|index| index as u64),
            Palette::Direct => Some(id as u64),
        }
    }

    /// Global id for a storage index. `None` for an out-of-range indirect
    /// index, which callers treat as a hard decode error.
    pub fn id_at(&self, index: u64) -> Option<u32> {
        match self {
            Palette::SingleValue(value) => Some(*value),
            Palette::Indirect(entries) => entries.get(index as usize).copied(),
            Palette::Direct => Some(index as u32),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Palette::SingleValue(_) => 1,
            Palette::Indirect(entries) => entries.len(),
            Palette::Direct => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
