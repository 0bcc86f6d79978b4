use std::io;

/// Fixed-width integer array packed LSB-first into 64-bit words. Fields may
/// span a word boundary. Width changes require a full rebuild by the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPackedArray {
    bits: usize,
    len: usize,
    words: Vec<u64>,
}

impl BitPackedArray {
    /// Number of 64-bit words needed for `len` fields of `bits` width each.
    pub const fn word_count(len: usize, bits: usize) -> usize {
        (len * bits + 63) / 64
    }

    /// Creates a zero-filled array. `bits` must be in `1..=32`.
    pub fn new(bits: usize, len: usize) -> Self {
        debug_assert!(bits >= 1 && bits <= 32);
        Self {
            bits,
            len,
            words: vec![0; Self::word_count(len, bits)],
        }
    }

    /// Wraps decoded words, validating the word count against the expected
    /// size for `len` fields.
    pub fn from_words(bits: usize, len: usize, words: Vec<u64>) -> io::Result<Self> {
        if bits < 1 || bits > 32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid bits per entry: {}", bits),
            ));
        }
        let expected = Self::word_count(len, bits);
        if words.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Packed array has {} words, expected {}",
                    words.len(),
                    expected
                ),
            ));
        }
        Ok(Self { bits, len, words })
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.len);
        let mask = (1u64 << self.bits) - 1;
        let bit_index = index * self.bits;
        let word = bit_index / 64;
        let offset = bit_index % 64;

        let mut value = self.words[word] >> offset;
        if offset + self.bits > 64 {
            value |= self.words[word + 1] << (64 - offset);
        }
        value & mask
    }

    pub fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.len);
        let mask = (1u64 << self.bits) - 1;
        debug_assert!(value <= mask);
        let bit_index = index * self.bits;
        let word = bit_index / 64;
        let offset = bit_index % 64;

        self.words[word] = (self.words[word] & !(mask << offset)) | ((value & mask) << offset);
        if offset + self.bits > 64 {
            let used = 64 - offset;
            self.words[word + 1] =
                (self.words[word + 1] & !(mask >> used)) | ((value & mask) >> used);
        }
    }
}
