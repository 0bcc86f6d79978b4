use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SECTOR_BYTES: u64 = 4096;
const LOCATION_ENTRIES: usize = 1024;
/// The location table occupies the first sector.
const HEADER_SECTORS: u32 = 1;

/// Number of 4KiB sectors needed for `size` bytes.
fn required_sectors(size: u32) -> u32 {
    (size + SECTOR_BYTES as u32 - 1) / SECTOR_BYTES as u32
}

/// One on-disk container for a 32x32-chunk region. The first 4096 bytes are
/// a location table of 1024 big-endian words, `sector_offset << 8 |
/// sector_count`, indexed by `(x & 31) + (z & 31) * 32`. Each payload starts
/// on a sector boundary with a u32 length prefix.
#[derive(Debug)]
pub struct RegionFile {
    file: File,
    path: PathBuf,
    locations: Vec<u32>,
    /// First sector past all allocated payloads.
    sector_end: u32,
}

impl RegionFile {
    /// Opens a region file, creating it (with an empty location table) if it
    /// does not exist yet.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let mut locations = vec![0u32; LOCATION_ENTRIES];
        if file_len == 0 {
            let header = vec![0u8; SECTOR_BYTES as usize];
            file.write_all(&header)?;
        } else {
            file.seek(SeekFrom::Start(0))?;
            for entry in locations.iter_mut() {
                *entry = file.read_u32::<BigEndian>()?;
            }
        }

        let mut sector_end = HEADER_SECTORS;
        for &entry in &locations {
            let offset = entry >> 8;
            let count = entry & 0xFF;
            if offset != 0 {
                sector_end = sector_end.max(offset + count);
            }
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            locations,
            sector_end,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn location_index(chunk_x: i32, chunk_z: i32) -> usize {
        ((chunk_x & 31) + (chunk_z & 31) * 32) as usize
    }

    /// Reads one chunk's payload, or `None` when it was never written.
    pub fn read_chunk(&mut self, chunk_x: i32, chunk_z: i32) -> io::Result<Option<Vec<u8>>> {
        let entry = self.locations[Self::location_index(chunk_x, chunk_z)];
        let offset = entry >> 8;
        if offset == 0 {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(offset as u64 * SECTOR_BYTES))?;
        let length = self.file.read_u32::<BigEndian>()?;
        let sectors = entry & 0xFF;
        if length as u64 + 4 > sectors as u64 * SECTOR_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Chunk ({}, {}) claims {} bytes in {} sectors",
                    chunk_x, chunk_z, length, sectors
                ),
            ));
        }
        let mut data = vec![0u8; length as usize];
        self.file.read_exact(&mut data)?;
        Ok(Some(data))
    }

    /// Writes one chunk's payload, reusing its old sector run when the new
    /// payload still fits, otherwise appending fresh sectors at the end.
    pub fn write_chunk(&mut self, chunk_x: i32, chunk_z: i32, data: &[u8]) -> io::Result<()> {
        let index = Self::location_index(chunk_x, chunk_z);
        let needed = required_sectors(data.len() as u32 + 4);
        if needed > 0xFF {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Chunk payload of {} bytes exceeds the region format", data.len()),
            ));
        }

        let old_entry = self.locations[index];
        let old_offset = old_entry >> 8;
        let old_sectors = old_entry & 0xFF;

        let offset = if old_offset != 0 && needed <= old_sectors {
            old_offset
        } else {
            let offset = self.sector_end;
            self.sector_end += needed;
            offset
        };

        self.file.seek(SeekFrom::Start(offset as u64 * SECTOR_BYTES))?;
        self.file.write_u32::<BigEndian>(data.len() as u32)?;
        self.file.write_all(data)?;

        // Pad the final sector so the file stays sector-aligned.
        let written = data.len() as u64 + 4;
        let padding = (SECTOR_BYTES - (written % SECTOR_BYTES)) % SECTOR_BYTES;
        if padding > 0 {
            self.file.write_all(&vec![0u8; padding as usize])?;
        }

        let new_entry = (offset << 8) | needed.min(0xFF);
        if new_entry != old_entry {
            self.locations[index] = new_entry;
            self.file.seek(SeekFrom::Start(index as u64 * 4))?;
            self.file.write_u32::<BigEndian>(new_entry)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
