use crate::logger::{log, LogSeverity};
use crate::processor::ObfuscationResponse;
use crate::types::{pack_local_pos, unpack_local_pos, ChunkCacheKey, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::io::{Read, Write};

/// One cache lookup: the chunk identity plus the 16-byte content hash
/// computed over the system hash and the raw packet bytes. The world's
/// bottom height rides along so positions can be packed chunk-locally.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub key: ChunkCacheKey,
    pub hash: [u8; 16],
    pub min_y: i32,
}

/// A processed chunk as stored in the cache tiers: one gzip blob whose first
/// 16 decompressed bytes are always the content hash that produced it.
///
/// Decompressed layout:
/// `hash[16] | i32 dataLen | data | i32 n | n x u32 proximity | i32 m |
/// m x u32 blockEntity`, positions packed per [`pack_local_pos`].
#[derive(Debug, Clone)]
pub struct CacheChunkEntry {
    key: ChunkCacheKey,
    blob: Vec<u8>,
}

impl CacheChunkEntry {
    /// Compresses a freshly processed response against the request's hash.
    pub fn create(request: &CacheRequest, response: &ObfuscationResponse) -> Result<Self> {
        let mut raw = Vec::with_capacity(response.data.len() + 64);
        raw.write_all(&request.hash)?;
        raw.write_i32::<BigEndian>(response.data.len() as i32)?;
        raw.write_all(&response.data)?;
        raw.write_i32::<BigEndian>(response.proximity.len() as i32)?;
        for pos in &response.proximity {
            raw.write_u32::<BigEndian>(pack_local_pos(*pos, request.min_y))?;
        }
        raw.write_i32::<BigEndian>(response.block_entities.len() as i32)?;
        for pos in &response.block_entities {
            raw.write_u32::<BigEndian>(pack_local_pos(*pos, request.min_y))?;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let blob = encoder.finish()?;

        Ok(Self {
            key: request.key.clone(),
            blob,
        })
    }

    /// Rewraps a blob loaded from the disk tier.
    pub fn from_blob(key: ChunkCacheKey, blob: Vec<u8>) -> Self {
        Self { key, blob }
    }

    pub fn key(&self) -> &ChunkCacheKey {
        &self.key
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Compares the stored hash prefix against the request's hash without
    /// decompressing the payload: the decompression stream is opened, exactly
    /// 16 bytes are read and compared, done.
    pub fn is_valid(&self, request: &CacheRequest) -> bool {
        let mut decoder = GzDecoder::new(self.blob.as_slice());
        let mut stored = [0u8; 16];
        match decoder.read_exact(&mut stored) {
            Ok(()) => stored == request.hash,
            Err(_) => false,
        }
    }

    /// Full decompression back into a response. Any failure (corrupt stream,
    /// length mismatch) is logged and reported as absent; the caller treats
    /// that identically to a cache miss and recomputes.
    pub fn to_result(&self, min_y: i32) -> Option<ObfuscationResponse> {
        match self.decode(min_y) {
            Ok(response) => Some(response),
            Err(err) => {
                log(
                    format!(
                        "Discarding corrupt cache entry for chunk ({}, {}) in {}: {}",
                        self.key.x, self.key.z, self.key.world, err
                    ),
                    LogSeverity::Warning,
                );
                None
            }
        }
    }

    fn decode(&self, min_y: i32) -> std::io::Result<ObfuscationResponse> {
        let mut decoder = GzDecoder::new(self.blob.as_slice());

        let mut hash = [0u8; 16];
        decoder.read_exact(&mut hash)?;

        let data_len = decoder.read_i32::<BigEndian>()?;
        if data_len < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Negative data length",
            ));
        }
        let mut data = vec![0u8; data_len as usize];
        decoder.read_exact(&mut data)?;

        let proximity_count = decoder.read_i32::<BigEndian>()?;
        let mut proximity = Vec::with_capacity(proximity_count.max(0) as usize);
        for _ in 0..proximity_count {
            let packed = decoder.read_u32::<BigEndian>()?;
            proximity.push(unpack_local_pos(packed, self.key.x, self.key.z, min_y));
        }

        let block_entity_count = decoder.read_i32::<BigEndian>()?;
        let mut block_entities = HashSet::with_capacity(block_entity_count.max(0) as usize);
        for _ in 0..block_entity_count {
            let packed = decoder.read_u32::<BigEndian>()?;
            block_entities.insert(unpack_local_pos(packed, self.key.x, self.key.z, min_y));
        }

        Ok(ObfuscationResponse {
            data,
            block_entities,
            proximity,
        })
    }
}
