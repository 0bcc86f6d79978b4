pub mod buffer;
pub mod cache;
pub mod cache_entry;
pub mod chunk;
pub mod config;
pub mod error;
pub mod flags;
pub mod logger;
pub mod packed_array;
pub mod packet;
pub mod palette;
pub mod pipeline;
pub mod processor;
pub mod region;
pub mod region_pool;
pub mod sampler;
pub mod section;
pub mod serializer;
pub mod simple_cache;
pub mod types;

// Re-export the embedding surface
pub use cache::ObfuscationCache;
pub use config::{BlockRegistry, OreveilConfig};
pub use error::OreveilError;
pub use logger::{log, LogSeverity};
pub use packet::{ChunkPacket, ChunkPacketAccessor};
pub use pipeline::{NeighborFetcher, ObfuscationPipeline};
pub use processor::{ObfuscationProcessor, ObfuscationResponse};
pub use types::{BlockPos, ChunkCacheKey, Result, WorldHeight};
