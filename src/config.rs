use crate::flags::BlockFlagTable;
use crate::sampler::{LayeredSampler, SamplerLayer, WeightedRandom};
use crate::types::{Result, WorldHeight};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// The active configuration. Serialized in full into [`system_hash`], so any
/// edit invalidates every previously cached chunk.
///
/// [`system_hash`]: OreveilConfig::system_hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OreveilConfig {
    /// Running server/mod version; mixed into the system hash so an upgrade
    /// invalidates the cache the same way a config edit does.
    pub version: String,
    pub cache: CacheConfig,
    pub obfuscation: ObfuscationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub memory_max_chunks: usize,
    pub memory_expire_ms: u64,
    pub disk_enabled: bool,
    pub disk_directory: PathBuf,
    pub max_open_region_files: usize,
    pub max_pending_disk_tasks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_chunks: 4096,
            memory_expire_ms: 60_000,
            disk_enabled: true,
            disk_directory: PathBuf::from("cache"),
            max_open_region_files: 256,
            max_pending_disk_tasks: 64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObfuscationConfig {
    /// Block states hidden whenever fully enclosed.
    pub hidden: Vec<HiddenBlock>,
    /// Block states reported for distance-based hiding.
    pub proximity: Vec<ProximityBlock>,
    /// Substitutes for hidden blocks, by height layer.
    pub replacements: Vec<ReplacementLayer>,
    /// Substitutes for proximity blocks without use-block-below.
    pub proximity_replacements: Vec<ReplacementLayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenBlock {
    pub id: u32,
    #[serde(default)]
    pub block_entity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityBlock {
    pub id: u32,
    pub min_y: i32,
    pub max_y: i32,
    #[serde(default)]
    pub use_block_below: bool,
    #[serde(default)]
    pub block_entity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementLayer {
    pub min_y: i32,
    pub max_y: i32,
    pub weights: Vec<WeightedBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedBlock {
    pub id: u32,
    pub weight: f64,
}

/// Registry facts the flag table needs, handed in pre-built by the
/// per-version host shims: the dense id space size and which states occlude
/// or may serve as use-block-below substitutes.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    pub total_states: usize,
    pub occluding: Vec<u32>,
    pub allow_for_use_block_below: Vec<u32>,
}

impl OreveilConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            cache: CacheConfig::default(),
            obfuscation: ObfuscationConfig::default(),
        }
    }

    /// 16-byte hash over the running version and the fully-serialized
    /// configuration. Used as the namespace for every content hash, so no
    /// stored hash prefix survives a version or config change.
    pub fn system_hash(&self) -> Result<[u8; 16]> {
        let mut serialized = serde_json::to_vec(self)
            .map_err(|err| crate::error::OreveilError::ConfigError(err.to_string()))?;
        serialized.extend_from_slice(self.version.as_bytes());
        Ok(*Uuid::new_v3(&Uuid::NAMESPACE_OID, &serialized).as_bytes())
    }

    /// Builds the dense flag table for one world's height range.
    pub fn build_flag_table(&self, registry: &BlockRegistry, height: WorldHeight) -> BlockFlagTable {
        let mut builder = BlockFlagTable::builder(registry.total_states);
        for &id in &registry.occluding {
            builder.occluding(id);
        }
        for &id in &registry.allow_for_use_block_below {
            builder.allow_for_use_block_below(id);
        }
        for hidden in &self.obfuscation.hidden {
            builder.obfuscate(hidden.id);
            if hidden.block_entity {
                builder.block_entity(hidden.id);
            }
        }
        for proximity in &self.obfuscation.proximity {
            builder.proximity(
                proximity.id,
                height,
                proximity.min_y,
                proximity.max_y,
                proximity.use_block_below,
            );
            if proximity.block_entity {
                builder.block_entity(proximity.id);
            }
        }
        builder.build()
    }

    /// Sampler for hidden-block substitution, one weighted table per layer.
    pub fn hidden_sampler(&self) -> Result<LayeredSampler> {
        Self::build_sampler(&self.obfuscation.replacements)
    }

    pub fn proximity_sampler(&self) -> Result<LayeredSampler> {
        Self::build_sampler(&self.obfuscation.proximity_replacements)
    }

    fn build_sampler(layers: &[ReplacementLayer]) -> Result<LayeredSampler> {
        let mut built = Vec::with_capacity(layers.len());
        for layer in layers {
            let mut builder = WeightedRandom::builder();
            for weighted in &layer.weights {
                builder.add(weighted.id, weighted.weight)?;
            }
            built.push(SamplerLayer {
                min_y: layer.min_y,
                max_y: layer.max_y,
                random: builder.build()?,
            });
        }
        Ok(LayeredSampler::new(built))
    }
}
