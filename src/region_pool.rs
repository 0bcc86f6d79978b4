use crate::logger::{log, LogSeverity};
use crate::region::RegionFile;
use crate::types::{ChunkCacheKey, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

struct PoolEntry {
    handle: Arc<Mutex<RegionFile>>,
    /// Milliseconds since pool creation, for LRU eviction.
    last_access: AtomicU64,
}

/// Bounded pool of open region file handles. Lookup takes the shared lock;
/// insertion upgrades to the exclusive lock with insert-if-absent, so of two
/// racing creations only the first inserted handle survives. The pool
/// self-limits by closing the least recently used handle before an insert
/// would exceed `max_open`.
pub struct RegionFilePool {
    handles: RwLock<HashMap<PathBuf, PoolEntry>>,
    max_open: usize,
    created: Instant,
}

impl RegionFilePool {
    pub fn new(max_open: usize) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            max_open: max_open.max(1),
            created: Instant::now(),
        }
    }

    /// Filesystem path of the region containing `key`:
    /// `<base>/<world>/r.<x >> 5>.<z >> 5>.mca`.
    pub fn path_for(base: &Path, key: &ChunkCacheKey) -> PathBuf {
        base.join(&key.world)
            .join(format!("r.{}.{}.mca", key.region_x(), key.region_z()))
    }

    fn touch(&self, entry: &PoolEntry) {
        entry
            .last_access
            .store(self.created.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    /// Returns the open handle for `path`, creating parent directories and
    /// the handle on first access.
    pub fn get(&self, path: &Path) -> Result<Arc<Mutex<RegionFile>>> {
        {
            let handles = self.handles.read().expect("region pool lock poisoned");
            if let Some(entry) = handles.get(path) {
                self.touch(entry);
                return Ok(entry.handle.clone());
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let fresh = Arc::new(Mutex::new(RegionFile::open(path)?));

        let mut handles = self.handles.write().expect("region pool lock poisoned");
        if let Some(entry) = handles.get(path) {
            // A racing thread inserted first; our handle is discarded.
            self.touch(entry);
            return Ok(entry.handle.clone());
        }

        if handles.len() >= self.max_open {
            self.evict_lru(&mut handles);
        }
        if handles.len() >= self.max_open {
            // The LRU eviction above must always make room; running past the
            // configured bound is a programming or configuration error.
            panic!(
                "Region file pool exceeded its configured maximum of {} open handles",
                self.max_open
            );
        }

        let entry = PoolEntry {
            handle: fresh.clone(),
            last_access: AtomicU64::new(self.created.elapsed().as_millis() as u64),
        };
        handles.insert(path.to_path_buf(), entry);
        Ok(fresh)
    }

    fn evict_lru(&self, handles: &mut HashMap<PathBuf, PoolEntry>) {
        let lru = handles
            .iter()
            .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
            .map(|(path, _)| path.clone());
        if let Some(path) = lru {
            if let Some(entry) = handles.remove(&path) {
                Self::close_handle(&path, entry);
            }
        }
    }

    fn close_handle(path: &Path, entry: PoolEntry) {
        if let Ok(mut region) = entry.handle.lock() {
            if let Err(err) = region.flush() {
                log(
                    format!("Failed to flush region file {}: {}", path.display(), err),
                    LogSeverity::Warning,
                );
            }
        }
    }

    /// Closes one handle. Close failures are logged, never propagated.
    pub fn close(&self, path: &Path) {
        let mut handles = self.handles.write().expect("region pool lock poisoned");
        if let Some(entry) = handles.remove(path) {
            Self::close_handle(path, entry);
        }
    }

    /// Closes every handle.
    pub fn clear(&self) {
        let mut handles = self.handles.write().expect("region pool lock poisoned");
        for (path, entry) in handles.drain() {
            Self::close_handle(&path, entry);
        }
    }

    pub fn open_count(&self) -> usize {
        self.handles.read().expect("region pool lock poisoned").len()
    }
}
