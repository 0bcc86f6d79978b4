use crate::cache_entry::CacheChunkEntry;
use crate::logger::{log, LogSeverity};
use crate::region_pool::RegionFilePool;
use crate::types::ChunkCacheKey;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

enum DiskTask {
    /// Pending disk read with every waiter sharing the same result.
    Read(Vec<oneshot::Sender<Option<CacheChunkEntry>>>),
    /// Pending write-back carrying the payload to persist.
    Write(CacheChunkEntry),
}

struct SerializerState {
    tasks: HashMap<ChunkCacheKey, DiskTask>,
    queue: VecDeque<ChunkCacheKey>,
    closed: bool,
}

struct SerializerShared {
    state: Mutex<SerializerState>,
    task_added: Condvar,
    space_freed: Condvar,
    max_tasks: usize,
    pool: Arc<RegionFilePool>,
    base_dir: PathBuf,
}

/// Single background worker draining a bounded, per-key-coalesced queue of
/// region-file reads and writes.
///
/// Per key at most one task is pending: a write supersedes a pending read
/// for the same key and fulfils it in memory without touching disk. Under
/// back-pressure a write blocks its producer (throttling eviction-driven
/// write-back to disk throughput) while a read completes immediately with
/// absent, because recomputing is cheaper than waiting on I/O backlog.
pub struct AsyncChunkSerializer {
    shared: Arc<SerializerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncChunkSerializer {
    pub fn new(pool: Arc<RegionFilePool>, base_dir: PathBuf, max_tasks: usize) -> Self {
        Self::new_inner(pool, base_dir, max_tasks, true)
    }

    /// Worker not started; tasks stay queued. Lets tests drive the
    /// coalescing and back-pressure rules deterministically.
    #[cfg(test)]
    pub(crate) fn paused(pool: Arc<RegionFilePool>, base_dir: PathBuf, max_tasks: usize) -> Self {
        Self::new_inner(pool, base_dir, max_tasks, false)
    }

    fn new_inner(
        pool: Arc<RegionFilePool>,
        base_dir: PathBuf,
        max_tasks: usize,
        spawn: bool,
    ) -> Self {
        let shared = Arc::new(SerializerShared {
            state: Mutex::new(SerializerState {
                tasks: HashMap::new(),
                queue: VecDeque::new(),
                closed: false,
            }),
            task_added: Condvar::new(),
            space_freed: Condvar::new(),
            max_tasks: max_tasks.max(1),
            pool,
            base_dir,
        });

        let worker = if spawn {
            let worker_shared = shared.clone();
            Some(std::thread::spawn(move || worker_loop(worker_shared)))
        } else {
            None
        };

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Queues a write-back. Upserts the pending task for the key: a pending
    /// read is fulfilled from this payload and superseded; a pending write
    /// is replaced. Blocks the caller while the queue is at capacity.
    pub fn write(&self, entry: CacheChunkEntry) {
        let key = entry.key().clone();
        let mut state = self.shared.state.lock().expect("serializer lock poisoned");
        loop {
            if state.closed {
                return;
            }
            if let Some(task) = state.tasks.get_mut(&key) {
                match task {
                    DiskTask::Read(waiters) => {
                        for waiter in waiters.drain(..) {
                            let _ = waiter.send(Some(entry.clone()));
                        }
                        *task = DiskTask::Write(entry);
                    }
                    DiskTask::Write(pending) => {
                        *pending = entry;
                    }
                }
                self.shared.task_added.notify_one();
                return;
            }
            if state.queue.len() >= self.shared.max_tasks {
                state = self
                    .shared
                    .space_freed
                    .wait(state)
                    .expect("serializer lock poisoned");
                continue;
            }
            state.tasks.insert(key.clone(), DiskTask::Write(entry));
            state.queue.push_back(key);
            self.shared.task_added.notify_one();
            return;
        }
    }

    /// Queues a read. Fulfilled immediately from a pending write for the
    /// same key; shares the result slot of a pending read; completes with
    /// absent instead of queueing when the queue is at capacity or the
    /// serializer is shutting down.
    pub fn read(&self, key: ChunkCacheKey) -> oneshot::Receiver<Option<CacheChunkEntry>> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.shared.state.lock().expect("serializer lock poisoned");

        if state.closed {
            let _ = tx.send(None);
            return rx;
        }
        if let Some(task) = state.tasks.get_mut(&key) {
            match task {
                DiskTask::Write(pending) => {
                    let _ = tx.send(Some(pending.clone()));
                }
                DiskTask::Read(waiters) => {
                    waiters.push(tx);
                }
            }
            return rx;
        }
        if state.queue.len() >= self.shared.max_tasks {
            let _ = tx.send(None);
            return rx;
        }
        state.tasks.insert(key.clone(), DiskTask::Read(vec![tx]));
        state.queue.push_back(key);
        self.shared.task_added.notify_one();
        rx
    }

    /// Stops accepting reads, drains and executes all queued writes, then
    /// joins the worker. Queued reads are discarded with absent.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("serializer lock poisoned");
            state.closed = true;
        }
        self.shared.task_added.notify_all();
        self.shared.space_freed.notify_all();

        let handle = self
            .worker
            .lock()
            .expect("serializer worker lock poisoned")
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log("Disk serializer worker panicked".to_owned(), LogSeverity::Error);
            }
        }
    }
}

impl Drop for AsyncChunkSerializer {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(shared: Arc<SerializerShared>) {
    loop {
        let (key, task, closed) = {
            let mut state = shared.state.lock().expect("serializer lock poisoned");
            loop {
                if let Some(key) = state.queue.pop_front() {
                    let task = match state.tasks.remove(&key) {
                        Some(task) => task,
                        None => continue,
                    };
                    break (key, task, state.closed);
                }
                if state.closed {
                    return;
                }
                state = shared
                    .task_added
                    .wait(state)
                    .expect("serializer lock poisoned");
            }
        };
        shared.space_freed.notify_all();

        match task {
            DiskTask::Write(entry) => execute_write(&shared, &key, entry),
            DiskTask::Read(waiters) => {
                // Reads still queued at shutdown are discarded.
                let result = if closed { None } else { execute_read(&shared, &key) };
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            }
        }
    }
}

fn execute_write(shared: &SerializerShared, key: &ChunkCacheKey, entry: CacheChunkEntry) {
    let path = RegionFilePool::path_for(&shared.base_dir, key);
    let result = shared.pool.get(&path).and_then(|handle| {
        let mut region = handle.lock().expect("region handle lock poisoned");
        region.write_chunk(key.x, key.z, entry.blob())?;
        Ok(())
    });
    if let Err(err) = result {
        // A failed write-back is dropped; the entry can always be recomputed.
        log(
            format!(
                "Failed to persist chunk ({}, {}) in {}: {}",
                key.x, key.z, key.world, err
            ),
            LogSeverity::Warning,
        );
    }
}

fn execute_read(shared: &SerializerShared, key: &ChunkCacheKey) -> Option<CacheChunkEntry> {
    let path = RegionFilePool::path_for(&shared.base_dir, key);
    if !path.exists() {
        return None;
    }
    let result = shared.pool.get(&path).and_then(|handle| {
        let mut region = handle.lock().expect("region handle lock poisoned");
        Ok(region.read_chunk(key.x, key.z)?)
    });
    match result {
        Ok(Some(blob)) => Some(CacheChunkEntry::from_blob(key.clone(), blob)),
        Ok(None) => None,
        Err(err) => {
            log(
                format!(
                    "Failed to read cached chunk ({}, {}) in {}: {}",
                    key.x, key.z, key.world, err
                ),
                LogSeverity::Warning,
            );
            None
        }
    }
}
