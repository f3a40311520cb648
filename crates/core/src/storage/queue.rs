//! Background save queue
//!
//! Dirty records are pushed from the thread that owns the claim state and
//! written by one worker thread. Callers only wait when the queue is full.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, SendError, Sender, TrySendError};
use parking_lot::Mutex;

use super::{ChunkRecord, ChunkStorage, RankRecord, StorageResult, ZoneRecord};
use crate::claims::OwnerCascade;
use crate::identity::{WorldId, ZoneId};
use crate::position::ChunkPos;

/// Default number of pending jobs before callers wait for the worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A write to forward to storage
#[derive(Debug, Clone)]
pub enum SaveJob {
    Chunk(ChunkRecord),
    RemoveChunk { world: WorldId, position: ChunkPos },
    Zone(ZoneRecord),
    RemoveZone { world: WorldId, zone: ZoneId },
    Rank(RankRecord),
    /// Zone owner change for chunks that were not loaded
    Cascade(OwnerCascade),
}

impl SaveJob {
    pub(crate) fn apply(&self, storage: &dyn ChunkStorage) -> StorageResult<()> {
        match self {
            SaveJob::Chunk(record) => storage.save_chunk(record),
            SaveJob::RemoveChunk { world, position } => storage.remove_chunk(*world, *position),
            SaveJob::Zone(record) => storage.save_zone(record),
            SaveJob::RemoveZone { world, zone } => storage.remove_zone(*world, *zone),
            SaveJob::Rank(record) => storage.save_rank(record),
            SaveJob::Cascade(cascade) => {
                for &position in &cascade.unloaded {
                    let Some(mut record) = storage.load_chunk(cascade.world, position)? else {
                        continue;
                    };
                    if cascade.apply_to(&mut record) {
                        storage.save_chunk(&record)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Bounded channel drained by a single worker thread
pub struct SaveQueue {
    sender: Mutex<Option<Sender<SaveJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SaveQueue {
    /// Spawn the worker thread
    pub fn start(storage: Arc<dyn ChunkStorage>, capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<SaveJob>(capacity.max(1));

        let worker = std::thread::Builder::new()
            .name("mychunks-save".to_string())
            .spawn(move || {
                // Ends once every sender is dropped and the channel is drained
                for job in receiver {
                    if let Err(e) = job.apply(storage.as_ref()) {
                        tracing::error!("Failed to save {:?}: {}", job, e);
                    }
                }
                tracing::debug!("Save worker stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a write.
    ///
    /// Blocks while the queue is full, so a burst of saves is never dropped.
    /// Hands the job back once the queue has been shut down.
    pub fn enqueue(&self, job: SaveJob) -> Result<(), SaveJob> {
        // Cloned so a blocked send does not hold up `shutdown`
        let Some(sender) = self.sender.lock().clone() else {
            return Err(job);
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::debug!("Save queue full, waiting for the worker");
                sender.send(job).map_err(|SendError(job)| job)
            }
            Err(TrySendError::Disconnected(job)) => {
                tracing::error!("Save queue disconnected");
                Err(job)
            }
        }
    }

    /// Number of jobs waiting for the worker
    pub fn pending(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, Sender::len)
    }

    /// Stop accepting jobs and wait for the worker to flush the backlog
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("Save worker panicked");
            }
        }
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
