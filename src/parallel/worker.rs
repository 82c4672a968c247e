// Block worker implementation.
//
// Each worker owns an independently-opened read source (workers never
// share a read cursor), a reusable hasher and a producer handle on the
// shared result channel. It processes the block sequence assigned by the
// partition (start at block `id`, advance by the stride) on its own OS
// thread until the sequence ends, a stop is requested, or an error occurs.

use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, trace};

use crate::config::Config;
use crate::error::{BlockHashError, Result};
use crate::hasher::BlockHasher;
use crate::parallel::result_queue::ResultProducer;
use crate::parallel::BlockResult;
use crate::partition::Partition;

/// State shared between a worker thread and the manager's polls.
struct WorkerShared {
    /// `true` from just before spawn until the worker thread exits.
    running: AtomicBool,

    /// Cooperative stop request, checked at block boundaries only.
    stop: AtomicBool,

    /// Deferred error, stored by the worker thread and taken by the
    /// manager. Errors never unwind across the thread boundary.
    error: Mutex<Option<BlockHashError>>,
}

/// A block-hashing worker bound to one slot of the partition.
pub struct Worker<S: Read + Seek + Send + 'static> {
    id: usize,
    shared: Arc<WorkerShared>,
    inner: Option<WorkerInner<S>>,
    handle: Option<JoinHandle<()>>,
}

/// The parts that move onto the worker thread.
struct WorkerInner<S> {
    id: usize,
    source: S,
    hasher: Box<dyn BlockHasher>,
    producer: ResultProducer<BlockResult>,
    config: Arc<Config>,
    partition: Partition,
    read_buffer: Vec<u8>,
    shared: Arc<WorkerShared>,
}

impl<S: Read + Seek + Send + 'static> Worker<S> {
    /// Create a worker for partition slot `id`.
    ///
    /// `source` must be a freshly-opened read handle positioned at the
    /// start of the input; the worker seeks it to its own first block.
    pub fn new(
        id: usize,
        source: S,
        hasher: Box<dyn BlockHasher>,
        producer: ResultProducer<BlockResult>,
        config: Arc<Config>,
        partition: Partition,
    ) -> Self {
        let buffer_size = config.read_buffer_size.min(config.block_size as usize).max(1);
        let shared = Arc::new(WorkerShared {
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            error: Mutex::new(None),
        });
        Self {
            id,
            shared: Arc::clone(&shared),
            inner: Some(WorkerInner {
                id,
                source,
                hasher,
                producer,
                config,
                partition,
                read_buffer: vec![0u8; buffer_size],
                shared,
            }),
            handle: None,
        }
    }

    /// Partition slot served by this worker.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Spawn the worker thread.
    ///
    /// Returns the result of the spawn itself, not of the run; failures
    /// during the run are deferred to [`Worker::take_error`]. A worker
    /// must not be started twice.
    pub fn run_async(&mut self) -> Result<()> {
        let inner = self.inner.take().ok_or(BlockHashError::AlreadyStarted)?;
        let shared = Arc::clone(&self.shared);

        // Mark running before the spawn so a successful return guarantees
        // `is_running()` until the thread actually exits.
        shared.running.store(true, Ordering::Release);

        let spawned = thread::Builder::new()
            .name(format!("blockhash-worker-{}", self.id))
            .spawn(move || {
                let id = inner.id;
                debug!("worker {} starting", id);
                if let Err(e) = inner.run() {
                    let mut slot = shared
                        .error
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    *slot = Some(e);
                }
                shared.running.store(false, Ordering::Release);
                debug!("worker {} exiting", id);
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Cheap, thread-safe liveness poll.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Request a cooperative stop. Observed at the next block boundary; a
    /// block in flight always finishes or fails on its own.
    pub fn set_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// `true` if the worker has stored a deferred error.
    pub fn has_error(&self) -> bool {
        self.shared
            .error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Take the deferred error, if any.
    pub fn take_error(&self) -> Option<BlockHashError> {
        self.shared
            .error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Reap the worker thread. Idempotent; blocks until the thread exits.
    pub fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| BlockHashError::WorkerPanicked)?;
        }
        Ok(())
    }
}

impl<S: Read + Seek + Send> WorkerInner<S> {
    /// Per-block loop: read, hash, emit, skip to the next assigned block.
    fn run(mut self) -> Result<()> {
        let block_size = self.config.block_size;
        let Some(last_block) = self.partition.last_block_index() else {
            return Ok(());
        };
        let stride = self.partition.stride();
        let mut block = self.partition.start_block(self.id);

        // Skip forward to the first assigned block.
        self.skip_forward(block * block_size)?;

        while block <= last_block {
            if self.shared.stop.load(Ordering::Acquire) {
                debug!("worker {}: stop requested before block {}", self.id, block);
                break;
            }

            trace!("worker {}: hashing block {}", self.id, block);
            self.hasher.init();
            self.read_block(block_size)?;
            let digest = self.hasher.finish();

            self.producer.push(BlockResult {
                block_index: block,
                digest,
            })?;

            // One block width was consumed by the reads above; skip the
            // remainder of the stride to reach the next assigned block.
            self.skip_forward((stride - 1) * block_size)?;
            block += stride;
        }

        Ok(())
    }

    /// Feed exactly `block_size` bytes worth of input into the hasher,
    /// padding with the filler byte once the source reports end-of-file.
    fn read_block(&mut self, block_size: u64) -> Result<()> {
        let mut remaining = block_size;
        while remaining > 0 {
            let want = remaining.min(self.read_buffer.len() as u64) as usize;
            let n = self.source.read(&mut self.read_buffer[..want])?;
            if n == 0 {
                // The file ended before the block boundary: the rest of
                // the block hashes as filler bytes.
                self.hasher
                    .update_repeat(self.config.filler_byte, remaining);
                remaining = 0;
            } else {
                self.hasher.update(&self.read_buffer[..n]);
                remaining -= n as u64;
            }
        }
        Ok(())
    }

    fn skip_forward(&mut self, bytes: u64) -> Result<()> {
        if bytes > 0 {
            let offset = i64::try_from(bytes)
                .map_err(|_| BlockHashError::Other(format!("seek offset {} overflows", bytes)))?;
            self.source.seek(SeekFrom::Current(offset))?;
        }
        Ok(())
    }
}
