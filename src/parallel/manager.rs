// Manager / collector implementation.
//
// The manager computes the partition, wires one worker per slot onto the
// shared result channel, and runs the collection loop on the calling
// thread: pop results, write records in arrival order, watch worker
// health, escalate the first worker error into a cooperative abort, and
// drain the channel before returning so no computed result is lost.

use std::io::{Read, Seek, Write};
use std::sync::Arc;
use std::time::Duration;

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{BlockHashError, Result};
use crate::parallel::result_queue::ResultQueue;
use crate::parallel::worker::Worker;
use crate::parallel::BlockResult;
use crate::partition::Partition;

/// Shared factory for per-worker read handles. Each worker gets its own
/// independently-opened source; workers never share a read cursor.
pub type SourceOpener<S> = Arc<dyn Fn() -> std::io::Result<S> + Send + Sync>;

/// Collection-loop poll bound: how long one iteration waits on an empty
/// channel before re-checking worker health.
const POLL_WAIT: Duration = Duration::from_millis(50);

/// Orchestrates one hashing run end-to-end.
///
/// Records are written in **arrival order**, not block order; each record
/// is self-describing (8-byte little-endian block index followed by the
/// raw digest bytes), so consumers needing block order must sort by the
/// embedded index.
pub struct Manager<S: Read + Seek + Send + 'static, W: Write> {
    config: Arc<Config>,
    partition: Partition,
    queue: Arc<ResultQueue<BlockResult>>,
    workers: Vec<Worker<S>>,
    sink: W,
}

impl<S: Read + Seek + Send + 'static, W: Write> Manager<S, W> {
    /// Build a manager: compute the partition, open one read source per
    /// worker slot and wire each worker to its own producer handle.
    pub fn new(config: Arc<Config>, opener: SourceOpener<S>, sink: W) -> Result<Self> {
        let partition = Partition::compute(config.input_size, config.block_size, config.threads);
        info!(
            "final configuration: {} blocks={} workers={} stride={}",
            config,
            partition.block_count(),
            partition.worker_count(),
            partition.stride(),
        );

        let queue = Arc::new(ResultQueue::new());
        let mut workers = Vec::with_capacity(partition.worker_count());
        for slot in 0..partition.worker_count() {
            let source = opener()?;
            let hasher = config.algorithm.new_hasher();
            let producer = queue.new_producer();
            workers.push(Worker::new(
                slot,
                source,
                hasher,
                producer,
                Arc::clone(&config),
                partition,
            ));
        }

        Ok(Self {
            config,
            partition,
            queue,
            workers,
            sink,
        })
    }

    /// The partition this manager was built for.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The configuration this manager runs under.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawn all workers.
    ///
    /// If any spawn fails, every already-started worker is stopped and
    /// reaped before the start failure is reported; the run never proceeds
    /// with a partial pool.
    pub fn start(&mut self) -> Result<()> {
        for slot in 0..self.workers.len() {
            if let Err(e) = self.workers[slot].run_async() {
                error!("failed to start worker {}: {}", slot, e);
                self.stop_all();
                for worker in &mut self.workers {
                    if let Err(join_err) = worker.join() {
                        warn!("worker {} failed to join: {}", worker.id(), join_err);
                    }
                }
                return Err(BlockHashError::StartFailure(e.to_string()));
            }
            debug!("worker {} started", slot);
        }
        Ok(())
    }

    /// Run the collection loop until every worker has stopped, then drain
    /// the channel and flush the sink.
    ///
    /// Returns `Ok(())` for a clean run, or the first captured worker
    /// error; later worker errors are logged but do not change the
    /// outcome. A sink write failure is immediately fatal.
    pub fn run(&mut self) -> Result<()> {
        if self.partition.is_empty() {
            info!("input partitions into zero blocks; writing empty output");
            self.sink.flush()?;
            return Ok(());
        }

        let mut first_error: Option<BlockHashError> = None;
        let mut aborting = false;

        loop {
            if let Some(result) = self.queue.pop_timeout(POLL_WAIT) {
                self.write_record(&result)?;
            }

            let finished = self.workers.iter().all(|worker| !worker.is_running());

            if !aborting {
                if let Some((slot, cause)) = self.poll_worker_errors() {
                    error!(
                        "worker {} failed: {}; stopping remaining workers",
                        slot, cause
                    );
                    first_error = Some(BlockHashError::WorkerFailed {
                        worker_id: slot,
                        source: Box::new(cause),
                    });
                    aborting = true;
                    self.stop_all();
                    // Keep looping: in-flight blocks must finish or fail
                    // on their own before the drain below is safe.
                }
            }

            if finished {
                break;
            }
        }

        // Every worker thread has stopped; reap them and pick up any error
        // stored after the last in-loop poll.
        for worker in &mut self.workers {
            if let Err(e) = worker.join() {
                warn!("worker {} panicked: {}", worker.id(), e);
                first_error.get_or_insert(e);
            }
        }
        while let Some((slot, cause)) = self.poll_worker_errors() {
            if first_error.is_some() {
                warn!("worker {} also failed: {}", slot, cause);
            } else {
                first_error = Some(BlockHashError::WorkerFailed {
                    worker_id: slot,
                    source: Box::new(cause),
                });
            }
        }

        self.drain()?;
        self.sink.flush()?;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Write every result still sitting in the channel. Only called once
    /// all producers are gone, so pops never block here.
    fn drain(&mut self) -> Result<()> {
        let mut drained = 0usize;
        while let Some(result) = self.queue.pop_timeout(Duration::ZERO) {
            self.write_record(&result)?;
            drained += 1;
        }
        if drained > 0 {
            debug!("drained {} remaining results", drained);
        }
        Ok(())
    }

    /// First stored worker error wins; returns the slot it came from.
    fn poll_worker_errors(&self) -> Option<(usize, BlockHashError)> {
        for worker in &self.workers {
            if let Some(e) = worker.take_error() {
                return Some((worker.id(), e));
            }
        }
        None
    }

    fn stop_all(&self) {
        for worker in &self.workers {
            worker.set_stop();
        }
    }

    /// Write one record with a single sink write: the 8-byte little-endian
    /// block index immediately followed by the raw digest bytes.
    fn write_record(&mut self, result: &BlockResult) -> Result<()> {
        let mut record = Vec::with_capacity(8 + result.digest.len());
        record.write_u64::<LittleEndian>(result.block_index)?;
        record.extend_from_slice(&result.digest);
        self.sink.write_all(&record)?;
        trace!(
            "wrote record for block {} ({} digest bytes)",
            result.block_index,
            result.digest.len()
        );
        Ok(())
    }
}

impl<S: Read + Seek + Send + 'static, W: Write> Drop for Manager<S, W> {
    fn drop(&mut self) {
        // Torn down while workers might still run (early return, panic
        // unwind): force a stop and wait for every thread before the sink
        // is released, so no worker is left mid-push into a dead channel.
        self.stop_all();
        self.queue.close();
        for worker in &mut self.workers {
            if let Err(e) = worker.join() {
                warn!("worker {} failed to join during teardown: {}", worker.id(), e);
            }
        }
    }
}
