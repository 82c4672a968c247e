//! Parallel block-hashing machinery.
//!
//! This module contains the concurrent core: the lock-free result channel
//! that moves completed digests from worker threads to the collector, the
//! workers themselves, and the manager that orchestrates a run end-to-end.

pub mod manager;
pub mod result_queue;
pub mod worker;

#[cfg(test)]
mod tests;

use bytes::Bytes;

/// A completed block digest, produced exactly once per block by exactly
/// one worker and consumed by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    /// Zero-based block index.
    pub block_index: u64,

    /// Digest over the block bytes (filler-padded past end-of-file).
    pub digest: Bytes,
}
