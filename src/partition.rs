// Copyright 2024
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Block partitioning.
//!
//! Pure derivation of the block layout from the input size, block size and
//! requested thread count. Worker `k` starts at block `k` and advances by
//! the stride (= worker count) after each block, so the per-worker block
//! sequences tile `0..block_count` exactly once with no gaps or overlaps.

/// Derived block layout for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    block_count: u64,
    worker_count: usize,
    block_size: u64,
}

impl Partition {
    /// Compute the partition.
    ///
    /// One thread is reserved for the collector, so `requested_threads`
    /// yields `requested_threads - 1` workers, with a minimum of one
    /// worker and never more workers than blocks. An empty input produces
    /// zero blocks and zero workers.
    pub fn compute(input_size: u64, block_size: u64, requested_threads: usize) -> Self {
        assert!(block_size > 0, "block size must be > 0");
        assert!(requested_threads > 0, "thread count must be >= 1");

        let block_count = input_size.div_ceil(block_size);
        let worker_count = if block_count == 0 {
            0
        } else {
            requested_threads
                .saturating_sub(1)
                .max(1)
                .min(block_count.min(usize::MAX as u64) as usize)
        };

        Self {
            block_count,
            worker_count,
            block_size,
        }
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Number of workers serving this partition.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// `true` when there is nothing to hash.
    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    /// Blocks a worker skips forward after finishing one block.
    pub fn stride(&self) -> u64 {
        self.worker_count as u64
    }

    /// Bytes a worker skips forward in the input per stride.
    pub fn byte_stride(&self) -> u64 {
        self.stride() * self.block_size
    }

    /// Index of the last valid block, or `None` for an empty partition.
    pub fn last_block_index(&self) -> Option<u64> {
        self.block_count.checked_sub(1)
    }

    /// First block assigned to worker `k`.
    pub fn start_block(&self, worker: usize) -> u64 {
        debug_assert!(worker < self.worker_count);
        worker as u64
    }

    /// The full block sequence assigned to worker `k`, in processing order.
    pub fn blocks_for_worker(&self, worker: usize) -> impl Iterator<Item = u64> + '_ {
        let stride = self.stride();
        let count = self.block_count;
        (self.start_block(worker)..count).step_by(stride.max(1) as usize)
    }
}
