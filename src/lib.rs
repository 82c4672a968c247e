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

//! Blockhash splits a large input file into fixed-size blocks, hashes each
//! block (MD5 or CRC32) in parallel across a worker pool, and streams
//! `(block_index, digest)` records to an output sink.
//!
//! Workers own independent read handles and interleave by stride: worker
//! `k` of `n` hashes blocks `k, k+n, k+2n, ...`. Completed digests flow
//! through a lock-free multi-producer/single-consumer channel to the
//! manager, which writes records in arrival order; each record carries its
//! block index, so output order is not block order.

pub mod config;
pub mod error;
pub mod hasher;
pub mod parallel;
pub mod partition;

pub use config::{Config, HashAlgorithm};
pub use error::{BlockHashError, Result};
pub use parallel::manager::Manager;
pub use parallel::BlockResult;
pub use partition::Partition;
