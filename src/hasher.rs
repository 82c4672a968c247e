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

//! Per-block hashing capability.
//!
//! A [`BlockHasher`] is a reusable, stateful digest: a worker calls
//! [`BlockHasher::init`] once per block, feeds the block bytes through
//! [`BlockHasher::update`] (and [`BlockHasher::update_repeat`] for filler
//! padding), then takes the digest with [`BlockHasher::finish`]. Instances
//! are reused across blocks, never reallocated per block.

use bytes::Bytes;
use md5::{Digest, Md5};

/// Stateful per-block hasher, reused across blocks.
pub trait BlockHasher: Send {
    /// Reset internal state for a fresh block.
    fn init(&mut self);

    /// Feed bytes into the current block's digest.
    fn update(&mut self, data: &[u8]);

    /// Feed `count` repetitions of `byte` into the current block's digest.
    ///
    /// Used to pad a short final block with the filler byte without
    /// materializing a padding buffer; batches through a fixed scratch
    /// buffer.
    fn update_repeat(&mut self, byte: u8, count: u64) {
        let scratch = [byte; 256];
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(scratch.len() as u64) as usize;
            self.update(&scratch[..n]);
            remaining -= n as u64;
        }
    }

    /// Take the digest of the current block, leaving the hasher ready for
    /// the next [`BlockHasher::init`].
    fn finish(&mut self) -> Bytes;

    /// Digest length in bytes.
    fn digest_size(&self) -> usize;
}

/// MD5 block hasher (16-byte digest).
pub struct Md5Hasher {
    inner: Md5,
}

impl Md5Hasher {
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockHasher for Md5Hasher {
    fn init(&mut self) {
        self.inner.reset();
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finish(&mut self) -> Bytes {
        let digest = self.inner.finalize_reset();
        Bytes::copy_from_slice(&digest)
    }

    fn digest_size(&self) -> usize {
        16
    }
}

/// CRC32 block hasher (4-byte digest).
///
/// The digest is the CRC value in big-endian byte order.
pub struct Crc32Hasher {
    inner: crc32fast::Hasher,
}

impl Crc32Hasher {
    pub fn new() -> Self {
        Self {
            inner: crc32fast::Hasher::new(),
        }
    }
}

impl Default for Crc32Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockHasher for Crc32Hasher {
    fn init(&mut self) {
        self.inner.reset();
    }

    fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn finish(&mut self) -> Bytes {
        let hasher = std::mem::replace(&mut self.inner, crc32fast::Hasher::new());
        Bytes::copy_from_slice(&hasher.finalize().to_be_bytes())
    }

    fn digest_size(&self) -> usize {
        4
    }
}
