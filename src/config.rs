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

//! Run configuration.
//!
//! A [`Config`] is built once in the entry point, validated, and then
//! shared read-only (via `Arc`) with the manager and every worker. Derived
//! partition figures live in [`crate::partition::Partition`], not here.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;

use crate::error::{BlockHashError, Result};
use crate::hasher::{BlockHasher, Crc32Hasher, Md5Hasher};

/// Default values carried over from the reference implementation.
pub mod defaults {
    /// Default block size in KiB.
    pub const BLOCK_SIZE_KB: u64 = 1024;

    /// Default read buffer size in bytes.
    pub const READ_BUFFER_SIZE: usize = 4096;

    /// Byte used to pad the final block past end-of-file.
    pub const FILLER_BYTE: u8 = 0;

    /// Thread count used when available parallelism cannot be queried.
    pub const FALLBACK_THREADS: usize = 2;
}

/// Returns the default thread count: as many as the machine offers.
pub fn default_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(defaults::FALLBACK_THREADS)
}

/// Selectable block hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Crc32,
}

impl HashAlgorithm {
    /// Digest length in bytes for this algorithm.
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Crc32 => 4,
        }
    }

    /// Create a fresh hasher instance for this algorithm.
    pub fn new_hasher(&self) -> Box<dyn BlockHasher> {
        match self {
            HashAlgorithm::Md5 => Box::new(Md5Hasher::new()),
            HashAlgorithm::Crc32 => Box::new(Crc32Hasher::new()),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = BlockHashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "crc32" => Ok(HashAlgorithm::Crc32),
            other => Err(BlockHashError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "md5"),
            HashAlgorithm::Crc32 => write!(f, "crc32"),
        }
    }
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the file to hash.
    pub input_path: PathBuf,

    /// Size of the input file in bytes, queried once at startup.
    pub input_size: u64,

    /// Path of the record output file.
    pub output_path: PathBuf,

    /// Block size in bytes.
    pub block_size: u64,

    /// Requested thread count (including the collector thread).
    pub threads: usize,

    /// Byte used to pad the final block past end-of-file.
    pub filler_byte: u8,

    /// Per-worker read buffer size in bytes.
    pub read_buffer_size: usize,

    /// Selected hash algorithm.
    pub algorithm: HashAlgorithm,
}

impl Config {
    /// Build a configuration from explicit fields, validating every value.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_path: impl Into<PathBuf>,
        input_size: u64,
        output_path: impl Into<PathBuf>,
        block_size: u64,
        threads: usize,
        filler_byte: u8,
        read_buffer_size: usize,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(BlockHashError::Config("block size must be > 0".to_string()));
        }
        if threads == 0 {
            return Err(BlockHashError::Config(
                "thread count must be >= 1".to_string(),
            ));
        }
        if read_buffer_size == 0 {
            return Err(BlockHashError::Config(
                "read buffer size must be > 0".to_string(),
            ));
        }
        if input_size == 0 {
            return Err(BlockHashError::Config("input file is empty".to_string()));
        }

        Ok(Self {
            input_path: input_path.into(),
            input_size,
            output_path: output_path.into(),
            block_size,
            threads,
            filler_byte,
            read_buffer_size,
            algorithm,
        })
    }

    /// Build a configuration for an input file on disk, querying its size.
    #[allow(clippy::too_many_arguments)]
    pub fn from_input_file(
        input_path: impl AsRef<Path>,
        output_path: impl Into<PathBuf>,
        block_size: u64,
        threads: usize,
        filler_byte: u8,
        read_buffer_size: usize,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        let input_path = input_path.as_ref();
        let metadata = fs::metadata(input_path).map_err(|e| {
            BlockHashError::Config(format!("cannot stat input {}: {}", input_path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(BlockHashError::Config(format!(
                "input {} is not a regular file",
                input_path.display()
            )));
        }

        Self::new(
            input_path,
            metadata.len(),
            output_path,
            block_size,
            threads,
            filler_byte,
            read_buffer_size,
            algorithm,
        )
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input={} ({} bytes) output={} block_size={} threads={} \
             filler=0x{:02x} read_buffer={} algo={}",
            self.input_path.display(),
            self.input_size,
            self.output_path.display(),
            self.block_size,
            self.threads,
            self.filler_byte,
            self.read_buffer_size,
            self.algorithm,
        )
    }
}
