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

//! Error types for blockhash operations.

use std::io;
use thiserror::Error;

/// The main error type for blockhash operations.
#[derive(Debug, Error)]
pub enum BlockHashError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// An unrecognized hash algorithm name was given.
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Occurs when attempting to push into a channel whose consumer is gone.
    #[error("result channel is closed: {0}")]
    QueueClosed(String),

    /// A worker was asked to run a second time.
    #[error("worker was already started")]
    AlreadyStarted,

    /// One or more worker threads could not be spawned.
    #[error("workers failed to start: {0}")]
    StartFailure(String),

    /// A worker failed while processing blocks.
    #[error("worker {worker_id} failed: {source}")]
    WorkerFailed {
        worker_id: usize,
        #[source]
        source: Box<BlockHashError>,
    },

    /// A worker thread panicked instead of storing its error.
    #[error("worker thread panicked")]
    WorkerPanicked,

    /// A general error occurred.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for blockhash operations.
pub type Result<T> = std::result::Result<T, BlockHashError>;
