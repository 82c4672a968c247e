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

//! Command-line front end for parallel block hashing.
//!
//! Exit codes: 0 success, 1 configuration error, 2 workers failed to
//! start, 3 a worker failed during the run.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, LevelFilter};

use blockhash::config::{default_thread_count, defaults, Config, HashAlgorithm};
use blockhash::parallel::manager::{Manager, SourceOpener};

const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_START_FAILURE: u8 = 2;
const EXIT_RUNTIME_FAILURE: u8 = 3;

/// Hash fixed-size blocks of a file in parallel.
#[derive(Parser, Debug)]
#[command(name = "blockhash", version, about)]
struct Cli {
    /// File to hash.
    input: PathBuf,

    /// Output file receiving (block index, digest) records.
    output: PathBuf,

    /// Block size in KiB.
    #[arg(long, default_value_t = defaults::BLOCK_SIZE_KB)]
    block_size: u64,

    /// Total thread count, one of which collects results
    /// [default: available parallelism].
    #[arg(long)]
    threads: Option<usize>,

    /// Hash algorithm: md5 or crc32.
    #[arg(long, default_value = "md5")]
    algo: String,

    /// Byte value used to pad the final block past end-of-file.
    #[arg(long, default_value_t = defaults::FILLER_BYTE)]
    filler: u8,

    /// Per-worker read buffer size in bytes.
    #[arg(long, default_value_t = defaults::READ_BUFFER_SIZE)]
    read_buffer: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let algorithm = match cli.algo.parse::<HashAlgorithm>() {
        Ok(algorithm) => algorithm,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let config = match Config::from_input_file(
        &cli.input,
        &cli.output,
        cli.block_size.saturating_mul(1024),
        cli.threads.unwrap_or_else(default_thread_count),
        cli.filler,
        cli.read_buffer,
        algorithm,
    ) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let sink = match File::create(&config.output_path) {
        Ok(file) => BufWriter::new(file),
        Err(e) => {
            error!("cannot create output {}: {}", config.output_path.display(), e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // Every worker opens its own read handle so no read cursor is shared.
    let input_path = config.input_path.clone();
    let opener: SourceOpener<File> = Arc::new(move || File::open(&input_path));

    let mut manager = match Manager::new(Arc::clone(&config), opener, sink) {
        Ok(manager) => manager,
        Err(e) => {
            error!("cannot set up workers: {}", e);
            return ExitCode::from(EXIT_START_FAILURE);
        }
    };

    if let Err(e) = manager.start() {
        error!("{}", e);
        return ExitCode::from(EXIT_START_FAILURE);
    }

    match manager.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("run failed: {}", e);
            ExitCode::from(EXIT_RUNTIME_FAILURE)
        }
    }
}
