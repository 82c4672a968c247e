//! On-disk end-to-end tests driving the public API the same way the CLI
//! front end does: real input and output files, one read handle per
//! worker.

use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::Arc;

use rand::RngCore;

use blockhash::config::{Config, HashAlgorithm};
use blockhash::hasher::BlockHasher;
use blockhash::parallel::manager::{Manager, SourceOpener};

/// Run a full hashing pass over `data` and return the parsed records.
fn run_blockhash(
    data: &[u8],
    block_size: u64,
    threads: usize,
    algorithm: HashAlgorithm,
) -> Vec<(u64, Vec<u8>)> {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");
    fs::write(&input_path, data).unwrap();

    let config = Arc::new(
        Config::from_input_file(
            &input_path,
            &output_path,
            block_size,
            threads,
            0x00,
            4096,
            algorithm,
        )
        .unwrap(),
    );

    let opener_path = input_path.clone();
    let opener: SourceOpener<File> = Arc::new(move || File::open(&opener_path));
    let sink = BufWriter::new(File::create(&output_path).unwrap());

    let mut manager = Manager::new(Arc::clone(&config), opener, sink).unwrap();
    manager.start().unwrap();
    manager.run().unwrap();
    drop(manager);

    let output = fs::read(&output_path).unwrap();
    let record_size = 8 + algorithm.digest_size();
    assert_eq!(output.len() % record_size, 0);
    output
        .chunks(record_size)
        .map(|record| {
            let index = u64::from_le_bytes(record[..8].try_into().unwrap());
            (index, record[8..].to_vec())
        })
        .collect()
}

fn digest_of(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut hasher = algorithm.new_hasher();
    hasher.init();
    hasher.update(data);
    hasher.finish().to_vec()
}

/// Digest of block `index`, filler-padded to the block boundary.
fn expected_block_digest(
    algorithm: HashAlgorithm,
    data: &[u8],
    index: u64,
    block_size: u64,
) -> Vec<u8> {
    let start = (index * block_size) as usize;
    let end = ((index + 1) * block_size) as usize;
    let mut block: Vec<u8> = data[start..end.min(data.len())].to_vec();
    block.resize(block_size as usize, 0x00);
    digest_of(algorithm, &block)
}

#[test]
fn test_ten_byte_crc32_single_thread() {
    let data: Vec<u8> = (0u8..10).collect();
    let mut records = run_blockhash(&data, 4, 1, HashAlgorithm::Crc32);

    assert_eq!(records.len(), 3);
    records.sort_by_key(|(index, _)| *index);
    let indices: Vec<u64> = records.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    // Final block is the trailing two bytes plus two filler bytes.
    assert_eq!(
        records[2].1,
        digest_of(HashAlgorithm::Crc32, &[data[8], data[9], 0x00, 0x00])
    );
    for (index, digest) in &records {
        assert_eq!(
            digest,
            &expected_block_digest(HashAlgorithm::Crc32, &data, *index, 4)
        );
    }
}

#[test]
fn test_random_input_md5_multithreaded() {
    let mut data = vec![0u8; 100_000];
    rand::thread_rng().fill_bytes(&mut data);

    let block_size = 4096u64;
    let mut records = run_blockhash(&data, block_size, 4, HashAlgorithm::Md5);

    let block_count = (data.len() as u64).div_ceil(block_size);
    assert_eq!(records.len() as u64, block_count);

    records.sort_by_key(|(index, _)| *index);
    for (position, (index, digest)) in records.iter().enumerate() {
        assert_eq!(*index, position as u64, "missing or duplicated block");
        assert_eq!(
            digest,
            &expected_block_digest(HashAlgorithm::Md5, &data, *index, block_size)
        );
    }
}

#[test]
fn test_block_size_larger_than_file() {
    let data = b"ten bytes!".to_vec();
    let records = run_blockhash(&data, 64, 2, HashAlgorithm::Md5);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, 0);

    let mut padded = data.clone();
    padded.resize(64, 0x00);
    assert_eq!(records[0].1, digest_of(HashAlgorithm::Md5, &padded));
}

#[test]
fn test_more_threads_than_blocks() {
    let data: Vec<u8> = (0u8..32).collect();
    let mut records = run_blockhash(&data, 8, 16, HashAlgorithm::Crc32);

    assert_eq!(records.len(), 4);
    records.sort_by_key(|(index, _)| *index);
    for (position, (index, digest)) in records.iter().enumerate() {
        assert_eq!(*index, position as u64);
        assert_eq!(
            digest,
            &expected_block_digest(HashAlgorithm::Crc32, &data, *index, 8)
        );
    }
}
