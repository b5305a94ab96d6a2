//! Reads the test file back from storage and digests it.
use crate::digest::{DigestAccumulator, StreamDigest};
use crate::error::{CycleError, Result};
use crate::page_cache;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A read that stopped partway.
#[derive(Debug)]
pub struct StreamReadError {
    /// Bytes successfully read and digested before the failure.
    pub read: u64,
    pub source: io::Error,
}

/// Reads `source` to end-of-stream in blocks of `buffer.len()` bytes, feeding
/// each block to `digest` in order.
///
/// A short read is not the end; only a read returning zero bytes is.
/// `on_progress` receives the running total after every non-empty read.
pub fn digest_stream<R, F>(
    source: &mut R,
    buffer: &mut [u8],
    digest: &mut DigestAccumulator,
    mut on_progress: F,
) -> std::result::Result<u64, StreamReadError>
where
    R: Read,
    F: FnMut(u64),
{
    let mut read_total: u64 = 0;
    loop {
        let n = match source.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(StreamReadError {
                    read: read_total,
                    source: e,
                });
            }
        };
        digest.update(&buffer[..n]);
        read_total += n as u64;
        on_progress(read_total);
    }
    Ok(read_total)
}

/// Opens `path` read-only and digests its entire contents.
///
/// The file's cached pages are dropped first where the platform allows it, so
/// the bytes come from the device rather than from memory. The working buffer
/// is `block_size` bytes regardless of file size.
pub fn run<F>(path: &Path, block_size: usize, on_progress: F) -> Result<StreamDigest>
where
    F: FnMut(u64),
{
    let mut file = File::open(path).map_err(|source| CycleError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if let Err(e) = page_cache::evict(&file) {
        tracing::debug!(path = %path.display(), error = %e, "could not drop cached pages");
    }

    let mut buffer = vec![0u8; block_size.max(1)];
    let mut digest = DigestAccumulator::new();
    digest_stream(&mut file, &mut buffer, &mut digest, on_progress).map_err(|e| {
        CycleError::Read {
            path: path.to_path_buf(),
            read: e.read,
            source: e.source,
        }
    })?;
    Ok(digest.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{DEFAULT_SEED, expected_digest};
    use std::io::Write;

    /// Returns at most `max` bytes per read, with an `Interrupted` between
    /// reads, then optionally fails after `fail_after` bytes.
    struct Trickle<'a> {
        data: &'a [u8],
        pos: usize,
        max: usize,
        fail_after: Option<usize>,
        interrupt: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if !self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }
            if self.fail_after.is_some_and(|limit| self.pos >= limit) {
                return Err(io::Error::other("usb reset"));
            }
            let n = buf.len().min(self.max).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn short_reads_keep_the_loop_going() {
        let data: Vec<u8> = (0..5_000u32).map(|i| (i * 7) as u8).collect();
        let mut source = Trickle {
            data: &data,
            pos: 0,
            max: 333,
            fail_after: None,
            interrupt: false,
        };
        let mut buffer = vec![0u8; 1024];
        let mut digest = DigestAccumulator::new();
        let mut calls = 0;

        let n = digest_stream(&mut source, &mut buffer, &mut digest, |_| calls += 1).unwrap();

        let mut reference = DigestAccumulator::new();
        reference.update(&data);
        assert_eq!(n, 5_000);
        assert_eq!(calls, 16);
        assert_eq!(digest.finalize(), reference.finalize());
    }

    #[test]
    fn mid_stream_failure_reports_bytes_read() {
        let data = vec![1u8; 1_000];
        let mut source = Trickle {
            data: &data,
            pos: 0,
            max: 100,
            fail_after: Some(300),
            interrupt: false,
        };
        let mut buffer = vec![0u8; 100];

        let err = digest_stream(&mut source, &mut buffer, &mut DigestAccumulator::new(), |_| {})
            .unwrap_err();

        assert_eq!(err.read, 300);
        assert_eq!(err.source.to_string(), "usb reset");
    }

    #[test]
    fn empty_stream_is_not_an_error() {
        let mut buffer = vec![0u8; 16];
        let n = digest_stream(&mut io::empty(), &mut buffer, &mut DigestAccumulator::new(), |_| {})
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn file_digest_matches_generated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let mut generator = crate::payload::PayloadGenerator::new(DEFAULT_SEED, 777);
        generator.reset(10_000);
        let mut file = File::create(&path).unwrap();
        while let Some(block) = generator.next_block() {
            file.write_all(block).unwrap();
        }
        drop(file);

        let digest = run(&path, 4096, |_| {}).unwrap();

        assert_eq!(digest, expected_digest(DEFAULT_SEED, 10_000, 4096));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("gone.bin"), 4096, |_| {}).unwrap_err();
        assert!(matches!(err, CycleError::Open { .. }));
    }
}
