//! Streams the payload to the test file.
//!
//! Writing happens in two steps so the caller can tell them apart:
//! 1.  [`ChunkedWriter::write_payload`] pushes every block of the payload to
//!     the file, feeding the same blocks to the write-side digest.
//! 2.  [`ChunkedWriter::commit`] forces the file to stable storage and closes
//!     it. Nothing may read the file back before this returns.
//!
//! A failed write leaves the partial file where it is. Deleting it is the
//! orchestrator's call.
use crate::digest::DigestAccumulator;
use crate::error::{CycleError, Result};
use crate::payload::PayloadGenerator;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A write that stopped partway.
#[derive(Debug)]
pub struct StreamWriteError {
    /// Bytes the sink accepted before the failure.
    pub written: u64,
    pub source: io::Error,
}

/// Writes the rest of `payload` to `sink`, block by block.
///
/// Each block is added to `digest` only after the sink has taken all of it,
/// so the digest always covers exactly the bytes reported as written.
/// `on_progress` receives the running total after every block.
pub fn write_stream<W, F>(
    sink: &mut W,
    payload: &mut PayloadGenerator,
    digest: &mut DigestAccumulator,
    mut on_progress: F,
) -> std::result::Result<u64, StreamWriteError>
where
    W: Write,
    F: FnMut(u64),
{
    let mut written: u64 = 0;
    while let Some(block) = payload.next_block() {
        let mut offset = 0;
        while offset < block.len() {
            match sink.write(&block[offset..]) {
                Ok(0) => {
                    return Err(StreamWriteError {
                        written: written + offset as u64,
                        source: io::Error::new(
                            io::ErrorKind::WriteZero,
                            "storage accepted no more bytes",
                        ),
                    });
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(StreamWriteError {
                        written: written + offset as u64,
                        source: e,
                    });
                }
            }
        }
        digest.update(block);
        written += block.len() as u64;
        on_progress(written);
    }
    Ok(written)
}

/// An open test file being filled with payload.
///
/// The file handle is closed when this is dropped, whichever way the write
/// ends.
pub struct ChunkedWriter {
    file: File,
    path: PathBuf,
    written: u64,
}

impl ChunkedWriter {
    /// Creates `path`, truncating anything already there.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| CycleError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes the file has accepted, updated after every block. Only ever
    /// grows.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes the whole remaining payload.
    pub fn write_payload<F>(
        &mut self,
        payload: &mut PayloadGenerator,
        digest: &mut DigestAccumulator,
        mut on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(u64),
    {
        let target = self.written + payload.remaining();
        let base = self.written;
        let result = write_stream(&mut self.file, payload, digest, |n| {
            self.written = base + n;
            on_progress(self.written);
        });
        match result {
            Ok(n) => {
                self.written = base + n;
                Ok(self.written)
            }
            Err(e) => {
                self.written = base + e.written;
                Err(CycleError::Write {
                    path: self.path.clone(),
                    written: self.written,
                    target,
                    source: e.source,
                })
            }
        }
    }

    /// Syncs data and metadata to the device, then closes the file.
    pub fn commit(self) -> Result<u64> {
        self.file.sync_all().map_err(|source| CycleError::Flush {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.written)
    }
}

/// Creates `path`, writes the whole payload and makes it durable.
pub fn run<F>(
    path: &Path,
    payload: &mut PayloadGenerator,
    digest: &mut DigestAccumulator,
    on_progress: F,
) -> Result<u64>
where
    F: FnMut(u64),
{
    let mut writer = ChunkedWriter::create(path)?;
    writer.write_payload(payload, digest, on_progress)?;
    writer.commit()
}
