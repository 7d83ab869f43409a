//! Streaming decompression for archive entries
//!
//! Supports the compression methods found in release bundles:
//! - Store (no compression)
//! - Deflate (standard ZIP)
//! - ZStd (Zstandard, method 93)
//!
//! Entries are never inflated into memory as a whole; each method is
//! exposed as a [`Read`] adapter over the compressed bytes.

use std::io::{self, Read};

use patchcat_core::{Error, Result};

use super::CompressionMethod;

/// Builds decompressing readers for entry data
pub struct EntryDecoder;

impl EntryDecoder {
    /// Wrap the compressed bytes of an entry in a decompressing reader
    pub fn reader<'a>(
        data: &'a [u8],
        method: CompressionMethod,
    ) -> Result<Box<dyn Read + Send + 'a>> {
        match method {
            CompressionMethod::Store => Ok(Box::new(data)),

            CompressionMethod::Deflate => Ok(Box::new(flate2::read::DeflateDecoder::new(data))),

            CompressionMethod::Zstd => {
                let decoder = zstd::stream::read::Decoder::with_buffer(data).map_err(|e| {
                    Error::UnsupportedCompression {
                        method: format!("zstd decoder initialisation failed: {}", e),
                    }
                })?;
                Ok(Box::new(decoder))
            }

            CompressionMethod::Unknown(method) => Err(Error::UnsupportedCompression {
                method: format!("unknown compression method {}", method),
            }),
        }
    }
}

/// Reader that checks the uncompressed size and CRC-32 of an entry.
///
/// A mismatch is reported as an [`io::ErrorKind::InvalidData`] error on the
/// read that would otherwise signal end of stream (or on the read that
/// overruns the declared size).
pub struct VerifyingReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    bytes_read: u64,
    expected_size: u64,
    expected_crc: u32,
}

impl<R: Read> VerifyingReader<R> {
    pub fn new(inner: R, expected_size: u64, expected_crc: u32) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            bytes_read: 0,
            expected_size,
            expected_crc,
        }
    }

    fn verify_end(&self) -> io::Result<()> {
        if self.bytes_read != self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "size mismatch: expected {} bytes, got {}",
                    self.expected_size, self.bytes_read
                ),
            ));
        }

        let actual = self.hasher.clone().finalize();
        if actual != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "checksum mismatch: expected {:08X}, got {:08X}",
                    self.expected_crc, actual
                ),
            ));
        }

        Ok(())
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;

        if n == 0 {
            if !buf.is_empty() {
                self.verify_end()?;
            }
            return Ok(0);
        }

        self.bytes_read += n as u64;
        if self.bytes_read > self.expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry produced more than the declared {} bytes",
                    self.expected_size
                ),
            ));
        }

        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
