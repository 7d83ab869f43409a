//! Digest Computer
//!
//! Content equality is decided by comparing SHA-512 digests of the full
//! uncompressed entry content. Streams are consumed in bounded chunks, so
//! memory use does not depend on entry size.

use std::io::{self, Read};

use patchcat_archive::{ArchiveEntry, ArchiveIndex};
use patchcat_core::{Digest, Error, Result};
use sha2::{Digest as _, Sha512};

/// Default read buffer size while digesting
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Consume `reader` to the end and return the hex SHA-512 of its content
///
/// The reader is taken by value and dropped before returning, whether the
/// digest succeeds or not. A read failure yields [`Error::Io`] and no
/// digest.
pub fn digest_stream<R: Read>(mut reader: R, chunk_size: usize) -> Result<Digest> {
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }

    Ok(Digest::from_hex(hex::encode(hasher.finalize())))
}

/// Digest in-memory content
pub fn digest_bytes(data: &[u8]) -> Digest {
    Digest::from_hex(hex::encode(Sha512::digest(data)))
}

/// Open an entry of `index` and digest its content
///
/// Failures to open the stream surface as [`Error::EntryRead`], failures
/// while reading as [`Error::Digest`].
pub fn digest_entry(index: &ArchiveIndex, entry: &ArchiveEntry, chunk_size: usize) -> Result<Digest> {
    let stream = index.open_stream(entry)?;
    digest_stream(stream, chunk_size).map_err(|e| match e {
        Error::Io(source) => Error::Digest {
            path: entry.path.clone(),
            source,
        },
        other => other,
    })
}
