//! ZIP container parsing
//!
//! Release bundles are plain ZIP (or ZIP64) files. Only the central
//! directory is parsed up front; entry data is located through its local
//! header when a stream is opened.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! |                         ZIP Archive                         |
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │      Local Header + File Data (Stored/Deflate/Zstd)     ││
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐                    ││
//! │  │  │ File 1  │ │ File 2  │ │ File N  │ ...                ││
//! │  │  └─────────┘ └─────────┘ └─────────┘                    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │           Central Directory (Entries)                   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │   [ZIP64 EOCD record + locator]                         ││
//! │  │   End of Central Directory (0x06054B50)                 ││
//! │  │  - Central Directory offset                             ││
//! │  │  - Total entries count                                  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod compression;
mod entry;

pub use compression::{EntryDecoder, VerifyingReader};
pub use entry::{format_bytes, ArchiveEntry};

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt};
use patchcat_core::{Error, Result};
use tracing::warn;

/// End of central directory signature
const EOCD_SIGNATURE: u32 = 0x06054B50;

/// Central directory file header signature
const CD_SIGNATURE: u32 = 0x02014B50;

/// Local file header signature
const LOCAL_HEADER_SIGNATURE: u32 = 0x04034B50;

/// ZIP64 end of central directory record signature
const ZIP64_EOCD_SIGNATURE: u32 = 0x06064B50;

/// ZIP64 end of central directory locator signature
const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064B50;

/// General purpose flag bit marking a UTF-8 encoded name
const FLAG_UTF8_NAME: u16 = 0x0800;

/// Fixed part of the EOCD record
const EOCD_LEN: u64 = 22;

/// Fixed part of a central directory header
const CD_HEADER_LEN: u64 = 46;

/// Fixed part of a local file header
const LOCAL_HEADER_LEN: u64 = 30;

/// Maximum trailing archive comment
const MAX_COMMENT_LEN: u64 = 0xFFFF;

/// Compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store,
    Deflate,
    Zstd,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            93 => CompressionMethod::Zstd,
            other => CompressionMethod::Unknown(other),
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Store => f.write_str("store"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Zstd => f.write_str("zstd"),
            CompressionMethod::Unknown(id) => write!(f, "method {}", id),
        }
    }
}

/// End of Central Directory record
#[derive(Debug)]
struct EndOfCentralDirectory {
    total_entries: u64,
    cd_size: u64,
    cd_offset: u64,
}

/// Parse the central directory of a ZIP archive held in `data`
pub(crate) fn parse_central_directory(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut reader = Cursor::new(data);

    let eocd = parse_eocd(&mut reader)?;
    let cd_end = eocd.cd_offset.checked_add(eocd.cd_size);
    if cd_end.map_or(true, |end| end > data.len() as u64) {
        return Err(Error::corrupted(format!(
            "central directory ({} bytes at offset {}) lies outside the archive ({} bytes)",
            eocd.cd_size,
            eocd.cd_offset,
            data.len()
        )));
    }

    reader.seek(SeekFrom::Start(eocd.cd_offset))?;

    // Never trust the declared count for the allocation
    let capacity = eocd.total_entries.min(eocd.cd_size / CD_HEADER_LEN) as usize;
    let mut entries = Vec::with_capacity(capacity);

    for i in 0..eocd.total_entries {
        let entry = parse_cd_entry(&mut reader).map_err(|e| {
            e.with_context(format!("central directory entry {} of {}", i, eocd.total_entries))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Parse the end of central directory record
fn parse_eocd(reader: &mut Cursor<&[u8]>) -> Result<EndOfCentralDirectory> {
    let file_size = reader.get_ref().len() as u64;
    if file_size < EOCD_LEN {
        return Err(Error::corrupted(format!(
            "{} bytes is too small to be a ZIP archive",
            file_size
        )));
    }

    // EOCD is at least 22 bytes, search within the trailing comment window
    let search_start = file_size.saturating_sub(MAX_COMMENT_LEN + EOCD_LEN);
    let window = &reader.get_ref()[search_start as usize..];

    let sig_bytes = EOCD_SIGNATURE.to_le_bytes();
    let eocd_offset = window
        .windows(4)
        .rposition(|w| w == sig_bytes)
        .ok_or_else(|| Error::InvalidMagic {
            expected: sig_bytes.to_vec(),
            found: vec![],
        })?;

    let eocd_abs_offset = search_start + eocd_offset as u64;
    if eocd_abs_offset + EOCD_LEN > file_size {
        return Err(Error::corrupted("truncated end of central directory record"));
    }
    reader.seek(SeekFrom::Start(eocd_abs_offset + 4))?;

    let _disk_number = reader.read_u16::<LittleEndian>()?;
    let _cd_disk = reader.read_u16::<LittleEndian>()?;
    let _disk_entries = reader.read_u16::<LittleEndian>()?;
    let total_entries = reader.read_u16::<LittleEndian>()?;
    let cd_size = reader.read_u32::<LittleEndian>()?;
    let cd_offset = reader.read_u32::<LittleEndian>()?;
    let _comment_length = reader.read_u16::<LittleEndian>()?;

    if cd_offset == 0xFFFF_FFFF || cd_size == 0xFFFF_FFFF || total_entries == 0xFFFF {
        return parse_zip64_eocd(reader, eocd_abs_offset);
    }

    Ok(EndOfCentralDirectory {
        total_entries: total_entries as u64,
        cd_size: cd_size as u64,
        cd_offset: cd_offset as u64,
    })
}

/// Parse ZIP64 end of central directory
fn parse_zip64_eocd(
    reader: &mut Cursor<&[u8]>,
    eocd_offset: u64,
) -> Result<EndOfCentralDirectory> {
    // The locator sits directly before the EOCD
    let locator_offset = eocd_offset
        .checked_sub(20)
        .ok_or_else(|| Error::corrupted("no room for a ZIP64 locator"))?;
    reader.seek(SeekFrom::Start(locator_offset))?;

    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != ZIP64_EOCD_LOCATOR_SIGNATURE {
        return Err(Error::InvalidMagic {
            expected: ZIP64_EOCD_LOCATOR_SIGNATURE.to_le_bytes().to_vec(),
            found: sig.to_le_bytes().to_vec(),
        });
    }

    let _disk = reader.read_u32::<LittleEndian>()?;
    let zip64_eocd_offset = reader.read_u64::<LittleEndian>()?;

    reader.seek(SeekFrom::Start(zip64_eocd_offset))?;

    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != ZIP64_EOCD_SIGNATURE {
        return Err(Error::InvalidMagic {
            expected: ZIP64_EOCD_SIGNATURE.to_le_bytes().to_vec(),
            found: sig.to_le_bytes().to_vec(),
        });
    }

    // record size (8), versions (2 + 2), disk numbers (4 + 4), disk entries (8)
    reader.seek(SeekFrom::Current(28))?;
    let total_entries = reader.read_u64::<LittleEndian>()?;
    let cd_size = reader.read_u64::<LittleEndian>()?;
    let cd_offset = reader.read_u64::<LittleEndian>()?;

    Ok(EndOfCentralDirectory {
        total_entries,
        cd_size,
        cd_offset,
    })
}

/// Parse a single central directory entry
fn parse_cd_entry<R: Read + Seek>(reader: &mut R) -> Result<ArchiveEntry> {
    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != CD_SIGNATURE {
        return Err(Error::InvalidMagic {
            expected: CD_SIGNATURE.to_le_bytes().to_vec(),
            found: sig.to_le_bytes().to_vec(),
        });
    }

    let _version_made = reader.read_u16::<LittleEndian>()?;
    let _version_needed = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let compression = CompressionMethod::from(reader.read_u16::<LittleEndian>()?);
    let _mod_time = reader.read_u16::<LittleEndian>()?;
    let _mod_date = reader.read_u16::<LittleEndian>()?;
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;
    let name_length = reader.read_u16::<LittleEndian>()? as usize;
    let extra_length = reader.read_u16::<LittleEndian>()? as usize;
    let comment_length = reader.read_u16::<LittleEndian>()? as i64;
    let _disk_start = reader.read_u16::<LittleEndian>()?;
    let _internal_attrs = reader.read_u16::<LittleEndian>()?;
    let _external_attrs = reader.read_u32::<LittleEndian>()?;
    let local_header_offset = reader.read_u32::<LittleEndian>()?;

    let mut name_bytes = vec![0u8; name_length];
    reader.read_exact(&mut name_bytes)?;
    let path = decode_entry_name(name_bytes, flags);

    let mut extra = vec![0u8; extra_length];
    reader.read_exact(&mut extra)?;

    let (compressed_size, uncompressed_size, local_header_offset) =
        parse_zip64_extra(&extra, compressed_size, uncompressed_size, local_header_offset);

    // Skip comment
    reader.seek(SeekFrom::Current(comment_length))?;

    let is_directory = path.ends_with('/');

    Ok(ArchiveEntry {
        path,
        compression,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
        is_encrypted: flags & 0x01 != 0,
        is_directory,
    })
}

/// Decode a raw entry name
///
/// Invalid UTF-8 is replaced with U+FFFD, which can make two distinct raw
/// names collide, so every altered name is logged with its raw bytes.
pub(crate) fn decode_entry_name(raw: Vec<u8>, flags: u16) -> String {
    match String::from_utf8(raw) {
        Ok(name) => name,
        Err(e) => {
            let raw = e.into_bytes();
            let name = String::from_utf8_lossy(&raw).into_owned();
            warn!(
                path = %name,
                raw = %hex::encode(&raw),
                utf8_flag = flags & FLAG_UTF8_NAME != 0,
                "Entry name is not valid UTF-8, decoded lossily"
            );
            name
        }
    }
}

/// Resolve 32-bit sentinels through the ZIP64 extended information field
///
/// Fields appear in the fixed order uncompressed, compressed, offset and
/// only when the matching 32-bit value is saturated.
pub(crate) fn parse_zip64_extra(
    extra: &[u8],
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
) -> (u64, u64, u64) {
    let mut compressed = compressed_size as u64;
    let mut uncompressed = uncompressed_size as u64;
    let mut offset = local_offset as u64;

    let mut fields = Cursor::new(extra);
    while let (Ok(id), Ok(size)) = (
        fields.read_u16::<LittleEndian>(),
        fields.read_u16::<LittleEndian>(),
    ) {
        let start = fields.position() as usize;
        let end = start + size as usize;
        if end > extra.len() {
            break;
        }

        if id == 0x0001 {
            let mut field = Cursor::new(&extra[start..end]);

            if uncompressed_size == 0xFFFF_FFFF {
                match field.read_u64::<LittleEndian>() {
                    Ok(value) => uncompressed = value,
                    Err(_) => break,
                }
            }
            if compressed_size == 0xFFFF_FFFF {
                match field.read_u64::<LittleEndian>() {
                    Ok(value) => compressed = value,
                    Err(_) => break,
                }
            }
            if local_offset == 0xFFFF_FFFF {
                if let Ok(value) = field.read_u64::<LittleEndian>() {
                    offset = value;
                }
            }
            break;
        }

        fields.set_position(end as u64);
    }

    (compressed, uncompressed, offset)
}

/// Locate the compressed bytes of `entry` by reading its local header
pub(crate) fn locate_entry_data(data: &[u8], entry: &ArchiveEntry) -> Result<Range<usize>> {
    let archive_len = data.len() as u64;
    let header_end = entry.local_header_offset.checked_add(LOCAL_HEADER_LEN);
    if header_end.map_or(true, |end| end > archive_len) {
        return Err(Error::corrupted(format!(
            "local header offset {} beyond end of archive",
            entry.local_header_offset
        )));
    }

    let mut reader = Cursor::new(data);
    reader.seek(SeekFrom::Start(entry.local_header_offset))?;

    let sig = reader.read_u32::<LittleEndian>()?;
    if sig != LOCAL_HEADER_SIGNATURE {
        return Err(Error::InvalidMagic {
            expected: LOCAL_HEADER_SIGNATURE.to_le_bytes().to_vec(),
            found: sig.to_le_bytes().to_vec(),
        });
    }

    reader.seek(SeekFrom::Start(entry.local_header_offset + 26))?;
    let name_len = reader.read_u16::<LittleEndian>()? as u64;
    let extra_len = reader.read_u16::<LittleEndian>()? as u64;

    let start = entry.local_header_offset + LOCAL_HEADER_LEN + name_len + extra_len;
    let end = start
        .checked_add(entry.compressed_size)
        .filter(|end| *end <= archive_len)
        .ok_or_else(|| {
            Error::corrupted(format!(
                "{} compressed bytes at offset {} run past end of archive",
                entry.compressed_size, start
            ))
        })?;

    Ok(start as usize..end as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_method_conversion() {
        assert_eq!(CompressionMethod::from(0), CompressionMethod::Store);
        assert_eq!(CompressionMethod::from(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from(93), CompressionMethod::Zstd);
        assert_eq!(CompressionMethod::from(99), CompressionMethod::Unknown(99));
    }

    #[test]
    fn test_zip64_extra_resolves_saturated_fields() {
        let mut extra = vec![0x01, 0x00, 24, 0x00];
        extra.extend_from_slice(&5_000_000_000u64.to_le_bytes());
        extra.extend_from_slice(&4_000_000_000u64.to_le_bytes());
        extra.extend_from_slice(&6_000_000_000u64.to_le_bytes());

        let (compressed, uncompressed, offset) =
            parse_zip64_extra(&extra, 0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF);
        assert_eq!(uncompressed, 5_000_000_000);
        assert_eq!(compressed, 4_000_000_000);
        assert_eq!(offset, 6_000_000_000);
    }

    #[test]
    fn test_zip64_extra_only_offset_saturated() {
        // Skips an unrelated field first
        let mut extra = vec![0x55, 0x54, 0x01, 0x00, 0xAA];
        extra.extend_from_slice(&[0x01, 0x00, 8, 0x00]);
        extra.extend_from_slice(&7_000_000_000u64.to_le_bytes());

        let (compressed, uncompressed, offset) = parse_zip64_extra(&extra, 10, 20, 0xFFFF_FFFF);
        assert_eq!((compressed, uncompressed), (10, 20));
        assert_eq!(offset, 7_000_000_000);
    }

    #[test]
    fn test_zip64_extra_truncated_field_is_ignored() {
        let extra = [0x01, 0x00, 16, 0x00, 1, 2, 3];
        assert_eq!(parse_zip64_extra(&extra, 1, 2, 3), (1, 2, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for data in [&b"definitely not a zip archive"[..], &b"PK"[..]] {
            let err = parse_central_directory(data).unwrap_err();
            assert!(matches!(
                err.root(),
                Error::InvalidMagic { .. } | Error::ArchiveCorrupted { .. }
            ));
        }
    }

    #[test]
    fn test_parse_empty_archive() {
        // An archive with no entries is just an EOCD record
        let mut data = EOCD_SIGNATURE.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 18]);

        let entries = parse_central_directory(&data).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_rejects_directory_out_of_range() {
        let mut data = EOCD_SIGNATURE.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 1, 0, 1, 0]);
        data.extend_from_slice(&46u32.to_le_bytes());
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(&[0, 0]);

        let err = parse_central_directory(&data).unwrap_err();
        assert!(matches!(err, Error::ArchiveCorrupted { .. }));
    }

    fn cd_header(name: &[u8], flags: u16) -> Vec<u8> {
        let mut data = CD_SIGNATURE.to_le_bytes().to_vec();
        data.extend_from_slice(&20u16.to_le_bytes());
        data.extend_from_slice(&20u16.to_le_bytes());
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(name);
        data
    }

    #[test]
    fn test_invalid_utf8_name_is_decoded_lossily() {
        let data = cd_header(b"\xFFconf/app.cfg", 0);
        let entry = parse_cd_entry(&mut Cursor::new(data)).unwrap();

        assert_eq!(entry.path, "\u{FFFD}conf/app.cfg");
        assert_eq!(entry.compression, CompressionMethod::Store);
        assert_eq!(entry.uncompressed_size, 3);
        assert!(!entry.is_directory);
    }

    #[test]
    fn test_distinct_raw_names_can_collide() {
        let first = decode_entry_name(b"\xFEb.txt".to_vec(), 0);
        let second = decode_entry_name(b"\xFFb.txt".to_vec(), FLAG_UTF8_NAME);
        assert_eq!(first, second);

        let plain = decode_entry_name("caf\u{e9}.txt".as_bytes().to_vec(), FLAG_UTF8_NAME);
        assert_eq!(plain, "caf\u{e9}.txt");
    }
}
