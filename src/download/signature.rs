//! Archive detection from leading bytes

use crate::types::ArchiveType;
use std::io::Read;
use std::path::Path;

/// Bytes needed to see every supported signature (tar's is at offset 257)
pub const SIGNATURE_LEN: usize = 262;

const TAR_MAGIC_OFFSET: usize = 257;

/// Identify an archive from the first bytes of a file
///
/// Returns `None` for anything else, including JSON or HTML error payloads.
pub fn detect(head: &[u8]) -> Option<ArchiveType> {
    const MAGIC: &[(&[u8], ArchiveType)] = &[
        (b"PK\x03\x04", ArchiveType::Zip),
        // empty archive
        (b"PK\x05\x06", ArchiveType::Zip),
        // spanned archive
        (b"PK\x07\x08", ArchiveType::Zip),
        (b"7z\xBC\xAF\x27\x1C", ArchiveType::SevenZip),
        (b"Rar!\x1A\x07", ArchiveType::Rar),
        (b"\x1F\x8B", ArchiveType::Gzip),
        (b"BZh", ArchiveType::Bzip2),
        (b"\xFD7zXZ\x00", ArchiveType::Xz),
        (b"\x28\xB5\x2F\xFD", ArchiveType::Zstd),
    ];

    if let Some((_, kind)) = MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
        return Some(*kind);
    }

    // "ustar\0" (POSIX) or "ustar " (GNU)
    head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5)
        .filter(|magic| *magic == b"ustar")
        .map(|_| ArchiveType::Tar)
}

/// Read the head of `path` and detect its archive type
pub fn detect_file(path: &Path) -> std::io::Result<Option<ArchiveType>> {
    let mut head = Vec::with_capacity(SIGNATURE_LEN);
    std::fs::File::open(path)?
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(detect(&head))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_compressed_formats() {
        assert_eq!(detect(b"PK\x03\x04rest"), Some(ArchiveType::Zip));
        assert_eq!(detect(b"PK\x05\x06"), Some(ArchiveType::Zip));
        assert_eq!(detect(b"7z\xBC\xAF\x27\x1C\x00\x04"), Some(ArchiveType::SevenZip));
        assert_eq!(detect(b"Rar!\x1A\x07\x01\x00"), Some(ArchiveType::Rar));
        assert_eq!(detect(b"\x1F\x8B\x08\x00"), Some(ArchiveType::Gzip));
        assert_eq!(detect(b"BZh91AY"), Some(ArchiveType::Bzip2));
        assert_eq!(detect(b"\xFD7zXZ\x00\x00"), Some(ArchiveType::Xz));
        assert_eq!(detect(b"\x28\xB5\x2F\xFD\x00"), Some(ArchiveType::Zstd));
    }

    #[test]
    fn recognises_tar_header() {
        let mut block = vec![0u8; 512];
        block[..8].copy_from_slice(b"file.txt");
        block[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(detect(&block), Some(ArchiveType::Tar));
    }

    #[test]
    fn rejects_error_payloads() {
        assert_eq!(detect(br#"{"status": 403, "message": "Forbidden"}"#), None);
        assert_eq!(detect(b"<!DOCTYPE html><html>"), None);
        assert_eq!(detect(b""), None);
        assert_eq!(detect(b"P"), None);
    }

    #[test]
    fn detects_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"PK\x03\x04\x14\x00").unwrap();
        assert_eq!(detect_file(&path).unwrap(), Some(ArchiveType::Zip));

        std::fs::write(&path, b"not an archive").unwrap();
        assert_eq!(detect_file(&path).unwrap(), None);
    }
}
