//! In-memory source archives.
//!
//! Container filesystems are populated through tar streams, so the submitted
//! source is packed as a single-entry, uncompressed tar before injection.

use bytes::Bytes;
use std::path::{Component, Path};
use thiserror::Error;

/// Errors that can occur while packing a source archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The entry name is not a plain relative file name
    #[error("invalid archive entry name: {0:?}")]
    InvalidName(String),

    /// Underlying write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pack `source` as the only file of a tar archive, named `filename`.
///
/// The entry is a regular file with mode `0644` and a zero mtime, so the
/// same input always yields the same bytes.
pub fn build_archive(filename: &str, source: &str) -> Result<Bytes, ArchiveError> {
    validate_name(filename)?;

    let body = source.as_bytes();
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::with_capacity(body.len() + 1536));
    builder.append_data(&mut header, filename, body)?;
    let archive = builder.into_inner()?;

    tracing::trace!(filename = %filename, bytes = archive.len(), "Built source archive");
    Ok(Bytes::from(archive))
}

fn validate_name(filename: &str) -> Result<(), ArchiveError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ArchiveError::InvalidName(filename.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
        let mut reader = tar::Archive::new(archive);
        reader
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let mode = entry.header().mode().unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (path, body, mode)
            })
            .collect()
    }

    #[test]
    fn test_single_entry() {
        let archive = build_archive("main.py", "print(\"hi\")").unwrap();
        let entries = entries(&archive);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "main.py");
        assert_eq!(entries[0].1, b"print(\"hi\")");
        assert_eq!(entries[0].2, 0o644);
    }

    #[test]
    fn test_deterministic() {
        let a = build_archive("Main.java", "class Main {}").unwrap();
        let b = build_archive("Main.java", "class Main {}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_source() {
        let archive = build_archive("main.c", "").unwrap();
        let entries = entries(&archive);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].1.is_empty());
    }

    #[test]
    fn test_multibyte_source() {
        let source = "print('héllo ✓')";
        let archive = build_archive("main.py", source).unwrap();
        assert_eq!(entries(&archive)[0].1, source.as_bytes());
    }

    #[test]
    fn test_rejects_paths() {
        assert!(build_archive("../main.py", "x").is_err());
        assert!(build_archive("/app/main.py", "x").is_err());
        assert!(build_archive("src/main.py", "x").is_err());
        assert!(build_archive("", "x").is_err());
    }
}
