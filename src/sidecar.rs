//! Sidecar metadata accompanying every columnar chunk.
//!
//! `<data>.parquet` gets a `<data>.parquet.meta.json` with the timestamp
//! range and row count, so the bundler can size merged files without opening
//! the Parquet footers. The sidecar is written to a `.part` file first and
//! renamed into place; a crash can leave a stray `.part` behind but never a
//! truncated `.meta.json`.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Earliest record timestamp in the chunk (epoch seconds), 0 when no
    /// record carries a timestamp.
    pub min_timestamp: i64,
    /// Latest record timestamp in the chunk (epoch seconds), 0 when no
    /// record carries a timestamp.
    pub max_timestamp: i64,
    pub rows_written: i64,
}

fn append_os(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

impl ChunkMeta {
    /// The sidecar path for a data file: `<data_path>.meta.json`.
    pub fn path_for(data_path: &Path) -> PathBuf {
        append_os(data_path, ".meta.json")
    }

    /// Atomically writes the sidecar next to `data_path`.
    pub fn write_for(&self, data_path: &Path) -> io::Result<()> {
        let target = Self::path_for(data_path);
        let part = append_os(&target, ".part");
        let json = serde_json::to_vec(self)?;
        fs::write(&part, json).inspect_err(|_| {
            let _ = fs::remove_file(&part);
        })?;
        fs::rename(&part, &target).inspect_err(|_| {
            let _ = fs::remove_file(&part);
        })
    }

    pub fn read_for(data_path: &Path) -> io::Result<ChunkMeta> {
        let bytes = fs::read(Self::path_for(data_path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("oeuf-2024-06-01T12:00:00+00:00.parquet");
        let meta = ChunkMeta {
            min_timestamp: 1717243200,
            max_timestamp: 1717243260,
            rows_written: 42,
        };
        meta.write_for(&data).unwrap();
        assert_eq!(ChunkMeta::read_for(&data).unwrap(), meta);
        // The intermediate .part is gone once the rename lands.
        assert!(!append_os(&ChunkMeta::path_for(&data), ".part").exists());
    }

    #[test]
    fn sidecar_path_appends_full_suffix() {
        let p = ChunkMeta::path_for(Path::new("out/oeuf-x.parquet"));
        assert_eq!(p, Path::new("out/oeuf-x.parquet.meta.json"));
    }

    #[test]
    fn missing_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ChunkMeta::read_for(&dir.path().join("nope.parquet")).is_err());
    }

    #[test]
    fn stray_part_never_shadows_the_sidecar() {
        // A crash between data close and sidecar rename leaves only the
        // .part; a reader must not see a half-written .meta.json.
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("oeuf-crash.parquet");
        let part = append_os(&ChunkMeta::path_for(&data), ".part");
        fs::write(&part, b"{\"min_timestamp\":").unwrap();
        assert!(ChunkMeta::read_for(&data).is_err());
        assert!(part.exists());
    }
}
