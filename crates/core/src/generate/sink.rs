//! Where generated bytes go. Generators never touch the filesystem directly.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::PipelineError;

pub trait ArtifactSink: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError>;
}

/// Writes to a temp file in the destination directory, then renames over the target.
/// Readers see either the old file or the new one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl ArtifactSink for FsSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        let write_err = |source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        self.files.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_sink_creates_dirs_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/file.json");

        FsSink.write(&target, b"one").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"one");

        FsSink.write(&target, b"two").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"two");

        // No stray temp files left behind.
        let entries: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("file.json")]);
    }

    #[test]
    fn fs_sink_reports_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let err = FsSink.write(&blocker.join("a.png"), b"png").unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
    }

    #[test]
    fn memory_sink_records_writes() {
        let sink = MemorySink::new();
        sink.write(Path::new("a/b.json"), b"{}").unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get(Path::new("a/b.json")).unwrap(), b"{}");
    }
}
