// In-memory sample sequence, rewritten to disk after every append.
// Each write goes to a temp file in the target directory, is fsynced, then renamed over the
// target, so the file on disk is always a complete JSON document.

use crate::error::WriteError;
use crate::models::Sample;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct SampleBuffer {
    path: PathBuf,
    samples: Vec<Sample>,
    /// Samples exist that the file on disk does not contain yet.
    dirty: bool,
    writes: u64,
}

impl SampleBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            samples: Vec::new(),
            dirty: false,
            writes: 0,
        }
    }

    /// Appends and persists the whole sequence. On a write error the sample stays buffered
    /// and the next append (or `flush`) writes the full backlog.
    pub fn append(&mut self, sample: Sample) -> Result<(), WriteError> {
        self.samples.push(sample);
        self.dirty = true;
        self.flush()
    }

    /// Writes the buffer if anything is pending.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_vec_pretty(&self.samples)?;
        write_atomically(&self.path, &json)?;
        self.dirty = false;
        self.writes += 1;
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Successful writes so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

/// Replaces `path` with `contents` via temp file + fsync + rename. Creates the parent directory.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| WriteError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| WriteError::io(dir, e))?;
    tmp.write_all(contents)
        .map_err(|e| WriteError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| WriteError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| WriteError::io(path, e.error))?;
    Ok(())
}
