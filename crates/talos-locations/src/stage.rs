//! Staged file writes
//!
//! Locations read and write files only through [`FileStage`]. A
//! [`StagingBuffer`] keeps every staged edit in memory, so several locations
//! touching the same file see each other's edits, and writes the changed
//! files to disk only when [`StagingBuffer::flush`] or
//! [`StagingBuffer::commit`] is called.
//!
//! Offsets recorded at scan time refer to the file as it was first read.
//! The buffer keeps every splice it applied so [`FileStage::locate`] can map
//! such offsets onto the current content, even across several flushes.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

/// File access used while staging an edit
pub trait FileStage {
    /// Current content of a repository-relative file
    fn read(&mut self, path: &Utf8Path) -> Result<String>;

    /// Replace the whole content of a repository-relative file.
    ///
    /// Spans recorded before this call can no longer be located.
    fn write(&mut self, path: &Utf8Path, content: String) -> Result<()>;

    /// Replace `start..end` of the current content with `replacement`
    fn replace(&mut self, path: &Utf8Path, start: usize, end: usize, replacement: &str)
        -> Result<()>;

    /// Where `start..end` of the file as first read sits in the current
    /// content, or `None` when an earlier edit overlapped it
    fn locate(&self, path: &Utf8Path, start: usize, end: usize) -> Option<(usize, usize)>;
}

/// One applied edit, in the coordinates of the content it was applied to
#[derive(Debug, Clone, Copy)]
struct Splice {
    start: usize,
    end: usize,
    len: usize,
}

#[derive(Debug, Clone)]
struct StagedFile {
    /// Content on disk
    original: String,
    current: String,
    splices: Vec<Splice>,
}

/// In-memory staging area over a repository working tree.
///
/// Cloning the buffer gives a cheap checkpoint: stage into the clone and
/// keep it only if everything staged.
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    root: Utf8PathBuf,
    files: BTreeMap<Utf8PathBuf, StagedFile>,
}

impl StagingBuffer {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
        }
    }

    fn load(&mut self, path: &Utf8Path) -> Result<&mut StagedFile> {
        if !self.files.contains_key(path) {
            let full = self.root.join(path);
            let content = fs::read_to_string(&full).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::conflict(path, "file no longer exists")
                } else {
                    Error::Io(e)
                }
            })?;
            self.files.insert(
                path.to_owned(),
                StagedFile {
                    original: content.clone(),
                    current: content,
                    splices: Vec::new(),
                },
            );
        }
        self.files
            .get_mut(path)
            .ok_or_else(|| Error::invalid_location(path, "staged file vanished"))
    }

    /// Files whose staged content differs from disk
    pub fn changed_files(&self) -> Vec<&Utf8Path> {
        self.files
            .iter()
            .filter(|(_, f)| f.original != f.current)
            .map(|(p, _)| p.as_path())
            .collect()
    }

    /// Write every changed file to disk and write nothing more afterwards.
    pub fn commit(mut self) -> Result<usize> {
        self.flush()
    }

    /// Write every file changed since the last flush to disk. Staged content
    /// and the splice history are kept, so the buffer can go on staging.
    ///
    /// Each file is written to a sibling temporary file and renamed over the
    /// original, so a reader never observes a half-written file.
    pub fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        for (path, file) in self.files.iter_mut() {
            if file.original == file.current {
                continue;
            }
            let full = self.root.join(path);
            let dir = full
                .parent()
                .ok_or_else(|| Error::invalid_location(path, "file has no parent directory"))?;

            let mut temp = NamedTempFile::new_in(dir)?;
            temp.write_all(file.current.as_bytes())?;
            if let Ok(metadata) = fs::metadata(&full) {
                temp.as_file().set_permissions(metadata.permissions())?;
            }
            temp.persist(&full).map_err(|e| Error::Io(e.error))?;
            file.original.clone_from(&file.current);

            debug!("Wrote {}", full);
            written += 1;
        }
        Ok(written)
    }
}

impl FileStage for StagingBuffer {
    fn read(&mut self, path: &Utf8Path) -> Result<String> {
        Ok(self.load(path)?.current.clone())
    }

    fn write(&mut self, path: &Utf8Path, content: String) -> Result<()> {
        let file = self.load(path)?;
        let whole = Splice {
            start: 0,
            end: file.current.len(),
            len: content.len(),
        };
        file.current = content;
        file.splices.push(whole);
        Ok(())
    }

    fn replace(
        &mut self,
        path: &Utf8Path,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> Result<()> {
        let file = self.load(path)?;
        if file.current.get(start..end).is_none() {
            return Err(Error::conflict(
                path,
                format!("{}..{} is outside the file", start, end),
            ));
        }
        file.current.replace_range(start..end, replacement);
        file.splices.push(Splice {
            start,
            end,
            len: replacement.len(),
        });
        Ok(())
    }

    fn locate(&self, path: &Utf8Path, start: usize, end: usize) -> Option<(usize, usize)> {
        let Some(file) = self.files.get(path) else {
            return Some((start, end));
        };
        let (mut start, mut end) = (start, end);
        for splice in &file.splices {
            if splice.end <= start {
                start = start + splice.len - (splice.end - splice.start);
                end = end + splice.len - (splice.end - splice.start);
            } else if splice.start < end {
                return None;
            }
        }
        Some((start, end))
    }
}
