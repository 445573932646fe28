use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::MoveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub outcome: MoveOutcome,
}

impl MoveRecord {
    pub fn is_moved(&self) -> bool {
        self.outcome == MoveOutcome::Moved
    }
}

pub trait Relocator {
    /// Moves `source` into `destination_dir`, returning the new path.
    fn relocate(&self, source: &Path, destination_dir: &Path) -> Result<PathBuf, MoveError>;
}

/// Moves files with `rename`, falling back to copy + remove across
/// filesystems. When an archive root is set the source is copied there
/// first, while it still exists.
#[derive(Debug, Clone, Default)]
pub struct FileRelocator {
    archive_root: Option<PathBuf>,
}

impl FileRelocator {
    pub fn new(archive_root: Option<PathBuf>) -> Self {
        Self { archive_root }
    }

    fn archive(&self, source: &Path, name: &std::ffi::OsStr) {
        let Some(root) = &self.archive_root else {
            return;
        };
        let target = root.join(name);
        let result = if target.exists() {
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "archive copy already exists",
            ))
        } else {
            fs::create_dir_all(root).and_then(|_| fs::copy(source, &target))
        };
        match result {
            Ok(_) => debug!(source = %source.display(), archive = %target.display(), "archived"),
            Err(err) => warn!(
                source = %source.display(),
                archive = %target.display(),
                error = %err,
                "archive copy failed; moving anyway"
            ),
        }
    }
}

impl Relocator for FileRelocator {
    fn relocate(&self, source: &Path, destination_dir: &Path) -> Result<PathBuf, MoveError> {
        let name = source
            .file_name()
            .ok_or_else(|| MoveError::NoFileName(source.to_path_buf()))?;
        if !source.is_file() {
            return Err(MoveError::MissingSource(source.to_path_buf()));
        }
        fs::create_dir_all(destination_dir)?;
        let target = destination_dir.join(name);
        if target.exists() {
            return Err(MoveError::Collision(target));
        }
        self.archive(source, name);
        move_file(source, &target)?;
        Ok(target)
    }
}

fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    let rename_err = match fs::rename(source, target) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if !source.exists() {
        return Err(rename_err);
    }
    // cross-device rename; copy then remove the original
    if fs::copy(source, target).is_err() {
        let _ = fs::remove_file(target);
        return Err(rename_err);
    }
    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(target);
        return Err(err);
    }
    Ok(())
}
