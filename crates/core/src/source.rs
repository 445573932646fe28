use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{NotefoldError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

pub trait DocumentSource {
    /// Candidate documents, in a stable order.
    fn list(&self) -> Result<Vec<PathBuf>>;
    fn read(&self, path: &Path) -> Result<String>;
}

/// Regular files directly inside one directory whose lowercased name matches
/// one of the configured glob patterns.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    patterns: Vec<Pattern>,
}

impl DirectorySource {
    /// `patterns` is a comma-separated list such as `"*.md,*.txt"`.
    pub fn new(dir: impl Into<PathBuf>, patterns: &str) -> Result<Self> {
        let patterns = patterns
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::new(&p.to_lowercase())
                    .map_err(|err| NotefoldError::Config(format!("bad pattern {p:?}: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;
        if patterns.is_empty() {
            return Err(NotefoldError::Config("no file patterns given".to_string()));
        }
        Ok(Self {
            dir: dir.into(),
            patterns,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.patterns.iter().any(|p| p.matches(&name))
    }
}

impl DocumentSource for DirectorySource {
    fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|source| NotefoldError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(decode_text(bytes))
    }
}

/// UTF-8 when valid, otherwise Latin-1 (each byte is its own code point).
pub fn decode_text(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
