//! Config resolver: walks a file's ancestry for config and ignore files.
//!
//! At each directory the candidate list is checked in order with a
//! case-insensitive name match. Plain candidates win immediately; a manifest
//! candidate only wins when it carries its section key, otherwise the walk
//! continues upward. Nothing outside the boundary (home) directory is ever
//! listed or read.

use std::path::{Path, PathBuf};

use lintel_types::CandidateFile;

use crate::fs::{Filesystem, OsFilesystem, normalize_path};

/// Nearest match only, or every match up to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Nearest,
    Cascade,
}

pub struct ConfigResolver<F = OsFilesystem> {
    fs: F,
    /// Search boundary. `None` disables discovery entirely.
    home: Option<PathBuf>,
    config_candidates: Vec<CandidateFile>,
    ignore_candidates: Vec<CandidateFile>,
}

impl<F: Filesystem> ConfigResolver<F> {
    pub fn new(
        fs: F,
        home: Option<PathBuf>,
        config_candidates: Vec<CandidateFile>,
        ignore_candidates: Vec<CandidateFile>,
    ) -> Self {
        Self {
            fs,
            home: home.map(|h| normalize_path(&h)),
            config_candidates,
            ignore_candidates,
        }
    }

    /// Nearest config file for `path`.
    pub fn find_config(&self, path: &Path) -> Option<PathBuf> {
        self.find(path, &self.config_candidates)
    }

    /// Nearest ignore file for `path`.
    pub fn find_ignore(&self, path: &Path) -> Option<PathBuf> {
        self.find(path, &self.ignore_candidates)
    }

    /// Config files for `path` in the given mode, nearest first.
    pub fn find_configs(&self, path: &Path, mode: SearchMode) -> Vec<PathBuf> {
        match mode {
            SearchMode::Nearest => self.find_config(path).into_iter().collect(),
            SearchMode::Cascade => self.find_all(path, &self.config_candidates),
        }
    }

    fn find(&self, path: &Path, candidates: &[CandidateFile]) -> Option<PathBuf> {
        let start = self.start_dir(path)?;
        self.find_from(&start, candidates)
    }

    fn find_all(&self, path: &Path, candidates: &[CandidateFile]) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let Some(mut start) = self.start_dir(path) else {
            return found;
        };
        while let Some(hit) = self.find_from(&start, candidates) {
            // Resume above the directory that held the match.
            let next = hit.parent().and_then(Path::parent).map(Path::to_path_buf);
            found.push(hit);
            match next {
                Some(next) if next != start => start = next,
                _ => break,
            }
        }
        found
    }

    /// Directory the walk starts from, or `None` when `path` lies outside
    /// the boundary. The boundary check happens before any filesystem access.
    fn start_dir(&self, path: &Path) -> Option<PathBuf> {
        let home = self.home.as_deref()?;
        let normalized = normalize_path(path);
        if !normalized.starts_with(home) {
            tracing::debug!(path = %path.display(), "Path outside search boundary");
            return None;
        }
        if self.fs.is_dir(&normalized) {
            Some(normalized)
        } else {
            normalized.parent().map(Path::to_path_buf)
        }
    }

    fn find_from(&self, start: &Path, candidates: &[CandidateFile]) -> Option<PathBuf> {
        let home = self.home.as_deref()?;
        if !start.starts_with(home) {
            return None;
        }
        let mut dir = start;
        loop {
            if let Some(hit) = self.match_in(dir, candidates) {
                return Some(hit);
            }
            if dir == home {
                return None;
            }
            dir = dir.parent()?;
        }
    }

    fn match_in(&self, dir: &Path, candidates: &[CandidateFile]) -> Option<PathBuf> {
        let entries = match self.fs.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!(dir = %dir.display(), "Skipping unreadable directory: {e}");
                return None;
            }
        };

        for candidate in candidates {
            let Some(entry) = entries
                .iter()
                .find(|e| e.eq_ignore_ascii_case(candidate.name()))
            else {
                continue;
            };
            let path = dir.join(entry);
            match candidate.section_key() {
                None => return Some(path),
                Some(key) if self.manifest_has_section(&path, key) => return Some(path),
                Some(_) => {}
            }
        }
        None
    }

    /// Unreadable or malformed manifests count as "no section".
    fn manifest_has_section(&self, path: &Path, key: &str) -> bool {
        let text = match self.fs.read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Cannot read manifest: {e}");
                return false;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => value.get(key).is_some(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Malformed manifest: {e}");
                false
            }
        }
    }
}
