use crate::models::{MessageRecord, ProjectRecord, SessionRecord};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only view over the OpenCode storage tree:
/// `session/<projectID>/ses_*.json`, `message/<sessionID>/msg_*.json`,
/// `project/*.json`.
pub struct Corpus {
    root: PathBuf,
}

pub struct Snapshot {
    pub sessions: Vec<SessionRecord>,
    pub messages: Vec<MessageRecord>,
    pub projects: Vec<ProjectRecord>,
    /// Files that existed but failed to parse or validate.
    pub skipped: usize,
}

/// `$RECAP_DATA_DIR`, else `$XDG_DATA_HOME/opencode/storage`,
/// else `~/.local/share/opencode/storage`.
pub fn default_root() -> PathBuf {
    if let Ok(dir) = std::env::var("RECAP_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("opencode").join("storage");
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/share/opencode/storage")
}

impl Corpus {
    /// `Ok(None)` means the storage root does not exist — "no data", not an
    /// error. A root that exists but cannot be enumerated fails loudly.
    pub fn open() -> Result<Option<Corpus>> {
        Corpus::at(default_root())
    }

    pub fn at(root: PathBuf) -> Result<Option<Corpus>> {
        if !root.exists() {
            return Ok(None);
        }
        fs::read_dir(&root)
            .with_context(|| format!("cannot enumerate storage root {}", root.display()))?;
        Ok(Some(Corpus { root }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self) -> Result<Snapshot> {
        let (sessions, s0) = self.list_sessions()?;
        let (messages, s1) = self.list_messages()?;
        let (projects, s2) = self.list_projects()?;
        Ok(Snapshot {
            sessions,
            messages,
            projects,
            skipped: s0 + s1 + s2,
        })
    }

    /// All sessions, sorted by `(created, id)`. The second element counts
    /// files that were present but unparsable.
    pub fn list_sessions(&self) -> Result<(Vec<SessionRecord>, usize)> {
        let files = json_files(&self.root.join("session"), true);
        let (mut records, skipped) = parse_files::<SessionRecord>(&files);
        records.sort_by(|a, b| a.time.created.cmp(&b.time.created).then_with(|| a.id.cmp(&b.id)));
        Ok((records, skipped))
    }

    /// All messages across every session, sorted by `(created, id)` so the
    /// aggregation pass sees a deterministic stream (ranking and
    /// most-active-day tie-breaks depend on encounter order).
    pub fn list_messages(&self) -> Result<(Vec<MessageRecord>, usize)> {
        let files = json_files(&self.root.join("message"), true);
        let (mut records, skipped) = parse_files::<MessageRecord>(&files);
        records.sort_by(|a, b| a.time.created.cmp(&b.time.created).then_with(|| a.id.cmp(&b.id)));
        Ok((records, skipped))
    }

    pub fn list_projects(&self) -> Result<(Vec<ProjectRecord>, usize)> {
        let files = json_files(&self.root.join("project"), false);
        let (mut records, skipped) = parse_files::<ProjectRecord>(&files);
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((records, skipped))
    }
}

/// Enumerate `*.json` leaves under `dir`, optionally descending one level of
/// grouping subdirectories. A missing or unreadable directory contributes
/// nothing — only the storage root itself is allowed to fail loudly.
fn json_files(dir: &Path, grouped: bool) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if !grouped {
                continue;
            }
            let Ok(sub) = fs::read_dir(&path) else {
                continue;
            };
            files.extend(
                sub.flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|e| e == "json")),
            );
        } else if path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
    files
}

/// Parse every file concurrently; each read or parse failure is a skip, never
/// an abort. Ordering of the result is not meaningful — callers sort.
fn parse_files<T: DeserializeOwned + Send>(files: &[PathBuf]) -> (Vec<T>, usize) {
    let parsed: Vec<Option<T>> = files
        .par_iter()
        .map(|path| {
            let bytes = fs::read(path).ok()?;
            serde_json::from_slice(&bytes).ok()
        })
        .collect();
    let skipped = parsed.iter().filter(|r| r.is_none()).count();
    (parsed.into_iter().flatten().collect(), skipped)
}
