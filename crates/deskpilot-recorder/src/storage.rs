//! Workflow storage - one pretty-printed JSON file per workflow
//!
//! The file name is the workflow id: `<sanitized name>_<YYYYmmdd_HHMMSS>.json`,
//! with `_<n>` appended when two workflows land in the same second.

use crate::events::{Workflow, WorkflowSummary};
use deskpilot_core::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

pub struct WorkflowStorage {
    dir: PathBuf,
}

impl WorkflowStorage {
    /// `$HOME/.deskpilot/workflows`
    pub fn new() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::persistence("HOME not set"))?;
        Self::with_dir(PathBuf::from(home).join(".deskpilot").join("workflows"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::persistence(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    /// Write a new file for `workflow` and return its id. Never overwrites.
    pub fn save(&self, workflow: &Workflow) -> Result<String> {
        let ts = workflow.created_at.format("%Y%m%d_%H%M%S");
        let stem = format!("{}_{}", sanitize(&workflow.name), ts);

        let mut attempt = 0u32;
        let (id, file) = loop {
            let id = if attempt == 0 {
                format!("{}.{}", stem, EXTENSION)
            } else {
                format!("{}_{}.{}", stem, attempt, EXTENSION)
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&id))
            {
                Ok(file) => break (id, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(Error::persistence(format!("Failed to create {}: {}", id, e)))
                }
            }
        };

        let mut w = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut w, workflow)
            .map_err(std::io::Error::from)
            .and_then(|_| w.flush());
        if let Err(e) = written {
            let _ = fs::remove_file(self.dir.join(&id));
            return Err(Error::persistence(format!("Failed to write {}: {}", id, e)));
        }
        debug!(id = %id, events = workflow.actions.len(), "workflow saved");
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<Workflow> {
        let path = self.resolve(id)?;
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::not_found(format!("workflow {}", id)))
            }
            Err(e) => return Err(Error::persistence(format!("Failed to open {}: {}", id, e))),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::persistence(format!("Workflow {} is corrupt: {}", id, e)))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.resolve(id).map(|p| p.is_file()).unwrap_or(false)
    }

    /// All readable workflows, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::persistence(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            match self.load(&id) {
                Ok(w) => out.push(WorkflowSummary {
                    id,
                    name: w.name,
                    created_at: w.created_at,
                    actions_count: w.actions.len(),
                    duration: w.duration,
                }),
                Err(e) => warn!("skipping {}: {}", id, e),
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.resolve(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::not_found(format!("workflow {}", id)))
            }
            Err(e) => Err(Error::persistence(format!("Failed to delete {}: {}", id, e))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Map an id to a file inside the storage dir. Directory components
    /// are dropped (`workflows/a.json` -> `a.json`) and the extension is optional.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let name = Path::new(id.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::not_found(format!("workflow {:?}", id)))?;
        let name = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{}.{}", name, EXTENSION)
        };
        Ok(self.dir.join(name))
    }
}

/// Keep letters, digits, `-` and `_`; spaces become `_`; everything else is dropped.
pub fn sanitize(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    if cleaned.is_empty() {
        "workflow".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_names() {
        assert_eq!(sanitize("My Login Flow"), "My_Login_Flow");
        assert_eq!(sanitize("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize("a-b_c"), "a-b_c");
        assert_eq!(sanitize("  ?? "), "workflow");
    }

    #[test]
    fn resolve_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let s = WorkflowStorage::with_dir(dir.path()).unwrap();
        assert_eq!(s.resolve("workflows/a.json").unwrap(), dir.path().join("a.json"));
        assert_eq!(s.resolve("a").unwrap(), dir.path().join("a.json"));
        assert_eq!(s.resolve("../../x.json").unwrap(), dir.path().join("x.json"));
        assert!(s.resolve("..").is_err());
    }
}
