use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, SpecgraphError};

/// Key-value access to the files of one graph directory. Paths are relative
/// to that directory and use `/` separators.
pub trait Storage: Send + Sync {
    fn read(&self, rel: &str) -> Result<Vec<u8>>;

    fn write(&self, rel: &str, bytes: &[u8]) -> Result<()>;

    /// Deleting a missing file is not an error.
    fn delete(&self, rel: &str) -> Result<()>;

    fn exists(&self, rel: &str) -> Result<bool>;

    /// Relative paths matching a glob pattern, sorted.
    fn list(&self, pattern: &str) -> Result<Vec<String>>;
}

/// Pretty JSON with a trailing newline.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut body = serde_json::to_string_pretty(value)
        .map_err(|e| SpecgraphError::json("<document>", e))?;
    body.push('\n');
    Ok(body.into_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// --- Filesystem ---

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `rel` inside the root, rejecting anything that climbs out of it.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        let mut resolved = self.root.clone();
        let mut depth: usize = 0;
        for component in rel_path.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir if depth > 0 => {
                    resolved.pop();
                    depth -= 1;
                }
                _ => return Err(SpecgraphError::PathEscape(rel.to_string())),
            }
        }
        Ok(resolved)
    }
}

impl Storage for FsStorage {
    fn read(&self, rel: &str) -> Result<Vec<u8>> {
        let path = self.resolve(rel)?;
        fs::read(&path).map_err(|e| SpecgraphError::io(path, e))
    }

    /// Temp file + rename so readers never observe a half-written document.
    fn write(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SpecgraphError::io(parent, e))?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp, bytes).map_err(|e| SpecgraphError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| SpecgraphError::io(&path, e))
    }

    fn delete(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SpecgraphError::io(path, e)),
        }
    }

    fn exists(&self, rel: &str) -> Result<bool> {
        Ok(self.resolve(rel)?.exists())
    }

    fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let full = self.root.join(pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .map_err(|e| SpecgraphError::invalid_index(format!("bad pattern {}: {}", pattern, e)))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry while listing {}: {}", pattern, e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&self.root) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                found.push(rel);
            }
        }
        found.sort();
        Ok(found)
    }
}

// --- In-memory ---

#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, rel: &str) -> Result<Vec<u8>> {
        self.lock().get(rel).cloned().ok_or_else(|| {
            SpecgraphError::io(
                rel,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn write(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.lock().insert(rel.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, rel: &str) -> Result<()> {
        self.lock().remove(rel);
        Ok(())
    }

    fn exists(&self, rel: &str) -> Result<bool> {
        Ok(self.lock().contains_key(rel))
    }

    fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| SpecgraphError::invalid_index(format!("bad pattern {}: {}", pattern, e)))?;
        Ok(self
            .lock()
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }
}
