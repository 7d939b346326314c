//! Document Repository (C5): read-only access to the active snapshot's
//! files, with path-safety enforced on every lookup.

use std::path::{Component, Path, PathBuf};

use crate::snapshot::directory_tree_sha;

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    root: PathBuf,
}

impl DocumentRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lists every regular file under `root`, as paths relative to it.
    pub fn list_documents(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        walk(&self.root, &self.root, &mut out)?;
        out.sort();
        Ok(out)
    }

    /// Reads a file's raw bytes. Rejects any `relative_path` that escapes
    /// `root` via `..` or an absolute component.
    pub fn read_file(&self, relative_path: &str) -> std::io::Result<Vec<u8>> {
        let resolved = self.resolve(relative_path)?;
        std::fs::read(resolved)
    }

    /// Reads and JSON-parses a document.
    pub fn read_document(&self, relative_path: &str) -> std::io::Result<serde_json::Value> {
        let bytes = self.read_file(relative_path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// The digest of `{(relativePath, mtimeNs)}` over the whole tree,
    /// used as the cache's generation token.
    pub fn directory_hash(&self) -> std::io::Result<String> {
        directory_tree_sha(&self.root)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    /// Parses every `.json` file directly under `documents_subdirectory`,
    /// keyed by its file stem. Files that fail to parse are skipped rather
    /// than failing the whole listing — one malformed document shouldn't
    /// take down the well-known endpoint.
    pub fn load_documents(
        &self,
        documents_subdirectory: &str,
    ) -> std::io::Result<Vec<(String, serde_json::Value)>> {
        let docs_root = self.resolve(documents_subdirectory)?;
        if !docs_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in std::fs::read_dir(&docs_root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let Ok(value) = serde_json::from_slice(&bytes) else {
                continue;
            };
            out.push((format!("{}.json", stem), value));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Resolves `relative_path` against `root`, rejecting any path that
    /// would escape it. Does not require the target to exist.
    fn resolve(&self, relative_path: &str) -> std::io::Result<PathBuf> {
        let candidate = Path::new(relative_path);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "path escapes the snapshot root",
            ));
        }
        Ok(self.root.join(candidate))
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}
