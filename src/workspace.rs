use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::model::{FileChange, FileRole};
use crate::util::{list_files_with_extension, sha256_hex};

#[derive(Debug)]
struct Document {
    role: FileRole,
    original: String,
    text: String,
}

#[derive(Debug, Default)]
pub struct Workspace {
    content: Vec<PathBuf>,
    outline: Option<PathBuf>,
    entities: Option<PathBuf>,
    docs: BTreeMap<PathBuf, Document>,
}

impl Workspace {
    pub fn add_content_dir(&mut self, dir: &Path, exclude: Option<&Path>) -> Result<()> {
        let excluded = exclude.map(comparable_path);

        for path in list_files_with_extension(dir, "xml")? {
            if excluded.as_ref() == Some(&comparable_path(&path)) {
                continue;
            }
            self.insert(&path, FileRole::Content)?;
            self.content.push(path);
        }

        if self.content.is_empty() {
            bail!("no .xml content files found in {}", dir.display());
        }

        info!(dir = %dir.display(), files = self.content.len(), "loaded content files");
        Ok(())
    }

    pub fn add_outline(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            bail!("outline file not found: {}", path.display());
        }
        self.insert(path, FileRole::Outline)?;
        self.outline = Some(path.to_path_buf());
        Ok(())
    }

    pub fn add_entities(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            bail!("entity file not found: {}", path.display());
        }
        self.insert(path, FileRole::Entities)?;
        self.entities = Some(path.to_path_buf());
        Ok(())
    }

    fn insert(&mut self, path: &Path, role: FileRole) -> Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        debug!(path = %path.display(), role = role.as_str(), bytes = text.len(), "loaded file");
        self.docs.insert(
            path.to_path_buf(),
            Document {
                role,
                original: text.clone(),
                text,
            },
        );
        Ok(())
    }

    pub fn content_paths(&self) -> Vec<PathBuf> {
        self.content.clone()
    }

    pub fn outline_path(&self) -> Result<PathBuf> {
        self.outline
            .clone()
            .context("no outline file loaded for this pass")
    }

    pub fn entities_path(&self) -> Option<PathBuf> {
        self.entities.clone()
    }

    pub fn text(&self, path: &Path) -> Result<&str> {
        self.docs
            .get(path)
            .map(|doc| doc.text.as_str())
            .with_context(|| format!("file not loaded: {}", path.display()))
    }

    pub fn replace(&mut self, path: &Path, text: String) -> Result<()> {
        let doc = self
            .docs
            .get_mut(path)
            .with_context(|| format!("file not loaded: {}", path.display()))?;
        doc.text = text;
        Ok(())
    }

    #[cfg(test)]
    pub fn is_modified(&self, path: &Path) -> bool {
        self.docs
            .get(path)
            .map(|doc| doc.text != doc.original)
            .unwrap_or(false)
    }

    pub fn flush(&mut self, dry_run: bool) -> Result<Vec<FileChange>> {
        let mut changes = Vec::new();

        for (path, doc) in &mut self.docs {
            if doc.text == doc.original {
                continue;
            }

            if !dry_run {
                fs::write(path, &doc.text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "rewrote file");
            }

            changes.push(FileChange {
                path: path.display().to_string(),
                role: doc.role,
                sha256_before: sha256_hex(doc.original.as_bytes()),
                sha256_after: sha256_hex(doc.text.as_bytes()),
                bytes_before: doc.original.len(),
                bytes_after: doc.text.len(),
                written: !dry_run,
            });

            if !dry_run {
                doc.original = doc.text.clone();
            }
        }

        Ok(changes)
    }
}

fn comparable_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
