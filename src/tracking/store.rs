use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flat file holding one line of `;`-terminated identifiers per priority
/// bucket. Loaded at the start of a cycle and replaced whole at the end.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored line. A missing file is created empty.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::File::create(&self.path)
                .with_context(|| format!("Failed to create {}", self.path.display()))?;
            tracing::info!(path = %self.path.display(), "Created empty state file");
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(contents
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect())
    }

    /// Replace the file with `lines`, one per line. Written to a sibling
    /// temporary file first and renamed over the target.
    pub fn save(&self, lines: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp_path = self.tmp_path();
        if let Err(e) = self.replace_with(&tmp_path, lines) {
            // A directory at the temp path is not ours to remove.
            if tmp_path.is_file() {
                let _ = std::fs::remove_file(&tmp_path);
            }
            return Err(e);
        }
        tracing::info!(path = %self.path.display(), buckets = lines.len(), "State file saved");
        Ok(())
    }

    fn replace_with(&self, tmp_path: &Path, lines: &[String]) -> Result<()> {
        {
            let mut file = std::fs::File::create(tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            for line in lines {
                writeln!(file, "{line}")
                    .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
            }
            file.sync_all()
                .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        }
        std::fs::rename(tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to replace {} with {}",
                self.path.display(),
                tmp_path.display()
            )
        })?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = format!(
            ".{}.tmp-{}",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("state"),
            std::process::id()
        );
        match self.path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }
}
