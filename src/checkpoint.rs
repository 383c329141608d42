use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Last fully scraped listing page, stored as a bare integer.
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns 0 when no page has completed yet.
    pub fn load(&self) -> Result<u32> {
        if !self.path.exists() {
            return Ok(0);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint {}", self.path.display()))?;
        let trimmed = raw.trim();
        trimmed
            .parse()
            .with_context(|| format!("Checkpoint {} holds {:?}, not a page number", self.path.display(), trimmed))
    }

    pub fn save(&self, page: u32) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, page.to_string())?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write checkpoint {}", self.path.display()))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_starts_at_zero() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("savepoint.txt"));
        assert_eq!(checkpoint.load().unwrap(), 0);
    }

    #[test]
    fn save_overwrites_previous_page() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("savepoint.txt"));
        checkpoint.save(3).unwrap();
        checkpoint.save(4).unwrap();
        assert_eq!(checkpoint.load().unwrap(), 4);
        assert_eq!(fs::read_to_string(dir.path().join("savepoint.txt")).unwrap(), "4");
        assert!(!dir.path().join("savepoint.txt.tmp").exists());
    }

    #[test]
    fn tolerates_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("savepoint.txt");
        fs::write(&path, "12\n").unwrap();
        assert_eq!(Checkpoint::new(path).load().unwrap(), 12);
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("savepoint.txt");
        fs::write(&path, "").unwrap();
        assert!(Checkpoint::new(path).load().is_err());
    }

    #[test]
    fn max_page_loads_unchanged() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("savepoint.txt"));
        checkpoint.save(u32::MAX).unwrap();
        assert_eq!(checkpoint.load().unwrap(), u32::MAX);
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("savepoint.txt");
        fs::write(&path, "page seven").unwrap();
        assert!(Checkpoint::new(path).load().is_err());
    }
}
