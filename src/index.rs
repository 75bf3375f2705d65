/*!
 * Tracked-path index
 *
 * An ordered set of workspace-relative paths the user has asked shard to
 * manage, stored one per line at `.shard/index`. The sync core only reads
 * it; `track`/`untrack` are the writers.
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::store::STORE_DIR;

const INDEX_FILE: &str = "index";

/// Newline-separated ordered set of tracked paths
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
}

impl Index {
    /// Index for a workspace (`<workspace>/.shard/index`)
    pub fn for_workspace(workspace: &Path) -> Self {
        Self {
            path: workspace.join(STORE_DIR).join(INDEX_FILE),
        }
    }

    /// Load the tracked paths in insertion order. Empty if the index is absent.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Add a path; returns false if it was already tracked
    pub fn add(&self, path: &str) -> Result<bool> {
        let mut entries = self.load()?;
        if entries.iter().any(|e| e == path) {
            return Ok(false);
        }
        entries.push(path.to_string());
        self.save(&entries)?;
        Ok(true)
    }

    /// Remove a path; returns false if it was not tracked
    pub fn remove(&self, path: &str) -> Result<bool> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|e| e != path);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn save(&self, entries: &[String]) -> Result<()> {
        let mut contents = entries.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use tempfile::tempdir;

    #[test]
    fn test_empty_when_absent() {
        let dir = tempdir().unwrap();
        let index = Index::for_workspace(dir.path());
        assert!(index.load().unwrap().is_empty());
    }

    #[test]
    fn test_add_preserves_order_and_dedupes() {
        let dir = tempdir().unwrap();
        LocalStore::for_workspace(dir.path()).init().unwrap();
        let index = Index::for_workspace(dir.path());

        assert!(index.add("models/big.bin").unwrap());
        assert!(index.add("data/corpus.bin").unwrap());
        assert!(!index.add("models/big.bin").unwrap());

        assert_eq!(
            index.load().unwrap(),
            vec!["models/big.bin".to_string(), "data/corpus.bin".to_string()]
        );
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        LocalStore::for_workspace(dir.path()).init().unwrap();
        let index = Index::for_workspace(dir.path());

        index.add("a.bin").unwrap();
        index.add("b.bin").unwrap();
        assert!(index.remove("a.bin").unwrap());
        assert!(!index.remove("a.bin").unwrap());
        assert_eq!(index.load().unwrap(), vec!["b.bin".to_string()]);
    }
}
