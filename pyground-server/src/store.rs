//! Directory-backed named script store

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid script name")]
    InvalidName,

    #[error("script not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ScriptStore {
    dir: PathBuf,
}

impl ScriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Save a script under a sanitized name; returns the stored path
    pub fn save(&self, name: &str, code: &str) -> Result<PathBuf, StoreError> {
        let file = sanitize(name)?;
        let path = self.dir.join(file);
        fs::write(&path, code)?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<String, StoreError> {
        let file = sanitize(name)?;
        let path = self.dir.join(&file);
        if !path.exists() {
            return Err(StoreError::NotFound(file));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Stored script names, sorted
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".py") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Reduce a user-supplied name to a safe `.py` basename
fn sanitize(name: &str) -> Result<String, StoreError> {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(StoreError::InvalidName)?;
    if base.is_empty() || base.starts_with('.') {
        return Err(StoreError::InvalidName);
    }
    Ok(if base.ends_with(".py") {
        base.to_string()
    } else {
        format!("{base}.py")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ScriptStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ScriptStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, store) = store();
        store.save("demo", "print(1)").unwrap();
        assert_eq!(store.load("demo").unwrap(), "print(1)");
        assert_eq!(store.load("demo.py").unwrap(), "print(1)");
    }

    #[test]
    fn test_py_suffix_is_enforced() {
        let (_dir, store) = store();
        let path = store.save("plain", "x = 1").unwrap();
        assert!(path.to_string_lossy().ends_with("plain.py"));
    }

    #[test]
    fn test_traversal_is_reduced_to_basename() {
        let (dir, store) = store();
        let path = store.save("../../escape", "x = 1").unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().ends_with("escape.py"));
    }

    #[test]
    fn test_hidden_and_empty_names_are_rejected() {
        let (_dir, store) = store();
        assert!(matches!(store.save("..", "x"), Err(StoreError::InvalidName)));
        assert!(matches!(
            store.save(".hidden", "x"),
            Err(StoreError::InvalidName)
        ));
        assert!(matches!(store.save("/", "x"), Err(StoreError::InvalidName)));
    }

    #[test]
    fn test_list_is_sorted_and_filtered() {
        let (dir, store) = store();
        store.save("b_script", "x = 1").unwrap();
        store.save("a_script", "x = 2").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list().unwrap(), vec!["a_script.py", "b_script.py"]);
    }

    #[test]
    fn test_missing_script_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.load("ghost"), Err(StoreError::NotFound(_))));
    }
}
