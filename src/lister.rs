//! Directory listing boundary used during discovery.

use std::path::{Path, PathBuf};

/// Expands glob-style patterns into matching file paths.
pub trait DirectoryLister: Send + Sync {
    fn list(&self, pattern: &str) -> Vec<PathBuf>;
}

/// Filesystem lister backed by the `glob` crate. Results are sorted.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobLister;

impl DirectoryLister for GlobLister {
    fn list(&self, pattern: &str) -> Vec<PathBuf> {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Invalid glob pattern '{}': {}", pattern, e);
                return Vec::new();
            }
        };

        let mut found: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .collect();
        found.sort();
        found
    }
}

/// Build a pattern under `dir`, escaping glob metacharacters in the directory.
pub fn pattern_in(dir: &Path, suffix: &str) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}", escaped.trim_end_matches('/'), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_glob_lister_sorted() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("a.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("c.txt"), "").unwrap();

        let found = GlobLister.list(&pattern_in(temp_dir.path(), "*.yaml"));
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml"]);
    }

    #[test]
    fn test_pattern_escapes_directory() {
        let pattern = pattern_in(Path::new("/srv/site[1]"), "*/templates/template.*");
        assert_eq!(pattern, "/srv/site[[]1[]]/*/templates/template.*");
    }
}
