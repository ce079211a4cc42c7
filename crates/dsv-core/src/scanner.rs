//! Directory scanner for discovering DSV files

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions scanned when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// Scan one or more directories for files with the given extensions.
///
/// Extensions are matched case-insensitively, without the leading dot.
/// An empty list means [`DEFAULT_EXTENSIONS`]. Results are sorted and
/// deduplicated; traversal errors are returned, not skipped.
pub fn scan_directory<P: AsRef<Path>, S: AsRef<str>>(roots: &[P], extensions: &[S]) -> Result<Vec<PathBuf>> {
    let wanted: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let mut found = BTreeSet::new();
    for root in roots {
        for entry in WalkDir::new(root.as_ref()).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| wanted.iter().any(|w| w.eq_ignore_ascii_case(ext)));
            if matches {
                found.insert(path.to_path_buf());
            }
        }
    }

    log::debug!("scanned {} root(s), found {} file(s)", roots.len(), found.len());
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        fs::write(nested.join("b.TSV"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = scan_directory(&[dir.path()], &[] as &[&str]).unwrap();
        assert_eq!(found, vec![dir.path().join("a.csv"), nested.join("b.TSV")]);

        let only_txt = scan_directory(&[dir.path()], &[".txt"]).unwrap();
        assert_eq!(only_txt, vec![dir.path().join("notes.txt")]);
    }

    #[test]
    fn test_scan_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(scan_directory(&[missing], &["csv"]).is_err());
    }

    #[test]
    fn test_overlapping_roots_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        let found = scan_directory(&[dir.path(), dir.path()], &["csv"]).unwrap();
        assert_eq!(found.len(), 1);
    }
}
