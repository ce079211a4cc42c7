//! Non-interactive runs of a rule file over many files

use crate::codec::{load_file, save_file};
use crate::error::{Error, Result};
use crate::options::{LoadOptions, SaveOptions};
use crate::rules::RuleFile;
use crate::scanner::scan_directory;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A batch file describing which files to transform and where to write them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    /// Root directories to scan
    pub roots: Vec<PathBuf>,
    /// File extensions to include; empty means csv and tsv
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Output directory for transformed files
    pub output_dir: PathBuf,
    /// Rule file to apply to every input
    pub rules: PathBuf,
    /// How inputs are parsed
    #[serde(default)]
    pub load: LoadOptions,
    /// How outputs are written; defaults to the input format
    #[serde(default)]
    pub save: Option<SaveOptions>,
}

impl BatchFile {
    /// Load a batch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the batch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).map_err(|e| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files that were written
    pub files_written: Vec<PathBuf>,
    /// Inputs that failed (input path, error message)
    pub errors: Vec<(PathBuf, String)>,
}

/// Run a batch: scan the roots, apply the rule file to each input, write outputs.
///
/// Per-file failures are collected into the report; only failures to read
/// the rule file, scan the roots or create the output directory abort the run.
pub fn run_batch(batch: &BatchFile) -> Result<BatchReport> {
    let rules = RuleFile::load(&batch.rules)?;
    let pipeline = rules.pipeline();
    let save = batch
        .save
        .clone()
        .unwrap_or_else(|| SaveOptions::from(&batch.load));

    let inputs = scan_directory(&batch.roots, &batch.extensions)?;
    fs::create_dir_all(&batch.output_dir).map_err(|e| Error::FileWrite {
        path: batch.output_dir.clone(),
        source: e,
    })?;

    info!(
        "batch '{}': {} rules over {} files",
        rules.name,
        pipeline.len(),
        inputs.len()
    );

    let mut report = BatchReport::default();
    for input in inputs {
        let output = output_path(&batch.roots, &input, &batch.output_dir);
        let result = load_file(&input, &batch.load).and_then(|table| {
            let table = pipeline.run_all(&table).map_err(|f| {
                Error::rule(f.rule, format!("rule {} of the pipeline: {}", f.index, f.error))
            })?;
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::FileWrite {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            save_file(&output, &table, &save)
        });

        match result {
            Ok(()) => report.files_written.push(output),
            Err(e) => {
                warn!("{}: {}", input.display(), e);
                report.errors.push((input, e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Mirror `input`'s location under its root into `output_dir`
fn output_path(roots: &[PathBuf], input: &Path, output_dir: &Path) -> PathBuf {
    let relative = roots
        .iter()
        .find_map(|root| input.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .or_else(|| input.file_name().map(PathBuf::from))
        .unwrap_or_else(|| input.to_path_buf());
    output_dir.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_keeps_subdirectories() {
        let roots = vec![PathBuf::from("/data/in")];
        let out = output_path(&roots, Path::new("/data/in/sub/a.csv"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/sub/a.csv"));
    }

    #[test]
    fn test_batch_file_defaults() {
        let json = r#"{ "roots": ["in"], "output_dir": "out", "rules": "rules.json" }"#;
        let batch: BatchFile = serde_json::from_str(json).unwrap();
        assert!(batch.extensions.is_empty());
        assert_eq!(batch.load, LoadOptions::default());
        assert!(batch.save.is_none());
    }
}
