//! Pre-computed OCR results on the local filesystem

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ExpenseAnalysis, OcrEngine};
use crate::error::{Error, Result};

/// OCR engine that reads `<dir>/<key>.json`, falling back to `<dir>/<file name>.json`
pub struct DirectoryOcrEngine {
    dir: PathBuf,
}

impl DirectoryOcrEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create from `SAVR_OCR_DIR`
    pub fn from_env() -> Option<Self> {
        let dir = std::env::var("SAVR_OCR_DIR").ok()?;
        if dir.trim().is_empty() {
            return None;
        }
        Some(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, document_key: &str) -> Result<Vec<PathBuf>> {
        if document_key
            .split('/')
            .any(|segment| segment == ".." || segment == ".")
        {
            return Err(Error::InvalidInput(format!(
                "Invalid document key: {}",
                document_key
            )));
        }

        let trimmed = document_key.trim_start_matches('/');
        let mut paths = vec![self.dir.join(format!("{}.json", trimmed))];
        if let Some(file_name) = trimmed.rsplit('/').next() {
            let flat = self.dir.join(format!("{}.json", file_name));
            if !paths.contains(&flat) {
                paths.push(flat);
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl OcrEngine for DirectoryOcrEngine {
    fn name(&self) -> &str {
        "directory"
    }

    async fn analyze_expense(&self, document_key: &str) -> Result<ExpenseAnalysis> {
        for path in self.candidates(document_key)? {
            if path.is_file() {
                debug!(path = %path.display(), "Reading stored expense analysis");
                let content = fs::read_to_string(&path)?;
                return Ok(serde_json::from_str(&content)?);
            }
        }
        Err(Error::Ocr(format!(
            "No expense analysis for {} in {}",
            document_key,
            self.dir.display()
        )))
    }
}
