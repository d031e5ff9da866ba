//! Input resolution: a user-supplied path becomes one PDF or a sorted list of
//! PDFs discovered under a directory.
//!
//! Validation happens before any output directory is touched, so a bad path
//! aborts the run without side effects.

use crate::error::TriageError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the user pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    File(PathBuf),
    /// Every PDF under the directory, recursively, in sorted order.
    Directory { root: PathBuf, files: Vec<PathBuf> },
}

/// Resolve `path` to a single validated PDF or a directory of PDFs.
pub fn resolve_input(path: &Path) -> Result<ResolvedInput, TriageError> {
    if !path.exists() {
        return Err(TriageError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if path.is_dir() {
        let files = discover_pdfs(path)?;
        if files.is_empty() {
            return Err(TriageError::NoPdfFiles {
                path: path.to_path_buf(),
            });
        }
        debug!("Found {} PDFs under {}", files.len(), path.display());
        return Ok(ResolvedInput::Directory {
            root: path.to_path_buf(),
            files,
        });
    }
    validate_pdf(path)?;
    Ok(ResolvedInput::File(path.to_path_buf()))
}

/// `true` for a `.pdf` extension in any case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Check that `path` is a readable file with a `.pdf` extension and `%PDF` magic.
pub fn validate_pdf(path: &Path) -> Result<(), TriageError> {
    if !path.is_file() {
        return Err(TriageError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if !has_pdf_extension(path) {
        return Err(TriageError::NotAPdf {
            path: path.to_path_buf(),
        });
    }

    let mut f = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TriageError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(TriageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(TriageError::NotAPdf {
            path: path.to_path_buf(),
        });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(())
}

/// Recursively list `*.pdf` files under `dir`, sorted by path.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, TriageError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => TriageError::PermissionDenied {
                path: current.clone(),
            },
            _ => TriageError::Internal(format!("read_dir {}: {}", current.display(), e)),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_pdf_extension(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}
