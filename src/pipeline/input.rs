//! Input resolution: validate the local PDF and name the paper after it.
//!
//! We validate the PDF magic bytes (`%PDF`) before returning so callers get a
//! meaningful error rather than an opaque upload or pdfium failure later on.

use crate::error::Paper2PostError;
use chrono::NaiveDate;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub path: PathBuf,
    /// File stem, used as the post slug, `paper_id` and asset directory name.
    pub paper_name: String,
}

/// Resolve a user-supplied path to a readable PDF.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<ResolvedInput, Paper2PostError> {
    let path = input.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Paper2PostError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Paper2PostError::PermissionDenied { path });
        }
        Err(_) => return Err(Paper2PostError::FileNotFound { path }),
    };

    // Short files are padded with zeros and fail the check below.
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    if &magic != b"%PDF" {
        return Err(Paper2PostError::NotAPdf { path, magic });
    }

    let paper_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Paper2PostError::InvalidInput {
            input: path.display().to_string(),
        })?;

    debug!("Resolved local PDF: {} (paper '{}')", path.display(), paper_name);
    Ok(ResolvedInput { path, paper_name })
}

/// Post location relative to the site root: `_posts/<date>-<paper_name>.markdown`.
pub fn post_relative_path(date: NaiveDate, paper_name: &str) -> PathBuf {
    Path::new("_posts").join(format!("{}-{}.markdown", date.format("%Y-%m-%d"), paper_name))
}
