//! Untrusted filename handling.
//!
//! Only the final path segment of a caller-supplied name is ever honoured. Directory
//! components are discarded; names that reduce to nothing are rejected.

use std::path::Path;

use crate::error::{FsOpsError, FsOpsResult};

/// Final segment of a caller-supplied filename, split for target-name derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedName {
    /// Final segment, trimmed.
    pub file_name: String,
    /// Segment without its extension; the whole segment when there is none.
    pub stem: String,
    /// Extension without the leading dot.
    pub extension: Option<String>,
}

/// Reduce a raw filename to its final segment.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidFilename`] when the name is empty, ends with a separator,
/// or consists only of traversal tokens.
pub fn sanitize_filename(raw: &str) -> FsOpsResult<SanitizedName> {
    let normalized = raw.replace('\\', "/");
    let segment = normalized.rsplit('/').next().unwrap_or_default().trim();
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(FsOpsError::InvalidFilename {
            value: Some(raw.to_owned()),
        });
    }

    let path = Path::new(segment);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(segment)
        .to_owned();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_owned);

    Ok(SanitizedName {
        file_name: segment.to_owned(),
        stem,
        extension,
    })
}

/// Download name for a produced artifact: the source stem with the target extension.
///
/// Requests without a source name (store references) fall back to `transform`.
#[must_use]
pub fn target_filename(source: Option<&SanitizedName>, target_extension: &str) -> String {
    let stem = source.map_or("transform", |name| name.stem.as_str());
    let extension = target_extension.trim_start_matches('.');
    if extension.is_empty() {
        stem.to_owned()
    } else {
        format!("{stem}.{extension}")
    }
}
