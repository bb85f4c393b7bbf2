//! Change detection against the catalog watermarks.
//!
//! Each cataloged image stores the modification time it was last processed
//! at. A file is reprocessed only when its effective mtime differs from
//! that watermark, so repeated runs over a large archive stay cheap.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::metadata::xmp::sidecar_candidates;

/// Effective modification time of an image in seconds since the epoch.
///
/// Editors like Lightroom write adjustments to an XMP sidecar without
/// touching the image, so the newer of the two mtimes is the one that
/// matters for re-extraction.
pub fn effective_mtime(path: &Path) -> Result<f64> {
    let mut mtime = file_mtime(path)?;
    for sidecar in sidecar_candidates(path) {
        if sidecar.exists() {
            if let Ok(sidecar_mtime) = file_mtime(&sidecar) {
                mtime = mtime.max(sidecar_mtime);
            }
            break;
        }
    }
    Ok(mtime)
}

fn file_mtime(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(secs)
}

/// Decide whether a file must be re-extracted.
///
/// The watermark comparison is exact: any drift in mtime, forward or
/// backward, triggers reprocessing. Unknown files always do.
pub fn needs_reprocessing(
    filepath: &str,
    mtime: f64,
    watermarks: &HashMap<String, f64>,
    refresh: bool,
) -> bool {
    if refresh {
        return true;
    }
    match watermarks.get(filepath) {
        Some(&stored) => stored != mtime,
        None => true,
    }
}
