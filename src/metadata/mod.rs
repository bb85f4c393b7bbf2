//! Metadata extraction from image files.
//!
//! Three sources are read per image: binary EXIF tags, IPTC-IIM records and
//! XMP packets (embedded or sidecar). Each source produces a [`RawTagSet`],
//! a flat mapping from human-readable tag names to loosely-typed values.
//! The raw sets are merged into one canonical record by the reconciler.

pub mod convert;
pub mod exif;
pub mod iptc;
pub mod xmp;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A raw tag value as found in EXIF, IPTC or XMP data.
///
/// Metadata standards store values as text, numbers, byte strings, repeated
/// elements or nested structures. Keeping these in one closed enum lets the
/// decoders and the reconciler pattern-match exhaustively instead of guessing
/// at runtime types.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Number(f64),
    Bytes(Vec<u8>),
    List(Vec<TagValue>),
    Node(BTreeMap<String, TagValue>),
}

impl TagValue {
    /// Render the value as a display string, if it has a sensible one.
    ///
    /// Numbers drop a trailing `.0`, lists join with `", "`, nodes yield
    /// their `_text` entry when present. Empty strings count as absent.
    pub fn as_display_string(&self) -> Option<String> {
        match self {
            TagValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            TagValue::Number(n) => Some(format_number(*n)),
            TagValue::Bytes(b) => {
                let s = decode_bytes(b);
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            TagValue::List(items) => {
                let parts: Vec<String> =
                    items.iter().filter_map(|v| v.as_display_string()).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(", "))
                }
            }
            TagValue::Node(map) => map.get("_text").and_then(|v| v.as_display_string()),
        }
    }

    /// Interpret the value as a number where possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Text(s) => s.trim().parse().ok(),
            TagValue::List(items) => items.first().and_then(|v| v.as_f64()),
            _ => None,
        }
    }
}

/// Flat mapping from tag name to raw value, one per metadata source.
///
/// Ephemeral: built per image and discarded after reconciliation.
pub type RawTagSet = BTreeMap<String, TagValue>;

/// All metadata sources extracted from a single image.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub exif: RawTagSet,
    pub iptc: RawTagSet,
    /// Flattened XMP projection (embedded packet merged with sidecar).
    pub xmp: BTreeMap<String, String>,
}

/// Errors surfaced while extracting metadata from one image.
///
/// Decode-level problems inside a single source degrade to empty data and
/// are only logged; this error type covers failures that leave us with
/// nothing useful for the image at all.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XMP parse error: {0}")]
    XmpParse(String),
}

/// Extract every metadata source from an image file.
///
/// Individual sources failing is normal (a PNG without IPTC, a file without
/// XMP); those are logged at debug level and produce empty sets. Only an
/// unreadable file is an error.
pub fn extract_sources(path: &Path) -> Result<SourceSet, ExtractionError> {
    // Probe readability once so a missing/permission-denied file is reported
    // as a per-image error instead of three silent empty sources.
    std::fs::metadata(path).map_err(|e| ExtractionError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let exif = exif::extract(path).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "no EXIF data");
        RawTagSet::new()
    });
    let iptc = iptc::extract(path).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "no IPTC data");
        RawTagSet::new()
    });
    let xmp = xmp::extract_flat(path).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "no XMP data");
        BTreeMap::new()
    });

    Ok(SourceSet { exif, iptc, xmp })
}

/// Decode a byte string as UTF-8, falling back to Latin-1, with trailing
/// NUL padding removed. EXIF and IPTC writers disagree on encodings; this
/// mirrors what cataloging tools accept in practice.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let trimmed: &[u8] = {
        let mut end = bytes.len();
        while end > 0 && bytes[end - 1] == 0 {
            end -= 1;
        }
        &bytes[..end]
    };
    match std::str::from_utf8(trimmed) {
        Ok(s) => s.to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => trimmed.iter().map(|&b| b as char).collect(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
