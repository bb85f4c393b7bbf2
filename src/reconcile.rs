//! Per-field reconciliation of EXIF, XMP and IPTC metadata.
//!
//! Different tools populate different namespaces for the same semantics:
//! Lightroom writes lens data into XMP, cameras write it into EXIF, news
//! workflows use IPTC. Each canonical field therefore has a precedence
//! chain, and the first source yielding a non-empty value wins. The chains
//! live in one table below so the ordering is configuration, not scattered
//! code.

use std::path::Path;

use crate::metadata::convert::{format_creation_date, resolve_gps, shutter_fraction};
use crate::metadata::SourceSet;

/// Where a field value may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Exif,
    Xmp,
    Iptc,
}

use Source::{Exif, Iptc, Xmp};

/// One step in a precedence chain: source and the tag name within it.
pub type Chain = &'static [(Source, &'static str)];

const CAMERA_MODEL: Chain = &[(Exif, "Model"), (Xmp, "Model"), (Xmp, "CameraModel")];
const LENS_MODEL: Chain = &[
    (Exif, "LensModel"),
    (Xmp, "LensModel"),
    (Xmp, "Lens"),
    (Xmp, "LensInfo"),
];
const FOCAL_LENGTH: Chain = &[
    (Exif, "FocalLength"),
    (Xmp, "FocalLength"),
    (Xmp, "focalLength"),
];
const EXPOSURE_TIME: Chain = &[
    (Exif, "ExposureTime"),
    (Xmp, "ExposureTime"),
    (Xmp, "ShutterSpeedValue"),
    (Xmp, "shutterSpeed"),
    (Exif, "ShutterSpeedValue"),
];
const APERTURE: Chain = &[
    (Exif, "FNumber"),
    (Xmp, "FNumber"),
    (Xmp, "ApertureValue"),
    (Xmp, "aperture"),
    (Exif, "ApertureValue"),
];
const ISO: Chain = &[
    (Exif, "PhotographicSensitivity"),
    (Exif, "ISOSpeed"),
    (Xmp, "ISOSpeedRatings"),
    (Xmp, "ISO"),
    (Xmp, "ISOSpeed"),
    (Xmp, "iso"),
    (Xmp, "isoSpeedRatings"),
];
const CREATION_DATE: Chain = &[
    (Exif, "DateTimeOriginal"),
    (Xmp, "DateTimeOriginal"),
    (Xmp, "CreateDate"),
    (Xmp, "DateCreated"),
    (Iptc, "DateCreated"),
];
const GENRE: Chain = &[(Xmp, "genre"), (Xmp, "Genre"), (Iptc, "Category")];
const KEYWORDS: Chain = &[(Iptc, "Keywords"), (Xmp, "Keywords"), (Xmp, "subject")];
const DESCRIPTION: Chain = &[
    (Exif, "ImageDescription"),
    (Iptc, "Caption"),
    (Xmp, "ImageDescription"),
    (Xmp, "description"),
    (Xmp, "title"),
];
const CITY: Chain = &[
    (Iptc, "City"),
    (Xmp, "City"),
    (Xmp, "Iptc4xmpCore_City"),
    (Xmp, "city"),
];
const SUB_LOCATION: Chain = &[
    (Iptc, "SubLocation"),
    (Xmp, "Sublocation"),
    (Xmp, "Iptc4xmpCore_Sublocation"),
    (Xmp, "sublocation"),
];
const PROVINCE_STATE: Chain = &[
    (Iptc, "ProvinceState"),
    (Xmp, "ProvinceState"),
    (Xmp, "Iptc4xmpCore_ProvinceState"),
    (Xmp, "state"),
];
const SOFTWARE: Chain = &[(Exif, "Software"), (Xmp, "CreatorTool"), (Xmp, "Software")];
const SERIAL_NUMBER: Chain = &[(Exif, "BodySerialNumber"), (Xmp, "SerialNumber")];
const EXPOSURE_BIAS: Chain = &[(Exif, "ExposureBiasValue"), (Xmp, "ExposureBiasValue")];
const METERING_MODE: Chain = &[(Exif, "MeteringMode"), (Xmp, "MeteringMode")];
const FLASH: Chain = &[(Exif, "Flash"), (Xmp, "Flash")];
const WHITE_BALANCE: Chain = &[(Exif, "WhiteBalance"), (Xmp, "WhiteBalance")];
const FOCAL_LENGTH_35MM: Chain = &[
    (Exif, "FocalLengthIn35mmFilm"),
    (Xmp, "FocalLengthIn35mmFilm"),
];
const EXPOSURE_PROGRAM: Chain = &[(Exif, "ExposureProgram"), (Xmp, "ExposureProgram")];
const SUBJECT_DISTANCE: Chain = &[
    (Exif, "SubjectDistance"),
    (Xmp, "ApproximateFocusDistance"),
];
const WIDTH: Chain = &[
    (Exif, "Width"),
    (Exif, "PixelXDimension"),
    (Xmp, "PixelXDimension"),
    (Xmp, "ImageWidth"),
];
const HEIGHT: Chain = &[
    (Exif, "Height"),
    (Exif, "PixelYDimension"),
    (Xmp, "PixelYDimension"),
    (Xmp, "ImageHeight"),
];
const RATING: Chain = &[(Xmp, "Rating"), (Xmp, "rating")];
const ARTIST: Chain = &[(Exif, "Artist"), (Xmp, "Creator"), (Xmp, "creator")];
const COPYRIGHT: Chain = &[
    (Exif, "Copyright"),
    (Xmp, "Copyright"),
    (Xmp, "Rights"),
    (Iptc, "CopyrightNotice"),
];

/// File-level attributes gathered by the scanner.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    /// Absolute path, the catalog's stable key.
    pub filepath: String,
    /// Filename without extension.
    pub stem: String,
    /// Lowercased extension including the dot.
    pub extension: String,
    pub file_size: i64,
    /// Effective modification time (file or sidecar, whichever is newer),
    /// seconds since the epoch.
    pub last_modified: f64,
}

impl FileInfo {
    pub fn from_path(path: &Path, file_size: i64, last_modified: f64) -> Self {
        Self {
            filepath: path.to_string_lossy().to_string(),
            stem: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
            file_size,
            last_modified,
        }
    }
}

/// The reconciled metadata record for one image.
///
/// String fields hold an empty string when no source had a value, matching
/// the catalog schema; numeric fields stay `None` and persist as SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    pub filepath: String,
    pub filename: String,
    pub camera_model: String,
    pub lens_model: String,
    pub focal_length: String,
    pub shutter: String,
    pub aperture: String,
    pub iso: String,
    pub creation_date: String,
    pub genre: String,
    pub keywords: String,
    pub description: String,
    pub city: String,
    pub sub_location: String,
    pub province_state: String,
    pub software: String,
    pub serial_number: String,
    pub exposure_bias: String,
    pub metering_mode: String,
    pub flash: String,
    pub white_balance: String,
    pub focal_length_35mm: String,
    pub exposure_program: String,
    pub subject_distance: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub rating: String,
    pub artist: String,
    pub copyright: String,
    pub extension: String,
    pub file_size: i64,
    pub last_modified: f64,
}

/// Merge all sources into one canonical record. Pure; no side effects.
pub fn build_record(file: &FileInfo, sources: &SourceSet) -> CanonicalRecord {
    let gps = resolve_gps(&sources.exif, &sources.xmp);
    let shutter_raw = pick(sources, EXPOSURE_TIME);

    CanonicalRecord {
        filepath: file.filepath.clone(),
        filename: file.stem.clone(),
        camera_model: pick_or_empty(sources, CAMERA_MODEL),
        lens_model: pick_or_empty(sources, LENS_MODEL),
        focal_length: pick_or_empty(sources, FOCAL_LENGTH),
        shutter: shutter_fraction(shutter_raw.as_deref()),
        aperture: pick_or_empty(sources, APERTURE),
        iso: pick_or_empty(sources, ISO),
        creation_date: pick(sources, CREATION_DATE)
            .map(|d| format_creation_date(&d))
            .unwrap_or_default(),
        genre: pick_or_empty(sources, GENRE),
        keywords: pick_or_empty(sources, KEYWORDS),
        description: pick_or_empty(sources, DESCRIPTION),
        city: pick_or_empty(sources, CITY),
        sub_location: pick_or_empty(sources, SUB_LOCATION),
        province_state: pick_or_empty(sources, PROVINCE_STATE),
        software: pick_or_empty(sources, SOFTWARE),
        serial_number: pick_or_empty(sources, SERIAL_NUMBER),
        exposure_bias: pick_or_empty(sources, EXPOSURE_BIAS),
        metering_mode: pick_or_empty(sources, METERING_MODE),
        flash: pick_or_empty(sources, FLASH),
        white_balance: pick_or_empty(sources, WHITE_BALANCE),
        focal_length_35mm: pick_or_empty(sources, FOCAL_LENGTH_35MM),
        exposure_program: pick_or_empty(sources, EXPOSURE_PROGRAM),
        subject_distance: pick_or_empty(sources, SUBJECT_DISTANCE),
        latitude: gps.latitude,
        longitude: gps.longitude,
        altitude: gps.altitude,
        width: pick_numeric(sources, WIDTH),
        height: pick_numeric(sources, HEIGHT),
        rating: pick_or_empty(sources, RATING),
        artist: pick_or_empty(sources, ARTIST),
        copyright: pick_or_empty(sources, COPYRIGHT),
        extension: file.extension.clone(),
        file_size: file.file_size,
        last_modified: file.last_modified,
    }
}

/// First non-empty value along the chain.
pub fn pick(sources: &SourceSet, chain: Chain) -> Option<String> {
    for (source, key) in chain {
        let value = match source {
            Source::Exif => sources.exif.get(*key).and_then(|v| v.as_display_string()),
            Source::Iptc => sources.iptc.get(*key).and_then(|v| v.as_display_string()),
            Source::Xmp => sources
                .xmp
                .get(*key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        };
        if value.is_some() {
            return value;
        }
    }
    None
}

fn pick_or_empty(sources: &SourceSet, chain: Chain) -> String {
    pick(sources, chain).unwrap_or_default()
}

fn pick_numeric(sources: &SourceSet, chain: Chain) -> Option<i64> {
    pick(sources, chain)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TagValue;

    fn sources_with(exif_model: Option<&str>, xmp_model: Option<&str>) -> SourceSet {
        let mut sources = SourceSet::default();
        if let Some(m) = exif_model {
            sources
                .exif
                .insert("Model".to_string(), TagValue::Text(m.to_string()));
        }
        if let Some(m) = xmp_model {
            sources.xmp.insert("Model".to_string(), m.to_string());
        }
        sources
    }

    #[test]
    fn exif_wins_over_xmp() {
        let sources = sources_with(Some("A"), Some("B"));
        assert_eq!(pick(&sources, CAMERA_MODEL).unwrap(), "A");
    }

    #[test]
    fn xmp_used_when_exif_absent() {
        let sources = sources_with(None, Some("B"));
        assert_eq!(pick(&sources, CAMERA_MODEL).unwrap(), "B");
    }

    #[test]
    fn empty_exif_value_falls_through() {
        let sources = sources_with(Some("   "), Some("B"));
        assert_eq!(pick(&sources, CAMERA_MODEL).unwrap(), "B");
    }

    #[test]
    fn iptc_caption_beats_xmp_description() {
        let mut sources = SourceSet::default();
        sources
            .iptc
            .insert("Caption".to_string(), TagValue::Text("from iptc".into()));
        sources
            .xmp
            .insert("description".to_string(), "from xmp".to_string());
        assert_eq!(pick(&sources, DESCRIPTION).unwrap(), "from iptc");
    }

    #[test]
    fn record_normalizes_shutter_and_date() {
        let mut sources = SourceSet::default();
        sources
            .exif
            .insert("ExposureTime".to_string(), TagValue::Number(0.0005));
        sources.exif.insert(
            "DateTimeOriginal".to_string(),
            TagValue::Text("2024:08:09 10:11:12".into()),
        );
        sources.exif.insert("Width".to_string(), TagValue::Number(8256.0));

        let file = FileInfo::from_path(Path::new("/photos/_EVY2460-HDR.jpg"), 1234, 99.0);
        let record = build_record(&file, &sources);

        assert_eq!(record.filename, "_EVY2460-HDR");
        assert_eq!(record.extension, ".jpg");
        assert_eq!(record.shutter, "1/2000");
        assert_eq!(record.creation_date, "08/09/2024");
        assert_eq!(record.width, Some(8256));
        assert_eq!(record.file_size, 1234);
    }

    #[test]
    fn missing_everything_yields_empty_strings() {
        let file = FileInfo::from_path(Path::new("/photos/blank.png"), 0, 1.0);
        let record = build_record(&file, &SourceSet::default());
        assert_eq!(record.camera_model, "");
        assert_eq!(record.shutter, "N/A");
        assert_eq!(record.latitude, None);
        assert_eq!(record.width, None);
    }
}
