//! Unit conversions for photographic quantities.
//!
//! Shutter speeds snap to the standard photographic series, GPS coordinates
//! convert from degrees/minutes/seconds to signed decimal degrees, and
//! capture dates normalize across the formats EXIF, XMP and IPTC writers
//! produce.

use chrono::NaiveDate;

use super::{RawTagSet, TagValue};
use std::collections::BTreeMap;

/// Standard shutter speeds in seconds, 1/8000 through 30 s.
const STANDARD_SPEEDS: [f64; 55] = [
    1.0 / 8000.0,
    1.0 / 6400.0,
    1.0 / 5000.0,
    1.0 / 4000.0,
    1.0 / 3200.0,
    1.0 / 2500.0,
    1.0 / 2000.0,
    1.0 / 1600.0,
    1.0 / 1250.0,
    1.0 / 1000.0,
    1.0 / 800.0,
    1.0 / 640.0,
    1.0 / 500.0,
    1.0 / 400.0,
    1.0 / 320.0,
    1.0 / 250.0,
    1.0 / 200.0,
    1.0 / 160.0,
    1.0 / 125.0,
    1.0 / 100.0,
    1.0 / 80.0,
    1.0 / 60.0,
    1.0 / 50.0,
    1.0 / 40.0,
    1.0 / 30.0,
    1.0 / 25.0,
    1.0 / 20.0,
    1.0 / 15.0,
    1.0 / 13.0,
    1.0 / 10.0,
    1.0 / 8.0,
    1.0 / 6.0,
    1.0 / 5.0,
    1.0 / 4.0,
    1.0 / 3.0,
    0.4,
    0.5,
    0.6,
    0.8,
    1.0,
    1.3,
    1.6,
    2.0,
    2.5,
    3.2,
    4.0,
    5.0,
    6.0,
    8.0,
    10.0,
    13.0,
    15.0,
    20.0,
    25.0,
    30.0,
];

/// Normalize an exposure time into a standard shutter-speed string.
///
/// Accepts a decimal string or a `"num/den"` fraction. Values within 10%
/// relative error of a standard speed render as that speed (`1/N` below one
/// second, integer or one-decimal above). Anything else falls back to a
/// GCD-reduced fraction (below 1 s) or a one-decimal string. Empty or
/// non-numeric input yields `"N/A"`.
pub fn shutter_fraction(input: Option<&str>) -> String {
    let Some(raw) = input else {
        return "N/A".to_string();
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return "N/A".to_string();
    }

    let seconds = match eval_fraction(raw) {
        Some(v) => v,
        None => return raw.to_string(),
    };

    if seconds <= 0.0 {
        return raw.to_string();
    }

    let closest = STANDARD_SPEEDS
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - seconds)
                .abs()
                .partial_cmp(&(b - seconds).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(seconds);

    if (closest - seconds).abs() / seconds < 0.1 {
        if closest < 1.0 {
            // Speeds like 0.4 or 0.6 s are not unit fractions; rendering
            // them as 1/N would misstate the exposure, so only reciprocal
            // integers get the fraction form.
            let denom = (1.0 / closest).round();
            if (1.0 / denom - closest).abs() / closest < 1e-6 {
                return format!("1/{}", denom as i64);
            }
            return format!("{}", closest);
        }
        if closest.fract() == 0.0 {
            return format!("{}", closest as i64);
        }
        return format!("{}", closest);
    }

    // Not near any standard speed: keep a plain representation.
    if seconds >= 1.0 {
        if seconds.fract() == 0.0 {
            return format!("{}", seconds as i64);
        }
        return format!("{:.1}", seconds);
    }

    const PRECISION: i64 = 1_000_000;
    let numerator = (seconds * PRECISION as f64) as i64;
    let divisor = gcd(numerator, PRECISION);
    format!("{}/{}", numerator / divisor, PRECISION / divisor)
}

/// Evaluate a decimal string or `"num/den"` fraction to seconds.
fn eval_fraction(raw: &str) -> Option<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    raw.parse().ok()
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

/// Convert a degrees/minutes/seconds triplet to decimal degrees.
///
/// Malformed or partial triplets yield `None`, never an error.
pub fn dms_to_decimal(value: &TagValue) -> Option<f64> {
    let TagValue::List(parts) = value else {
        // A single number is already decimal degrees.
        return value.as_f64();
    };
    if parts.len() < 3 {
        return None;
    }
    let d = parts[0].as_f64()?;
    let m = parts[1].as_f64()?;
    let s = parts[2].as_f64()?;
    Some(d + m / 60.0 + s / 3600.0)
}

/// Resolved GPS position in signed decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsPosition {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

/// Resolve GPS coordinates from EXIF tags, falling back to XMP decimal
/// fields where EXIF is missing. South latitudes and west longitudes are
/// negated; altitude ref 1 means below sea level.
pub fn resolve_gps(exif: &RawTagSet, xmp: &BTreeMap<String, String>) -> GpsPosition {
    let mut pos = GpsPosition::default();

    // A coordinate without its hemisphere reference is ambiguous; leave it
    // for the XMP fallback instead of guessing a sign.
    if let (Some(value), Some(hemi)) = (exif.get("GPSLatitude"), exif.get("GPSLatitudeRef")) {
        if let Some(lat) = dms_to_decimal(value) {
            let south = hemi
                .as_display_string()
                .map(|r| r != "N")
                .unwrap_or(false);
            pos.latitude = Some(if south { -lat } else { lat });
        }
    }

    if let (Some(value), Some(hemi)) = (exif.get("GPSLongitude"), exif.get("GPSLongitudeRef")) {
        if let Some(lon) = dms_to_decimal(value) {
            let west = hemi
                .as_display_string()
                .map(|r| r != "E")
                .unwrap_or(false);
            pos.longitude = Some(if west { -lon } else { lon });
        }
    }

    if let Some(value) = exif.get("GPSAltitude") {
        if let Some(alt) = value.as_f64() {
            let below_sea = exif
                .get("GPSAltitudeRef")
                .and_then(|r| r.as_f64())
                .map(|r| r == 1.0)
                .unwrap_or(false);
            pos.altitude = Some(if below_sea { -alt } else { alt });
        }
    }

    // XMP stores decimal degrees directly (Lightroom writes these).
    if pos.latitude.is_none() {
        pos.latitude = xmp.get("GPSLatitude").and_then(|v| parse_xmp_coord(v));
    }
    if pos.longitude.is_none() {
        pos.longitude = xmp.get("GPSLongitude").and_then(|v| parse_xmp_coord(v));
    }
    if pos.altitude.is_none() {
        pos.altitude = xmp
            .get("GPSAltitude")
            .and_then(|v| eval_fraction(v.trim()));
    }

    pos
}

/// XMP coordinates are either plain decimals or the `DD,MM.mmmmH` form.
fn parse_xmp_coord(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<f64>() {
        return Some(v);
    }

    let hemisphere = raw.chars().last()?;
    let negative = matches!(hemisphere, 'S' | 'W' | 's' | 'w');
    let body = if hemisphere.is_ascii_alphabetic() {
        &raw[..raw.len() - 1]
    } else {
        raw
    };

    let (deg, min) = body.split_once(',')?;
    let deg: f64 = deg.trim().parse().ok()?;
    let min: f64 = min.trim().parse().ok()?;
    let value = deg + min / 60.0;
    Some(if negative { -value } else { value })
}

/// Date formats seen across EXIF, XMP and IPTC.
const DATE_FORMATS: [&str; 6] = [
    "%Y:%m:%d %H:%M:%S", // EXIF standard
    "%Y-%m-%d %H:%M:%S", // XMP/ISO style
    "%Y:%m:%d",          // date only (EXIF)
    "%Y-%m-%d",          // date only (ISO)
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y",
];

/// Normalize a capture date into `MM/DD/YYYY`.
///
/// Sub-seconds, timezone offsets and a trailing `Z` are stripped before
/// matching. Unparseable input passes through unchanged.
pub fn format_creation_date(date_str: &str) -> String {
    let mut clean = date_str.replace('T', " ");
    if let Some(idx) = clean.find('.') {
        clean.truncate(idx);
    }
    if let Some(idx) = clean.find('+') {
        clean.truncate(idx);
    }
    let clean = clean.trim().trim_end_matches('Z').trim();

    for fmt in DATE_FORMATS {
        if fmt.contains("%H") {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(clean, fmt) {
                return dt.format("%m/%d/%Y").to_string();
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(clean, fmt) {
            return d.format("%m/%d/%Y").to_string();
        }
    }

    date_str.to_string()
}
