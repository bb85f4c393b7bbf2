//! EXIF tag extraction.
//!
//! Reads every field of the primary image IFD (including the Exif and GPS
//! sub-IFDs, which the reader flattens for us) into a [`RawTagSet`] keyed by
//! the standard tag name. Unknown tags fall back to their numeric id.

use anyhow::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{decode_bytes, RawTagSet, TagValue};

/// Extract all EXIF fields from an image into a raw tag set.
///
/// Image dimensions from the container itself are recorded as `Width` and
/// `Height` so downstream code has them even when the EXIF pixel-dimension
/// tags are missing.
pub fn extract(path: &Path) -> Result<RawTagSet> {
    let mut tags = RawTagSet::new();

    if let Ok(reader) = image::ImageReader::open(path) {
        if let Ok((w, h)) = reader.into_dimensions() {
            tags.insert("Width".to_string(), TagValue::Number(w as f64));
            tags.insert("Height".to_string(), TagValue::Number(h as f64));
        }
    }

    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader)?;

    for field in exif.fields() {
        // Thumbnail IFD repeats primary tags with stale values; skip it.
        if field.ifd_num != exif::In::PRIMARY {
            continue;
        }
        if let Some(value) = convert_value(&field.value) {
            tags.insert(tag_name(field.tag), value);
        }
    }

    Ok(tags)
}

/// Human-readable tag name, or the raw numeric id when the tag is unknown.
fn tag_name(tag: exif::Tag) -> String {
    if tag.description().is_some() {
        tag.to_string()
    } else {
        tag.number().to_string()
    }
}

fn convert_value(value: &exif::Value) -> Option<TagValue> {
    use exif::Value;

    match value {
        Value::Ascii(lines) => {
            let parts: Vec<String> = lines
                .iter()
                .map(|bytes| decode_bytes(bytes))
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(TagValue::Text(parts.join(", ")))
            }
        }
        // Undefined holds byte payloads that are usually text (UserComment,
        // ExifVersion); decode best-effort like the byte-string rule says.
        Value::Undefined(bytes, _) => {
            let s = decode_bytes(bytes);
            if s.is_empty() {
                None
            } else {
                Some(TagValue::Text(s))
            }
        }
        Value::Byte(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::SByte(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::Short(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::SShort(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::Long(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::SLong(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::Float(v) => numeric_list(v.iter().map(|&n| n as f64)),
        Value::Double(v) => numeric_list(v.iter().copied()),
        Value::Rational(v) => numeric_list(
            v.iter()
                .filter(|r| r.denom != 0)
                .map(|r| r.num as f64 / r.denom as f64),
        ),
        Value::SRational(v) => numeric_list(
            v.iter()
                .filter(|r| r.denom != 0)
                .map(|r| r.num as f64 / r.denom as f64),
        ),
        _ => None,
    }
}

fn numeric_list(values: impl Iterator<Item = f64>) -> Option<TagValue> {
    let mut numbers: Vec<TagValue> = values.map(TagValue::Number).collect();
    match numbers.len() {
        0 => None,
        1 => numbers.pop(),
        _ => Some(TagValue::List(numbers)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tag_uses_standard_name() {
        assert_eq!(tag_name(exif::Tag::DateTimeOriginal), "DateTimeOriginal");
        assert_eq!(tag_name(exif::Tag::FNumber), "FNumber");
    }

    #[test]
    fn rational_zero_denominator_is_skipped() {
        let v = exif::Value::Rational(vec![exif::Rational { num: 1, denom: 0 }]);
        assert_eq!(convert_value(&v), None);
    }

    #[test]
    fn single_short_unwraps_to_scalar() {
        let v = exif::Value::Short(vec![400]);
        assert_eq!(convert_value(&v), Some(TagValue::Number(400.0)));
    }

    #[test]
    fn gps_triplet_stays_a_list() {
        let v = exif::Value::Rational(vec![
            exif::Rational { num: 40, denom: 1 },
            exif::Rational { num: 26, denom: 1 },
            exif::Rational { num: 46, denom: 1 },
        ]);
        match convert_value(&v) {
            Some(TagValue::List(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn ascii_decodes_and_strips_nuls() {
        let v = exif::Value::Ascii(vec![b"NIKON Z 7\0".to_vec()]);
        assert_eq!(
            convert_value(&v),
            Some(TagValue::Text("NIKON Z 7".to_string()))
        );
    }
}
