//! IPTC-IIM record extraction.
//!
//! IPTC metadata lives in two container formats:
//! - JPEG: APP13 marker holding Photoshop 8BIM resources, resource 0x0404
//!   carrying the raw IIM bytes.
//! - TIFF (also NEF/DNG): IFD tag 33723 (IPTC-NAA) with raw IIM bytes,
//!   falling back to tag 34377 (Photoshop resource block).
//!
//! Every Record 2 (Application Record) dataset is decoded. Repeatable
//! datasets such as Keywords are joined into one comma-separated string.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::Path;

use super::{decode_bytes, RawTagSet, TagValue};

/// Record 2 dataset numbers and their standard names.
static IPTC_TAGS: &[(u8, &str)] = &[
    (5, "ObjectName"),
    (7, "EditStatus"),
    (10, "Urgency"),
    (15, "Category"),
    (20, "SupplementalCategories"),
    (25, "Keywords"),
    (40, "SpecialInstructions"),
    (55, "DateCreated"),
    (60, "TimeCreated"),
    (80, "ByLine"),
    (85, "ByLineTitle"),
    (90, "City"),
    (92, "SubLocation"),
    (95, "ProvinceState"),
    (100, "CountryCode"),
    (101, "CountryName"),
    (103, "OriginalTransmissionReference"),
    (105, "Headline"),
    (110, "Credit"),
    (115, "Source"),
    (116, "CopyrightNotice"),
    (120, "Caption"),
    (122, "CaptionWriter"),
];

fn dataset_name(record: u8, dataset: u8) -> String {
    if record == 2 {
        if let Some((_, name)) = IPTC_TAGS.iter().find(|(d, _)| *d == dataset) {
            return (*name).to_string();
        }
    }
    format!("IPTC_{}_{}", record, dataset)
}

/// Extract IPTC metadata from an image file, dispatching on extension.
pub fn extract(path: &Path) -> Result<RawTagSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let bytes = std::fs::read(path)?;

    let iim = match ext.as_str() {
        "jpg" | "jpeg" => find_jpeg_app13_iptc(&bytes),
        "tif" | "tiff" | "nef" | "dng" => find_tiff_iptc(&bytes),
        _ => None,
    };

    let iim = iim.ok_or_else(|| anyhow!("no IPTC-IIM data"))?;
    Ok(parse_iim(iim))
}

/// Parse raw IPTC-IIM bytes into a tag set.
///
/// IIM dataset layout: 0x1C marker, record number, dataset number, big-endian
/// u16 length, then the data bytes.
pub(crate) fn parse_iim(data: &[u8]) -> RawTagSet {
    // Collect repeatable datasets first, then unwrap singletons.
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != 0x1C {
            pos += 1;
            continue;
        }

        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        pos += 5;

        if pos + length > data.len() {
            break;
        }

        let value = decode_bytes(&data[pos..pos + length]).trim().to_string();
        if !value.is_empty() {
            collected
                .entry(dataset_name(record, dataset))
                .or_default()
                .push(value);
        }

        pos += length;
    }

    let mut tags = RawTagSet::new();
    for (name, mut values) in collected {
        let value = if values.len() == 1 {
            TagValue::Text(values.pop().unwrap_or_default())
        } else {
            TagValue::Text(values.join(", "))
        };
        tags.insert(name, value);
    }
    tags
}

// ---------------------------------------------------------------------------
// JPEG: APP13 / Photoshop 8BIM
// ---------------------------------------------------------------------------

const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

fn find_jpeg_app13_iptc(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 0;
    while pos + 4 < data.len() {
        if data[pos] == 0xFF && data[pos + 1] == 0xED {
            let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            let seg_start = pos + 4;
            let seg_end = (pos + 2 + seg_len).min(data.len());
            if let Some(iptc) = extract_iptc_from_8bim(&data[seg_start..seg_end]) {
                return Some(iptc);
            }
        }

        if data[pos] == 0xFF && pos + 3 < data.len() && data[pos + 1] != 0x00 {
            let marker = data[pos + 1];
            // SOS marks the start of entropy-coded image data.
            if marker == 0xDA {
                break;
            }
            if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) {
                pos += 2;
            } else {
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + len;
            }
        } else {
            pos += 1;
        }
    }
    None
}

/// Walk Photoshop 8BIM resource blocks looking for the IPTC resource.
fn extract_iptc_from_8bim(segment: &[u8]) -> Option<&[u8]> {
    let data = if segment.starts_with(PHOTOSHOP_HEADER) {
        &segment[PHOTOSHOP_HEADER.len()..]
    } else {
        segment
    };

    let mut pos = 0;
    while pos + 12 <= data.len() {
        if &data[pos..pos + 4] != BIM_MARKER {
            pos += 1;
            continue;
        }
        pos += 4;

        if pos + 2 > data.len() {
            break;
        }
        let resource_id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        // Pascal name string: 1 length byte + string, padded to even total.
        if pos >= data.len() {
            break;
        }
        let pascal_len = data[pos] as usize;
        pos += 1 + pascal_len + ((1 + pascal_len) % 2);

        if pos + 4 > data.len() {
            break;
        }
        let res_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;

        if pos + res_len > data.len() {
            break;
        }

        if resource_id == IPTC_RESOURCE_ID {
            return Some(&data[pos..pos + res_len]);
        }

        pos += res_len + (res_len % 2);
    }

    None
}

// ---------------------------------------------------------------------------
// TIFF-family containers: IFD tag 33723 (IPTC-NAA) / 34377 (Photoshop)
// ---------------------------------------------------------------------------

const TIFF_TAG_IPTC: u16 = 33723;
const TIFF_TAG_PHOTOSHOP: u16 = 34377;

fn find_tiff_iptc(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 8 {
        return None;
    }

    let big_endian = match &data[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };

    let read_u16 = |offset: usize| -> Option<u16> {
        let b = data.get(offset..offset + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |offset: usize| -> Option<u32> {
        let b = data.get(offset..offset + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    let ifd_offset = read_u32(4)? as usize;
    let entry_count = read_u16(ifd_offset)? as usize;

    let mut photoshop_block: Option<&[u8]> = None;

    for i in 0..entry_count {
        let entry = ifd_offset + 2 + i * 12;
        let tag = read_u16(entry)?;
        if tag != TIFF_TAG_IPTC && tag != TIFF_TAG_PHOTOSHOP {
            continue;
        }

        let field_type = read_u16(entry + 2)?;
        let count = read_u32(entry + 4)? as usize;
        // BYTE/UNDEFINED are 1 byte per element, LONG is 4.
        let elem_size = match field_type {
            1 | 7 => 1,
            4 => 4,
            _ => continue,
        };
        let total = count * elem_size;
        let value_offset = if total <= 4 {
            entry + 8
        } else {
            read_u32(entry + 8)? as usize
        };
        let block = data.get(value_offset..value_offset + total)?;

        if tag == TIFF_TAG_IPTC {
            return Some(block);
        }
        photoshop_block = Some(block);
    }

    photoshop_block.and_then(extract_iptc_from_8bim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(record: u8, num: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![0x1C, record, num];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn single_dataset_unwraps_to_scalar() {
        let data = dataset(2, 120, b"Dawn over the valley");
        let tags = parse_iim(&data);
        assert_eq!(
            tags.get("Caption"),
            Some(&TagValue::Text("Dawn over the valley".to_string()))
        );
    }

    #[test]
    fn repeated_keywords_join_with_commas() {
        let mut data = dataset(2, 25, b"landscape");
        data.extend(dataset(2, 25, b"sunrise"));
        data.extend(dataset(2, 25, b"fog"));
        let tags = parse_iim(&data);
        assert_eq!(
            tags.get("Keywords"),
            Some(&TagValue::Text("landscape, sunrise, fog".to_string()))
        );
    }

    #[test]
    fn unknown_dataset_synthesizes_name() {
        let data = dataset(2, 200, b"mystery");
        let tags = parse_iim(&data);
        assert_eq!(
            tags.get("IPTC_2_200"),
            Some(&TagValue::Text("mystery".to_string()))
        );
    }

    #[test]
    fn truncated_dataset_is_ignored() {
        let mut data = dataset(2, 90, b"Reykjavik");
        // Claim 100 bytes but provide none.
        data.extend_from_slice(&[0x1C, 2, 105, 0, 100]);
        let tags = parse_iim(&data);
        assert_eq!(
            tags.get("City"),
            Some(&TagValue::Text("Reykjavik".to_string()))
        );
        assert!(!tags.contains_key("Headline"));
    }

    #[test]
    fn iim_inside_8bim_resource() {
        let iim = dataset(2, 5, b"Title here");
        let mut segment = PHOTOSHOP_HEADER.to_vec();
        segment.extend_from_slice(BIM_MARKER);
        segment.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        segment.extend_from_slice(&[0, 0]); // empty pascal name, padded
        segment.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        segment.extend_from_slice(&iim);

        let found = extract_iptc_from_8bim(&segment).expect("resource found");
        let tags = parse_iim(found);
        assert_eq!(
            tags.get("ObjectName"),
            Some(&TagValue::Text("Title here".to_string()))
        );
    }
}
