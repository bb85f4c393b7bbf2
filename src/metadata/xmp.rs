//! XMP packet parsing and flattening.
//!
//! XMP is RDF/XML, either embedded in the image file or stored in a
//! Lightroom-style sidecar (`<stem>.xmp` or `<name>.xmp`). Strict namespace
//! handling buys nothing here because every tool nests the same
//! `xmpmeta → RDF → Description` shape under different prefixes, so the
//! payload is textually stripped of namespaces before parsing and converted
//! into a prefix-free [`TagValue`] tree.
//!
//! The tree is then flattened into a flat string map: Description attributes
//! and one level of nested tags become keys, `rdf:li` lists join with
//! commas, and if the well-known shape is not found a generic recursive
//! flatten serves as a degraded fallback.

use anyhow::{bail, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use super::{ExtractionError, TagValue};

/// Parsed XMP tree: root tag name mapped to its subtree.
pub type XmpTree = BTreeMap<String, TagValue>;

/// Extract and flatten XMP metadata for an image.
///
/// Reads the embedded packet first, then applies any sidecar file on top:
/// sidecars reflect later edits in professional cataloging workflows, so
/// their flattened values override the embedded ones.
pub fn extract_flat(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut flat = BTreeMap::new();

    if let Ok(bytes) = std::fs::read(path) {
        if let Some(xml) = find_packet(&bytes) {
            match parse_tree(&xml) {
                Ok(tree) => flat = flatten(&tree),
                Err(e) => debug!(path = %path.display(), error = %e, "embedded XMP unreadable"),
            }
        }
    }

    for candidate in sidecar_candidates(path) {
        if !candidate.is_file() {
            continue;
        }
        let Ok(bytes) = std::fs::read(&candidate) else {
            continue;
        };
        let xml = String::from_utf8_lossy(&bytes);
        match parse_tree(&xml) {
            Ok(tree) => {
                // Sidecar wins over embedded data.
                for (k, v) in flatten(&tree) {
                    flat.insert(k, v);
                }
            }
            Err(e) => debug!(path = %candidate.display(), error = %e, "sidecar XMP unreadable"),
        }
    }

    if flat.is_empty() {
        bail!("no XMP data");
    }
    Ok(flat)
}

/// Sidecar file locations: `photo.xmp` next to `photo.nef`, and the
/// `photo.nef.xmp` style some tools write.
pub fn sidecar_candidates(path: &Path) -> [PathBuf; 2] {
    let mut appended = path.as_os_str().to_os_string();
    appended.push(".xmp");
    [path.with_extension("xmp"), PathBuf::from(appended)]
}

/// Locate an XMP packet inside raw image bytes.
///
/// Looks for `<x:xmpmeta>` directly, then for an `<?xpacket?>` wrapper and
/// extracts the xmpmeta element inside it.
pub fn find_packet(data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);

    if let Some(start) = text.find("<x:xmpmeta") {
        let rest = &text[start..];
        let end = rest.find("</x:xmpmeta>")?;
        return Some(rest[..end + "</x:xmpmeta>".len()].to_string());
    }

    if let Some(start) = text.find("<?xpacket begin") {
        let rest = &text[start..];
        let end_marker = rest.find("<?xpacket end")?;
        return Some(rest[..end_marker].to_string());
    }

    None
}

/// Parse XMP XML into a nested tree, namespace prefixes removed.
///
/// Malformed XML yields a tagged error; callers log it and continue with
/// empty data rather than aborting the surrounding batch.
pub fn parse_tree(xml: &str) -> Result<XmpTree, ExtractionError> {
    let cleaned = strip_namespaces(xml);
    let doc = roxmltree::Document::parse(&cleaned)
        .map_err(|e| ExtractionError::XmpParse(e.to_string()))?;

    let root = doc.root_element();
    let built = build_element(root);

    let mut tree = XmpTree::new();
    if let Some(value) = collapse(built) {
        tree.insert(root.tag_name().name().to_string(), value);
    }
    Ok(tree)
}

/// Remove namespace declarations and prefixes from tags and attributes.
///
/// This is a textual normalization, not XML-namespace semantics: the goal
/// is only a prefix-free tree.
fn strip_namespaces(xml: &str) -> String {
    static DECLS: OnceLock<Regex> = OnceLock::new();
    static TAG_PREFIX: OnceLock<Regex> = OnceLock::new();
    static ATTR_PREFIX: OnceLock<Regex> = OnceLock::new();

    let decls = DECLS.get_or_init(|| Regex::new(r#"\sxmlns(:\w+)?="[^"]*""#).unwrap());
    let tag_prefix = TAG_PREFIX.get_or_init(|| Regex::new(r"(</?)\w+:").unwrap());
    let attr_prefix = ATTR_PREFIX.get_or_init(|| Regex::new(r#"\s\w+:(\w+=")"#).unwrap());

    let s = decls.replace_all(xml, "");
    let s = tag_prefix.replace_all(&s, "$1");
    attr_prefix.replace_all(&s, " $1").into_owned()
}

/// Convert an element into a node: attributes become keys, non-empty text
/// becomes `_text`, repeated child tags promote to lists. No collapsing
/// happens here; that is a separate bottom-up pass so the algorithm stays
/// deterministic regardless of traversal order.
fn build_element(element: roxmltree::Node) -> TagValue {
    let mut map = BTreeMap::new();

    for attr in element.attributes() {
        map.insert(
            attr.name().to_string(),
            TagValue::Text(attr.value().to_string()),
        );
    }

    let text: String = element
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect::<String>()
        .trim()
        .to_string();
    if !text.is_empty() {
        map.insert("_text".to_string(), TagValue::Text(text));
    }

    for child in element.children().filter(|c| c.is_element()) {
        let tag = child.tag_name().name().to_string();
        let value = build_element(child);
        match map.get_mut(&tag) {
            Some(TagValue::List(items)) => items.push(value),
            Some(existing) => {
                let first = existing.clone();
                map.insert(tag, TagValue::List(vec![first, value]));
            }
            None => {
                map.insert(tag, value);
            }
        }
    }

    TagValue::Node(map)
}

/// Bottom-up collapse: an empty node vanishes, a node holding only `_text`
/// becomes that bare string.
fn collapse(value: TagValue) -> Option<TagValue> {
    match value {
        TagValue::Node(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                if let Some(collapsed) = collapse(v) {
                    out.insert(k, collapsed);
                }
            }
            if out.is_empty() {
                return None;
            }
            if out.len() == 1 {
                if let Some(text) = out.remove("_text") {
                    return Some(text);
                }
            }
            Some(TagValue::Node(out))
        }
        TagValue::List(items) => {
            let collapsed: Vec<TagValue> = items.into_iter().filter_map(collapse).collect();
            if collapsed.is_empty() {
                None
            } else {
                Some(TagValue::List(collapsed))
            }
        }
        other => Some(other),
    }
}

/// Flatten a parsed tree into a flat key → string projection.
///
/// Walks `xmpmeta → RDF → Description` (tolerating `RDF` at the top level
/// and repeated Description entries, merged by union with the first
/// non-empty value winning) and takes each Description's direct and
/// one-level-nested keys. Fewer than 5 keys means the well-known shape was
/// not there; fall back to flattening the whole tree.
pub fn flatten(tree: &XmpTree) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();

    for desc in find_descriptions(tree) {
        flatten_description(desc, &mut flat);
    }

    if flat.len() < 5 {
        for (key, value) in tree {
            flatten_generic(value, key, &mut flat);
        }
    }

    flat
}

fn find_descriptions(tree: &XmpTree) -> Vec<&BTreeMap<String, TagValue>> {
    let mut rdf_sources = Vec::new();
    if let Some(TagValue::Node(meta)) = tree.get("xmpmeta") {
        if let Some(rdf) = meta.get("RDF") {
            rdf_sources.push(rdf);
        }
    }
    if let Some(rdf) = tree.get("RDF") {
        rdf_sources.push(rdf);
    }

    let mut descriptions = Vec::new();
    for rdf in rdf_sources {
        let nodes: Vec<&TagValue> = match rdf {
            TagValue::List(items) => items.iter().collect(),
            single => vec![single],
        };
        for node in nodes {
            if let TagValue::Node(map) = node {
                match map.get("Description") {
                    Some(TagValue::List(items)) => {
                        for item in items {
                            if let TagValue::Node(desc) = item {
                                descriptions.push(desc);
                            }
                        }
                    }
                    Some(TagValue::Node(desc)) => descriptions.push(desc),
                    _ => {}
                }
            }
        }
    }
    descriptions
}

fn flatten_description(desc: &BTreeMap<String, TagValue>, flat: &mut BTreeMap<String, String>) {
    for (key, value) in desc {
        match value {
            TagValue::Node(inner) => {
                if let Some(TagValue::Text(text)) = inner.get("_text") {
                    put_first(flat, key, text);
                }
                for (sub_key, sub_value) in inner {
                    if sub_key == "_text" {
                        continue;
                    }
                    match sub_value {
                        // A list item child stands in for its parent tag:
                        // <keywords><li>a</li><li>b</li></keywords> means
                        // keywords = "a, b".
                        TagValue::Text(_) | TagValue::List(_) if sub_key == "li" => {
                            if let Some(joined) = sub_value.as_display_string() {
                                put_first(flat, key, &joined);
                            }
                        }
                        TagValue::List(_) | TagValue::Node(_) => {}
                        scalar => {
                            if let Some(s) = scalar.as_display_string() {
                                put_first(flat, &format!("{}_{}", key, sub_key), &s);
                            }
                        }
                    }
                }
            }
            TagValue::List(_) => {}
            scalar => {
                if let Some(s) = scalar.as_display_string() {
                    put_first(flat, key, &s);
                } else if !flat.contains_key(key) {
                    flat.insert(key.clone(), String::new());
                }
            }
        }
    }
}

/// Insert unless an earlier non-empty value already claimed the key.
fn put_first(flat: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let occupied = flat.get(key).map(|v| !v.is_empty()).unwrap_or(false);
    if !occupied {
        flat.insert(key.to_string(), value.to_string());
    }
}

/// Best-effort degraded mode: flatten every leaf with underscore-joined
/// path prefixes.
fn flatten_generic(value: &TagValue, prefix: &str, flat: &mut BTreeMap<String, String>) {
    match value {
        TagValue::Node(map) => {
            for (k, v) in map {
                flatten_generic(v, &format!("{}_{}", prefix, k), flat);
            }
        }
        leaf => {
            if let Some(s) = leaf.as_display_string() {
                flat.insert(prefix.to_string(), s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:exif="http://ns.adobe.com/exif/1.0/"
    xmlns:aux="http://ns.adobe.com/exif/1.0/aux/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    exif:FNumber="28/10"
    exif:ISOSpeedRatings="400"
    aux:Lens="NIKKOR Z 35mm f/1.8 S">
   <exif:ExposureTime>1/250</exif:ExposureTime>
   <dc:description>
    <rdf:Alt>
     <rdf:li xml:lang="x-default">Morning fog</rdf:li>
    </rdf:Alt>
   </dc:description>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

    #[test]
    fn text_only_element_collapses_to_string() {
        let tree = parse_tree("<root><a:tag xmlns:a=\"x\">foo</a:tag></root>").unwrap();
        let TagValue::Node(root) = tree.get("root").unwrap() else {
            panic!("expected node");
        };
        assert_eq!(root.get("tag"), Some(&TagValue::Text("foo".to_string())));
    }

    #[test]
    fn empty_element_collapses_to_absence() {
        let tree = parse_tree("<root><empty></empty><kept>x</kept></root>").unwrap();
        let TagValue::Node(root) = tree.get("root").unwrap() else {
            panic!("expected node");
        };
        assert!(!root.contains_key("empty"));
        assert!(root.contains_key("kept"));
    }

    #[test]
    fn repeated_tags_promote_to_list() {
        let tree = parse_tree("<root><li>a</li><li>b</li><li>c</li></root>").unwrap();
        let TagValue::Node(root) = tree.get("root").unwrap() else {
            panic!("expected node");
        };
        match root.get("li") {
            Some(TagValue::List(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn malformed_xml_is_a_tagged_error() {
        let err = parse_tree("<root><broken").unwrap_err();
        assert!(matches!(err, ExtractionError::XmpParse(_)));
    }

    #[test]
    fn description_attributes_flatten() {
        let tree = parse_tree(SAMPLE).unwrap();
        let flat = flatten(&tree);
        assert_eq!(flat.get("FNumber").unwrap(), "28/10");
        assert_eq!(flat.get("ISOSpeedRatings").unwrap(), "400");
        assert_eq!(flat.get("Lens").unwrap(), "NIKKOR Z 35mm f/1.8 S");
        assert_eq!(flat.get("ExposureTime").unwrap(), "1/250");
    }

    #[test]
    fn list_items_flatten_under_parent_tag() {
        let tree = parse_tree(
            r#"<xmpmeta><RDF><Description about=""
                 a="1" b="2" c="3" d="4">
               <subject><li>landscape</li><li>fog</li></subject>
               <Title><li>Dawn</li></Title>
             </Description></RDF></xmpmeta>"#,
        )
        .unwrap();
        let flat = flatten(&tree);
        assert_eq!(flat.get("subject").unwrap(), "landscape, fog");
        assert_eq!(flat.get("Title").unwrap(), "Dawn");
    }

    #[test]
    fn generic_fallback_when_no_description() {
        let tree = parse_tree("<weird><deep><value>42</value></deep></weird>").unwrap();
        let flat = flatten(&tree);
        assert_eq!(flat.get("weird_deep_value").unwrap(), "42");
    }

    #[test]
    fn packet_found_in_raw_bytes() {
        let mut bytes = vec![0xFFu8, 0xD8, 0x00, 0x13];
        bytes.extend_from_slice(b"<x:xmpmeta>x</x:xmpmeta>");
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        let packet = find_packet(&bytes).unwrap();
        assert!(packet.starts_with("<x:xmpmeta"));
        assert!(packet.ends_with("</x:xmpmeta>"));
    }

    #[test]
    fn sidecar_overrides_embedded() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("photo.jpg");

        let mut f = std::fs::File::create(&img).unwrap();
        f.write_all(&[0xFF, 0xD8]).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();

        let sidecar = dir.path().join("photo.xmp");
        std::fs::write(
            &sidecar,
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:exif="http://ns.adobe.com/exif/1.0/"
    exif:FNumber="40/10" exif:ISOSpeedRatings="100"
    exif:WhiteBalance="1" exif:MeteringMode="5" exif:Flash="0"/>
 </rdf:RDF>
</x:xmpmeta>"#,
        )
        .unwrap();

        let flat = extract_flat(&img).unwrap();
        // Sidecar values win; embedded-only keys survive.
        assert_eq!(flat.get("FNumber").unwrap(), "40/10");
        assert_eq!(flat.get("ISOSpeedRatings").unwrap(), "100");
        assert_eq!(flat.get("ExposureTime").unwrap(), "1/250");
    }

    #[test]
    fn sidecar_candidates_cover_both_styles() {
        let [a, b] = sidecar_candidates(Path::new("/photos/img.nef"));
        assert_eq!(a, Path::new("/photos/img.xmp"));
        assert_eq!(b, Path::new("/photos/img.nef.xmp"));
    }
}
