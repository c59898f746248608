//! Best-effort recovery of the generation prompt embedded in an image by the
//! tool that produced it.
//!
//! Only metadata blocks are read, never pixel data. Node-graph workflows
//! (a JSON object stored under `prompt`) take priority, then a free-form
//! `parameters` block, then a plain `Description`.

use crate::error::Error;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

pub const WORKFLOW_FIELD: &str = "prompt";
pub const PARAMETERS_FIELD: &str = "parameters";
pub const DESCRIPTION_FIELD: &str = "Description";

/// Node types carrying prompt text contain this marker in their `class_type`.
pub const TEXT_ENCODE_MARKER: &str = "CLIPTextEncode";

/// Input names that hold prompt text on a text-encode node.
pub const PROMPT_INPUT_KEYS: [&str; 4] = ["text", "text_g", "text_l", "string"];

/// Shorter strings are treated as placeholders, not prompts.
const MIN_PROMPT_CHARS: usize = 5;

/// Keyword -> text for every embedded text block found.
pub type TextFields = BTreeMap<String, String>;

/// Extract the embedded prompt from `path`, or `None` when there is nothing
/// recognizable. Never fails; problems are logged.
pub fn extract_prompt(path: &Path) -> Option<String> {
    match read_text_fields(path) {
        Ok(fields) => prompt_from_fields(&fields),
        Err(e) => {
            warn!("Extraction error for {}: {}", path.display(), e);
            None
        }
    }
}

/// Pick the prompt out of already-read metadata fields.
pub fn prompt_from_fields(fields: &TextFields) -> Option<String> {
    if fields.is_empty() {
        return None;
    }

    if let Some(raw) = fields.get(WORKFLOW_FIELD) {
        match serde_json::from_str::<Value>(raw) {
            Ok(workflow) => {
                let prompts = workflow_prompts(&workflow);
                if !prompts.is_empty() {
                    return Some(prompts.join("\n"));
                }
            }
            Err(e) => debug!("Workflow field is not JSON: {}", e),
        }
    }

    if let Some(params) = fields.get(PARAMETERS_FIELD) {
        let first_line = params.lines().next().unwrap_or_default().trim();
        return non_empty(first_line);
    }

    fields
        .get(DESCRIPTION_FIELD)
        .and_then(|description| non_empty(description.trim()))
}

/// Collect the distinct prompt strings of a node-graph workflow,
/// longest first.
///
/// The graph is a loose mapping of node id -> node; anything that does not
/// look like a text-encode node with string inputs is skipped.
pub fn workflow_prompts(workflow: &Value) -> Vec<String> {
    let Some(nodes) = workflow.as_object() else {
        return Vec::new();
    };

    let mut unique: HashSet<String> = HashSet::new();
    for node in nodes.values() {
        let class_type = node
            .get("class_type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !class_type.contains(TEXT_ENCODE_MARKER) {
            continue;
        }
        let Some(inputs) = node.get("inputs").and_then(Value::as_object) else {
            continue;
        };

        for key in PROMPT_INPUT_KEYS {
            if let Some(text) = inputs.get(key).and_then(Value::as_str) {
                let text = text.trim();
                if text.chars().count() > MIN_PROMPT_CHARS {
                    unique.insert(text.to_string());
                }
            }
        }
    }

    let mut prompts: Vec<String> = unique.into_iter().collect();
    // Longest first; the most specific prompt tends to be the longest
    prompts.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });
    prompts
}

/// Read every embedded text block of `path`.
///
/// PNG text chunks are read directly; other formats go through their EXIF
/// block, with `UserComment` surfaced as `parameters` and `ImageDescription`
/// as `Description`.
pub fn read_text_fields(path: &Path) -> Result<TextFields, Error> {
    let is_png = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

    if is_png {
        read_png_text(path)
    } else {
        read_exif_text(path)
    }
}

fn read_png_text(path: &Path) -> Result<TextFields, Error> {
    let decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    let reader = decoder.read_info()?;
    let info = reader.info();

    let mut fields = TextFields::new();
    for chunk in &info.uncompressed_latin1_text {
        fields
            .entry(chunk.keyword.clone())
            .or_insert_with(|| chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        match chunk.get_text() {
            Ok(text) => {
                fields.entry(chunk.keyword.clone()).or_insert(text);
            }
            Err(e) => debug!("Skipping zTXt '{}': {}", chunk.keyword, e),
        }
    }
    for chunk in &info.utf8_text {
        match chunk.get_text() {
            Ok(text) => {
                fields.entry(chunk.keyword.clone()).or_insert(text);
            }
            Err(e) => debug!("Skipping iTXt '{}': {}", chunk.keyword, e),
        }
    }
    Ok(fields)
}

fn read_exif_text(path: &Path) -> Result<TextFields, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(TextFields::new()),
        Err(e) => return Err(e.into()),
    };

    let mut fields = TextFields::new();
    if let Some(field) = exif.get_field(exif::Tag::UserComment, exif::In::PRIMARY) {
        if let exif::Value::Undefined(ref bytes, _) = field.value {
            // Cameras often leave a blank comment behind
            let comment = decode_user_comment(bytes, exif.little_endian());
            if !comment.trim().is_empty() {
                fields.insert(PARAMETERS_FIELD.to_string(), comment);
            }
        }
    }
    if let Some(field) = exif.get_field(exif::Tag::ImageDescription, exif::In::PRIMARY) {
        if let exif::Value::Ascii(ref values) = field.value {
            if let Some(bytes) = values.first() {
                fields.insert(
                    DESCRIPTION_FIELD.to_string(),
                    String::from_utf8_lossy(bytes).into_owned(),
                );
            }
        }
    }
    Ok(fields)
}

/// EXIF `UserComment` starts with an 8-byte character code. `UNICODE`
/// text is UTF-16 in the byte order of the surrounding EXIF block.
fn decode_user_comment(bytes: &[u8], little_endian: bool) -> String {
    let (code, body) = if bytes.len() >= 8 {
        bytes.split_at(8)
    } else {
        (&[][..], bytes)
    };

    let text = if code == b"UNICODE\0" {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| {
                if little_endian {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else if code == b"ASCII\0\0\0" || code == &[0u8; 8] {
        String::from_utf8_lossy(body).into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    text.trim_end_matches('\0').to_string()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> TextFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_workflow_prompts_dedupe_longest_first() {
        let workflow = json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": 1}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "a red fox in snow, detailed"}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "blurry"}},
            "8": {"class_type": "CLIPTextEncodeSDXL", "inputs": {
                "text_g": "a red fox in snow, detailed",
                "text_l": "red fox",
                "clip": ["4", 1]
            }},
            "9": {"class_type": "CLIPTextEncode", "inputs": {"text": "tiny"}},
            "10": {"class_type": "CLIPTextEncode"},
            "11": "not a node",
            "12": {"class_type": "CLIPTextEncode", "inputs": {"string": ["5", 0]}}
        });

        let prompts = workflow_prompts(&workflow);
        assert_eq!(prompts, vec!["a red fox in snow, detailed", "red fox", "blurry"]);
    }

    #[test]
    fn test_workflow_wins_over_parameters() {
        let workflow = json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "castle on a hill"}}
        })
        .to_string();
        let f = fields(&[(WORKFLOW_FIELD, &workflow), (PARAMETERS_FIELD, "ignored\nSteps: 20")]);
        assert_eq!(prompt_from_fields(&f).as_deref(), Some("castle on a hill"));
    }

    #[test]
    fn test_bad_workflow_falls_back_to_parameters_first_line() {
        let f = fields(&[
            (WORKFLOW_FIELD, "{not json"),
            (PARAMETERS_FIELD, "  portrait of an astronaut  \nNegative prompt: ugly\nSteps: 30"),
        ]);
        assert_eq!(prompt_from_fields(&f).as_deref(), Some("portrait of an astronaut"));
    }

    #[test]
    fn test_workflow_without_text_nodes_falls_back() {
        let workflow = json!({"1": {"class_type": "KSampler", "inputs": {}}}).to_string();
        let f = fields(&[(WORKFLOW_FIELD, &workflow), (DESCRIPTION_FIELD, "  a lake at dusk \n")]);
        assert_eq!(prompt_from_fields(&f).as_deref(), Some("a lake at dusk"));
    }

    #[test]
    fn test_no_recognized_fields() {
        assert_eq!(prompt_from_fields(&TextFields::new()), None);
        assert_eq!(prompt_from_fields(&fields(&[("Software", "GIMP")])), None);
        assert_eq!(prompt_from_fields(&fields(&[(PARAMETERS_FIELD, "\nSteps: 20")])), None);
    }

    #[test]
    fn test_decode_user_comment() {
        let mut unicode = b"UNICODE\0".to_vec();
        for unit in "hi there".encode_utf16() {
            unicode.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_user_comment(&unicode, false), "hi there");

        let mut unicode_le = b"UNICODE\0".to_vec();
        for unit in "hi there".encode_utf16() {
            unicode_le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_user_comment(&unicode_le, true), "hi there");

        let mut ascii = b"ASCII\0\0\0".to_vec();
        ascii.extend_from_slice(b"sunset\0");
        assert_eq!(decode_user_comment(&ascii, true), "sunset");
        assert_eq!(decode_user_comment(b"ASCII\0\0\0", false), "");
    }
}
