//! Locating JSON payloads inside free-form model output.

use serde_json::Value;

/// Candidate JSON payloads in order of preference.
///
/// Fenced code blocks (```json or a bare fence whose body starts with `{`)
/// come first, then every top-level JSON object embedded in the text in order
/// of appearance. Duplicates are dropped.
pub fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = Vec::new();
    for block in fenced_blocks(text) {
        if !candidates.contains(&block) {
            candidates.push(block);
        }
    }
    for object in embedded_objects(text) {
        if !candidates.contains(&object) {
            candidates.push(object);
        }
    }
    candidates
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    let mut offset = 0;
    while let Some(open) = rest.find("```") {
        let after_fence = open + 3;
        let line_end = rest[after_fence..]
            .find('\n')
            .map(|i| after_fence + i)
            .unwrap_or(rest.len());
        let tag = rest[after_fence..line_end].trim();
        let body_start = (line_end + 1).min(rest.len());
        let Some(close) = rest[body_start..].find("```") else {
            break;
        };
        let body = rest[body_start..body_start + close].trim();
        let is_json = tag.eq_ignore_ascii_case("json")
            || (tag.is_empty() && (body.starts_with('{') || body.starts_with('[')));
        if is_json && !body.is_empty() {
            let start = offset + body_start + (rest[body_start..].len() - rest[body_start..].trim_start().len());
            blocks.push(&text[start..start + body.len()]);
        }
        let consumed = body_start + close + 3;
        offset += consumed;
        rest = &rest[consumed..];
    }
    blocks
}

/// Every JSON object embedded in `text`. Each `{` is tried as a start until one
/// parses; a stray brace in prose only costs that one attempt.
fn embedded_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match object_len(&text[start..]) {
            Some(len) => {
                objects.push(&text[start..start + len]);
                from = start + len;
            }
            None => from = start + 1,
        }
    }
    objects
}

/// Byte length of the JSON object at the head of `text`, if one parses there.
fn object_len(text: &str) -> Option<usize> {
    let mut values = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(_))) => Some(values.byte_offset()),
        _ => None,
    }
}
