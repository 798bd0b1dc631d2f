//! Recovery of a JSON object from free-text agent replies.

use regex::Regex;
use serde_json::Value;

/// Extracts the JSON object an agent embedded in `text`.
///
/// Tries, in order: the whole text, each fenced markdown code block, and
/// each balanced `{...}` span.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }

    if let Ok(re) = Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```") {
        for cap in re.captures_iter(text) {
            if let Some(body) = cap.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                    if value.is_object() {
                        return Some(value);
                    }
                }
            }
        }
    }

    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..start + end]) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Byte length of the balanced object starting at `s[0] == '{'`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
