use crate::utils::error::{Result, SearchError};

/// Characters of offending output kept in parse-failure diagnostics.
const DIAG_SNIPPET_CHARS: usize = 200;

/// Recovers a single JSON value from backend stdout that may carry log lines
/// before, after, or around the payload.
///
/// Whole-string parse first (the clean case), then a left-to-right scan that
/// attempts a prefix decode at every `{` or `[`. The first position that
/// decodes to a complete value wins.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    if text.trim().is_empty() {
        return Err(SearchError::JsonParse {
            detail: "empty output".to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    for (idx, byte) in text.bytes().enumerate() {
        if byte != b'{' && byte != b'[' {
            continue;
        }
        // `{` and `[` are ASCII, so idx is always a char boundary.
        let mut stream =
            serde_json::Deserializer::from_str(&text[idx..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }

    Err(SearchError::JsonParse {
        detail: snippet(text),
    })
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= DIAG_SNIPPET_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(DIAG_SNIPPET_CHARS).collect()
    }
}
