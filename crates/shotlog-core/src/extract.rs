use serde_json::{Value, json};

/// Recover a structured value from untrusted model text.
///
/// The generation often wraps its JSON in prose ("Sure! here is ...",
/// trailing "Hope this helps"), fences it, or truncates it. Strategy:
/// take the first `[` or `{`, then try every end position from the end of
/// the text backwards; the first slice that parses wins, which keeps the
/// longest valid prefix starting at the opening bracket. Deterministic and
/// side-effect free.
///
/// When no bracket exists or nothing parses, the sentinel
/// `{"ask_user": true}` is returned; this function never errors.
#[must_use]
pub fn extract_json_block(text: &str) -> Value {
    let Some(start) = text
        .char_indices()
        .find(|(_, c)| *c == '[' || *c == '{')
        .map(|(idx, _)| idx)
    else {
        return sentinel();
    };

    let candidate = &text[start..];
    let mut end = candidate.len();
    while end > 0 {
        if candidate.is_char_boundary(end) {
            if let Ok(parsed) = serde_json::from_str::<Value>(&candidate[..end]) {
                return parsed;
            }
        }
        end -= 1;
    }
    sentinel()
}

#[must_use]
pub fn sentinel() -> Value {
    json!({"ask_user": true})
}
