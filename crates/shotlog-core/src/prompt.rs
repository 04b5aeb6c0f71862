use serde_json::{Value, json};

use crate::models::Record;

/// Render the batch prompt: one JSON payload object per record, embedded
/// in a fixed instruction template that asks for a JSON array in input
/// order.
#[must_use]
pub fn build_batch_prompt(batch: &[Record]) -> String {
    let payload: Vec<Value> = batch
        .iter()
        .map(|record| {
            json!({
                "filename": record.id,
                "captured_at": record.captured_at,
                "ocr_text": record.ocr_text,
            })
        })
        .collect();
    let items = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a tagging assistant.

Analyze each screenshot object below and output a JSON array of objects in the same order.

For each screenshot:
- Suggest 3-5 topical tags (project/game/tool, category, theme).
- Write a short one-sentence summary.
- Include a confidence score (0-1).
- If you cannot classify or are uncertain, set "ask_user": true and leave "tags_ai" empty.

Input screenshots:
{items}

Return **only** JSON, in this structure:
[
  {{
    "filename": "...",
    "tags_ai": ["Tag1", "Tag2"],
    "summary": "...",
    "confidence": 0.93,
    "ask_user": false
  }},
  ...
]"#
    )
}

/// Render the retry prompt for a single record, feeding the previous
/// low-confidence result back as context and asking for one JSON object.
#[must_use]
pub fn build_retry_prompt(record: &Record, previous: &Value) -> String {
    let previous_confidence = previous.get("confidence").cloned().unwrap_or(json!(0));
    let hint_tags = crate::models::result_tags(previous).join(", ");
    let hints = if hint_tags.is_empty() {
        "None".to_string()
    } else {
        hint_tags
    };
    let payload = json!({
        "filename": record.id,
        "captured_at": record.captured_at,
        "ocr_text": record.ocr_text,
    });
    let item = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You returned low confidence ({previous_confidence}) for:\n{item}\n\nPrevious tags: {hints}\n\nTry again and output a single JSON object with improved tags and summary.\nReturn only JSON."
    )
}
