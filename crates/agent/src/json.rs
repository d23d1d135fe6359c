//! Pulls a JSON object out of free-form model output.

/// Return the span from the first `{` to the last `}` in `text`.
///
/// Models often wrap their JSON in prose or code fences. This is a
/// best-effort cut, not a tokenizer: several JSON fragments in one answer
/// are captured together, and braces inside string literals are not
/// special. When no such span exists the input comes back unchanged and
/// the caller's parser is expected to reject it.
pub fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
