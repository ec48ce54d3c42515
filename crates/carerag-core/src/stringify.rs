//! Flattens structured documents into prose before chunking.

use crate::types::SourceValue;

/// Fields treated as the primary content of an object, in priority order.
pub const PREFERRED_FIELDS: [&str; 6] = ["title", "content", "description", "body", "text", "answer"];

/// Recursive descent over a structured value.
///
/// Objects contribute their preferred fields when any is present and
/// non-empty, otherwise every value. Parts are trimmed and empty parts are
/// dropped before joining with a single space.
pub fn stringify(value: &SourceValue) -> String {
    match value {
        SourceValue::Text(s) => s.clone(),
        SourceValue::List(items) => join_parts(items.iter().map(stringify)),
        SourceValue::Object(fields) => {
            let preferred: Vec<&SourceValue> = PREFERRED_FIELDS
                .iter()
                .filter_map(|key| value.field(key))
                .filter(|v| !v.is_empty())
                .collect();
            if preferred.is_empty() {
                join_parts(fields.iter().map(|(_, v)| stringify(v)))
            } else {
                join_parts(preferred.into_iter().map(stringify))
            }
        }
    }
}

fn join_parts(parts: impl Iterator<Item = String>) -> String {
    parts
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
