//! Layered header merging with case-insensitive overwrite.

use crate::domain::entities::ContentMode;
use indexmap::IndexMap;

/// Headers implied by the content mode.
///
/// Multipart deliberately takes its Content-Type from the body encoder so the
/// boundary parameter survives; json and form set theirs here.
pub fn mode_headers(
    mode: ContentMode,
    encoder_content_type: Option<&str>,
) -> IndexMap<String, String> {
    let mut headers = IndexMap::new();
    match mode {
        ContentMode::Json => {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
            headers.insert("Accept".to_string(), "application/json".to_string());
        }
        ContentMode::Form => {
            headers.insert(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            );
        }
        ContentMode::Multipart => {
            if let Some(content_type) = encoder_content_type {
                headers.insert("Content-Type".to_string(), content_type.to_string());
            }
        }
        ContentMode::None => {}
    }
    headers
}

/// Merges the three header layers in precedence order: configured defaults,
/// then mode-derived headers, then explicit per-request headers.
///
/// Overwrites compare names case-insensitively and keep the last-written
/// casing. An empty value unsets the header instead of sending it blank,
/// which lets an explicit `Header:` suppress a default.
pub fn merge(
    defaults: &IndexMap<String, String>,
    mode: &IndexMap<String, String>,
    explicit: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut merged = IndexMap::new();
    for layer in [defaults, mode, explicit] {
        for (name, value) in layer {
            let existing = merged
                .keys()
                .find(|k: &&String| k.eq_ignore_ascii_case(name))
                .cloned();
            if let Some(old) = existing {
                merged.shift_remove(&old);
            }
            if !value.is_empty() {
                merged.insert(name.clone(), value.clone());
            }
        }
    }
    merged
}
