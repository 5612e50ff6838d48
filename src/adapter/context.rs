//! Speech-context composition.
//!
//! The `speech.context` message is assembled from two optional fragments:
//! grammar hints (DGI) derived from the site's listen-for list, and an
//! intent-service descriptor. Values are composed as JSON trees so that
//! embedded quotes and backslashes in hints or credentials are escaped.

use serde_json::{json, Value};

/// Wire message path for the speech context.
pub const SPEECH_CONTEXT_PATH: &str = "speech.context";

/// Partition of the listen-for list into reference grammars and generic
/// phrase hints.
///
/// An item shaped `{name:ref}` (braces at both ends, a colon inside,
/// longer than three characters) is a reference grammar; the braces are
/// stripped and the first colon becomes a slash. Everything else is a
/// generic phrase.
fn partition_listen_for(listen_for: &[String]) -> (Vec<String>, Vec<String>) {
    let mut grammars = Vec::new();
    let mut generic = Vec::new();

    for item in listen_for {
        let is_ref = item.len() > 3
            && item.starts_with('{')
            && item.ends_with('}')
            && item.contains(':');
        if is_ref {
            let inner = &item[1..item.len() - 1];
            grammars.push(inner.replacen(':', "/", 1));
        } else {
            generic.push(item.clone());
        }
    }

    (grammars, generic)
}

/// Build the DGI fragment, or `None` when the listen-for list is empty.
pub fn dgi_json(listen_for: &[String]) -> Option<Value> {
    let (grammars, generic) = partition_listen_for(listen_for);
    if grammars.is_empty() && generic.is_empty() {
        return None;
    }

    let mut dgi = serde_json::Map::new();
    if !generic.is_empty() {
        let items: Vec<Value> = generic.iter().map(|text| json!({ "Text": text })).collect();
        dgi.insert(
            "Groups".to_string(),
            json!([{ "Type": "Generic", "Items": items }]),
        );
    }
    if !grammars.is_empty() {
        dgi.insert("ReferenceGrammars".to_string(), json!(grammars));
    }

    Some(Value::Object(dgi))
}

/// Build the intent fragment, or `None` unless provider, id, and key are
/// all non-empty.
pub fn intent_json(provider: &str, id: &str, key: &str) -> Option<Value> {
    if provider.is_empty() || id.is_empty() || key.is_empty() {
        return None;
    }
    Some(json!({ "provider": provider, "id": id, "key": key }))
}

/// Compose the final speech-context payload. `None` when both fragments
/// are absent, in which case no context message is sent at all.
pub fn speech_context_json(dgi: Option<Value>, intent: Option<Value>) -> Option<String> {
    if dgi.is_none() && intent.is_none() {
        return None;
    }

    let mut context = serde_json::Map::new();
    if let Some(dgi) = dgi {
        context.insert("dgi".to_string(), dgi);
    }
    if let Some(intent) = intent {
        context.insert("intent".to_string(), intent);
    }

    Some(Value::Object(context).to_string())
}
