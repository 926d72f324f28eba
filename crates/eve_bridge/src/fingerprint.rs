use serde_json::Value;
use tracing::warn;

use crate::event::{nested_object, Event};

/// Fingerprint directives carried in a rule's `alert.metadata`. Rules tag
/// themselves with `fingerprint_os`, `fingerprint_source`,
/// `fingerprint_type`, and `fingerprint_expire`; an alert from such a rule
/// publishes a fingerprint instead of being routed as an ordinary alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintMeta {
    pub os: String,
    pub source: String,
    /// `"client"`, `"server"`, or empty when the rule did not say.
    pub kind: String,
    /// TTL in seconds; 0 means "use the configured default".
    pub expire: u64,
    /// True iff at least one recognised key was present.
    pub present: bool,
}

impl Default for FingerprintMeta {
    fn default() -> Self {
        Self {
            os: "unknown".to_string(),
            source: "unknown".to_string(),
            kind: String::new(),
            expire: 0,
            present: false,
        }
    }
}

/// Extract fingerprint directives from an alert's rule metadata. Absent
/// alert or metadata subobjects yield `present == false`.
pub fn parse_fingerprint_meta(event: &Event) -> FingerprintMeta {
    let mut meta = FingerprintMeta::default();

    let Some(alert) = event.nested("alert") else {
        return meta;
    };
    let Some(metadata) = nested_object(&alert, "metadata") else {
        return meta;
    };

    if let Some(value) = metadata.get("fingerprint_os") {
        meta.present = true;
        let os = first_token(&scalar_text(value));
        if os.is_empty() {
            warn!("could not decode fingerprint_os from rule metadata");
        } else {
            meta.os = os;
        }
    }

    if let Some(value) = metadata.get("fingerprint_source") {
        meta.present = true;
        let source = first_token(&scalar_text(value));
        if source.is_empty() {
            warn!("could not decode fingerprint_source from rule metadata");
        } else {
            meta.source = source;
        }
    }

    if let Some(value) = metadata.get("fingerprint_expire") {
        meta.present = true;
        meta.expire = first_token(&scalar_text(value)).parse().unwrap_or(0);
    }

    if let Some(value) = metadata.get("fingerprint_type") {
        meta.present = true;
        let text = scalar_text(value).to_ascii_lowercase();
        if text.contains("client") {
            meta.kind = "client".to_string();
        } else if text.contains("server") {
            meta.kind = "server".to_string();
        }
    }

    meta
}

/// Metadata values arrive as strings, arrays of strings, or occasionally
/// raw tokens; render whatever is there as text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.first().map(scalar_text).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Strip surrounding array brackets and quotes, then take the first token:
/// a quoted segment is taken whole, otherwise text up to the first comma.
fn first_token(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    if let Some(rest) = stripped.strip_prefix('"') {
        let end = rest.find('"').unwrap_or(rest.len());
        return rest[..end].to_string();
    }

    stripped
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
