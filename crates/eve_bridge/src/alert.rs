use serde_json::{Map, Value};
use tracing::warn;

use crate::classifications::Classifications;
use crate::correlate::{CorrelationClient, KvStore};
use crate::event::{json_str, json_u64, Event};
use crate::netrange::CidrSet;

/// Normalised alert, constructed per event and consumed by the router.
/// `new_json_string` is the rewritten serialisation downstream sinks see.
#[derive(Debug, Clone, Default)]
pub struct AlertRecord {
    pub timestamp: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub src_port: u16,
    pub dest_port: u16,
    pub proto: String,
    pub flow_id: u64,
    pub signature_id: u64,
    pub rev: u64,
    pub signature: String,
    pub classification: String,
    pub new_json_string: String,
}

/// Build the normalised record and the first rewrite: the original fields
/// plus the resolved classification description.
pub fn decode_alert(
    event: &Event,
    classifications: &Classifications,
    payload_buffer_size: usize,
) -> AlertRecord {
    let mut record = AlertRecord {
        timestamp: event.timestamp().to_string(),
        src_ip: event.src_ip().to_string(),
        dest_ip: event.dest_ip().to_string(),
        src_port: event.src_port(),
        dest_port: event.dest_port(),
        proto: event.proto().to_string(),
        flow_id: event.flow_id(),
        ..AlertRecord::default()
    };

    let mut token = String::new();
    if let Some(alert) = event.nested("alert") {
        record.signature_id = json_u64(&alert, "signature_id");
        record.rev = json_u64(&alert, "rev");
        record.signature = json_str(&alert, "signature").to_string();

        token = json_str(&alert, "classtype").to_string();
        if token.is_empty() {
            token = json_str(&alert, "category").to_string();
        }
    } else {
        warn!("alert event without an alert record");
    }

    record.classification = classifications.resolve(&token).to_string();

    let mut rewritten = match event.value() {
        Value::Object(doc) => doc.clone(),
        _ => Map::new(),
    };
    rewritten.insert(
        "classification".to_string(),
        Value::String(record.classification.clone()),
    );

    record.new_json_string = Value::Object(rewritten).to_string();
    if record.new_json_string.len() > payload_buffer_size {
        warn!(
            signature_id = record.signature_id,
            "rewritten alert exceeds payload buffer, truncating"
        );
        truncate_on_char_boundary(&mut record.new_json_string, payload_buffer_size);
    }

    record
}

/// Splice stored correlations for any in-scope endpoint into the rewrite:
/// `fingerprint_dhcp_<dir>` for the DHCP binding, `fingerprint_<dir>_<i>`
/// for each stored fingerprint. Everything here is best-effort; the alert
/// proceeds with whatever enrichment fit.
pub fn enrich_alert<S: KvStore>(
    record: &mut AlertRecord,
    event: &Event,
    client: &mut CorrelationClient<S>,
    interest: &CidrSet,
    payload_buffer_size: usize,
) {
    let Ok(Value::Object(mut doc)) = serde_json::from_str(&record.new_json_string) else {
        // A truncated rewrite is no longer a JSON object; leave it alone.
        return;
    };

    let mut budget_left = true;

    for (ip, direction) in [(event.src_ip(), "src"), (event.dest_ip(), "dest")] {
        if !budget_left {
            break;
        }
        if ip.is_empty() || !interest.contains_str(ip) {
            continue;
        }

        let correlations = client.lookup_correlations(ip);

        if let Some(dhcp) = correlations.dhcp {
            budget_left = splice_field(
                &mut doc,
                format!("fingerprint_dhcp_{direction}"),
                dhcp,
                payload_buffer_size,
            );
        }

        for (index, body) in correlations.events.iter().enumerate() {
            if !budget_left {
                break;
            }
            let Some(fp) = body.get("fingerprint") else {
                warn!(%ip, "stored fingerprint body has no fingerprint record");
                continue;
            };
            budget_left = splice_field(
                &mut doc,
                format!("fingerprint_{direction}_{index}"),
                fp.clone(),
                payload_buffer_size,
            );
        }
    }

    record.new_json_string = Value::Object(doc).to_string();
}

/// Insert `value` unless the serialisation would cross the payload bound;
/// returns false once the budget is gone so callers stop splicing.
fn splice_field(
    doc: &mut Map<String, Value>,
    key: String,
    value: Value,
    payload_buffer_size: usize,
) -> bool {
    doc.insert(key.clone(), value);
    if Value::Object(doc.clone()).to_string().len() > payload_buffer_size {
        doc.remove(&key);
        warn!(field = %key, "correlation splice exceeds payload buffer, dropped");
        return false;
    }
    true
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    let mut end = max.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
