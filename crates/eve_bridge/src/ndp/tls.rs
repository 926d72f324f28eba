use tracing::warn;

use crate::event::{json_str, nested_object, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// TLS session observations, addressed by the `ja3:ja3s` pair. Events
/// with neither hash are dropped with a warning; that usually means the
/// sensor is not configured to compute them.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let Some(tls) = event.nested("tls") else {
        return;
    };

    let ja3 = nested_object(&tls, "ja3")
        .map(|j| json_str(&j, "hash").to_string())
        .unwrap_or_default();
    let ja3s = nested_object(&tls, "ja3s")
        .map(|j| json_str(&j, "hash").to_string())
        .unwrap_or_default();

    if ja3.is_empty() && ja3s.is_empty() {
        warn!("no JA3 or JA3S hash located; is the sensor sending this data?");
        return;
    }

    let id = ObservationId::of(&format!("{ja3}:{ja3s}"));
    if last.is_repeat(Slot::Tls, &id) {
        ctx.skip("tls", &id);
        return;
    }

    let mut doc = ObservationDoc::new("tls");
    doc.common(event, ctx.cfg)
        .str_field("fingerprint", json_str(&tls, "fingerprint"))
        .str_field("issuerdn", json_str(&tls, "issuerdn"))
        .str_field("subject", json_str(&tls, "subject"))
        .str_field("serial", json_str(&tls, "serial"))
        .str_field("sni", json_str(&tls, "sni"))
        .str_field("version", json_str(&tls, "version"))
        .str_field("notbefore", json_str(&tls, "notbefore"))
        .str_field("notafter", json_str(&tls, "notafter"))
        .str_field("ja3", &ja3)
        .str_field("ja3s", &ja3s);

    ctx.emit(last, Slot::Tls, "tls", id, &doc.finish());
}
