use crate::event::{json_str, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// DNS observations record queries only; answers are dropped silently.
/// Addressed by the queried name.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let Some(dns) = event.nested("dns") else {
        return;
    };

    if json_str(&dns, "type") != "query" {
        return;
    }

    let rrname = json_str(&dns, "rrname");
    if rrname.is_empty() {
        return;
    }

    let id = ObservationId::of(rrname);
    if last.is_repeat(Slot::Dns, &id) {
        ctx.skip("dns", &id);
        return;
    }

    let mut doc = ObservationDoc::new("dns");
    doc.common(event, ctx.cfg)
        .str_field("rrname", rrname)
        .str_field("rrtype", json_str(&dns, "rrtype"));

    ctx.emit(last, Slot::Dns, "dns", id, &doc.finish());
}
