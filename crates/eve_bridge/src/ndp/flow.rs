use std::net::IpAddr;

use crate::event::{json_bool, json_str, json_u64, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// Flows yield one observation per external endpoint, content-addressed by
/// the endpoint address itself. Both endpoint digests are checked against
/// the single flow slot before any work happens.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let src_ip = event.src_ip();
    let dest_ip = event.dest_ip();

    for ip in [src_ip, dest_ip] {
        let id = ObservationId::of(ip);
        if last.is_repeat(Slot::Flow, &id) {
            ctx.skip("flow", &id);
            return;
        }
    }

    let Some(flow) = event.nested("flow") else {
        return;
    };
    let state = json_str(&flow, "state");
    if state.is_empty() {
        return;
    }

    for (ip, direction) in [(src_ip, "src_ip"), (dest_ip, "dest_ip")] {
        if ctx.cfg.ndp_ignore.contains_str(ip) || ip.parse::<IpAddr>().is_err() {
            continue;
        }

        let mut app_proto = event.app_proto();
        if app_proto.is_empty() {
            app_proto = "unknown";
        }

        let mut doc = ObservationDoc::new("flow");
        doc.common(event, ctx.cfg)
            .str_field("direction", direction)
            .str_field("ip_address", ip)
            .str_field("proto", event.proto())
            .str_field("app_proto", app_proto)
            .u64_field("bytes_toserver", json_u64(&flow, "bytes_toserver"))
            .u64_field("bytes_toclient", json_u64(&flow, "bytes_toclient"))
            .u64_field("age", json_u64(&flow, "age"))
            .str_field("state", state)
            .str_field("reason", json_str(&flow, "reason"))
            .bool_field("alerted", json_bool(&flow, "alerted"))
            .str_field("start", json_str(&flow, "start"))
            .str_field("end", json_str(&flow, "end"));

        let id = ObservationId::of(ip);
        ctx.emit(last, Slot::Flow, "flow", id, &doc.finish());
    }
}
