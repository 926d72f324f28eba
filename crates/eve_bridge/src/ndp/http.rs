use crate::event::{json_str, json_u64, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// HTTP events yield up to two observations with independent slots: the
/// requested URL (hostname + path) and the user agent. One may be a
/// repeat while the other emits.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let Some(http) = event.nested("http") else {
        return;
    };

    let hostname = json_str(&http, "hostname");
    let url = json_str(&http, "url");
    let user_agent = json_str(&http, "http_user_agent");
    let full_url = format!("{hostname}{url}");

    let url_id = ObservationId::of(&full_url);
    if last.is_repeat(Slot::HttpUrl, &url_id) {
        ctx.skip("http url", &url_id);
    } else {
        let mut doc = ObservationDoc::new("http");
        doc.common(event, ctx.cfg)
            .str_field("url", &full_url)
            .str_field("user_agent", user_agent)
            .str_field("method", json_str(&http, "method"))
            .u64_field("status", json_u64(&http, "status"))
            .u64_field("length", json_u64(&http, "length"));

        ctx.emit(last, Slot::HttpUrl, "http url", url_id, &doc.finish());
    }

    let agent_id = ObservationId::of(user_agent);
    if last.is_repeat(Slot::UserAgent, &agent_id) {
        ctx.skip("http user_agent", &agent_id);
        return;
    }

    let mut doc = ObservationDoc::new("user_agent");
    doc.common(event, ctx.cfg).str_field("user_agent", user_agent);

    ctx.emit(last, Slot::UserAgent, "http user_agent", agent_id, &doc.finish());
}
