use crate::event::{json_str, nested_object, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// SSH banner observations, addressed by the listening endpoint plus both
/// advertised software versions.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let ssh = event.nested("ssh");

    let mut proto_version = String::new();
    let mut client_version = String::new();
    let mut server_version = String::new();

    if let Some(ssh) = &ssh {
        let client = nested_object(ssh, "client");
        let server = nested_object(ssh, "server");

        if let Some(client) = &client {
            proto_version = json_str(client, "proto_version").to_string();
            client_version = json_str(client, "software_version").to_string();
        }

        // Some sensor builds mirror the server banner into the client
        // record; the toggle keeps ids stable against such feeds.
        let server_source = if ctx.cfg.ssh_server_version_from_client {
            &client
        } else {
            &server
        };
        if let Some(source) = server_source {
            server_version = json_str(source, "software_version").to_string();
        }
    }

    let canonical = format!(
        "{}:{}:{}:{}",
        event.dest_ip(),
        event.dest_port(),
        server_version,
        client_version
    );
    let id = ObservationId::of(&canonical);

    if last.is_repeat(Slot::Ssh, &id) {
        ctx.skip("ssh", &id);
        return;
    }

    let mut doc = ObservationDoc::new("ssh");
    doc.common(event, ctx.cfg)
        .port_field("src_port", event.src_port())
        .port_field("dest_port", event.dest_port())
        .str_field("proto_version", &proto_version)
        .str_field("server_version", &server_version)
        .str_field("client_version", &client_version);

    ctx.emit(last, Slot::Ssh, "ssh", id, &doc.finish());
}
