use crate::event::{json_str, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// FTP observations for the configured command set (uploads, downloads,
/// usernames), addressed by command plus its argument.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let Some(ftp) = event.nested("ftp") else {
        return;
    };

    let command = json_str(&ftp, "command");
    if !ctx.cfg.ftp_commands.contains(command) {
        return;
    }

    let command_data = json_str(&ftp, "command_data");
    if command_data.is_empty() {
        return;
    }

    let id = ObservationId::of(&format!("{command}|{command_data}"));
    if last.is_repeat(Slot::Ftp, &id) {
        ctx.skip("ftp", &id);
        return;
    }

    let mut doc = ObservationDoc::new("ftp");
    doc.common(event, ctx.cfg)
        .str_field("command", command)
        .str_field("command_data", command_data);

    ctx.emit(last, Slot::Ftp, "ftp", id, &doc.finish());
}
