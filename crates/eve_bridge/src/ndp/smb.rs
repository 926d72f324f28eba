use crate::event::{json_str, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// SMB observations for the configured command set, addressed by
/// command plus filename so reads and writes of the same file surface
/// separately.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let Some(smb) = event.nested("smb") else {
        return;
    };

    let command = json_str(&smb, "command");
    if !ctx.cfg.smb_commands.contains(command) {
        return;
    }

    let filename = json_str(&smb, "filename");
    if filename.is_empty() {
        return;
    }

    let id = ObservationId::of(&format!("{command}|{filename}"));
    if last.is_repeat(Slot::Smb, &id) {
        ctx.skip("smb", &id);
        return;
    }

    let mut doc = ObservationDoc::new("smb");
    doc.common(event, ctx.cfg)
        .str_field("command", command)
        .str_field("filename", filename);

    ctx.emit(last, Slot::Smb, "smb", id, &doc.finish());
}
