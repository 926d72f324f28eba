use crate::event::{json_str, json_u64, Event};

use super::{LastSeen, NdpContext, ObservationDoc, ObservationId, Slot};

/// File transfer observations, addressed by the transferred file's md5.
pub(super) fn collect(last: &mut LastSeen, ctx: &mut NdpContext<'_>, event: &Event) {
    let fileinfo = event.nested("fileinfo");

    let file_md5 = fileinfo
        .as_ref()
        .map(|f| json_str(f, "md5").to_string())
        .unwrap_or_default();

    let id = ObservationId::of(&file_md5);
    if !file_md5.is_empty() && last.is_repeat(Slot::Fileinfo, &id) {
        ctx.skip("fileinfo", &id);
        return;
    }

    let mut doc = ObservationDoc::new("fileinfo");
    doc.common(event, ctx.cfg)
        .str_field("app_proto", event.app_proto());

    if let Some(fileinfo) = &fileinfo {
        doc.str_field("md5", &file_md5)
            .str_field("sha1", json_str(fileinfo, "sha1"))
            .str_field("sha256", json_str(fileinfo, "sha256"))
            .str_field("filename", json_str(fileinfo, "filename"))
            .str_field("magic", json_str(fileinfo, "magic"))
            .u64_field("size", json_u64(fileinfo, "size"));
    } else {
        doc.u64_field("size", 0);
    }

    ctx.emit(last, Slot::Fileinfo, "fileinfo", id, &doc.finish());
}
