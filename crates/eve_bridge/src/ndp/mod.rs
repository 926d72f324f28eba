//! Network discovery collector. Non-alert protocol events are distilled
//! into canonical observations, content-addressed by a 128-bit digest and
//! de-duplicated against the last observation of the same type, then
//! indexed into the search cluster under [`NDP_INDEX`].

use std::fmt;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::counters::Counters;
use crate::event::Event;
use crate::sink::SearchSink;

mod dns;
mod fileinfo;
mod flow;
mod ftp;
mod http;
mod smb;
mod ssh;
mod tls;

pub const NDP_INDEX: &str = "ndp";

/// Content address of one observation: md5 over a type-specific canonical
/// string, rendered as 32 lowercase hex characters for document ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationId([u8; 16]);

impl ObservationId {
    pub fn of(canonical: &str) -> Self {
        Self(md5::compute(canonical.as_bytes()).0)
    }

    pub fn hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// One dedup slot per observation type. The policy is "don't emit the same
/// observation twice in a row", not "emit each unique observation once":
/// interleaved traffic may legitimately re-emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Flow,
    Fileinfo,
    Tls,
    Dns,
    Ssh,
    HttpUrl,
    UserAgent,
    Smb,
    Ftp,
}

#[derive(Debug, Default)]
pub(crate) struct LastSeen {
    slots: [Option<ObservationId>; 9],
}

impl LastSeen {
    fn index(slot: Slot) -> usize {
        match slot {
            Slot::Flow => 0,
            Slot::Fileinfo => 1,
            Slot::Tls => 2,
            Slot::Dns => 3,
            Slot::Ssh => 4,
            Slot::HttpUrl => 5,
            Slot::UserAgent => 6,
            Slot::Smb => 7,
            Slot::Ftp => 8,
        }
    }

    pub(crate) fn is_repeat(&self, slot: Slot, id: &ObservationId) -> bool {
        self.slots[Self::index(slot)].as_ref() == Some(id)
    }

    pub(crate) fn remember(&mut self, slot: Slot, id: ObservationId) {
        self.slots[Self::index(slot)] = Some(id);
    }
}

/// Shared handles threaded through the per-protocol routines.
pub(crate) struct NdpContext<'a> {
    pub cfg: &'a BridgeConfig,
    pub counters: &'a Counters,
    pub search: &'a mut dyn SearchSink,
}

impl NdpContext<'_> {
    /// Record a dedup hit.
    fn skip(&self, what: &str, id: &ObservationId) {
        if self.cfg.ndp_debug {
            debug!(observation = what, id = %id, "SKIP");
        }
        self.counters.bump_ndp_skip();
    }

    /// Index the observation; the slot is updated only on success so a
    /// failed delivery gets retried by the next identical observation.
    fn emit(
        &mut self,
        last: &mut LastSeen,
        slot: Slot,
        what: &str,
        id: ObservationId,
        doc: &str,
    ) {
        if self.cfg.ndp_debug {
            debug!(observation = what, %id, document = doc, "INSERT");
        }
        match self.search.index(NDP_INDEX, Some(&id.hex()), doc) {
            Ok(()) => {
                self.counters.bump_ndp();
                last.remember(slot, id);
            }
            Err(err) => {
                warn!(observation = what, %id, error = %err, "ndp delivery failed");
                self.counters.bump_sink_error();
            }
        }
    }
}

/// Normalised observation under construction. Empty strings are omitted;
/// numeric and boolean fields are written even when zero/false.
pub(crate) struct ObservationDoc {
    doc: Map<String, Value>,
}

impl ObservationDoc {
    pub(crate) fn new(observation_type: &str) -> Self {
        let mut doc = Map::new();
        doc.insert("type".to_string(), json!(observation_type));
        Self { doc }
    }

    pub(crate) fn str_field(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.doc.insert(key.to_string(), json!(value));
        }
        self
    }

    pub(crate) fn u64_field(&mut self, key: &str, value: u64) -> &mut Self {
        self.doc.insert(key.to_string(), json!(value));
        self
    }

    pub(crate) fn port_field(&mut self, key: &str, value: u16) -> &mut Self {
        if value != 0 {
            self.doc.insert(key.to_string(), json!(value));
        }
        self
    }

    pub(crate) fn bool_field(&mut self, key: &str, value: bool) -> &mut Self {
        self.doc.insert(key.to_string(), json!(value));
        self
    }

    /// The header every observation shares.
    pub(crate) fn common(&mut self, event: &Event, cfg: &BridgeConfig) -> &mut Self {
        self.str_field("timestamp", event.timestamp())
            .str_field("src_ip", event.src_ip())
            .str_field("dest_ip", event.dest_ip())
            .u64_field("flow_id", event.flow_id())
            .str_field("src_dns", event.src_dns())
            .str_field("dest_dns", event.dest_dns())
            .str_field("host", event.host())
            .str_field("description", &cfg.description)
    }

    pub(crate) fn finish(&self) -> String {
        Value::Object(self.doc.clone()).to_string()
    }
}

/// Owns the dedup slots; everything else is threaded per call.
#[derive(Debug, Default)]
pub struct NdpCollector {
    last: LastSeen,
}

impl NdpCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one non-alert event to its protocol routine, subject to the
    /// per-protocol policy flags and the ignore-set gate.
    pub fn collect(
        &mut self,
        event: &Event,
        cfg: &BridgeConfig,
        counters: &Counters,
        search: &mut dyn SearchSink,
    ) {
        let mut ctx = NdpContext {
            cfg,
            counters,
            search,
        };

        let event_type = event.event_type();

        // SMB drives lateral movement; with smb_internal set we collect it
        // from everywhere, ignore set or not.
        if event_type == "smb" && cfg.ndp_routing_smb && cfg.ndp_smb_internal {
            smb::collect(&mut self.last, &mut ctx, event);
            return;
        }

        let src_ignored = cfg.ndp_ignore.contains_str(event.src_ip());
        let dest_ignored = cfg.ndp_ignore.contains_str(event.dest_ip());
        let in_scope = if cfg.require_both_external {
            !src_ignored && !dest_ignored
        } else {
            !src_ignored || !dest_ignored
        };
        if !in_scope {
            return;
        }

        match event_type {
            "flow" if cfg.ndp_routing_flow => flow::collect(&mut self.last, &mut ctx, event),
            "http" if cfg.ndp_routing_http => http::collect(&mut self.last, &mut ctx, event),
            "ssh" if cfg.ndp_routing_ssh => ssh::collect(&mut self.last, &mut ctx, event),
            "fileinfo" if cfg.ndp_routing_fileinfo => {
                fileinfo::collect(&mut self.last, &mut ctx, event)
            }
            "tls" if cfg.ndp_routing_tls => tls::collect(&mut self.last, &mut ctx, event),
            "dns" if cfg.ndp_routing_dns => dns::collect(&mut self.last, &mut ctx, event),
            "ftp" if cfg.ndp_routing_ftp => ftp::collect(&mut self.last, &mut ctx, event),
            "smb" if cfg.ndp_routing_smb => smb::collect(&mut self.last, &mut ctx, event),
            _ => {}
        }
    }
}
