#![forbid(unsafe_code)]
//! Decode, enrich, correlate, and fan out EVE sensor events.
//!
//! The bridge sits between an IDS sensor emitting newline-framed JSON
//! (Suricata or Sagan EVE) and a set of heterogeneous downstream sinks.
//! One [`Bridge`] carries each record through the whole pipeline:
//!
//! - **Decode** ([`Event`]): parse once, classify by `event_type`,
//!   tolerate missing or mistyped fields everywhere downstream.
//! - **Enrich** ([`alert`]): resolve rule classifications and splice
//!   previously-learned correlations (DHCP leases, per-IP fingerprints)
//!   into the rewritten alert JSON.
//! - **Correlate** ([`correlate`]): content-addressed keys in an external
//!   key/value store behind the [`KvStore`] seam; `|dhcp|`, `|ip|`, and
//!   `|event|` namespaces with independent TTLs.
//! - **Collect** ([`ndp`]): distil non-alert protocol events into
//!   deduplicated, md5-addressed observations for the search cluster.
//! - **Route** ([`sink`]): per-sink × per-class enablement matrix over a
//!   runtime sink registry; delivery is best-effort per sink.
//!
//! Configuration loading, log tailing, and the concrete SQL/Redis/HTTP
//! clients live outside this crate; they arrive as a [`BridgeConfig`], an
//! input `Read`er, and [`SinkRegistry`]/[`KvStore`] implementations.
//!
//! ```rust
//! use eve_bridge::{Bridge, BridgeConfig, MemoryKv, SinkRegistry};
//!
//! let mut config = BridgeConfig::default();
//! config.sinks.file_enabled = true;
//! config.sinks.file_all_events = true;
//!
//! let mut sinks = SinkRegistry::new();
//! sinks.file = Some(Box::new(eve_bridge::sink::memory::MemoryLineSink::new()));
//!
//! let mut bridge = Bridge::with_store(config, sinks, MemoryKv::new());
//! bridge.process_line("{\"event_type\":\"flow\",\"src_ip\":\"192.0.2.1\"}");
//! assert_eq!(bridge.counters().class("flow"), 1);
//! ```

pub mod alert;
pub mod classifications;
pub mod config;
pub mod correlate;
pub mod counters;
pub mod event;
pub mod fingerprint;
pub mod ndp;
pub mod netrange;
pub mod pipeline;
mod route;
pub mod sink;

pub use alert::AlertRecord;
pub use classifications::Classifications;
pub use config::{BridgeConfig, SinkMatrix};
pub use correlate::{CorrelationClient, Correlations, KvError, KvStore, MemoryKv};
pub use counters::Counters;
pub use event::{Event, EventParseError, EveParser};
pub use fingerprint::{parse_fingerprint_meta, FingerprintMeta};
pub use ndp::{NdpCollector, ObservationId, NDP_INDEX};
pub use netrange::{CidrParseError, CidrSet};
pub use pipeline::{Bridge, ConsumeSummary, ProcessOutcome};
pub use sink::{
    CommandSink, LineSink, SearchSink, SinkError, SinkRegistry, SqlSink, StatsSink, StreamSink,
    WriterLineSink,
};
