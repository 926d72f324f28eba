use std::io::Read;

use tracing::warn;

use eve_ingest::{IngestLimits, IngestRecordError, RecordIngestor};

use crate::config::BridgeConfig;
use crate::correlate::{CorrelationClient, KvStore, MemoryKv};
use crate::counters::Counters;
use crate::event::{bounded_prefix, Event, EveParser};
use crate::ndp::NdpCollector;
use crate::route::route_event;
use crate::sink::SinkRegistry;

/// What happened to one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Counted under `invalid_json` and dropped.
    Dropped,
    /// Decoded and offered to the enabled sinks.
    Routed,
}

/// Tallies for one `consume` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub routed: u64,
    pub dropped: u64,
}

/// The assembled pipeline: decode, enrich, correlate, NDP-collect, fan
/// out. One event is carried to completion before the next begins; the
/// only shared state is the counters, the NDP dedup slots, and the sink
/// and store handles.
pub struct Bridge<S: KvStore = MemoryKv> {
    config: BridgeConfig,
    counters: Counters,
    correlation: Option<CorrelationClient<S>>,
    ndp: NdpCollector,
    sinks: SinkRegistry,
}

impl<S: KvStore> Bridge<S> {
    /// A bridge with no correlation store: fingerprint and DHCP recording
    /// are inert, everything else runs.
    pub fn new(config: BridgeConfig, sinks: SinkRegistry) -> Self {
        Self {
            config,
            counters: Counters::new(),
            correlation: None,
            ndp: NdpCollector::new(),
            sinks,
        }
    }

    /// A bridge wired to a correlation store; key prefix and TTLs come
    /// from the config.
    pub fn with_store(config: BridgeConfig, sinks: SinkRegistry, store: S) -> Self {
        let correlation = CorrelationClient::new(
            store,
            config.fingerprint_key_prefix.clone(),
            config.fingerprint_ip_ttl,
            config.fingerprint_dhcp_ttl,
        );
        Self {
            config,
            counters: Counters::new(),
            correlation: Some(correlation),
            ndp: NdpCollector::new(),
            sinks,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    pub fn sinks_mut(&mut self) -> &mut SinkRegistry {
        &mut self.sinks
    }

    pub fn correlation(&self) -> Option<&CorrelationClient<S>> {
        self.correlation.as_ref()
    }

    pub fn correlation_mut(&mut self) -> Option<&mut CorrelationClient<S>> {
        self.correlation.as_mut()
    }

    /// Decode and route one input line. Exactly one of two things
    /// happens: the line is dropped with `invalid_json` bumped, or it is
    /// routed; nothing propagates to the caller either way.
    pub fn process_line(&mut self, line: &str) -> ProcessOutcome {
        match Event::parse(line) {
            Ok(event) => {
                self.process_event(&event);
                ProcessOutcome::Routed
            }
            Err(err) => {
                self.counters.bump_invalid_json();
                warn!(error = %err, input = bounded_prefix(line), "dropping malformed event");
                ProcessOutcome::Dropped
            }
        }
    }

    /// Route an already-decoded event.
    pub fn process_event(&mut self, event: &Event) {
        route_event(
            event,
            &self.config,
            &self.counters,
            self.correlation.as_mut(),
            &mut self.ndp,
            &mut self.sinks,
        );
    }

    /// Drain a newline-framed source through the bridge. Framing-level
    /// trouble (oversize, bad UTF-8, I/O) counts as malformed input, the
    /// same as a JSON parse failure.
    pub fn consume<R: Read>(&mut self, source: R, limits: IngestLimits) -> ConsumeSummary {
        let mut summary = ConsumeSummary::default();
        let ingestor = RecordIngestor::new(source, EveParser::new(), limits);

        for record in ingestor {
            match record.outcome {
                Ok(event) => {
                    self.process_event(&event);
                    summary.routed += 1;
                }
                Err(err) => {
                    self.counters.bump_invalid_json();
                    self.warn_dropped(record.line_number, &err);
                    summary.dropped += 1;
                }
            }
        }

        summary
    }

    /// Async twin of [`Bridge::consume`].
    #[cfg(feature = "tokio")]
    pub async fn consume_async<R>(&mut self, source: R, limits: IngestLimits) -> ConsumeSummary
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut summary = ConsumeSummary::default();
        let mut ingestor = eve_ingest::AsyncRecordIngestor::new(source, EveParser::new(), limits);

        while let Some(record) = ingestor.next_record().await {
            match record.outcome {
                Ok(event) => {
                    self.process_event(&event);
                    summary.routed += 1;
                }
                Err(err) => {
                    self.counters.bump_invalid_json();
                    self.warn_dropped(record.line_number, &err);
                    summary.dropped += 1;
                }
            }
        }

        summary
    }

    fn warn_dropped(&self, line_number: usize, err: &IngestRecordError) {
        warn!(line_number, error = %err, "dropping undecodable input line");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::MemoryLineSink;

    #[test]
    fn malformed_input_is_counted_and_dropped() {
        let mut bridge = Bridge::<MemoryKv>::new(BridgeConfig::default(), SinkRegistry::new());

        assert_eq!(bridge.process_line("{not json"), ProcessOutcome::Dropped);
        assert_eq!(bridge.process_line(""), ProcessOutcome::Dropped);
        assert_eq!(
            bridge.process_line("{\"no_event_type\":true}"),
            ProcessOutcome::Dropped
        );
        assert_eq!(bridge.counters().invalid_json(), 3);
    }

    #[test]
    fn unknown_event_types_flow_through_generic_sinks_only() {
        let pipe = MemoryLineSink::new();
        let mut config = BridgeConfig::default();
        config.sinks.pipe_enabled = true;
        config.sinks.pipe_all_events = true;

        let mut sinks = SinkRegistry::new();
        sinks.pipe = Some(Box::new(pipe.clone()));

        let mut bridge = Bridge::<MemoryKv>::new(config, sinks);
        let line = "{\"event_type\":\"quantum\",\"src_ip\":\"1.2.3.4\"}";
        assert_eq!(bridge.process_line(line), ProcessOutcome::Routed);

        assert_eq!(pipe.lines(), vec![line.to_string()]);
        assert_eq!(bridge.counters().class("quantum"), 1);
    }

    #[test]
    fn consume_drains_a_framed_source() {
        let data = b"{\"event_type\":\"flow\"}\n{broken\n{\"event_type\":\"dns\"}\n";
        let mut bridge = Bridge::<MemoryKv>::new(BridgeConfig::default(), SinkRegistry::new());

        let summary = bridge.consume(std::io::Cursor::new(data), IngestLimits::default());

        assert_eq!(summary.routed, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(bridge.counters().invalid_json(), 1);
        assert_eq!(bridge.counters().class("flow"), 1);
        assert_eq!(bridge.counters().class("dns"), 1);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn consume_async_matches_the_sync_path() {
        let data = b"{\"event_type\":\"flow\"}\n{broken\n";
        let mut bridge = Bridge::<MemoryKv>::new(BridgeConfig::default(), SinkRegistry::new());

        let summary = bridge
            .consume_async(std::io::Cursor::new(data.to_vec()), IngestLimits::default())
            .await;

        assert_eq!(summary.routed, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(bridge.counters().invalid_json(), 1);
    }
}
