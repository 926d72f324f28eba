use tracing::warn;

use crate::alert::{decode_alert, enrich_alert};
use crate::config::BridgeConfig;
use crate::correlate::{CorrelationClient, KvStore};
use crate::counters::Counters;
use crate::event::Event;
use crate::fingerprint::parse_fingerprint_meta;
use crate::ndp::NdpCollector;
use crate::sink::{SinkError, SinkRegistry};

/// Delivery is best-effort per sink: log, count, keep going.
fn best_effort(counters: &Counters, sink: &'static str, result: Result<(), SinkError>) {
    if let Err(err) = result {
        warn!(sink, error = %err, "delivery failed");
        counters.bump_sink_error();
    }
}

/// Apply the enablement matrix and per-class policy to one decoded event.
pub(crate) fn route_event<S: KvStore>(
    event: &Event,
    cfg: &BridgeConfig,
    counters: &Counters,
    correlation: Option<&mut CorrelationClient<S>>,
    ndp: &mut NdpCollector,
    sinks: &mut SinkRegistry,
) {
    counters.bump_class(event.event_type());

    // Alerts short-circuit: they are rewritten and never reach the
    // generic all-events fan-out below.
    if event.event_type() == "alert" {
        route_alert(event, cfg, counters, correlation, sinks);
        return;
    }

    match event.event_type() {
        "dhcp" => {
            if cfg.fingerprint && cfg.sinks.kv_enabled {
                if let Some(client) = correlation {
                    client.record_dhcp(event);
                }
            }
        }
        "stats" => {
            if cfg.sinks.stats_enabled {
                if let Some(sink) = &mut sinks.stats {
                    best_effort(counters, "stats", sink.record_stats(event.raw()));
                }
            }
        }
        "client_stats" => {
            if cfg.client_stats && cfg.sinks.kv_enabled {
                if let Some(sink) = &mut sinks.stream {
                    best_effort(
                        counters,
                        "kv",
                        sink.publish("client_stats", event.raw()),
                    );
                }
            }
        }
        _ => {}
    }

    if cfg.ndp_enabled && cfg.sinks.search_enabled {
        if let Some(search) = sinks.search.as_deref_mut() {
            ndp.collect(event, cfg, counters, search);
        }
    }

    let matrix = &cfg.sinks;
    if matrix.pipe_enabled && matrix.pipe_all_events {
        if let Some(sink) = &mut sinks.pipe {
            best_effort(counters, "pipe", sink.write_line(event.raw()));
        }
    }
    if matrix.file_enabled && matrix.file_all_events {
        if let Some(sink) = &mut sinks.file {
            best_effort(counters, "file", sink.write_line(event.raw()));
        }
    }
    if matrix.kv_enabled && matrix.kv_all_events {
        if let Some(sink) = &mut sinks.stream {
            best_effort(counters, "kv", sink.publish(event.event_type(), event.raw()));
        }
    }
    if matrix.search_enabled && matrix.search_all_events {
        if let Some(sink) = &mut sinks.search {
            best_effort(
                counters,
                "search",
                sink.index(event.event_type(), None, event.raw()),
            );
        }
    }
}

fn route_alert<S: KvStore>(
    event: &Event,
    cfg: &BridgeConfig,
    counters: &Counters,
    correlation: Option<&mut CorrelationClient<S>>,
    sinks: &mut SinkRegistry,
) {
    let mut record = decode_alert(event, &cfg.classifications, cfg.payload_buffer_size);

    // A "fingerprint source" alert is consumed into the correlation store
    // rather than routed as an ordinary alert.
    let mut fingerprint_consumed = false;

    if cfg.fingerprint && cfg.sinks.kv_enabled {
        if let Some(client) = correlation {
            enrich_alert(
                &mut record,
                event,
                client,
                &cfg.fingerprint_interest,
                cfg.payload_buffer_size,
            );

            let meta = parse_fingerprint_meta(event);
            if meta.present {
                client.record_fingerprint(event, &meta);
                fingerprint_consumed = true;
            }
        }
    }

    let matrix = &cfg.sinks;

    if !fingerprint_consumed {
        if matrix.sql_enabled && matrix.sql_alert {
            if let Some(sink) = &mut sinks.sql {
                best_effort(counters, "sql", sink.insert_alert(&record));
            }
        }
        if matrix.kv_enabled && matrix.kv_alert {
            if let Some(sink) = &mut sinks.stream {
                best_effort(counters, "kv", sink.publish("alert", &record.new_json_string));
            }
        }
    }

    if matrix.external_enabled {
        if let Some(sink) = &mut sinks.external {
            best_effort(counters, "external", sink.execute(&record.new_json_string));
        }
    }

    if matrix.search_enabled && matrix.search_alert {
        if let Some(sink) = &mut sinks.search {
            best_effort(
                counters,
                "search",
                sink.index("alert", None, &record.new_json_string),
            );
        }
    }

    if !fingerprint_consumed {
        if matrix.pipe_enabled && matrix.pipe_alert {
            if let Some(sink) = &mut sinks.pipe {
                best_effort(counters, "pipe", sink.write_line(&record.new_json_string));
            }
        }
        if matrix.file_enabled && matrix.file_alert {
            if let Some(sink) = &mut sinks.file {
                best_effort(counters, "file", sink.write_line(&record.new_json_string));
            }
        }
    }
}
