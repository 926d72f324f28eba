//! End-to-end runs: one or two input lines through a fully wired bridge,
//! asserting on sink side effects and counters.

use serde_json::Value;

use eve_bridge::sink::memory::{
    FailingSink, MemoryLineSink, MemorySearchSink, MemorySqlSink, MemoryStreamSink,
};
use eve_bridge::{
    Bridge, BridgeConfig, CidrSet, Classifications, KvStore, MemoryKv, ProcessOutcome,
    SinkRegistry,
};

struct Harness {
    bridge: Bridge<MemoryKv>,
    sql: MemorySqlSink,
    stream: MemoryStreamSink,
    search: MemorySearchSink,
    pipe: MemoryLineSink,
    file: MemoryLineSink,
}

fn harness(config: BridgeConfig) -> Harness {
    let sql = MemorySqlSink::new();
    let stream = MemoryStreamSink::new();
    let search = MemorySearchSink::new();
    let pipe = MemoryLineSink::new();
    let file = MemoryLineSink::new();

    let mut sinks = SinkRegistry::new();
    sinks.sql = Some(Box::new(sql.clone()));
    sinks.stream = Some(Box::new(stream.clone()));
    sinks.search = Some(Box::new(search.clone()));
    sinks.pipe = Some(Box::new(pipe.clone()));
    sinks.file = Some(Box::new(file.clone()));

    Harness {
        bridge: Bridge::with_store(config, sinks, MemoryKv::new()),
        sql,
        stream,
        search,
        pipe,
        file,
    }
}

fn alert_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.classifications =
        Classifications::from_iter([("trojan-activity", "A Network Trojan was Detected")]);
    config.sinks.sql_enabled = true;
    config.sinks.sql_alert = true;
    config.sinks.pipe_enabled = true;
    config.sinks.pipe_alert = true;
    config.sinks.file_enabled = true;
    config.sinks.file_alert = true;
    config
}

#[test]
fn malformed_input_touches_nothing_but_the_counter() {
    let mut h = harness(alert_config());

    assert_eq!(h.bridge.process_line("{not json"), ProcessOutcome::Dropped);

    assert_eq!(h.bridge.counters().invalid_json(), 1);
    assert!(h.sql.rows().is_empty());
    assert!(h.pipe.lines().is_empty());
    assert!(h.file.lines().is_empty());
    assert!(h.stream.published().is_empty());
    assert!(h.search.documents().is_empty());
}

#[test]
fn plain_alert_fans_out_with_resolved_classification() {
    let mut h = harness(alert_config());

    let line = "{\"event_type\":\"alert\",\"src_ip\":\"10.1.1.1\",\"dest_ip\":\"8.8.8.8\",\
                \"src_port\":50000,\"dest_port\":53,\"proto\":\"UDP\",\"flow_id\":99,\
                \"timestamp\":\"2021-10-06T11:29:12.000000-0400\",\
                \"alert\":{\"signature_id\":2001,\"rev\":1,\"signature\":\"ET TROJAN Test\",\
                \"classtype\":\"trojan-activity\"}}";
    assert_eq!(h.bridge.process_line(line), ProcessOutcome::Routed);

    let rows = h.sql.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].signature_id, 2001);
    assert_eq!(rows[0].classification, "A Network Trojan was Detected");

    for sink in [&h.pipe, &h.file] {
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let rewritten: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(rewritten["classification"], "A Network Trojan was Detected");
    }

    // No fingerprinting configured: the store stays empty.
    assert!(h.bridge.correlation().unwrap().store().is_empty());
    assert_eq!(h.bridge.counters().class("alert"), 1);
}

#[test]
fn fingerprint_alert_is_consumed_into_the_store() {
    let mut config = alert_config();
    config.fingerprint = true;
    config.sinks.kv_enabled = true;
    let mut h = harness(config);

    let line = "{\"event_type\":\"alert\",\"src_ip\":\"10.1.1.1\",\"dest_ip\":\"10.9.9.9\",\
                \"flow_id\":555,\"timestamp\":\"2021-10-06T11:29:12.000000-0400\",\
                \"host\":\"sensor-01\",\"in_iface\":\"eth0\",\
                \"alert\":{\"signature_id\":5001,\"rev\":2,\"signature\":\"FINGERPRINT win10\",\
                \"metadata\":{\"fingerprint_os\":[\"Windows 10\"],\
                \"fingerprint_type\":[\"client\"],\"fingerprint_expire\":[\"3600\"]}}}";
    assert_eq!(h.bridge.process_line(line), ProcessOutcome::Routed);

    let store = h.bridge.correlation().unwrap().store();
    assert_eq!(store.len(), 2);
    assert_eq!(store.ttl_of("fingerprint|ip|10.1.1.1"), Some(1209600));
    assert_eq!(store.ttl_of("fingerprint|event|10.1.1.1|5001"), Some(3600));

    let mut bridge = h.bridge;
    let body = bridge
        .correlation_mut()
        .unwrap()
        .store_mut()
        .get("fingerprint|event|10.1.1.1|5001")
        .unwrap()
        .unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["fingerprint"]["os"], "Windows 10");

    // Consumed, not routed: no SQL row, no alert stream, no pipe/file line.
    assert!(h.sql.rows().is_empty());
    assert!(h.stream.published().is_empty());
    assert!(h.pipe.lines().is_empty());
    assert!(h.file.lines().is_empty());
    assert_eq!(bridge.counters().ndp_skip(), 0);
}

#[test]
fn repeated_dns_query_emits_once_then_skips() {
    let mut config = BridgeConfig::default();
    config.ndp_enabled = true;
    config.ndp_routing_dns = true;
    config.sinks.search_enabled = true;
    let mut h = harness(config);

    let line = "{\"event_type\":\"dns\",\"src_ip\":\"10.0.0.5\",\"dest_ip\":\"8.8.8.8\",\
                \"flow_id\":7,\"timestamp\":\"t\",\
                \"dns\":{\"type\":\"query\",\"rrname\":\"example.com\",\"rrtype\":\"A\"}}";
    h.bridge.process_line(line);
    h.bridge.process_line(line);

    let docs = h.search.documents_in("ndp");
    assert_eq!(docs.len(), 1);
    let (id, doc) = &docs[0];
    assert_eq!(id.as_deref().map(str::len), Some(32));
    let parsed: Value = serde_json::from_str(doc).unwrap();
    assert_eq!(parsed["rrname"], "example.com");

    assert_eq!(h.bridge.counters().ndp(), 1);
    assert_eq!(h.bridge.counters().ndp_skip(), 1);
}

#[test]
fn tls_without_hashes_emits_nothing_and_counts_nothing() {
    let mut config = BridgeConfig::default();
    config.ndp_enabled = true;
    config.ndp_routing_tls = true;
    config.sinks.search_enabled = true;
    let mut h = harness(config);

    let line = "{\"event_type\":\"tls\",\"src_ip\":\"10.0.0.5\",\"dest_ip\":\"1.2.3.4\",\
                \"flow_id\":3,\"tls\":{\"sni\":\"example.com\",\"version\":\"TLS 1.3\"}}";
    h.bridge.process_line(line);

    assert!(h.search.documents_in("ndp").is_empty());
    assert_eq!(h.bridge.counters().ndp(), 0);
    assert_eq!(h.bridge.counters().ndp_skip(), 0);
}

#[test]
fn a_failing_sink_does_not_short_circuit_the_others() {
    let mut h = harness(alert_config());
    h.bridge.sinks_mut().sql = Some(Box::new(FailingSink));

    h.bridge.process_line(
        "{\"event_type\":\"alert\",\"src_ip\":\"10.1.1.1\",\
         \"alert\":{\"signature_id\":7,\"classtype\":\"trojan-activity\"}}",
    );

    // SQL failed, was counted, and pipe/file still delivered.
    assert_eq!(h.bridge.counters().sink_errors(), 1);
    assert_eq!(h.pipe.lines().len(), 1);
    assert_eq!(h.file.lines().len(), 1);
}

#[test]
fn file_sink_receives_one_line_per_alert() {
    use eve_bridge::WriterLineSink;

    let spool = tempfile::NamedTempFile::new().expect("temp file");
    let writer = std::fs::File::create(spool.path()).expect("open for write");

    let mut config = alert_config();
    config.sinks.sql_enabled = false;
    let mut sinks = SinkRegistry::new();
    sinks.file = Some(Box::new(WriterLineSink::new(writer)));

    let mut bridge = Bridge::<MemoryKv>::new(config, sinks);
    bridge.process_line(
        "{\"event_type\":\"alert\",\"src_ip\":\"10.1.1.1\",\
         \"alert\":{\"signature_id\":1,\"classtype\":\"trojan-activity\"}}",
    );

    let written = std::fs::read_to_string(spool.path()).unwrap();
    assert_eq!(written.lines().count(), 1);
    let rewritten: Value = serde_json::from_str(written.lines().next().unwrap()).unwrap();
    assert_eq!(rewritten["classification"], "A Network Trojan was Detected");
}

#[test]
fn dhcp_lease_is_spliced_into_a_later_alert() {
    let mut config = alert_config();
    config.fingerprint = true;
    config.sinks.kv_enabled = true;
    config.fingerprint_interest = CidrSet::parse(["192.0.2.0/24"]).unwrap();
    let mut h = harness(config);

    let dhcp_line = "{\"event_type\":\"dhcp\",\"dest_ip\":\"192.0.2.5\",\
                     \"dhcp\":{\"assigned_ip\":\"192.0.2.5\",\"client_mac\":\"aa:bb:cc:dd:ee:ff\"}}";
    h.bridge.process_line(dhcp_line);

    let alert_line = "{\"event_type\":\"alert\",\"src_ip\":\"192.0.2.5\",\"dest_ip\":\"8.8.8.8\",\
                      \"flow_id\":12,\"timestamp\":\"t\",\
                      \"alert\":{\"signature_id\":2001,\"classtype\":\"trojan-activity\"}}";
    h.bridge.process_line(alert_line);

    let lines = h.pipe.lines();
    assert_eq!(lines.len(), 1);
    let rewritten: Value = serde_json::from_str(&lines[0]).unwrap();
    let stored: Value = serde_json::from_str(dhcp_line).unwrap();
    assert_eq!(rewritten["fingerprint_dhcp_src"], stored);
    assert!(rewritten.get("fingerprint_dhcp_dest").is_none());
}
