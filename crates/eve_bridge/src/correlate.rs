use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::event::{json_str, json_u64, Event};
use crate::fingerprint::FingerprintMeta;

/// One SCAN round covers the common case; cursor chaining is not needed
/// for correctness.
const SCAN_COUNT: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key/value store connection lost: {0}")]
    Connection(String),
    #[error("key/value store backend error: {0}")]
    Backend(String),
}

/// The named interface to the external key/value store. The concrete
/// Redis client lives outside the core; anything that can SET-with-TTL,
/// GET, and SCAN-by-pattern can back the correlation namespaces.
pub trait KvStore {
    fn set_ex(&mut self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), KvError>;
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError>;
    fn scan(&mut self, pattern: &str, count: usize) -> Result<Vec<String>, KvError>;
}

/// In-process store: reference semantics for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: std::collections::BTreeMap<String, (String, u64)>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL the key was last written with, for assertions.
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|(_, ttl)| *ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryKv {
    fn set_ex(&mut self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), KvError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.get(key).map(|(value, _)| value.clone()))
    }

    fn scan(&mut self, pattern: &str, _count: usize) -> Result<Vec<String>, KvError> {
        let keys = match pattern.strip_suffix('*') {
            Some(prefix) => self
                .entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => self
                .entries
                .keys()
                .filter(|k| k.as_str() == pattern)
                .cloned()
                .collect(),
        };
        Ok(keys)
    }
}

/// Parsed correlation state for one address.
#[derive(Debug, Default)]
pub struct Correlations {
    pub dhcp: Option<Value>,
    pub events: Vec<Value>,
}

/// Typed surface over the store's three key namespaces:
/// `PFX|dhcp|<ip>`, `PFX|ip|<ip>`, and `PFX|event|<ip>|<signature_id>`.
pub struct CorrelationClient<S: KvStore> {
    store: S,
    prefix: String,
    ip_ttl: u64,
    dhcp_ttl: u64,
}

impl<S: KvStore> CorrelationClient<S> {
    pub fn new(store: S, prefix: impl Into<String>, ip_ttl: u64, dhcp_ttl: u64) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ip_ttl,
            dhcp_ttl,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn dhcp_key(&self, ip: &str) -> String {
        format!("{}|dhcp|{}", self.prefix, ip)
    }

    fn ip_key(&self, ip: &str) -> String {
        format!("{}|ip|{}", self.prefix, ip)
    }

    fn event_key(&self, ip: &str, signature_id: u64) -> String {
        format!("{}|event|{}|{}", self.prefix, ip, signature_id)
    }

    fn event_pattern(&self, ip: &str) -> String {
        format!("{}|event|{}|*", self.prefix, ip)
    }

    /// Record the most recent DHCP-learned binding for an address. When
    /// the server reports `assigned_ip` 0.0.0.0 (early handshake stages)
    /// the destination address stands in, unless it is the broadcast
    /// address.
    pub fn record_dhcp(&mut self, event: &Event) {
        let dest_ip = event.dest_ip();

        let Some(dhcp) = event.nested("dhcp") else {
            warn!("dhcp event without a dhcp record, nothing to store");
            return;
        };

        let assigned_ip = json_str(&dhcp, "assigned_ip");
        if assigned_ip.is_empty() {
            warn!("dhcp record carries no assigned_ip, nothing to store");
            return;
        }

        let effective_ip = if assigned_ip == "0.0.0.0" && dest_ip != "255.255.255.255" {
            dest_ip
        } else {
            assigned_ip
        };

        let key = self.dhcp_key(effective_ip);
        if let Err(err) = self.store.set_ex(&key, event.raw(), self.dhcp_ttl) {
            warn!(%key, error = %err, "dropping dhcp correlation write");
        }
    }

    /// Publish a fingerprint learned from an alert. Two writes: a summary
    /// under `|ip|` with the default TTL, and the full document under
    /// `|event|` with the rule's own expire when it set one. Returns the
    /// composed document.
    pub fn record_fingerprint(&mut self, event: &Event, meta: &FingerprintMeta) -> Option<String> {
        let src_ip = event.src_ip();
        let timestamp = event.timestamp();
        let flow_id = event.flow_id();

        if src_ip.is_empty() {
            warn!("fingerprint alert without src_ip");
        }
        if timestamp.is_empty() {
            warn!("fingerprint alert without timestamp");
        }
        if flow_id == 0 {
            warn!("fingerprint alert without flow_id");
        }

        let summary = json!({ "timestamp": timestamp, "ip": src_ip });
        let ip_key = self.ip_key(src_ip);
        if let Err(err) = self
            .store
            .set_ex(&ip_key, &summary.to_string(), self.ip_ttl)
        {
            warn!(key = %ip_key, error = %err, "dropping fingerprint ip write");
            return None;
        }

        let (document, signature_id) = compose_fingerprint_document(event, meta);
        let ttl = if meta.expire != 0 {
            meta.expire
        } else {
            self.ip_ttl
        };

        let event_key = self.event_key(src_ip, signature_id);
        let serialised = document.to_string();
        if let Err(err) = self.store.set_ex(&event_key, &serialised, ttl) {
            warn!(key = %event_key, error = %err, "dropping fingerprint event write");
            return None;
        }

        Some(serialised)
    }

    /// Everything previously recorded for an address: the DHCP binding
    /// plus each stored fingerprint event. Unparseable bodies are skipped.
    pub fn lookup_correlations(&mut self, ip: &str) -> Correlations {
        let mut out = Correlations::default();

        match self.store.get(&self.dhcp_key(ip)) {
            Ok(Some(body)) => match serde_json::from_str(&body) {
                Ok(value) => out.dhcp = Some(value),
                Err(_) => warn!(%ip, "incomplete or invalid stored dhcp JSON"),
            },
            Ok(None) => {}
            Err(err) => warn!(%ip, error = %err, "dhcp correlation read failed"),
        }

        let keys = match self.store.scan(&self.event_pattern(ip), SCAN_COUNT) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%ip, error = %err, "fingerprint scan failed");
                return out;
            }
        };

        for key in keys {
            match self.store.get(&key) {
                Ok(Some(body)) => match serde_json::from_str(&body) {
                    Ok(value) => out.events.push(value),
                    Err(_) => warn!(%key, "incomplete or invalid fingerprint JSON"),
                },
                Ok(None) => {}
                Err(err) => warn!(%key, error = %err, "fingerprint read failed"),
            }
        }

        out
    }
}

fn compose_fingerprint_document(event: &Event, meta: &FingerprintMeta) -> (Value, u64) {
    let mut doc = Map::new();

    doc.insert("timestamp".to_string(), json!(event.timestamp()));
    doc.insert("ip".to_string(), json!(event.src_ip()));
    doc.insert("event_type".to_string(), json!("fingerprint"));
    doc.insert("flow_id".to_string(), json!(event.flow_id()));
    doc.insert("src_ip".to_string(), json!(event.src_ip()));

    // Sagan events have no app_proto.
    put_str(&mut doc, "app_proto", event.app_proto());
    put_str(&mut doc, "src_host", event.src_dns());
    put_str(&mut doc, "dest_host", event.dest_dns());

    for key in ["host", "in_iface"] {
        let value = event.str_field(key);
        if value.is_empty() {
            warn!(field = key, "fingerprint alert missing field");
        } else {
            doc.insert(key.to_string(), json!(value));
        }
    }

    if event.src_port() != 0 {
        doc.insert("src_port".to_string(), json!(event.src_port()));
    }
    put_str(&mut doc, "dest_ip", event.dest_ip());
    if event.dest_port() != 0 {
        doc.insert("dest_port".to_string(), json!(event.dest_port()));
    }
    put_str(&mut doc, "proto", event.proto());
    put_str(&mut doc, "program", event.str_field("program"));

    let mut fp = Map::new();
    put_str(&mut fp, "payload", event.str_field("payload"));
    put_str(&mut fp, "os", &meta.os);
    put_str(&mut fp, "source", &meta.source);
    put_str(&mut fp, "client_server", &meta.kind);
    if meta.expire != 0 {
        fp.insert("expire".to_string(), json!(meta.expire));
    }

    let mut signature_id = 0;
    if let Some(alert) = event.nested("alert") {
        signature_id = json_u64(&alert, "signature_id");
        fp.insert("signature_id".to_string(), json!(signature_id));
        put_str(&mut fp, "signature", json_str(&alert, "signature"));
        fp.insert("rev".to_string(), json!(json_u64(&alert, "rev")));
    } else {
        warn!("fingerprint alert without alert record");
    }

    doc.insert("fingerprint".to_string(), Value::Object(fp));

    // Browser headers travel with HTTP-sourced fingerprints.
    if event.app_proto() == "http" {
        if let Some(http) = event.nested("http") {
            let mut http_doc = Map::new();
            put_str(&mut http_doc, "http_user_agent", json_str(&http, "http_user_agent"));
            put_str(&mut http_doc, "xff", json_str(&http, "xff"));
            if !http_doc.is_empty() {
                doc.insert("http".to_string(), Value::Object(http_doc));
            }
        }
    }

    (Value::Object(doc), signature_id)
}

fn put_str(doc: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        doc.insert(key.to_string(), json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::parse_fingerprint_meta;

    fn client() -> CorrelationClient<MemoryKv> {
        CorrelationClient::new(MemoryKv::new(), "fingerprint", 1209600, 691200)
    }

    fn fingerprint_alert() -> Event {
        Event::parse(
            "{\"event_type\":\"alert\",\"timestamp\":\"2021-10-06T11:29:12.000000-0400\",\
             \"flow_id\":123456,\"src_ip\":\"10.1.1.1\",\"dest_ip\":\"10.2.2.2\",\
             \"src_port\":49152,\"dest_port\":80,\"proto\":\"TCP\",\"host\":\"sensor-01\",\
             \"in_iface\":\"eth0\",\"app_proto\":\"http\",\
             \"http\":{\"http_user_agent\":\"curl/7.79\",\"xff\":\"203.0.113.9\"},\
             \"alert\":{\"signature_id\":5001,\"rev\":3,\"signature\":\"FINGERPRINT windows\",\
             \"metadata\":{\"fingerprint_os\":[\"windows\"],\"fingerprint_type\":[\"client\"],\
             \"fingerprint_expire\":[\"3600\"]}}}",
        )
        .unwrap()
    }

    #[test]
    fn fingerprint_writes_two_keys_with_expected_ttls() {
        let mut client = client();
        let event = fingerprint_alert();
        let meta = parse_fingerprint_meta(&event);

        let document = client.record_fingerprint(&event, &meta).expect("stored");

        assert_eq!(client.store().ttl_of("fingerprint|ip|10.1.1.1"), Some(1209600));
        assert_eq!(
            client.store().ttl_of("fingerprint|event|10.1.1.1|5001"),
            Some(3600)
        );

        let parsed: Value = serde_json::from_str(&document).unwrap();
        assert_eq!(parsed["fingerprint"]["os"], "windows");
        assert_eq!(parsed["fingerprint"]["client_server"], "client");
        assert_eq!(parsed["fingerprint"]["signature_id"], 5001);
        assert_eq!(parsed["http"]["http_user_agent"], "curl/7.79");
        assert_eq!(parsed["event_type"], "fingerprint");
    }

    #[test]
    fn zero_expire_falls_back_to_default_ttl() {
        let mut client = client();
        let event = Event::parse(
            "{\"event_type\":\"alert\",\"src_ip\":\"10.1.1.1\",\"flow_id\":1,\
             \"timestamp\":\"t\",\"alert\":{\"signature_id\":7}}",
        )
        .unwrap();
        let mut meta = parse_fingerprint_meta(&event);
        meta.present = true;
        meta.expire = 0;

        client.record_fingerprint(&event, &meta);
        assert_eq!(
            client.store().ttl_of("fingerprint|event|10.1.1.1|7"),
            Some(1209600)
        );
    }

    #[test]
    fn dhcp_zero_assigned_ip_keys_on_destination() {
        let mut client = client();
        let event = Event::parse(
            "{\"event_type\":\"dhcp\",\"dest_ip\":\"192.0.2.40\",\
             \"dhcp\":{\"assigned_ip\":\"0.0.0.0\"}}",
        )
        .unwrap();

        client.record_dhcp(&event);
        assert_eq!(
            client.store().ttl_of("fingerprint|dhcp|192.0.2.40"),
            Some(691200)
        );
    }

    #[test]
    fn dhcp_broadcast_destination_keeps_assigned_ip() {
        let mut client = client();
        let event = Event::parse(
            "{\"event_type\":\"dhcp\",\"dest_ip\":\"255.255.255.255\",\
             \"dhcp\":{\"assigned_ip\":\"0.0.0.0\"}}",
        )
        .unwrap();

        client.record_dhcp(&event);
        assert_eq!(client.store().ttl_of("fingerprint|dhcp|0.0.0.0"), Some(691200));
    }

    #[test]
    fn lookup_returns_dhcp_and_events_skipping_invalid_bodies() {
        let mut client = client();
        client
            .store_mut()
            .set_ex("fingerprint|dhcp|10.1.1.1", "{\"assigned_ip\":\"10.1.1.1\"}", 60)
            .unwrap();
        client
            .store_mut()
            .set_ex(
                "fingerprint|event|10.1.1.1|5001",
                "{\"fingerprint\":{\"os\":\"windows\"}}",
                60,
            )
            .unwrap();
        client
            .store_mut()
            .set_ex("fingerprint|event|10.1.1.1|5002", "{truncated", 60)
            .unwrap();

        let correlations = client.lookup_correlations("10.1.1.1");
        assert!(correlations.dhcp.is_some());
        assert_eq!(correlations.events.len(), 1);
    }
}
