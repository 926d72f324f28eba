use std::collections::HashSet;

use crate::classifications::Classifications;
use crate::netrange::CidrSet;

/// Per-sink × per-class enablement. Absent sinks in the registry read as
/// disabled regardless of these flags; the flags let an operator keep a
/// registered sink quiet for a class without tearing it down.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkMatrix {
    pub sql_enabled: bool,
    pub sql_alert: bool,

    pub kv_enabled: bool,
    pub kv_alert: bool,
    pub kv_all_events: bool,

    pub search_enabled: bool,
    pub search_alert: bool,
    pub search_all_events: bool,

    pub pipe_enabled: bool,
    pub pipe_alert: bool,
    pub pipe_all_events: bool,

    pub file_enabled: bool,
    pub file_alert: bool,
    pub file_all_events: bool,

    pub external_enabled: bool,
    pub stats_enabled: bool,
}

/// Everything the core consumes. Built by an external loader (file/CLI
/// parsing is out of scope here) and immutable once the bridge is up.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on any rewritten event serialisation, in bytes.
    pub payload_buffer_size: usize,

    pub fingerprint: bool,
    pub client_stats: bool,

    /// Free text stamped on every NDP observation; empty disables it.
    pub description: String,

    pub ndp_enabled: bool,
    pub ndp_routing_flow: bool,
    pub ndp_routing_http: bool,
    pub ndp_routing_ssh: bool,
    pub ndp_routing_fileinfo: bool,
    pub ndp_routing_tls: bool,
    pub ndp_routing_dns: bool,
    pub ndp_routing_smb: bool,
    pub ndp_routing_ftp: bool,

    /// Collect SMB regardless of the ignore set (lateral movement is most
    /// interesting inside the estate).
    pub ndp_smb_internal: bool,
    pub ndp_debug: bool,

    /// Default: one external endpoint is enough to include an event.
    /// Flipping this requires both endpoints outside the ignore set.
    pub require_both_external: bool,

    /// Compatibility switch for sensors that put the SSH server banner in
    /// the client subobject.
    pub ssh_server_version_from_client: bool,

    pub smb_commands: HashSet<String>,
    pub ftp_commands: HashSet<String>,

    /// Key namespace prefix for the correlation store.
    pub fingerprint_key_prefix: String,
    /// TTL (seconds) for `|ip|` keys and for `|event|` keys whose rule did
    /// not carry its own expire.
    pub fingerprint_ip_ttl: u64,
    /// TTL (seconds) for `|dhcp|` keys.
    pub fingerprint_dhcp_ttl: u64,

    pub fingerprint_interest: CidrSet,
    pub ndp_ignore: CidrSet,

    pub classifications: Classifications,
    pub sinks: SinkMatrix,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            payload_buffer_size: 64 * 1024,
            fingerprint: false,
            client_stats: false,
            description: String::new(),
            ndp_enabled: false,
            ndp_routing_flow: false,
            ndp_routing_http: false,
            ndp_routing_ssh: false,
            ndp_routing_fileinfo: false,
            ndp_routing_tls: false,
            ndp_routing_dns: false,
            ndp_routing_smb: false,
            ndp_routing_ftp: false,
            ndp_smb_internal: false,
            ndp_debug: false,
            require_both_external: false,
            ssh_server_version_from_client: false,
            smb_commands: default_smb_commands(),
            ftp_commands: default_ftp_commands(),
            fingerprint_key_prefix: "fingerprint".to_string(),
            fingerprint_ip_ttl: 1209600,
            fingerprint_dhcp_ttl: 691200,
            fingerprint_interest: CidrSet::default(),
            ndp_ignore: CidrSet::default(),
            classifications: Classifications::default(),
            sinks: SinkMatrix::default(),
        }
    }
}

fn default_smb_commands() -> HashSet<String> {
    [
        "SMB2_COMMAND_CREATE",
        "SMB2_COMMAND_READ",
        "SMB2_COMMAND_WRITE",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_ftp_commands() -> HashSet<String> {
    ["STOR", "RETR", "USER"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_every_sink_and_collector_off() {
        let cfg = BridgeConfig::default();
        assert!(!cfg.ndp_enabled);
        assert!(!cfg.fingerprint);
        assert!(!cfg.sinks.sql_enabled);
        assert!(cfg.smb_commands.contains("SMB2_COMMAND_WRITE"));
        assert!(cfg.ftp_commands.contains("RETR"));
    }
}
