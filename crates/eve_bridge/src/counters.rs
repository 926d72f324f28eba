use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic tallies. Incremented from every pipeline stage;
/// relaxed ordering is enough because nothing sequences against them.
#[derive(Debug, Default)]
pub struct Counters {
    invalid_json: AtomicU64,
    ndp: AtomicU64,
    ndp_skip: AtomicU64,
    sink_errors: AtomicU64,

    alert: AtomicU64,
    dhcp: AtomicU64,
    stats: AtomicU64,
    client_stats: AtomicU64,
    flow: AtomicU64,
    http: AtomicU64,
    tls: AtomicU64,
    dns: AtomicU64,
    ssh: AtomicU64,
    fileinfo: AtomicU64,
    smb: AtomicU64,
    ftp: AtomicU64,
    other: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump_invalid_json(&self) {
        self.invalid_json.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_json(&self) -> u64 {
        self.invalid_json.load(Ordering::Relaxed)
    }

    pub fn bump_ndp(&self) {
        self.ndp.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ndp(&self) -> u64 {
        self.ndp.load(Ordering::Relaxed)
    }

    pub fn bump_ndp_skip(&self) {
        self.ndp_skip.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ndp_skip(&self) -> u64 {
        self.ndp_skip.load(Ordering::Relaxed)
    }

    pub fn bump_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    /// Per-class accepted count; unknown event types tally under `other`.
    pub fn bump_class(&self, event_type: &str) {
        self.class_slot(event_type).fetch_add(1, Ordering::Relaxed);
    }

    pub fn class(&self, event_type: &str) -> u64 {
        self.class_slot(event_type).load(Ordering::Relaxed)
    }

    fn class_slot(&self, event_type: &str) -> &AtomicU64 {
        match event_type {
            "alert" => &self.alert,
            "dhcp" => &self.dhcp,
            "stats" => &self.stats,
            "client_stats" => &self.client_stats,
            "flow" => &self.flow,
            "http" => &self.http,
            "tls" => &self.tls,
            "dns" => &self.dns,
            "ssh" => &self.ssh,
            "fileinfo" => &self.fileinfo,
            "smb" => &self.smb,
            "ftp" => &self.ftp,
            _ => &self.other,
        }
    }
}
