use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid network range `{entry}`")]
pub struct CidrParseError {
    pub entry: String,
}

/// An ordered list of address ranges, fixed at startup. Membership is a
/// linear walk returning true on first hit; the configured lists are small
/// enough that nothing cleverer pays for itself.
#[derive(Debug, Clone, Default)]
pub struct CidrSet {
    ranges: Vec<IpNet>,
}

impl CidrSet {
    pub fn new(ranges: Vec<IpNet>) -> Self {
        Self { ranges }
    }

    /// Accepts CIDR notation (`10.0.0.0/8`) and bare addresses
    /// (`192.0.2.7`, treated as a host route).
    pub fn parse<I, S>(entries: I) -> Result<Self, CidrParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranges = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if let Ok(net) = entry.parse::<IpNet>() {
                ranges.push(net);
            } else if let Ok(addr) = entry.parse::<IpAddr>() {
                ranges.push(IpNet::from(addr));
            } else {
                return Err(CidrParseError {
                    entry: entry.to_string(),
                });
            }
        }
        Ok(Self { ranges })
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.ranges.iter().any(|net| net.contains(&addr))
    }

    /// Unparseable addresses are never members.
    pub fn contains_str(&self, addr: &str) -> bool {
        addr.parse::<IpAddr>()
            .map(|ip| self.contains(ip))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
