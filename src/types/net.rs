use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::int_enum;

/// Outbound firewall rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutRule {
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<IpRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortRange>,
    #[serde(rename = "icmps", skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpControl>,
    pub log: bool,
}

int_enum! {
    #[derive(Default)]
    pub enum Protocol {
        #[default]
        All = 0,
        Tcp = 1,
        Udp = 2,
        Icmp = 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl IpRange {
    pub fn single(ip: Ipv4Addr) -> Self {
        Self { start: ip, end: ip }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { start: port, end: port }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpControl {
    #[serde(rename = "type")]
    pub icmp_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
}
