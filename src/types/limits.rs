use serde::{Deserialize, Serialize};

use super::int_enum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthLimits {
    #[serde(rename = "rate")]
    pub rate_in_bytes_per_second: u64,
    #[serde(rename = "burst")]
    pub burst_rate_in_bytes_per_second: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuLimits {
    pub limit_in_shares: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskLimits {
    pub inode_soft: u64,
    pub inode_hard: u64,
    pub byte_soft: u64,
    pub byte_hard: u64,
    pub scope: DiskLimitScope,
}

int_enum! {
    /// Whether disk limits count the whole filesystem or only the container's layer.
    #[derive(Default)]
    pub enum DiskLimitScope {
        #[default]
        Total = 0,
        Exclusive = 1,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLimits {
    pub limit_in_bytes: u64,
}
