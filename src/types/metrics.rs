use serde::{Deserialize, Serialize};

use super::ErrorEntry;

/// Resource usage of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub memory_stat: ContainerMemoryStat,
    pub cpu_stat: ContainerCpuStat,
    pub disk_stat: ContainerDiskStat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_stat: Option<ContainerNetworkStat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMemoryStat {
    pub cache: u64,
    pub rss: u64,
    pub mapped_file: u64,
    pub swap: u64,
    pub total_cache: u64,
    pub total_rss: u64,
    pub total_usage_towards_limit: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerCpuStat {
    pub usage: u64,
    pub user: u64,
    pub system: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDiskStat {
    pub total_bytes_used: u64,
    pub total_inodes_used: u64,
    pub exclusive_bytes_used: u64,
    pub exclusive_inodes_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerNetworkStat {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// One element of a bulk metrics response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMetricsEntry {
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorEntry>,
}
