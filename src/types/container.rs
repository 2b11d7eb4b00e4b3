use serde::{Deserialize, Serialize};

use super::{int_enum, Properties};

/// Server-wide capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacity {
    pub memory_in_bytes: u64,
    pub disk_in_bytes: u64,
    pub max_containers: u64,
}

/// Parameters for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    /// Requested handle; the server picks one when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub handle: String,
    /// Idle time before the container is reaped, in nanoseconds. Zero disables reaping.
    #[serde(skip_serializing_if = "is_zero")]
    pub grace_time: u64,
    #[serde(rename = "rootfs", skip_serializing_if = "String::is_empty")]
    pub root_fs_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bind_mounts: Vec<BindMount>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network: String,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    pub privileged: bool,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// A host or container path mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub src_path: String,
    pub dst_path: String,
    pub mode: BindMountMode,
    pub origin: BindMountOrigin,
}

int_enum! {
    /// Mount access mode.
    pub enum BindMountMode {
        ReadOnly = 0,
        ReadWrite = 1,
    }
}

int_enum! {
    /// Where the mount source lives.
    pub enum BindMountOrigin {
        Host = 0,
        Container = 1,
    }
}

/// Snapshot of a container's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfo {
    /// Either "active" or "stopped".
    pub state: String,
    pub events: Vec<String>,
    pub host_ip: String,
    pub container_ip: String,
    pub external_ip: String,
    pub container_path: String,
    pub process_ids: Vec<u32>,
    pub properties: Properties,
    pub mapped_ports: Vec<PortMapping>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u32,
    pub container_port: u32,
}

/// One element of a bulk info response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfoEntry {
    pub info: ContainerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorEntry>,
}

/// Per-handle failure inside a bulk response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorEntry {
    pub message: String,
}
