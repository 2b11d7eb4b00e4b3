//! Typed request and response values exchanged with the garden server.
//!
//! Every value here is a plain serde record. Enumerations that travel as
//! integers on the wire are declared with [`int_enum!`] so that unknown
//! values surface as a decode error instead of being silently accepted.

mod container;
mod limits;
mod metrics;
mod net;
mod process;

use std::collections::HashMap;

pub use container::{
    BindMount, BindMountMode, BindMountOrigin, Capacity, ContainerInfo, ContainerInfoEntry,
    ContainerSpec, ErrorEntry, PortMapping,
};
pub use limits::{BandwidthLimits, CpuLimits, DiskLimitScope, DiskLimits, MemoryLimits};
pub use metrics::{
    ContainerCpuStat, ContainerDiskStat, ContainerMemoryStat, ContainerMetricsEntry,
    ContainerNetworkStat, Metrics,
};
pub use net::{IcmpControl, IpRange, NetOutRule, PortRange, Protocol};
pub use process::{ProcessSpec, ResourceLimits, Signal, TtySpec, WindowSize};

/// Free-form key/value properties attached to a container.
pub type Properties = HashMap<String, String>;

/// Declare a fieldless enum that is encoded as a small integer on the wire.
macro_rules! int_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value: {}", stringify!($name), other)),
                }
            }
        }
    };
}

pub(crate) use int_enum;
