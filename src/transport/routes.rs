//! Routing table: operation name → HTTP method and path template.
//!
//! Path templates use `:name` segments that are filled from the call's
//! path parameters. Values are percent-encoded as single path segments, so
//! a handle containing `/` cannot escape its segment.

use hyper::Method;
use url::{Position, Url};

use crate::error::{GardenError, Result};

pub const PING: &str = "Ping";
pub const CAPACITY: &str = "Capacity";
pub const CREATE: &str = "Create";
pub const LIST: &str = "List";
pub const DESTROY: &str = "Destroy";
pub const STOP: &str = "Stop";
pub const INFO: &str = "Info";
pub const BULK_INFO: &str = "BulkInfo";
pub const BULK_METRICS: &str = "BulkMetrics";
pub const STREAM_IN: &str = "StreamIn";
pub const STREAM_OUT: &str = "StreamOut";
pub const LIMIT_BANDWIDTH: &str = "LimitBandwidth";
pub const CURRENT_BANDWIDTH_LIMITS: &str = "CurrentBandwidthLimits";
pub const LIMIT_CPU: &str = "LimitCPU";
pub const CURRENT_CPU_LIMITS: &str = "CurrentCPULimits";
pub const LIMIT_DISK: &str = "LimitDisk";
pub const CURRENT_DISK_LIMITS: &str = "CurrentDiskLimits";
pub const LIMIT_MEMORY: &str = "LimitMemory";
pub const CURRENT_MEMORY_LIMITS: &str = "CurrentMemoryLimits";
pub const NET_IN: &str = "NetIn";
pub const NET_OUT: &str = "NetOut";
pub const RUN: &str = "Run";
pub const ATTACH: &str = "Attach";
pub const STDOUT: &str = "Stdout";
pub const STDERR: &str = "Stderr";
pub const PROPERTIES: &str = "Properties";
pub const PROPERTY: &str = "Property";
pub const SET_PROPERTY: &str = "SetProperty";
pub const REMOVE_PROPERTY: &str = "RemoveProperty";
pub const METRICS: &str = "Metrics";

/// One entry of the routing table.
#[derive(Debug)]
pub struct Route {
    pub name: &'static str,
    pub method: Method,
    pub path: &'static str,
}

const fn route(name: &'static str, method: Method, path: &'static str) -> Route {
    Route { name, method, path }
}

/// Every operation the server exposes.
pub static ROUTES: &[Route] = &[
    route(PING, Method::GET, "/ping"),
    route(CAPACITY, Method::GET, "/capacity"),
    route(CREATE, Method::POST, "/containers"),
    route(LIST, Method::GET, "/containers"),
    route(DESTROY, Method::DELETE, "/containers/:handle"),
    route(STOP, Method::PUT, "/containers/:handle/stop"),
    route(INFO, Method::GET, "/containers/:handle/info"),
    route(BULK_INFO, Method::GET, "/containers/bulk_info"),
    route(BULK_METRICS, Method::GET, "/containers/bulk_metrics"),
    route(STREAM_IN, Method::PUT, "/containers/:handle/files"),
    route(STREAM_OUT, Method::GET, "/containers/:handle/files"),
    route(LIMIT_BANDWIDTH, Method::PUT, "/containers/:handle/limits/bandwidth"),
    route(CURRENT_BANDWIDTH_LIMITS, Method::GET, "/containers/:handle/limits/bandwidth"),
    route(LIMIT_CPU, Method::PUT, "/containers/:handle/limits/cpu"),
    route(CURRENT_CPU_LIMITS, Method::GET, "/containers/:handle/limits/cpu"),
    route(LIMIT_DISK, Method::PUT, "/containers/:handle/limits/disk"),
    route(CURRENT_DISK_LIMITS, Method::GET, "/containers/:handle/limits/disk"),
    route(LIMIT_MEMORY, Method::PUT, "/containers/:handle/limits/memory"),
    route(CURRENT_MEMORY_LIMITS, Method::GET, "/containers/:handle/limits/memory"),
    route(NET_IN, Method::POST, "/containers/:handle/net/in"),
    route(NET_OUT, Method::POST, "/containers/:handle/net/out"),
    route(RUN, Method::POST, "/containers/:handle/processes"),
    route(ATTACH, Method::GET, "/containers/:handle/processes/:pid"),
    route(STDOUT, Method::GET, "/containers/:handle/processes/:pid/attaches/:streamid/stdout"),
    route(STDERR, Method::GET, "/containers/:handle/processes/:pid/attaches/:streamid/stderr"),
    route(PROPERTIES, Method::GET, "/containers/:handle/properties"),
    route(PROPERTY, Method::GET, "/containers/:handle/properties/:key"),
    route(SET_PROPERTY, Method::PUT, "/containers/:handle/properties/:key"),
    route(REMOVE_PROPERTY, Method::DELETE, "/containers/:handle/properties/:key"),
    route(METRICS, Method::GET, "/containers/:handle/metrics"),
];

/// Path parameters, e.g. `&[("handle", "web-1")]`.
pub type Params<'a> = &'a [(&'a str, &'a str)];

/// Builds request targets from the routing table.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    base: Url,
}

impl RequestGenerator {
    /// Host every request is addressed to. The transport ignores it.
    pub const HOST: &'static str = "api";

    pub fn new() -> Result<Self> {
        let base = Url::parse(&format!("http://{}", Self::HOST))
            .map_err(|e| GardenError::InvalidRequest(e.to_string()))?;
        Ok(Self { base })
    }

    /// Look up a route by operation name.
    pub fn route(&self, name: &str) -> Result<&'static Route> {
        ROUTES
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| GardenError::InvalidRequest(format!("unknown route: {}", name)))
    }

    /// Resolve `name` to its method and origin-form target (`/path?query`).
    pub fn request_target(
        &self,
        name: &str,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<(Method, String)> {
        let route = self.route(name)?;
        let mut url = self.base.clone();

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GardenError::InvalidRequest("base URL cannot hold a path".into()))?;
            segments.clear();

            for segment in route.path.split('/').filter(|s| !s.is_empty()) {
                match segment.strip_prefix(':') {
                    Some(key) => {
                        let value = params
                            .iter()
                            .find(|(k, _)| *k == key)
                            .map(|(_, v)| *v)
                            .filter(|v| !v.is_empty())
                            .ok_or_else(|| {
                                GardenError::InvalidRequest(format!(
                                    "missing path param {} for route {}",
                                    key, name
                                ))
                            })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        Ok((route.method.clone(), url[Position::BeforePath..].to_string()))
    }
}
