//! Connection identity attached to failure reports.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Implemented by store handles that can say where they are connected.
///
/// Every accessor is optional; a handle that is not connected, or does not
/// know a field, returns `None` and the field is left out of reports.
pub trait HostInfo: Send + Sync {
    /// Name of the library the handle belongs to.
    fn library_name(&self) -> Option<String> {
        None
    }

    /// Cluster members as `host:port`.
    fn cluster_nodes(&self) -> Option<Vec<String>> {
        None
    }

    /// The primary host string the handle was configured with.
    fn primary_host(&self) -> Option<String> {
        None
    }
}

impl<T: HostInfo + ?Sized> HostInfo for Arc<T> {
    fn library_name(&self) -> Option<String> {
        (**self).library_name()
    }

    fn cluster_nodes(&self) -> Option<Vec<String>> {
        (**self).cluster_nodes()
    }

    fn primary_host(&self) -> Option<String> {
        (**self).primary_host()
    }
}

// A batch of handles is described by its first element.
impl<T: HostInfo> HostInfo for [T] {
    fn library_name(&self) -> Option<String> {
        self.first().and_then(|handle| handle.library_name())
    }

    fn cluster_nodes(&self) -> Option<Vec<String>> {
        self.first().and_then(|handle| handle.cluster_nodes())
    }

    fn primary_host(&self) -> Option<String> {
        self.first().and_then(|handle| handle.primary_host())
    }
}

impl<T: HostInfo> HostInfo for Vec<T> {
    fn library_name(&self) -> Option<String> {
        self.as_slice().library_name()
    }

    fn cluster_nodes(&self) -> Option<Vec<String>> {
        self.as_slice().cluster_nodes()
    }

    fn primary_host(&self) -> Option<String> {
        self.as_slice().primary_host()
    }
}

/// Snapshot of a handle's identity, taken when a failure is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl HostDescriptor {
    pub fn describe(source: Option<&dyn HostInfo>) -> Self {
        match source {
            Some(info) => Self {
                library: info.library_name(),
                nodes: info.cluster_nodes(),
                host: info.primary_host(),
            },
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.library.is_none() && self.nodes.is_none() && self.host.is_none()
    }
}

impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(library) = &self.library {
            parts.push(format!("library={}", library));
        }
        if let Some(nodes) = &self.nodes {
            parts.push(format!("nodes={}", nodes.join(",")));
        }
        if let Some(host) = &self.host {
            parts.push(format!("host={}", host));
        }
        f.write_str(&parts.join(" "))
    }
}
