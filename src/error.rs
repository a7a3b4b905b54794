//! PPPoE driver error handling.
//!
//! The teacher this crate grew out of kept a `messages` module of error-string
//! templates and a comment describing, but never landing, a typed error enum
//! built on top of them ("v0.3.0: Add custom PfcpError enum here"). This module
//! finishes that: [`PpPoeError`] is the one error type returned from every
//! fallible operation in the crate, and its `Display` impl is built from the
//! same template functions a log line would use, so a returned error and the
//! log line describing the same failure never drift apart.

use std::fmt;
use std::io;

/// Error message templates shared between [`PpPoeError`]'s `Display` impl and
/// the `log::warn!`/`log::error!` call sites that describe the same failures.
pub mod messages {
    pub fn kernel_plumbing(op: &str, path: &str) -> String {
        format!("kernel-plumbing operation '{}' failed on {}", op, path)
    }

    pub fn resource_exhausted(what: &str, capacity: usize) -> String {
        format!("{} table is full (capacity {})", what, capacity)
    }

    pub fn protocol(reason: &str) -> String {
        format!("protocol error: {}", reason)
    }

    pub fn truncated_tag(cursor: usize, declared_end: usize) -> String {
        format!(
            "tag at offset {} would cross declared payload end {}",
            cursor, declared_end
        )
    }

    pub fn policy(reason: &str) -> String {
        format!("request rejected by policy: {}", reason)
    }

    pub fn timeout(link_id: u32) -> String {
        format!("link {} connect timer expired", link_id)
    }

    pub fn peer_signaled(link_id: u32, cause: &str) -> String {
        format!("link {} received peer signal: {}", link_id, cause)
    }

    pub fn invalid_config(field: &str, reason: &str) -> String {
        format!("invalid {} configuration: {}", field, reason)
    }

    pub fn out_of_range(field: &str, min: i64, max: i64, got: i64) -> String {
        format!(
            "{} out of range: expected [{}, {}], got {}",
            field, min, max, got
        )
    }

    pub fn wrong_node_type(path: &str, expected: &str, got: &str) -> String {
        format!(
            "node at {} has type '{}', expected '{}'",
            path, got, expected
        )
    }
}

/// The one error type returned by this crate.
///
/// Each variant corresponds to one of the error kinds from the driver's error
/// handling design: configuration, resource-exhaustion, kernel-plumbing,
/// protocol, policy, timeout, and peer-signaled.
#[derive(Debug)]
pub enum PpPoeError {
    /// Invalid configuration value (out-of-range max-payload, unknown
    /// MAC-format name, ...). Reported synchronously to the command caller.
    Configuration { field: &'static str, reason: String },

    /// The parent-interface table is full; the link stays DOWN.
    ResourceExhausted { what: &'static str, capacity: usize },

    /// A netgraph control operation (mkpeer, connect, listen, ...) failed.
    KernelPlumbing {
        op: &'static str,
        path: String,
        source: Option<io::Error>,
    },

    /// A discovery packet or control message was malformed.
    Protocol { reason: String },

    /// The daemon refused the request for a non-protocol reason (shutting
    /// down, overloaded, no eligible link for an incoming request, ...).
    Policy { reason: String },

    /// The per-link connect timer expired before PPPOE_SUCCESS.
    Timeout { link_id: u32 },

    /// The peer (or the kernel on the peer's behalf) signaled FAIL or CLOSE.
    PeerSignaled { link_id: u32, cause: &'static str },

    /// The Ethernet netgraph node type could not be found or loaded. This is
    /// the one process-level invariant violation; every other error is
    /// per-link and leaves the daemon running.
    EthernetNodeTypeMissing,
}

impl fmt::Display for PpPoeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpPoeError::Configuration { field, reason } => {
                write!(f, "{}", messages::invalid_config(field, reason))
            }
            PpPoeError::ResourceExhausted { what, capacity } => {
                write!(f, "{}", messages::resource_exhausted(what, *capacity))
            }
            PpPoeError::KernelPlumbing { op, path, source } => {
                write!(f, "{}", messages::kernel_plumbing(op, path))?;
                if let Some(source) = source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            PpPoeError::Protocol { reason } => write!(f, "{}", messages::protocol(reason)),
            PpPoeError::Policy { reason } => write!(f, "{}", messages::policy(reason)),
            PpPoeError::Timeout { link_id } => write!(f, "{}", messages::timeout(*link_id)),
            PpPoeError::PeerSignaled { link_id, cause } => {
                write!(f, "{}", messages::peer_signaled(*link_id, cause))
            }
            PpPoeError::EthernetNodeTypeMissing => {
                write!(f, "kernel Ethernet netgraph node type is not present or loadable")
            }
        }
    }
}

impl std::error::Error for PpPoeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PpPoeError::KernelPlumbing {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

impl PpPoeError {
    pub fn kernel_plumbing(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        PpPoeError::KernelPlumbing {
            op,
            path: path.into(),
            source: Some(source),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        PpPoeError::Protocol {
            reason: reason.into(),
        }
    }

    pub fn policy(reason: impl Into<String>) -> Self {
        PpPoeError::Policy {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for PpPoeError {
    fn from(source: io::Error) -> Self {
        PpPoeError::KernelPlumbing {
            op: "io",
            path: String::new(),
            source: Some(source),
        }
    }
}
