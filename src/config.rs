//! Per-link configuration surface.
//!
//! Every setter here takes an already-typed, already-validated-by-syntax
//! argument; no command text is tokenized in this crate. A CLI front end
//! (see `demos/link-cli`) is expected to split the commands in the upstream
//! documentation into these calls.

use crate::error::PpPoeError;
use crate::mac::MacFormat;

/// Minimum accepted PPP-Max-Payload value (the un-negotiated PPPoE MRU).
pub const PPPOE_MRU: u16 = 1492;

/// Maximum accepted PPP-Max-Payload value (`ETHER_MAX_LEN - 8`).
pub const ETHER_MAX_PAYLOAD: u16 = 1510;

/// Default graph hook a parent Ethernet interface is attached on.
pub const DEFAULT_ATTACH_HOOK: &str = "orphans";

/// Default service-name pattern: matches any service.
pub const DEFAULT_SERVICE: &str = "*";

/// Default connect-timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 9;

/// Per-link mutable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub iface: Option<String>,
    pub attach_hook: String,
    pub service: String,
    pub acname: Option<String>,
    pub max_payload: u16,
    pub mac_format: MacFormat,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            iface: None,
            attach_hook: DEFAULT_ATTACH_HOOK.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            acname: None,
            max_payload: 0,
            mac_format: MacFormat::default(),
        }
    }
}

/// Derives a netgraph path from an interface name: '.' and ':' are replaced
/// by '_', then a trailing ':' is appended.
///
/// The original implementation writes into a fixed-size buffer and stops at
/// the first '.' or ':' by overwriting it with ':' and terminating the
/// string there; names longer than the buffer are silently truncated. This
/// reimplementation preserves the "stop at the first separator" behavior
/// (a path component never contains '.' or ':') but operates on an owned
/// `String` so there is no hidden length limit.
///
/// Preserving that behavior means a VLAN sub-interface still collides with
/// its parent: `"eth0.100"` and `"eth0"` both derive the path `"eth0:"`, so
/// binding a link to one after the other acquires the same `ParentInterface`
/// entry rather than two distinct ones.
pub fn iface_to_path(iface: &str) -> String {
    let mut path = String::with_capacity(iface.len() + 1);
    for ch in iface.chars() {
        if ch == '.' || ch == ':' {
            break;
        }
        path.push(ch);
    }
    path.push(':');
    path
}

impl LinkConfig {
    /// Sets the parent interface and, optionally, the hook to attach on.
    /// `hook` defaults to [`DEFAULT_ATTACH_HOOK`] when absent.
    pub fn set_iface(&mut self, iface: impl Into<String>, hook: Option<String>) {
        self.iface = Some(iface.into());
        self.attach_hook = hook.unwrap_or_else(|| DEFAULT_ATTACH_HOOK.to_string());
    }

    /// Sets the service-name pattern.
    pub fn set_service(&mut self, service: impl Into<String>) {
        self.service = service.into();
    }

    /// Sets the AC-Name advertised in server OFFER messages.
    pub fn set_acname(&mut self, acname: impl Into<String>) {
        self.acname = Some(acname.into());
    }

    /// Sets the PPP-Max-Payload request value. `0` disables the request.
    /// Any other value must lie in `[PPPOE_MRU, ETHER_MAX_PAYLOAD]`.
    pub fn set_max_payload(&mut self, value: u16) -> Result<(), PpPoeError> {
        if value != 0 && !(PPPOE_MRU..=ETHER_MAX_PAYLOAD).contains(&value) {
            return Err(PpPoeError::Configuration {
                field: "max-payload",
                reason: crate::error::messages::out_of_range(
                    "max-payload",
                    PPPOE_MRU as i64,
                    ETHER_MAX_PAYLOAD as i64,
                    value as i64,
                ),
            });
        }
        self.max_payload = value;
        Ok(())
    }

    /// Parses and sets the MAC rendering format from an already-tokenized
    /// name (`"unformatted"`, `"unix-like"`, `"cisco-like"`, `"ietf"`).
    pub fn set_mac_format(&mut self, name: &str) -> Result<(), PpPoeError> {
        match MacFormat::parse(name) {
            Some(format) => {
                self.mac_format = format;
                Ok(())
            }
            None => Err(PpPoeError::Configuration {
                field: "mac-format",
                reason: format!("unknown MAC format '{}'", name),
            }),
        }
    }

    /// The netgraph path derived from the configured interface, if any.
    pub fn graph_path(&self) -> Option<String> {
        self.iface.as_deref().map(iface_to_path)
    }
}
