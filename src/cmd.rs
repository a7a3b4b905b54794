//! Netgraph PPPoE-cookie control message codes.
//!
//! These are the command codes carried in [`crate::transport::ControlMessage::cmd`]
//! for messages exchanged with a kernel PPPoE node. The real kernel ABI is
//! out of this crate's reach (see [`crate::transport`]); what matters here is
//! that both sides of the [`crate::transport::Transport`] boundary agree on
//! one numbering, which is all a driver and its kernel peer need.

/// Register interest in a service name on a `listen-<service>` hook.
pub const PPPOE_LISTEN: u32 = 1;

/// Request a session with the given service-name selector.
pub const PPPOE_CONNECT: u32 = 2;

/// The peer accepted the request; payload carries the negotiated session id.
pub const PPPOE_SUCCESS: u32 = 3;

/// The peer rejected the request or the attempt otherwise failed.
pub const PPPOE_FAIL: u32 = 4;

/// The session was torn down (by the peer, or by the kernel on its behalf).
pub const PPPOE_CLOSE: u32 = 5;

/// Server offer in response to a matched incoming discovery request.
pub const PPPOE_OFFER: u32 = 6;

/// Server service-name advertisement accompanying a [`PPPOE_OFFER`].
pub const PPPOE_SERVICE: u32 = 7;

/// Requests or reports the negotiated PPP-Max-Payload (RFC 4638).
pub const PPPOE_SETMAXP: u32 = 8;

/// Informational: AC-Name reported by the kernel node.
pub const PPPOE_ACNAME: u32 = 9;

/// Informational: Host-Uniq related URL tag, logged only.
pub const PPPOE_HURL: u32 = 10;

/// Informational: message-of-the-minute tag, logged only.
pub const PPPOE_MOTM: u32 = 11;

/// Informational: the kernel-assigned session id, logged only.
pub const PPPOE_SESSIONID: u32 = 12;
