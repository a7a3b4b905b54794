//! Upstream phys-layer contract: the interface the embedding PPP daemon
//! implements so this driver can report state changes and ask for the
//! hook it should attach a session's data path to.

use macaddr::MacAddr6;

use crate::link::LinkId;

/// Reason a link transitioned back to DOWN, passed to [`UpperLayer::notify_down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownCause {
    /// `close()` was called directly.
    Manual,
    /// The peer (or the kernel on the peer's behalf) sent PPPOE_FAIL.
    ConnectionFailed,
    /// The peer (or the kernel on the peer's behalf) sent PPPOE_CLOSE.
    Dropped,
    /// The connect timer expired before PPPOE_SUCCESS.
    ConnectionTimeout,
    /// A kernel-plumbing step inside `open()` failed.
    PlumbingError,
}

impl DownCause {
    /// The cause string passed to the upper layer, matching the wording
    /// used in the end-to-end scenarios this driver is tested against.
    pub fn as_str(&self) -> &'static str {
        match self {
            DownCause::Manual => "manual",
            DownCause::ConnectionFailed => "connection failed",
            DownCause::Dropped => "dropped",
            DownCause::ConnectionTimeout => "connection timeout",
            DownCause::PlumbingError => "plumbing error",
        }
    }
}

/// The hook path the upper PPP pipeline expects its data to arrive on,
/// resolved by [`UpperLayer::request_upper_hook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpperHook {
    pub path: String,
    pub hook: String,
}

/// Originating side of a link, reported by [`UpperLayer::originated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originated {
    Local,
    Remote,
}

/// Callbacks the driver makes upward into the embedding PPP daemon.
///
/// This is the daemon's view of one link; the driver calls these from
/// inside its own state-machine transitions and never expects a callback
/// to recurse back into the driver synchronously.
pub trait UpperLayer {
    /// Called once a link reaches state UP.
    fn notify_up(&mut self, link: LinkId);

    /// Called when a link transitions back to DOWN, with the triggering cause.
    fn notify_down(&mut self, link: LinkId, cause: DownCause);

    /// Called when an incoming discovery request is accepted and plumbed,
    /// before the handshake completes.
    fn notify_incoming(&mut self, link: LinkId);

    /// Asks the upper layer which hook the link's data path should attach
    /// to before the driver connects its per-session hook to it.
    fn request_upper_hook(&mut self, link: LinkId) -> UpperHook;

    /// Produces a fresh link instance cloned from `template`, used when an
    /// incoming discovery request matches a template (non-static) link.
    fn instantiate(&mut self, template: LinkId) -> LinkId;

    /// True for every link this driver manages (always `true` in practice;
    /// present for symmetry with the upstream phys-layer contract's
    /// `is_sync` query).
    fn is_sync(&self, link: LinkId) -> bool {
        let _ = link;
        true
    }

    /// Reports which side initiated the session.
    fn originated(&self, link: LinkId) -> Originated;
}

/// Peer identity fields surfaced to the upper layer's calling/called-number
/// and self/peer-name queries. Populated by the router on incoming match
/// and cleared on close.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    pub peer_mac: Option<[u8; 6]>,
    pub real_session: String,
    pub agent_circuit_id: String,
    pub agent_remote_id: String,
}

impl PeerIdentity {
    pub fn peer_mac_addr(&self) -> Option<MacAddr6> {
        self.peer_mac.map(|b| MacAddr6::new(b[0], b[1], b[2], b[3], b[4], b[5]))
    }
}
