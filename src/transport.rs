//! Netgraph transport contract.
//!
//! The kernel netgraph subsystem itself is out of reach from this crate: the
//! only thing that lives here is the interface the rest of the driver needs
//! from it, expressed as the [`Transport`] trait so the core is testable
//! against an in-memory double. Every operation is a single synchronous
//! round trip; none of them are expected to block longer than that, mirroring
//! the blocking `UdpSocket` send/recv pairs the rest of this codebase's
//! control-plane code uses rather than reaching for an async runtime.

use crate::error::PpPoeError;

pub mod mock;

/// A 32-bit netgraph node id, as returned by `get_node_id`.
pub type NodeId = u32;

/// One end of a control-socket / data-socket pair bound to a parent
/// Ethernet interface. Transports hand these out as opaque tokens; the
/// driver never inspects them beyond passing them back into this trait.
pub type ControlSocket = u32;
pub type DataSocket = u32;

/// A decoded netgraph control message, as received from a control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    /// Hook name the message pertains to (e.g. `"mpd1234-7"`, `"listen-isp"`).
    pub hook: String,
    /// The PPPoE-cookie command code (PPPOE_SUCCESS, PPPOE_FAIL, ...).
    pub cmd: u32,
    /// Command-specific payload (a session id, an error string, ...).
    pub body: Vec<u8>,
}

/// A raw data-socket datagram paired with the hook it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub hook: String,
    pub bytes: Vec<u8>,
}

/// The node type a graph node reports back on `list_hooks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookList {
    pub node_type: String,
    pub hooks: Vec<String>,
}

/// Kernel netgraph operations required by the link driver.
///
/// Implementations are expected to report every failure through
/// [`PpPoeError::KernelPlumbing`] (or a more specific variant where one
/// applies); none of these methods panic on a kernel-side failure.
pub trait Transport {
    /// Creates the control/data socket pair used by one parent interface.
    fn create_socket_pair(&mut self) -> Result<(ControlSocket, DataSocket), PpPoeError>;

    /// Sends a typed control message addressed to `path`.
    fn send_control(
        &mut self,
        sock: ControlSocket,
        path: &str,
        cmd: u32,
        body: &[u8],
    ) -> Result<(), PpPoeError>;

    /// Blocks for the next control message on `sock`.
    fn recv_control(&mut self, sock: ControlSocket) -> Result<ControlMessage, PpPoeError>;

    /// Sends a raw data frame on `hook`.
    fn send_data(&mut self, sock: DataSocket, hook: &str, bytes: &[u8]) -> Result<(), PpPoeError>;

    /// Blocks for the next data frame on `sock`.
    fn recv_data(&mut self, sock: DataSocket) -> Result<DataFrame, PpPoeError>;

    /// Creates a new peer node of `node_type` attached to `our_hook` on the
    /// node at `path`, with the peer's own hook named `peer_hook`. Returns
    /// the new peer's node id.
    fn make_peer(
        &mut self,
        sock: ControlSocket,
        path: &str,
        node_type: &str,
        our_hook: &str,
        peer_hook: &str,
    ) -> Result<NodeId, PpPoeError>;

    /// Connects `from_hook` on the node at `from_path` to `to_hook` on the
    /// node at `to_path`.
    fn connect_hooks(
        &mut self,
        sock: ControlSocket,
        from_path: &str,
        from_hook: &str,
        to_path: &str,
        to_hook: &str,
    ) -> Result<(), PpPoeError>;

    /// Disconnects `hook` on the node at `path`.
    fn disconnect_hook(&mut self, sock: ControlSocket, path: &str, hook: &str) -> Result<(), PpPoeError>;

    /// Shuts down the node at `path`.
    fn shutdown_node(&mut self, sock: ControlSocket, path: &str) -> Result<(), PpPoeError>;

    /// Lists the kernel node types currently loaded.
    fn list_node_types(&mut self, sock: ControlSocket) -> Result<Vec<String>, PpPoeError>;

    /// Lists the hooks attached to the node at `path`, plus its node type.
    fn list_hooks(&mut self, sock: ControlSocket, path: &str) -> Result<HookList, PpPoeError>;

    /// Resolves the node id of the node at `path`.
    fn get_node_id(&mut self, sock: ControlSocket, path: &str) -> Result<NodeId, PpPoeError>;

    /// Brings `iface` administratively up.
    fn set_interface_up(&mut self, iface: &str) -> Result<(), PpPoeError>;

    /// Loads a kernel module by name (used to bring in a missing node type).
    fn load_module(&mut self, name: &str) -> Result<(), PpPoeError>;
}
