//! In-memory [`Transport`] double used by the test suite and by the
//! illustrative `demos/` binaries, since the real netgraph transport is
//! kernel-resident and outside this crate's reach.

use std::collections::{HashMap, VecDeque};

use crate::error::PpPoeError;
use crate::transport::{ControlMessage, ControlSocket, DataFrame, DataSocket, HookList, NodeId, Transport};

/// One recorded call, in the order it was made. Tests assert on this log to
/// check plumbing order (e.g. "mkpeer before connect before PPPOE_CONNECT").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateSocketPair,
    SendControl { path: String, cmd: u32, body: Vec<u8> },
    SendData { hook: String, bytes: Vec<u8> },
    MakePeer {
        path: String,
        node_type: String,
        our_hook: String,
        peer_hook: String,
    },
    ConnectHooks {
        from_path: String,
        from_hook: String,
        to_path: String,
        to_hook: String,
    },
    DisconnectHook { path: String, hook: String },
    ShutdownNode { path: String },
    SetInterfaceUp { iface: String },
    LoadModule { name: String },
}

/// Deterministic, fully in-memory [`Transport`] implementation.
///
/// Node types, hook tables, and queued inbound messages are pre-seeded by
/// the test before exercising the driver; every mutating call is appended
/// to [`MockTransport::calls`] for later assertions.
#[derive(Default)]
pub struct MockTransport {
    pub calls: Vec<Call>,
    next_socket: u32,
    next_node_id: NodeId,
    node_types: Vec<String>,
    hooks_by_path: HashMap<String, HookList>,
    pending_control: VecDeque<ControlMessage>,
    pending_data: VecDeque<DataFrame>,
    pub fail_make_peer: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            node_types: vec!["ether".to_string()],
            ..Default::default()
        }
    }

    /// Seeds the hook list reported for `path` by `list_hooks`.
    pub fn seed_hooks(&mut self, path: &str, node_type: &str, hooks: &[&str]) {
        self.hooks_by_path.insert(
            path.to_string(),
            HookList {
                node_type: node_type.to_string(),
                hooks: hooks.iter().map(|h| h.to_string()).collect(),
            },
        );
    }

    /// Queues a control message to be returned by the next `recv_control`.
    pub fn push_control(&mut self, msg: ControlMessage) {
        self.pending_control.push_back(msg);
    }

    /// Queues a data frame to be returned by the next `recv_data`.
    pub fn push_data(&mut self, frame: DataFrame) {
        self.pending_data.push_back(frame);
    }

    /// Removes `node_type` from the set reported by `list_node_types`, to
    /// exercise the missing-node-type / load-module path.
    pub fn remove_node_type(&mut self, node_type: &str) {
        self.node_types.retain(|t| t != node_type);
    }
}

impl Transport for MockTransport {
    fn create_socket_pair(&mut self) -> Result<(ControlSocket, DataSocket), PpPoeError> {
        self.calls.push(Call::CreateSocketPair);
        let ctrl = self.next_socket;
        let data = self.next_socket + 1;
        self.next_socket += 2;
        Ok((ctrl, data))
    }

    fn send_control(
        &mut self,
        _sock: ControlSocket,
        path: &str,
        cmd: u32,
        body: &[u8],
    ) -> Result<(), PpPoeError> {
        self.calls.push(Call::SendControl {
            path: path.to_string(),
            cmd,
            body: body.to_vec(),
        });
        Ok(())
    }

    fn recv_control(&mut self, _sock: ControlSocket) -> Result<ControlMessage, PpPoeError> {
        self.pending_control
            .pop_front()
            .ok_or_else(|| PpPoeError::protocol("no control message queued on mock transport"))
    }

    fn send_data(&mut self, _sock: DataSocket, hook: &str, bytes: &[u8]) -> Result<(), PpPoeError> {
        self.calls.push(Call::SendData {
            hook: hook.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn recv_data(&mut self, _sock: DataSocket) -> Result<DataFrame, PpPoeError> {
        self.pending_data
            .pop_front()
            .ok_or_else(|| PpPoeError::protocol("no data frame queued on mock transport"))
    }

    fn make_peer(
        &mut self,
        _sock: ControlSocket,
        path: &str,
        node_type: &str,
        our_hook: &str,
        peer_hook: &str,
    ) -> Result<NodeId, PpPoeError> {
        self.calls.push(Call::MakePeer {
            path: path.to_string(),
            node_type: node_type.to_string(),
            our_hook: our_hook.to_string(),
            peer_hook: peer_hook.to_string(),
        });
        if self.fail_make_peer {
            return Err(PpPoeError::kernel_plumbing(
                "mkpeer",
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "mock failure"),
            ));
        }
        self.next_node_id += 1;
        Ok(self.next_node_id)
    }

    fn connect_hooks(
        &mut self,
        _sock: ControlSocket,
        from_path: &str,
        from_hook: &str,
        to_path: &str,
        to_hook: &str,
    ) -> Result<(), PpPoeError> {
        self.calls.push(Call::ConnectHooks {
            from_path: from_path.to_string(),
            from_hook: from_hook.to_string(),
            to_path: to_path.to_string(),
            to_hook: to_hook.to_string(),
        });
        Ok(())
    }

    fn disconnect_hook(&mut self, _sock: ControlSocket, path: &str, hook: &str) -> Result<(), PpPoeError> {
        self.calls.push(Call::DisconnectHook {
            path: path.to_string(),
            hook: hook.to_string(),
        });
        Ok(())
    }

    fn shutdown_node(&mut self, _sock: ControlSocket, path: &str) -> Result<(), PpPoeError> {
        self.calls.push(Call::ShutdownNode { path: path.to_string() });
        Ok(())
    }

    fn list_node_types(&mut self, _sock: ControlSocket) -> Result<Vec<String>, PpPoeError> {
        Ok(self.node_types.clone())
    }

    fn list_hooks(&mut self, _sock: ControlSocket, path: &str) -> Result<HookList, PpPoeError> {
        Ok(self.hooks_by_path.get(path).cloned().unwrap_or(HookList {
            node_type: String::new(),
            hooks: Vec::new(),
        }))
    }

    fn get_node_id(&mut self, _sock: ControlSocket, _path: &str) -> Result<NodeId, PpPoeError> {
        self.next_node_id += 1;
        Ok(self.next_node_id)
    }

    fn set_interface_up(&mut self, iface: &str) -> Result<(), PpPoeError> {
        self.calls.push(Call::SetInterfaceUp { iface: iface.to_string() });
        Ok(())
    }

    fn load_module(&mut self, name: &str) -> Result<(), PpPoeError> {
        self.calls.push(Call::LoadModule { name: name.to_string() });
        self.node_types.push(name.to_string());
        Ok(())
    }
}
