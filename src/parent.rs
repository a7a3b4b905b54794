//! Parent-interface registry: the fixed-capacity table of kernel Ethernet
//! bindings shared by every link attached to the same physical interface.

use crate::config::DEFAULT_ATTACH_HOOK;
use crate::error::PpPoeError;
use crate::transport::Transport;

/// Default table capacity.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Table capacity used by small builds (embedded targets, tests that want a
/// tight exhaustion boundary).
pub const SMALL_CAPACITY: usize = 32;

/// Kernel node type this crate attaches a PPPoE peer to.
pub const ETHER_NODE_TYPE: &str = "ether";

/// Kernel node type of the PPPoE peer itself.
pub const PPPOE_NODE_TYPE: &str = "pppoe";

/// Opaque handle into a [`ParentRegistry`]. Links hold this instead of an
/// owning reference; the registry entry it names may outlive or be released
/// independently of any one link's own lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentHandle(pub u32);

#[derive(Debug)]
struct ParentSlot {
    /// Empty path marks the slot free; see [`ParentRegistry::acquire`].
    path: String,
    node_id: u32,
    ctrl_sock: u32,
    data_sock: u32,
    refs: u32,
}

impl ParentSlot {
    fn free() -> Self {
        ParentSlot {
            path: String::new(),
            node_id: 0,
            ctrl_sock: 0,
            data_sock: 0,
            refs: 0,
        }
    }

    fn is_free(&self) -> bool {
        self.path.is_empty()
    }
}

/// Read-only view of one parent-interface entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentInfo {
    pub path: String,
    pub node_id: u32,
    pub ctrl_sock: u32,
    pub data_sock: u32,
    pub refs: u32,
}

/// Fixed-capacity table of parent-Ethernet bindings.
///
/// One entry exists per distinct graph path with at least one bound link;
/// `refs` equals the number of links whose parent handle names that entry
/// (invariant 2 of the testable-properties list).
pub struct ParentRegistry {
    slots: Vec<ParentSlot>,
    ether_node_type_confirmed: bool,
}

impl ParentRegistry {
    pub fn new(capacity: usize) -> Self {
        ParentRegistry {
            slots: (0..capacity).map(|_| ParentSlot::free()).collect(),
            ether_node_type_confirmed: false,
        }
    }

    pub fn with_default_capacity() -> Self {
        ParentRegistry::new(DEFAULT_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Looks up an existing entry by path without acquiring a reference.
    pub fn find(&self, path: &str) -> Option<ParentHandle> {
        self.slots
            .iter()
            .position(|s| !s.is_free() && s.path == path)
            .map(|i| ParentHandle(i as u32))
    }

    pub fn info(&self, handle: ParentHandle) -> Option<ParentInfo> {
        self.slots.get(handle.0 as usize).and_then(|s| {
            if s.is_free() {
                None
            } else {
                Some(ParentInfo {
                    path: s.path.clone(),
                    node_id: s.node_id,
                    ctrl_sock: s.ctrl_sock,
                    data_sock: s.data_sock,
                    refs: s.refs,
                })
            }
        })
    }

    /// Acquires a reference on the parent entry for `path`, creating it if
    /// necessary: bringing `iface` up, opening the socket pair, confirming
    /// (and if needed loading) the Ethernet node type, and either adopting
    /// an existing PPPoE peer on `attach_hook` or creating a new one.
    pub fn acquire(
        &mut self,
        transport: &mut impl Transport,
        path: &str,
        iface: &str,
        attach_hook: &str,
    ) -> Result<ParentHandle, PpPoeError> {
        if let Some(handle) = self.find(path) {
            self.slots[handle.0 as usize].refs += 1;
            return Ok(handle);
        }

        let slot_index = self
            .slots
            .iter()
            .position(|s| s.is_free())
            .ok_or_else(|| PpPoeError::ResourceExhausted {
                what: "parent interface",
                capacity: self.slots.len(),
            })?;

        transport.set_interface_up(iface)?;
        let (ctrl_sock, data_sock) = transport.create_socket_pair()?;

        self.ensure_ether_node_type(transport, ctrl_sock)?;

        let our_hook = attach_hook;
        let hooks = transport.list_hooks(ctrl_sock, path)?;
        let node_id = if hooks.hooks.iter().any(|h| h == our_hook) {
            if hooks.node_type != PPPOE_NODE_TYPE {
                return Err(PpPoeError::protocol(crate::error::messages::wrong_node_type(
                    path,
                    PPPOE_NODE_TYPE,
                    &hooks.node_type,
                )));
            }
            transport.get_node_id(ctrl_sock, path)?
        } else {
            transport.make_peer(ctrl_sock, path, PPPOE_NODE_TYPE, our_hook, "ethernet")?
        };

        self.slots[slot_index] = ParentSlot {
            path: path.to_string(),
            node_id,
            ctrl_sock,
            data_sock,
            refs: 1,
        };
        Ok(ParentHandle(slot_index as u32))
    }

    /// Releases one reference on `handle`; at zero refs the entry's sockets
    /// are closed (by shutting down its node) and the slot is freed.
    pub fn release(&mut self, transport: &mut impl Transport, handle: ParentHandle) -> Result<(), PpPoeError> {
        let slot = self
            .slots
            .get_mut(handle.0 as usize)
            .filter(|s| !s.is_free())
            .ok_or_else(|| PpPoeError::protocol("release of unknown parent handle"))?;
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            let path = std::mem::take(&mut slot.path);
            let ctrl_sock = slot.ctrl_sock;
            *slot = ParentSlot::free();
            transport.shutdown_node(ctrl_sock, &path)?;
        }
        Ok(())
    }

    fn ensure_ether_node_type(&mut self, transport: &mut impl Transport, ctrl_sock: u32) -> Result<(), PpPoeError> {
        if self.ether_node_type_confirmed {
            return Ok(());
        }
        let types = transport.list_node_types(ctrl_sock)?;
        if !types.iter().any(|t| t == ETHER_NODE_TYPE) {
            transport.load_module(ETHER_NODE_TYPE)?;
            let types = transport.list_node_types(ctrl_sock)?;
            if !types.iter().any(|t| t == ETHER_NODE_TYPE) {
                return Err(PpPoeError::EthernetNodeTypeMissing);
            }
        }
        self.ether_node_type_confirmed = true;
        Ok(())
    }
}

pub const fn default_attach_hook() -> &'static str {
    DEFAULT_ATTACH_HOOK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn acquire_creates_one_entry_and_second_acquire_shares_it() {
        let mut reg = ParentRegistry::new(4);
        let mut t = MockTransport::new();
        let h1 = reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        let h2 = reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(reg.info(h1).unwrap().refs, 2);
    }

    #[test]
    fn release_drops_refcount_and_frees_slot_at_zero() {
        let mut reg = ParentRegistry::new(4);
        let mut t = MockTransport::new();
        let h = reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        reg.release(&mut t, h).unwrap();
        assert_eq!(reg.info(h).unwrap().refs, 1);
        reg.release(&mut t, h).unwrap();
        assert!(reg.info(h).is_none());
        assert!(reg.find("eth0:").is_none());
    }

    #[test]
    fn acquire_over_capacity_fails() {
        let mut reg = ParentRegistry::new(1);
        let mut t = MockTransport::new();
        reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        let err = reg.acquire(&mut t, "eth1:", "eth1", "orphans").unwrap_err();
        assert!(matches!(err, PpPoeError::ResourceExhausted { .. }));
    }

    #[test]
    fn acquire_adopts_existing_pppoe_peer_on_attach_hook() {
        let mut reg = ParentRegistry::new(4);
        let mut t = MockTransport::new();
        t.seed_hooks("eth0:", PPPOE_NODE_TYPE, &["orphans"]);
        let h = reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        assert!(t.calls.iter().all(|c| !matches!(c, crate::transport::mock::Call::MakePeer { .. })));
        assert!(reg.info(h).is_some());
    }

    #[test]
    fn acquire_rejects_wrong_node_type_on_attach_hook() {
        let mut reg = ParentRegistry::new(4);
        let mut t = MockTransport::new();
        t.seed_hooks("eth0:", "some_other_type", &["orphans"]);
        let err = reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap_err();
        assert!(matches!(err, PpPoeError::Protocol { .. }));
    }

    #[test]
    fn acquire_loads_missing_ether_node_type() {
        let mut reg = ParentRegistry::new(4);
        let mut t = MockTransport::new();
        t.remove_node_type(ETHER_NODE_TYPE);
        reg.acquire(&mut t, "eth0:", "eth0", "orphans").unwrap();
        assert!(t
            .calls
            .iter()
            .any(|c| matches!(c, crate::transport::mock::Call::LoadModule { name } if name == ETHER_NODE_TYPE)));
    }
}
