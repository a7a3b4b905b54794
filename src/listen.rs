//! Listen set: per-(parent, service-name) registrations mirroring the
//! kernel PPPoE node's `listen-<service>` hooks.

use crate::cmd::PPPOE_LISTEN;
use crate::error::PpPoeError;
use crate::parent::{ParentHandle, ParentInfo, ParentRegistry};
use crate::transport::Transport;

/// Opaque handle into a [`ListenSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenHandle(pub u32);

struct ListenEntry {
    parent: ParentHandle,
    service: String,
    refs: u32,
}

/// Table of active listen registrations across all parents.
///
/// One entry exists per (parent, service) pair with at least one
/// incoming-enabled link bound to it; `refs` equals the number of such
/// links (invariant 3). Slots are indexed by [`ListenHandle`] and never
/// shift: a freed entry leaves a `None` tombstone behind (mirroring
/// `parent::ParentSlot::free`) rather than compacting the vector, since
/// links hold their `ListenHandle` as a stable positional index.
#[derive(Default)]
pub struct ListenSet {
    entries: Vec<Option<ListenEntry>>,
}

fn listen_hook_name(service: &str) -> String {
    format!("listen-{}", service)
}

impl ListenSet {
    pub fn new() -> Self {
        ListenSet::default()
    }

    /// Looks up an existing entry for (parent, service) without registering
    /// a new reference.
    pub fn find(&self, parent: ParentHandle, service: &str) -> Option<ListenHandle> {
        self.entries
            .iter()
            .position(|e| matches!(e, Some(e) if e.parent == parent && e.service == service))
            .map(|i| ListenHandle(i as u32))
    }

    pub fn refcount(&self, handle: ListenHandle) -> u32 {
        self.entries
            .get(handle.0 as usize)
            .and_then(|e| e.as_ref())
            .map(|e| e.refs)
            .unwrap_or(0)
    }

    pub fn service_name(&self, handle: ListenHandle) -> Option<&str> {
        self.entries
            .get(handle.0 as usize)
            .and_then(|e| e.as_ref())
            .map(|e| e.service.as_str())
    }

    /// Registers interest in `service` on `parent`. If an entry already
    /// exists, its refcount is bumped; otherwise a new `listen-<service>`
    /// hook is connected on the kernel side.
    pub fn listen(
        &mut self,
        transport: &mut impl Transport,
        parents: &ParentRegistry,
        parent: ParentHandle,
        service: &str,
    ) -> Result<ListenHandle, PpPoeError> {
        if let Some(handle) = self.find(parent, service) {
            self.entries[handle.0 as usize].as_mut().unwrap().refs += 1;
            return Ok(handle);
        }

        let info: ParentInfo = parents
            .info(parent)
            .ok_or_else(|| PpPoeError::protocol("listen() on unknown parent handle"))?;
        let hook = listen_hook_name(service);
        transport.connect_hooks(info.ctrl_sock, &info.path, &hook, &info.path, "listen")?;
        transport.send_control(info.ctrl_sock, &info.path, PPPOE_LISTEN, service.as_bytes())?;

        let entry = ListenEntry {
            parent,
            service: service.to_string(),
            refs: 1,
        };
        let slot_index = self.entries.iter().position(|e| e.is_none());
        let idx = match slot_index {
            Some(i) => {
                self.entries[i] = Some(entry);
                i
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        Ok(ListenHandle(idx as u32))
    }

    /// Drops one reference on `handle`; at zero refs the `listen-<service>`
    /// hook is disconnected and the entry removed.
    pub fn unlisten(
        &mut self,
        transport: &mut impl Transport,
        parents: &ParentRegistry,
        handle: ListenHandle,
    ) -> Result<(), PpPoeError> {
        let idx = handle.0 as usize;
        let slot = self
            .entries
            .get_mut(idx)
            .and_then(|e| e.as_mut())
            .ok_or_else(|| PpPoeError::protocol("unlisten() on unknown listen handle"))?;
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs != 0 {
            return Ok(());
        }
        let entry = self.entries[idx].take().unwrap();
        let info = parents
            .info(entry.parent)
            .ok_or_else(|| PpPoeError::protocol("unlisten() on released parent"))?;
        let hook = listen_hook_name(&entry.service);
        transport.disconnect_hook(info.ctrl_sock, &info.path, &hook)
    }

    /// Finds the listen entry on `parent` whose service exactly matches
    /// `service`, used by the discovery router to select the link a
    /// matched incoming request is routed to.
    pub fn find_by_parent_and_service(&self, parent: ParentHandle, service: &str) -> Option<ListenHandle> {
        self.find(parent, service)
    }
}
