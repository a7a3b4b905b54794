//! Per-link data model and phys-layer state machine.
//!
//! The state machine's transitions are implemented as plain functions over
//! [`Link`] plus its collaborators in [`crate::driver`], rather than as
//! methods that reach sideways into a transport or registry `Link` itself
//! does not own: a `Link` only ever holds integer handles into the parent
//! registry and listen set (see [`crate::parent`], [`crate::listen`]), never
//! owning references, so it stays a plain, independently-movable value.

use crate::clock::TimerHandle;
use crate::config::LinkConfig;
use crate::listen::ListenHandle;
use crate::parent::ParentHandle;
use crate::upper::PeerIdentity;

/// Opaque identity of a link within a [`crate::driver::Driver`]'s link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

/// Phys-layer state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Connecting,
    Ready,
    Up,
}

/// Runtime (as opposed to configured) fields of a link, reset on every
/// transition back to [`LinkState::Down`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRuntime {
    pub peer: PeerIdentity,
    /// True once `open()` has been called for this activation; distinguishes
    /// a server link held in READY (peer succeeded, but the upper layer has
    /// not opened yet) from one that goes straight to UP.
    pub opened: bool,
    /// True for links currently serving an accepted incoming request.
    pub incoming: bool,
    /// Set once a SETMAXP reply matching the configured request is seen.
    pub max_payload_reply: bool,
    pub timer: Option<TimerHandle>,
    /// Path of the transient tee node plumbed during incoming pickup (see
    /// `crate::router`), cleared once the upper layer opens the link.
    pub tee_path: Option<String>,
}

/// A PPPoE link: static-instance or template, outgoing or incoming-capable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub config: LinkConfig,
    pub state: LinkState,
    pub runtime: LinkRuntime,
    pub parent: Option<ParentHandle>,
    pub listen: Option<ListenHandle>,
    /// Incoming-enabled links configured as a template are cloned by the
    /// upper layer's `instantiate()` on each accepted incoming call rather
    /// than handling the call themselves.
    pub is_template: bool,
    /// Incoming discovery requests are only matched against links with this
    /// enabled (mirrors `LINK_CONF_INCOMING`).
    pub incoming_enabled: bool,
}

impl Link {
    pub fn new(id: LinkId, name: impl Into<String>) -> Self {
        Link {
            id,
            name: name.into(),
            config: LinkConfig::default(),
            state: LinkState::Down,
            runtime: LinkRuntime::default(),
            parent: None,
            listen: None,
            is_template: false,
            incoming_enabled: false,
        }
    }

    /// True once the link has a per-session hook worth tearing down, i.e.
    /// any state other than DOWN.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, LinkState::Down)
    }

    /// Whether this link is eligible to pick up a newly matched incoming
    /// discovery request: not already busy, bound to the given parent, with
    /// a matching service, and incoming-enabled.
    pub fn eligible_for_incoming(&self, parent: ParentHandle, service: &str) -> bool {
        self.state == LinkState::Down
            && self.parent == Some(parent)
            && self.config.service == service
            && self.incoming_enabled
    }

    /// The per-session hook name this link's PPPoE peer attaches on, keyed
    /// by the owning process id to disambiguate multiple daemon instances
    /// sharing a netgraph namespace (`mpd<pid>-<link_id>`).
    pub fn session_hook(&self, pid: u32) -> String {
        format!("mpd{}-{}", pid, self.id.0)
    }

    fn reset_runtime(&mut self) {
        self.runtime = LinkRuntime::default();
    }

    /// Applies a teardown: clears runtime state and moves to DOWN. Callers
    /// are responsible for the kernel-side hook disconnect and timer
    /// cancellation before calling this (see `crate::driver`).
    pub fn teardown(&mut self) {
        self.reset_runtime();
        self.state = LinkState::Down;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_hook_includes_pid_and_id() {
        let link = Link::new(LinkId(7), "link0");
        assert_eq!(link.session_hook(1234), "mpd1234-7");
    }

    #[test]
    fn eligible_for_incoming_requires_down_state_and_matching_service() {
        let mut link = Link::new(LinkId(1), "link0");
        let parent = ParentHandle(0);
        link.parent = Some(parent);
        link.config.service = "isp".to_string();
        link.incoming_enabled = true;
        assert!(link.eligible_for_incoming(parent, "isp"));

        link.state = LinkState::Up;
        assert!(!link.eligible_for_incoming(parent, "isp"));

        link.state = LinkState::Down;
        assert!(!link.eligible_for_incoming(parent, "biz"));

        link.incoming_enabled = false;
        assert!(!link.eligible_for_incoming(parent, "isp"));
    }

    #[test]
    fn teardown_clears_runtime_state() {
        let mut link = Link::new(LinkId(1), "link0");
        link.state = LinkState::Up;
        link.runtime.opened = true;
        link.runtime.incoming = true;
        link.teardown();
        assert_eq!(link.state, LinkState::Down);
        assert_eq!(link.runtime, LinkRuntime::default());
    }
}
