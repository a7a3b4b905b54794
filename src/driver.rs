//! Top-level link driver: owns the link table, the parent registry, the
//! listen set, and the transport/clock/upper-layer collaborators, and
//! implements the phys-layer state machine operations (§4.5) and
//! configuration surface (§4.7) that the discovery router (`crate::router`)
//! drives in response to kernel events.

use std::time::Duration;

use crate::clock::Clock;
use crate::cmd;
use crate::config::{LinkConfig, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::error::PpPoeError;
use crate::link::{Link, LinkId, LinkState};
use crate::listen::ListenSet;
use crate::mac;
use crate::parent::ParentRegistry;
use crate::tag;
use crate::transport::Transport;
use crate::upper::{DownCause, Originated, UpperLayer};

/// Owns every piece of driver state and drives the state machine.
///
/// Generic over its collaborators so tests can plug in [`crate::transport::mock::MockTransport`]
/// and [`crate::clock::FakeClock`] in place of the real kernel transport and
/// event-loop timer.
pub struct Driver<T: Transport, C: Clock, U: UpperLayer> {
    pid: u32,
    connect_timeout: Duration,
    links: Vec<Option<Link>>,
    parents: ParentRegistry,
    listens: ListenSet,
    pub transport: T,
    pub clock: C,
    pub upper: U,
    shutting_down: bool,
}

impl<T: Transport, C: Clock, U: UpperLayer> Driver<T, C, U> {
    pub fn new(pid: u32, parent_capacity: usize, transport: T, clock: C, upper: U) -> Self {
        Driver {
            pid,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            links: Vec::new(),
            parents: ParentRegistry::new(parent_capacity),
            listens: ListenSet::new(),
            transport,
            clock,
            upper,
            shutting_down: false,
        }
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn begin_shutdown(&mut self) {
        self.shutting_down = true;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Adds a new, unbound, DOWN link and returns its id.
    pub fn add_link(&mut self, name: impl Into<String>) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(Some(Link::new(id, name)));
        id
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0 as usize).and_then(|l| l.as_ref())
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.0 as usize).and_then(|l| l.as_mut())
    }

    pub fn links_iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter_map(|l| l.as_ref())
    }

    fn get_link(&self, id: LinkId) -> Result<&Link, PpPoeError> {
        self.link(id).ok_or_else(|| PpPoeError::protocol("unknown link id"))
    }

    // ---- configuration surface (§4.7) ----

    /// Binds (or rebinds) the link to `iface`, attaching on `hook` (default
    /// `orphans`). If the link was already bound, the old parent reference
    /// (and listen registration, if any) is released first and a fresh one
    /// acquired for the new interface.
    pub fn set_iface(&mut self, id: LinkId, iface: &str, hook: Option<String>) -> Result<(), PpPoeError> {
        self.release_binding(id)?;
        let link = self.link_mut(id).ok_or_else(|| PpPoeError::protocol("unknown link id"))?;
        link.config.set_iface(iface, hook);
        let path = link.config.graph_path().expect("iface just set");
        let attach_hook = link.config.attach_hook.clone();
        let incoming_enabled = link.incoming_enabled;
        let service = link.config.service.clone();

        let parent = self.parents.acquire(&mut self.transport, &path, iface, &attach_hook)?;
        let link = self.link_mut(id).unwrap();
        link.parent = Some(parent);

        if incoming_enabled {
            let listen = self.listens.listen(&mut self.transport, &self.parents, parent, &service)?;
            self.link_mut(id).unwrap().listen = Some(listen);
        }
        Ok(())
    }

    /// Changes the service-name pattern, relistening if currently incoming-enabled.
    pub fn set_service(&mut self, id: LinkId, service: &str) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        let parent = link.parent;
        let old_listen = link.listen;
        let incoming_enabled = link.incoming_enabled;

        if let Some(listen) = old_listen {
            self.listens.unlisten(&mut self.transport, &self.parents, listen)?;
        }
        self.link_mut(id).unwrap().config.set_service(service);
        self.link_mut(id).unwrap().listen = None;

        if incoming_enabled {
            let parent = parent.ok_or_else(|| {
                PpPoeError::Configuration {
                    field: "service",
                    reason: "link has no bound parent interface".to_string(),
                }
            })?;
            let listen = self.listens.listen(&mut self.transport, &self.parents, parent, service)?;
            self.link_mut(id).unwrap().listen = Some(listen);
        }
        Ok(())
    }

    pub fn set_acname(&mut self, id: LinkId, acname: &str) -> Result<(), PpPoeError> {
        self.link_mut(id)
            .ok_or_else(|| PpPoeError::protocol("unknown link id"))?
            .config
            .set_acname(acname);
        Ok(())
    }

    pub fn set_max_payload(&mut self, id: LinkId, value: u16) -> Result<(), PpPoeError> {
        self.link_mut(id)
            .ok_or_else(|| PpPoeError::protocol("unknown link id"))?
            .config
            .set_max_payload(value)
    }

    pub fn set_mac_format(&mut self, id: LinkId, name: &str) -> Result<(), PpPoeError> {
        self.link_mut(id)
            .ok_or_else(|| PpPoeError::protocol("unknown link id"))?
            .config
            .set_mac_format(name)
    }

    /// Enables incoming-call matching for this link: requires the link to
    /// already be bound to a parent (via [`Driver::set_iface`]).
    pub fn enable_incoming(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        if link.incoming_enabled {
            return Ok(());
        }
        let parent = link.parent.ok_or_else(|| PpPoeError::Configuration {
            field: "iface",
            reason: "link must be bound to a parent interface before enabling incoming".to_string(),
        })?;
        let service = link.config.service.clone();
        let listen = self.listens.listen(&mut self.transport, &self.parents, parent, &service)?;
        let link = self.link_mut(id).unwrap();
        link.listen = Some(listen);
        link.incoming_enabled = true;
        Ok(())
    }

    /// Disables incoming-call matching, dropping the listen reference.
    pub fn disable_incoming(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        if !link.incoming_enabled {
            return Ok(());
        }
        if let Some(listen) = link.listen {
            self.listens.unlisten(&mut self.transport, &self.parents, listen)?;
        }
        let link = self.link_mut(id).unwrap();
        link.listen = None;
        link.incoming_enabled = false;
        Ok(())
    }

    /// Releases the link's current parent (and listen, if any) binding, in
    /// preparation for rebinding to a new interface or for destruction.
    fn release_binding(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = match self.link(id) {
            Some(l) => l,
            None => return Ok(()),
        };
        let old_listen = link.listen;
        let old_parent = link.parent;
        if let Some(listen) = old_listen {
            self.listens.unlisten(&mut self.transport, &self.parents, listen)?;
        }
        if let Some(parent) = old_parent {
            self.parents.release(&mut self.transport, parent)?;
        }
        let link = self.link_mut(id).unwrap();
        link.listen = None;
        link.parent = None;
        Ok(())
    }

    // ---- state machine (§4.5) ----

    /// Opens a link: from DOWN, begins an outgoing connection attempt; from
    /// READY (a server link whose peer already succeeded), completes the
    /// incoming handshake by plumbing the upper pipeline and moving to UP.
    pub fn open(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        match self.get_link(id)?.state {
            LinkState::Down => self.open_outgoing(id),
            LinkState::Ready => self.complete_incoming_open(id),
            _ => Err(PpPoeError::policy("link is already active")),
        }
    }

    fn open_outgoing(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        let parent = link.parent.ok_or_else(|| PpPoeError::Configuration {
            field: "iface",
            reason: "link must be bound to a parent interface before opening".to_string(),
        })?;
        let info = self
            .parents
            .info(parent)
            .ok_or_else(|| PpPoeError::protocol("open() on a link with a released parent"))?;
        let session_hook = link.session_hook(self.pid);
        let max_payload = link.config.max_payload;
        let service = link.config.service.clone();

        let upper_hook = self.upper.request_upper_hook(id);

        self.transport
            .connect_hooks(info.ctrl_sock, &info.path, &session_hook, &upper_hook.path, &upper_hook.hook)
            .map_err(|e| self.abort_open(id, &[], e))?;

        let cleanup_hooks = [session_hook.clone()];

        if max_payload != 0 {
            let value = tag::max_payload_value(max_payload);
            self.transport
                .send_control(info.ctrl_sock, &info.path, cmd::PPPOE_SETMAXP, &value)
                .map_err(|e| self.abort_open(id, &cleanup_hooks, e))?;
        }

        self.transport
            .send_control(info.ctrl_sock, &info.path, cmd::PPPOE_CONNECT, service.as_bytes())
            .map_err(|e| self.abort_open(id, &cleanup_hooks, e))?;

        let timer = self.clock.arm(self.connect_timeout);
        let link = self.link_mut(id).unwrap();
        link.runtime.timer = Some(timer);
        link.runtime.opened = true;
        link.state = LinkState::Connecting;
        Ok(())
    }

    /// Disconnects any hooks already created earlier in a failed `open()`
    /// attempt and returns the triggering error, so the caller can simply
    /// `.map_err(...)?` out of the function.
    fn abort_open(&mut self, id: LinkId, hooks_to_clean: &[String], err: PpPoeError) -> PpPoeError {
        if let Some(parent) = self.link(id).and_then(|l| l.parent) {
            if let Some(info) = self.parents.info(parent) {
                for hook in hooks_to_clean {
                    let _ = self.transport.disconnect_hook(info.ctrl_sock, &info.path, hook);
                }
            }
        }
        if let Some(link) = self.link_mut(id) {
            link.teardown();
        }
        self.upper.notify_down(id, DownCause::PlumbingError);
        err
    }

    fn complete_incoming_open(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        let parent = link.parent.ok_or_else(|| PpPoeError::protocol("incoming link has no parent"))?;
        let tee_path = link
            .runtime
            .tee_path
            .clone()
            .ok_or_else(|| PpPoeError::protocol("incoming link has no tee plumbed"))?;
        let info = self
            .parents
            .info(parent)
            .ok_or_else(|| PpPoeError::protocol("open() on a link with a released parent"))?;

        let upper_hook = self.upper.request_upper_hook(id);
        self.transport
            .connect_hooks(info.ctrl_sock, &tee_path, "right", &upper_hook.path, &upper_hook.hook)?;
        self.transport.shutdown_node(info.ctrl_sock, &tee_path)?;

        let link = self.link_mut(id).unwrap();
        link.runtime.opened = true;
        link.runtime.tee_path = None;
        link.state = LinkState::Up;
        self.upper.notify_up(id);
        Ok(())
    }

    /// Tears a link down to DOWN, disconnecting its session hook and
    /// stopping its timer, regardless of which state it was in. A no-op if
    /// already DOWN.
    pub fn close(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        self.close_with_cause(id, DownCause::Manual)
    }

    fn close_with_cause(&mut self, id: LinkId, cause: DownCause) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        if link.state == LinkState::Down {
            return Ok(());
        }
        let parent = link.parent;
        let timer = link.runtime.timer;
        let session_hook = link.session_hook(self.pid);
        let tee_path = link.runtime.tee_path.clone();

        if let Some(parent) = parent {
            if let Some(info) = self.parents.info(parent) {
                let _ = self.transport.disconnect_hook(info.ctrl_sock, &info.path, &session_hook);
                if let Some(tee_path) = tee_path {
                    let _ = self.transport.shutdown_node(info.ctrl_sock, &tee_path);
                }
            }
        }
        if let Some(timer) = timer {
            self.clock.disarm(timer);
        }

        self.link_mut(id).unwrap().teardown();
        self.upper.notify_down(id, cause);
        Ok(())
    }

    /// Called by the router when the connect timer fires for `id`.
    pub fn on_connect_timeout(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        if self.get_link(id)?.state == LinkState::Connecting {
            self.close_with_cause(id, DownCause::ConnectionTimeout)?;
        }
        Ok(())
    }

    /// Destroys a link entirely: closes it if active, releases its parent
    /// and listen bindings, and removes it from the table.
    pub fn shutdown_link(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        self.close(id)?;
        self.release_binding(id)?;
        if let Some(slot) = self.links.get_mut(id.0 as usize) {
            *slot = None;
        }
        Ok(())
    }

    /// Read-only view of the parent-interface registry, for diagnostics and
    /// for tests asserting on the sharing/refcount invariants of §3.
    pub fn parents(&self) -> &ParentRegistry {
        &self.parents
    }

    /// Read-only view of the listen set, for diagnostics and for tests
    /// asserting on the per-service refcount invariant of §3.
    pub fn listens(&self) -> &ListenSet {
        &self.listens
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub(crate) fn peer_signaled(&mut self, id: LinkId, fail: bool) -> Result<(), PpPoeError> {
        let cause = if fail { DownCause::ConnectionFailed } else { DownCause::Dropped };
        self.close_with_cause(id, cause)
    }

    pub(crate) fn on_success(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        if link.state != LinkState::Connecting {
            log::debug!("link {} received late PPPOE_SUCCESS in state {:?}, dropping", id.0, link.state);
            return Ok(());
        }
        let timer = link.runtime.timer;
        let opened = link.runtime.opened;

        if let Some(timer) = timer {
            self.clock.disarm(timer);
        }
        let link = self.link_mut(id).unwrap();
        link.runtime.timer = None;
        if opened {
            link.state = LinkState::Up;
            self.upper.notify_up(id);
        } else {
            link.state = LinkState::Ready;
        }
        Ok(())
    }

    pub(crate) fn on_setmaxp_reply(&mut self, id: LinkId, value: Option<u16>) -> Result<(), PpPoeError> {
        let link = self.get_link(id)?;
        let configured = link.config.max_payload;
        match (configured, value) {
            (0, _) => log::debug!("link {} received unsolicited SETMAXP reply", id.0),
            (cfg, Some(v)) if cfg == v => {
                self.link_mut(id).unwrap().runtime.max_payload_reply = true;
            }
            (cfg, got) => log::warn!(
                "link {} SETMAXP mismatch: configured {}, replied {:?}",
                id.0,
                cfg,
                got
            ),
        }
        Ok(())
    }

    /// Finds the first DOWN, incoming-enabled link bound to `parent` whose
    /// service matches `service`, instantiating a clone if the match is a
    /// template link.
    pub(crate) fn match_incoming(
        &mut self,
        parent: crate::parent::ParentHandle,
        service: &str,
    ) -> Option<LinkId> {
        let candidate = self
            .links_iter()
            .find(|l| l.eligible_for_incoming(parent, service))
            .map(|l| (l.id, l.is_template))?;
        let (id, is_template) = candidate;
        if is_template {
            Some(self.upper.instantiate(id))
        } else {
            Some(id)
        }
    }

    // ---- phys-layer query surface (§6) ----
    //
    // The operations below are the read-only half of the upstream phys-layer
    // contract: queries the embedding daemon makes *down* into an established
    // or established-ish link, as opposed to the `UpperLayer` trait (notify_up,
    // notify_down, ...), which this driver calls *up*.

    /// (Re-)initializes a link's configuration and runtime state to defaults,
    /// without touching its id or name. Used when a daemon reuses a link slot
    /// (e.g. after `shutdown_link` freed it) rather than allocating a new one.
    pub fn init(&mut self, id: LinkId) -> Result<(), PpPoeError> {
        let link = self.link_mut(id).ok_or_else(|| PpPoeError::protocol("unknown link id"))?;
        link.config = LinkConfig::default();
        link.runtime = Default::default();
        link.parent = None;
        link.listen = None;
        link.is_template = false;
        link.incoming_enabled = false;
        link.state = LinkState::Down;
        Ok(())
    }

    /// PPP-Max-Payload MTU this link reports, per the rule in §4.5: a
    /// nonzero configured value is reported unconditionally in non-effective
    /// mode, and only once a matching SETMAXP reply has been seen in
    /// effective mode; otherwise the un-negotiated PPPoE MRU.
    pub fn get_mtu(&self, id: LinkId, effective: bool) -> Option<u16> {
        let link = self.link(id)?;
        if link.config.max_payload != 0 && (!effective || link.runtime.max_payload_reply) {
            Some(link.config.max_payload)
        } else {
            Some(crate::config::PPPOE_MRU)
        }
    }

    /// MRU counterpart of [`Driver::get_mtu`]. PPPoE does not negotiate MTU
    /// and MRU independently, so both sides of the link report the same
    /// value.
    pub fn get_mru(&self, id: LinkId, effective: bool) -> Option<u16> {
        self.get_mtu(id, effective)
    }

    /// Deprecated alias kept for callers written against the earlier name.
    #[deprecated(note = "use `get_mtu` instead")]
    pub fn reported_mtu(&self, id: LinkId, effective: bool) -> Option<u16> {
        self.get_mtu(id, effective)
    }

    /// The peer's Ethernet MAC address, if one has been recorded (only ever
    /// true for an incoming link that matched a discovery request).
    pub fn peer_mac_addr(&self, id: LinkId) -> Option<macaddr::MacAddr6> {
        self.link(id)?.runtime.peer.peer_mac_addr()
    }

    /// The parent Ethernet interface name this link is bound to, if any.
    pub fn peer_iface(&self, id: LinkId) -> Option<String> {
        self.link(id)?.config.iface.clone()
    }

    /// Identity of the party that dialed this call, rendered as the peer MAC
    /// per the link's configured [`crate::mac::MacFormat`] (§6: "mac-format
    /// ... selects peer-MAC rendering in calling/called-number outputs").
    /// Non-empty only for an incoming link, where the peer is the caller.
    pub fn calling_num(&self, id: LinkId) -> String {
        let link = match self.link(id) {
            Some(l) => l,
            None => return String::new(),
        };
        match (self.upper.originated(id), link.runtime.peer.peer_mac_addr()) {
            (Originated::Remote, Some(addr)) => mac::render(&addr, link.config.mac_format),
            _ => String::new(),
        }
    }

    /// Identity of the party that was called, rendered as the peer MAC.
    /// Non-empty only for an outgoing link, where the peer is the callee.
    pub fn called_num(&self, id: LinkId) -> String {
        let link = match self.link(id) {
            Some(l) => l,
            None => return String::new(),
        };
        match (self.upper.originated(id), link.runtime.peer.peer_mac_addr()) {
            (Originated::Local, Some(addr)) => mac::render(&addr, link.config.mac_format),
            _ => String::new(),
        }
    }

    /// This side's name, as advertised in a server OFFER: the configured
    /// AC-Name, or the process hostname, or the literal fallback "NONAME".
    pub fn self_name(&self, id: LinkId) -> String {
        self.ac_name_or_fallback(id)
    }

    /// The peer's resolved service name (the "real session" recorded on
    /// incoming match, or the configured service pattern otherwise).
    pub fn peer_name(&self, id: LinkId) -> String {
        match self.link(id) {
            Some(link) if !link.runtime.peer.real_session.is_empty() => {
                link.runtime.peer.real_session.clone()
            }
            Some(link) => link.config.service.clone(),
            None => String::new(),
        }
    }

    /// Human-readable per-link status line, used by the embedding daemon's
    /// `show link`-style diagnostics. Does not affect driver state.
    pub fn stat(&self, id: LinkId) -> Option<String> {
        let link = self.link(id)?;
        Some(format!(
            "{}: state={:?} parent={:?} incoming={} opened={} service='{}'",
            link.name, link.state, link.parent, link.runtime.incoming, link.runtime.opened, link.config.service
        ))
    }

    /// Periodic reconciliation hook some embedding daemons call on every
    /// link once per tick. This driver has no periodic state of its own to
    /// reconcile: the connect timer already drives the only time-based
    /// transition (§5), so this is a deliberate no-op kept for symmetry with
    /// the upstream phys-layer contract.
    pub fn on_update(&mut self, _id: LinkId) {}

    /// Hostname advertised in a server OFFER when no AC-Name is configured.
    pub(crate) fn ac_name_or_fallback(&self, id: LinkId) -> String {
        self.link(id)
            .and_then(|l| l.config.acname.clone())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "NONAME".to_string())
    }
}

pub fn default_config() -> LinkConfig {
    LinkConfig::default()
}
