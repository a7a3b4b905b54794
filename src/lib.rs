//! PPPoE (RFC 2516) phys-layer link driver for a user-space multilink PPP
//! daemon, multiplexed over a kernel netgraph transport.
//!
//! This crate owns the per-link connect/close state machine, the sharing of
//! one kernel PPPoE node and socket pair across every link bound to the same
//! Ethernet interface, the discovery-phase tag codec, and the kernel-graph
//! plumbing sequence for both outgoing (client) and incoming (server)
//! sessions. It does not implement PPP itself, does not parse configuration
//! text, and does not touch the kernel netgraph subsystem directly: the
//! [`transport::Transport`] trait is the seam between this crate's protocol
//! and state-machine logic and whatever actually holds the netgraph sockets.
//!
//! ```
//! use ng_pppoe::clock::FakeClock;
//! use ng_pppoe::driver::Driver;
//! use ng_pppoe::link::LinkId;
//! use ng_pppoe::transport::mock::MockTransport;
//! use ng_pppoe::upper::{DownCause, Originated, UpperHook, UpperLayer};
//!
//! struct NullUpper;
//! impl UpperLayer for NullUpper {
//!     fn notify_up(&mut self, _link: LinkId) {}
//!     fn notify_down(&mut self, _link: LinkId, _cause: DownCause) {}
//!     fn notify_incoming(&mut self, _link: LinkId) {}
//!     fn request_upper_hook(&mut self, _link: LinkId) -> UpperHook {
//!         UpperHook { path: "mpd-bundle:".to_string(), hook: "link0".to_string() }
//!     }
//!     fn instantiate(&mut self, template: LinkId) -> LinkId {
//!         template
//!     }
//!     fn originated(&self, _link: LinkId) -> Originated {
//!         Originated::Local
//!     }
//! }
//!
//! let mut driver = Driver::new(1, 4096, MockTransport::new(), FakeClock::new(), NullUpper);
//! let link = driver.add_link("isp0");
//! driver.set_iface(link, "eth0", None).unwrap();
//! driver.set_service(link, "isp").unwrap();
//! driver.open(link).unwrap();
//! ```

pub mod clock;
pub mod cmd;
pub mod config;
pub mod driver;
pub mod error;
pub mod link;
pub mod listen;
pub mod mac;
pub mod parent;
pub mod router;
pub mod tag;
pub mod transport;
pub mod upper;

pub use driver::Driver;
pub use error::PpPoeError;
pub use link::{Link, LinkId, LinkState};
