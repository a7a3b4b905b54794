//! Discovery event router: dispatches kernel control messages to the link
//! they name, and dispatches raw discovery frames to a matching
//! incoming-enabled link, plumbing the server side of the handshake.

use crate::clock::Clock;
use crate::cmd;
use crate::driver::Driver;
use crate::error::PpPoeError;
use crate::link::{LinkId, LinkState};
use crate::parent::ParentHandle;
use crate::tag;
use crate::transport::{ControlMessage, DataFrame, Transport};
use crate::upper::UpperLayer;

const ETHERNET_HEADER_LEN: usize = 14;
const PPPOE_HEADER_LEN: usize = 6;
const DISCOVERY_HEADER_LEN: usize = ETHERNET_HEADER_LEN + PPPOE_HEADER_LEN;
const ETH_SRC_OFFSET: usize = 6;

/// Handles one control message received on `parent`'s control socket.
///
/// Rejects (by dropping, with a log line) any message whose hook cannot be
/// mapped to a link bound to `parent`: hooks beginning with `"listen-"`,
/// hooks with the wrong `mpd<pid>-` prefix, unparsable trailing ids, and ids
/// that don't name a live, matching link are all logged and discarded
/// rather than treated as fatal.
pub fn handle_control_message<T: Transport, C: Clock, U: UpperLayer>(
    driver: &mut Driver<T, C, U>,
    parent: ParentHandle,
    msg: ControlMessage,
) -> Result<(), PpPoeError> {
    if msg.hook.starts_with("listen-") {
        log::debug!("ignoring control message on listen hook '{}'", msg.hook);
        return Ok(());
    }

    let prefix = format!("mpd{}-", driver.pid());
    let id_str = match msg.hook.strip_prefix(prefix.as_str()) {
        Some(s) => s,
        None => {
            log::warn!("control message on unrecognized hook '{}', dropping", msg.hook);
            return Ok(());
        }
    };
    let link_num: u32 = match id_str.parse() {
        Ok(n) => n,
        Err(_) => {
            log::warn!("control message hook '{}' has a non-numeric link id, dropping", msg.hook);
            return Ok(());
        }
    };
    let link_id = LinkId(link_num);

    let bound_here = driver.link(link_id).map(|l| l.parent == Some(parent)).unwrap_or(false);
    if !bound_here {
        log::warn!("control message for link {} not bound to this parent, dropping", link_num);
        return Ok(());
    }

    match msg.cmd {
        cmd::PPPOE_SUCCESS => driver.on_success(link_id),
        cmd::PPPOE_FAIL => driver.peer_signaled(link_id, true),
        cmd::PPPOE_CLOSE => driver.peer_signaled(link_id, false),
        cmd::PPPOE_SETMAXP => {
            let value = tag::decode_max_payload(&msg.body);
            driver.on_setmaxp_reply(link_id, value)
        }
        cmd::PPPOE_ACNAME | cmd::PPPOE_HURL | cmd::PPPOE_MOTM => {
            log::info!(
                "link {}: {}",
                link_num,
                String::from_utf8_lossy(&msg.body)
            );
            Ok(())
        }
        cmd::PPPOE_SESSIONID => {
            log::debug!("link {}: kernel session id {:?}", link_num, msg.body);
            Ok(())
        }
        other => {
            log::warn!("link {}: unknown control command {}, dropping", link_num, other);
            Ok(())
        }
    }
}

/// Handles one raw discovery datagram received on `parent`'s data socket.
pub fn handle_data_frame<T: Transport, C: Clock, U: UpperLayer>(
    driver: &mut Driver<T, C, U>,
    parent: ParentHandle,
    frame: DataFrame,
) -> Result<(), PpPoeError> {
    if driver.is_shutting_down() {
        log::debug!("shutting down, dropping discovery packet on '{}'", frame.hook);
        return Ok(());
    }

    let service = match frame.hook.strip_prefix("listen-") {
        Some(s) => s,
        None => {
            log::warn!("data frame on non-listen hook '{}', dropping", frame.hook);
            return Ok(());
        }
    };

    if frame.bytes.len() < DISCOVERY_HEADER_LEN {
        log::warn!(
            "truncated discovery packet ({} bytes < {}), dropping",
            frame.bytes.len(),
            DISCOVERY_HEADER_LEN
        );
        return Ok(());
    }

    let mut peer_mac = [0u8; 6];
    peer_mac.copy_from_slice(&frame.bytes[ETH_SRC_OFFSET..ETH_SRC_OFFSET + 6]);

    let tag_area = &frame.bytes[DISCOVERY_HEADER_LEN..];
    let real_session = tag::find_tag(tag_area, tag::PPPOE_TAG_SERVICE_NAME)
        .map(|t| String::from_utf8_lossy(t.value).into_owned())
        .unwrap_or_else(|| service.to_string());
    let ids = tag::find_vendor_tag(tag_area, tag::DSL_FORUM_VENDOR_ID)
        .map(|t| tag::parse_dsl_forum_subtlvs(t.value))
        .unwrap_or_default();

    let link_id = match driver.match_incoming(parent, service) {
        Some(id) => id,
        None => {
            log::info!("no eligible link for incoming service '{}', dropping", service);
            return Ok(());
        }
    };

    plumb_incoming(
        driver,
        parent,
        link_id,
        service,
        &frame.bytes,
        peer_mac,
        real_session,
        ids.agent_circuit_id,
        ids.agent_remote_id,
    )
}

#[allow(clippy::too_many_arguments)]
fn plumb_incoming<T: Transport, C: Clock, U: UpperLayer>(
    driver: &mut Driver<T, C, U>,
    parent: ParentHandle,
    link_id: LinkId,
    service: &str,
    original_bytes: &[u8],
    peer_mac: [u8; 6],
    real_session: String,
    agent_circuit_id: String,
    agent_remote_id: String,
) -> Result<(), PpPoeError> {
    let info = driver
        .parents()
        .info(parent)
        .ok_or_else(|| PpPoeError::protocol("incoming match against a released parent"))?;
    let pid = driver.pid();
    let session_hook = driver
        .link(link_id)
        .ok_or_else(|| PpPoeError::protocol("matched link vanished before plumbing"))?
        .session_hook(pid);
    let temp_hook = format!("{}-tmp", session_hook);
    let tee_path = format!("{}.{}", info.path, session_hook);

    driver
        .transport
        .make_peer(info.ctrl_sock, &info.path, "tee", &session_hook, "left")?;
    driver
        .transport
        .connect_hooks(info.ctrl_sock, &info.path, &temp_hook, &tee_path, "left2right")?;

    let acname = driver.ac_name_or_fallback(link_id);
    driver
        .transport
        .send_control(info.ctrl_sock, &info.path, cmd::PPPOE_OFFER, acname.as_bytes())?;
    driver
        .transport
        .send_control(info.ctrl_sock, &info.path, cmd::PPPOE_SERVICE, service.as_bytes())?;
    driver
        .transport
        .send_data(info.data_sock, &session_hook, original_bytes)?;
    driver
        .transport
        .disconnect_hook(info.ctrl_sock, &info.path, &temp_hook)?;

    let timeout = driver.connect_timeout();
    let timer = driver.clock.arm(timeout);

    let link = driver
        .link_mut(link_id)
        .ok_or_else(|| PpPoeError::protocol("matched link vanished before plumbing"))?;
    link.state = LinkState::Connecting;
    link.runtime.incoming = true;
    link.runtime.peer.peer_mac = Some(peer_mac);
    link.runtime.peer.real_session = real_session;
    link.runtime.peer.agent_circuit_id = agent_circuit_id;
    link.runtime.peer.agent_remote_id = agent_remote_id;
    link.runtime.tee_path = Some(tee_path);
    link.runtime.timer = Some(timer);

    driver.upper.notify_incoming(link_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::transport::mock::MockTransport;
    use crate::upper::{DownCause, Originated, UpperHook};

    #[derive(Default)]
    struct RecordingUpper {
        ups: Vec<LinkId>,
        downs: Vec<(LinkId, &'static str)>,
        incoming: Vec<LinkId>,
    }

    impl UpperLayer for RecordingUpper {
        fn notify_up(&mut self, link: LinkId) {
            self.ups.push(link);
        }
        fn notify_down(&mut self, link: LinkId, cause: DownCause) {
            self.downs.push((link, cause.as_str()));
        }
        fn notify_incoming(&mut self, link: LinkId) {
            self.incoming.push(link);
        }
        fn request_upper_hook(&mut self, _link: LinkId) -> UpperHook {
            UpperHook { path: "mpd-bundle:".to_string(), hook: "link0".to_string() }
        }
        fn instantiate(&mut self, template: LinkId) -> LinkId {
            template
        }
        fn originated(&self, _link: LinkId) -> Originated {
            Originated::Local
        }
    }

    fn test_driver() -> Driver<MockTransport, FakeClock, RecordingUpper> {
        Driver::new(1234, 4, MockTransport::new(), FakeClock::new(), RecordingUpper::default())
    }

    #[test]
    fn control_message_on_listen_hook_is_ignored() {
        let mut driver = test_driver();
        let msg = ControlMessage { hook: "listen-isp".into(), cmd: cmd::PPPOE_SUCCESS, body: vec![] };
        assert!(handle_control_message(&mut driver, ParentHandle(0), msg).is_ok());
        assert!(driver.upper.ups.is_empty());
    }

    #[test]
    fn control_message_with_unknown_link_id_is_dropped() {
        let mut driver = test_driver();
        let msg = ControlMessage { hook: "mpd1234-9".into(), cmd: cmd::PPPOE_SUCCESS, body: vec![] };
        assert!(handle_control_message(&mut driver, ParentHandle(0), msg).is_ok());
        assert!(driver.upper.ups.is_empty());
    }

    #[test]
    fn control_message_with_wrong_pid_prefix_is_dropped() {
        let mut driver = test_driver();
        let id = driver.add_link("link0");
        driver.set_iface(id, "eth0", None).unwrap();
        let msg = ControlMessage { hook: "mpd9999-0".into(), cmd: cmd::PPPOE_SUCCESS, body: vec![] };
        assert!(handle_control_message(&mut driver, ParentHandle(0), msg).is_ok());
        assert!(driver.upper.ups.is_empty());
    }

    #[test]
    fn data_frame_on_non_listen_hook_is_dropped() {
        let mut driver = test_driver();
        let frame = DataFrame { hook: "ethernet".into(), bytes: vec![0; 32] };
        assert!(handle_data_frame(&mut driver, ParentHandle(0), frame).is_ok());
        assert!(driver.upper.incoming.is_empty());
    }

    #[test]
    fn truncated_data_frame_is_dropped_without_panicking() {
        let mut driver = test_driver();
        let frame = DataFrame { hook: "listen-isp".into(), bytes: vec![0; 4] };
        assert!(handle_data_frame(&mut driver, ParentHandle(0), frame).is_ok());
        assert!(driver.upper.incoming.is_empty());
    }

    #[test]
    fn data_frame_with_no_eligible_link_is_dropped() {
        let mut driver = test_driver();
        let frame = DataFrame { hook: "listen-isp".into(), bytes: vec![0u8; DISCOVERY_HEADER_LEN] };
        assert!(handle_data_frame(&mut driver, ParentHandle(0), frame).is_ok());
        assert!(driver.upper.incoming.is_empty());
    }

    #[test]
    fn matched_incoming_request_plumbs_and_notifies() {
        let mut driver = test_driver();
        let id = driver.add_link("link0");
        driver.set_iface(id, "eth0", None).unwrap();
        driver.set_service(id, "isp").unwrap();
        driver.enable_incoming(id).unwrap();
        let parent = driver.link(id).unwrap().parent.unwrap();

        let mut bytes = vec![0u8; DISCOVERY_HEADER_LEN];
        bytes[ETH_SRC_OFFSET..ETH_SRC_OFFSET + 6].copy_from_slice(&[0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
        let frame = DataFrame { hook: "listen-isp".into(), bytes };

        handle_data_frame(&mut driver, parent, frame).unwrap();

        assert_eq!(driver.upper.incoming, vec![id]);
        let link = driver.link(id).unwrap();
        assert_eq!(link.state, LinkState::Connecting);
        assert_eq!(
            link.runtime.peer.peer_mac,
            Some([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee])
        );
        assert_eq!(link.runtime.peer.real_session, "isp");
    }
}
