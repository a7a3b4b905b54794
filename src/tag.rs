//! PPPoE discovery tag codec (RFC 2516, RFC 4638, RFC 5578 extensions).
//!
//! A tag area is the byte range that follows the 6-byte PPPoE discovery
//! header, already truncated by the caller to the header's declared payload
//! length. [`TagIter`] walks it with the same bounds discipline the rest of
//! this crate uses for the kernel-graph protocol: every read is checked
//! against the declared end before it happens, never after.

use log::{log_enabled, Level};
use pretty_hex::{HexConfig, PrettyHex};

/// RFC 2516
pub const PPPOE_TAG_END_OF_LIST: u16 = 0x0000;
pub const PPPOE_TAG_SERVICE_NAME: u16 = 0x0101;
pub const PPPOE_TAG_AC_NAME: u16 = 0x0102;
pub const PPPOE_TAG_HOST_UNIQ: u16 = 0x0103;
pub const PPPOE_TAG_AC_COOKIE: u16 = 0x0104;
pub const PPPOE_TAG_VENDOR_SPECIFIC: u16 = 0x0105;
pub const PPPOE_TAG_RELAY_SESSION_ID: u16 = 0x0110;
pub const PPPOE_TAG_SERVICE_NAME_ERROR: u16 = 0x0201;
pub const PPPOE_TAG_AC_SYSTEM_ERROR: u16 = 0x0202;
pub const PPPOE_TAG_GENERIC_ERROR: u16 = 0x0203;

/// RFC 4638
pub const PPPOE_TAG_PPP_MAX_PAYLOAD: u16 = 0x0120;

/// RFC 5578
pub const PPPOE_TAG_CREDITS: u16 = 0x0106;
pub const PPPOE_TAG_METRICS: u16 = 0x0107;
pub const PPPOE_TAG_SEQUENCE_NUMBER: u16 = 0x0108;
pub const PPPOE_TAG_CREDIT_SCALE_FACTOR: u16 = 0x0109;

/// DSL Forum vendor id carrying Agent-Circuit-ID / Agent-Remote-ID sub-TLVs.
pub const DSL_FORUM_VENDOR_ID: u32 = 0x0000_0DE9;

const DSL_FORUM_SUBTYPE_CIRCUIT_ID: u8 = 1;
const DSL_FORUM_SUBTYPE_REMOTE_ID: u8 = 2;

/// Maximum length a DSL-Forum sub-TLV string is truncated to, matching the
/// original C implementation's fixed 64-byte (63 chars + NUL) buffers.
const DSL_FORUM_SUBVALUE_MAX: usize = 63;

/// A single decoded tag: its wire-order type and a borrowed view of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRef<'a> {
    pub tag_type: u16,
    pub value: &'a [u8],
}

/// Bounds-checked, total iterator over the tags in a tag area.
///
/// Every step requires `cursor + 4 <= area.len()` before reading a tag
/// header, then `cursor + 4 + tag_len <= area.len()` before yielding the
/// value slice. Either check failing ends the iteration, matching invariant
/// 4: the walker never reads past `packet_start + 6 + declared_length`.
pub struct TagIter<'a> {
    area: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> TagIter<'a> {
    pub fn new(area: &'a [u8]) -> Self {
        TagIter {
            area,
            cursor: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = TagRef<'a>;

    fn next(&mut self) -> Option<TagRef<'a>> {
        if self.done {
            return None;
        }
        let area_len = self.area.len();
        if self.cursor + 4 > area_len {
            self.done = true;
            return None;
        }
        let tag_type = u16::from_be_bytes([self.area[self.cursor], self.area[self.cursor + 1]]);
        let tag_len =
            u16::from_be_bytes([self.area[self.cursor + 2], self.area[self.cursor + 3]]) as usize;
        if self.cursor + 4 + tag_len > area_len {
            self.done = true;
            return None;
        }
        let value = &self.area[self.cursor + 4..self.cursor + 4 + tag_len];
        self.cursor += 4 + tag_len;
        Some(TagRef { tag_type, value })
    }
}

/// Returns the first tag of `tag_type`, or `None` if absent or if the walk
/// hits a bounds violation before reaching it.
pub fn find_tag<'a>(area: &'a [u8], tag_type: u16) -> Option<TagRef<'a>> {
    TagIter::new(area).find(|t| t.tag_type == tag_type)
}

/// Returns the first Vendor-Specific tag whose first four value bytes equal
/// `vendor_id` (network order). Requires `tag_len >= 4`.
pub fn find_vendor_tag(area: &[u8], vendor_id: u32) -> Option<TagRef<'_>> {
    TagIter::new(area).find(|t| {
        t.tag_type == PPPOE_TAG_VENDOR_SPECIFIC
            && t.value.len() >= 4
            && u32::from_be_bytes([t.value[0], t.value[1], t.value[2], t.value[3]]) == vendor_id
    })
}

/// Appends one TLV to `buf`: 2-byte type, 2-byte length, value. No
/// compaction or reordering is performed; tags accumulate in call order.
pub fn emit(buf: &mut Vec<u8>, tag_type: u16, value: &[u8]) {
    buf.extend_from_slice(&tag_type.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

/// Encodes a PPP-Max-Payload tag value (a single u16, network order).
pub fn max_payload_value(bytes: u16) -> [u8; 2] {
    bytes.to_be_bytes()
}

/// Decodes a PPP-Max-Payload tag value.
pub fn decode_max_payload(value: &[u8]) -> Option<u16> {
    if value.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([value[0], value[1]]))
}

/// Decoded DSL-Forum Agent-Circuit-ID / Agent-Remote-ID pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DslForumIds {
    pub agent_circuit_id: String,
    pub agent_remote_id: String,
}

/// Parses the sub-TLV stream that follows the 4-byte vendor id inside a
/// DSL-Forum Vendor-Specific tag value.
///
/// Sub-TLVs are `(sub_type: u8, sub_len: u8, sub_value)`. A sub-TLV whose
/// `sub_len` exceeds the remaining bytes stops the walk immediately (the
/// fields decoded so far, if any, are kept). Sub-values are truncated to 63
/// bytes, matching the original's fixed-size NUL-terminated buffers.
pub fn parse_dsl_forum_subtlvs(vendor_value: &[u8]) -> DslForumIds {
    let mut ids = DslForumIds::default();
    if vendor_value.len() < 4 {
        return ids;
    }
    let mut rest = &vendor_value[4..];
    while rest.len() >= 2 {
        let sub_type = rest[0];
        let sub_len = rest[1] as usize;
        if 2 + sub_len > rest.len() {
            break;
        }
        let sub_value = &rest[2..2 + sub_len];
        let text = truncate_lossy(sub_value, DSL_FORUM_SUBVALUE_MAX);
        match sub_type {
            DSL_FORUM_SUBTYPE_CIRCUIT_ID => ids.agent_circuit_id = text,
            DSL_FORUM_SUBTYPE_REMOTE_ID => ids.agent_remote_id = text,
            _ => {}
        }
        rest = &rest[2 + sub_len..];
    }
    ids
}

fn truncate_lossy(bytes: &[u8], max: usize) -> String {
    let clipped = &bytes[..bytes.len().min(max)];
    String::from_utf8_lossy(clipped).into_owned()
}

/// Encodes a DSL-Forum Vendor-Specific tag value: the 4-byte vendor id
/// followed by the Agent-Circuit-ID and Agent-Remote-ID sub-TLVs (only the
/// non-empty ones are emitted).
pub fn encode_dsl_forum(ids: &DslForumIds) -> Vec<u8> {
    let mut value = Vec::with_capacity(4 + 4 + ids.agent_circuit_id.len() + ids.agent_remote_id.len());
    value.extend_from_slice(&DSL_FORUM_VENDOR_ID.to_be_bytes());
    if !ids.agent_circuit_id.is_empty() {
        let bytes = &ids.agent_circuit_id.as_bytes()[..ids.agent_circuit_id.len().min(DSL_FORUM_SUBVALUE_MAX)];
        value.push(DSL_FORUM_SUBTYPE_CIRCUIT_ID);
        value.push(bytes.len() as u8);
        value.extend_from_slice(bytes);
    }
    if !ids.agent_remote_id.is_empty() {
        let bytes = &ids.agent_remote_id.as_bytes()[..ids.agent_remote_id.len().min(DSL_FORUM_SUBVALUE_MAX)];
        value.push(DSL_FORUM_SUBTYPE_REMOTE_ID);
        value.push(bytes.len() as u8);
        value.extend_from_slice(bytes);
    }
    value
}

/// Human-readable diagnostic dump of every tag in `area`, emitted at debug
/// level so a disabled logger costs nothing beyond the `log_enabled!` check.
///
/// The original C implementation's `print_tags` had a PTT_SRV_ERR length
/// check that always evaluated true (`(const char *)(pt + 1)+4 != 0`); the
/// evident intent was `len > 0`, which is what this prints.
pub fn print(area: &[u8]) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    for tag in TagIter::new(area) {
        match tag.tag_type {
            PPPOE_TAG_SERVICE_NAME_ERROR | PPPOE_TAG_AC_SYSTEM_ERROR | PPPOE_TAG_GENERIC_ERROR => {
                if !tag.value.is_empty() {
                    log::debug!(
                        "tag 0x{:04x}: {}",
                        tag.tag_type,
                        String::from_utf8_lossy(tag.value)
                    );
                } else {
                    log::debug!("tag 0x{:04x}: <empty>", tag.tag_type);
                }
            }
            PPPOE_TAG_SERVICE_NAME | PPPOE_TAG_AC_NAME => {
                log::debug!(
                    "tag 0x{:04x}: {}",
                    tag.tag_type,
                    String::from_utf8_lossy(tag.value)
                );
            }
            PPPOE_TAG_PPP_MAX_PAYLOAD => {
                log::debug!(
                    "tag 0x{:04x}: max-payload {:?}",
                    tag.tag_type,
                    decode_max_payload(tag.value)
                );
            }
            _ => {
                let conf = HexConfig {
                    title: false,
                    ..HexConfig::default()
                };
                log::debug!("tag 0x{:04x}: {:?}", tag.tag_type, tag.value.hex_conf(conf));
            }
        }
    }
}
