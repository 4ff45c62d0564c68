//! 802.11 beacon frame template and builder
//!
//! The template is a complete WPA2 beacon. Open networks drop the trailing
//! RSN element and flip the privacy bit in the capability field. SSIDs are
//! either padded to the full 32 bytes (fixed frame size) or packed, in which
//! case everything after the SSID is shifted down to sit right behind it.

use std::fmt;

/// Longest SSID a beacon can carry.
pub const SSID_MAX_LEN: usize = 32;

/// Size of the RSN information element (tag + length + 24 bytes body).
pub const RSN_LEN: usize = 26;

/// Largest frame the builder can produce: WPA2 with a 32 byte SSID.
pub const MAX_FRAME_LEN: usize = 109;

/// Frame length with a 32 byte SSID and no RSN element.
pub const OPEN_FRAME_LEN: usize = MAX_FRAME_LEN - RSN_LEN;

pub const SRC_ADDR_OFFSET: usize = 10;
pub const BSSID_OFFSET: usize = 16;
pub const CAPABILITY_OFFSET: usize = 34;
pub const SSID_TAG_OFFSET: usize = 36;
pub const SSID_LEN_OFFSET: usize = 37;
pub const SSID_OFFSET: usize = 38;

/// Start of the supported-rates tag in the template.
const TAIL_OFFSET: usize = SSID_OFFSET + SSID_MAX_LEN;
/// Supported rates (10) + current channel (3).
const TAIL_OPEN_LEN: usize = 13;
/// Channel value inside the tail.
const TAIL_CHANNEL_OFFSET: usize = 12;

const CAPABILITY_WPA2: u8 = 0x31;
const CAPABILITY_OPEN: u8 = 0x21;

/// Scratch buffer sized for the largest frame, reused for every send.
pub type FrameBuffer = [u8; MAX_FRAME_LEN];

#[rustfmt::skip]
pub const BEACON_TEMPLATE: FrameBuffer = [
    /*  0 -  3 */ 0x80, 0x00, 0x00, 0x00,                   // type/subtype: management beacon
    /*  4 -  9 */ 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,       // destination: broadcast
    /* 10 - 15 */ 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,       // source
    /* 16 - 21 */ 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,       // bssid

    // fixed parameters
    /* 22 - 23 */ 0x00, 0x00,                               // fragment & sequence, set by the radio
    /* 24 - 31 */ 0x83, 0x51, 0xf7, 0x8f, 0x0f, 0x00, 0x00, 0x00, // timestamp
    /* 32 - 33 */ 0xe8, 0x03,                               // interval: 1s
    /* 34 - 35 */ 0x31, 0x00,                               // capabilities

    // tagged parameters
    /* 36 - 37 */ 0x00, 0x20,                               // SSID tag, length 32
    /* 38 - 69 */ 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                  0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                  0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                  0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,

    /* 70 - 71 */ 0x01, 0x08,                               // supported rates, length 8
    /* 72 - 79 */ 0x82, 0x84, 0x8b, 0x96, 0x24, 0x30, 0x48, 0x6c,

    /* 80 - 82 */ 0x03, 0x01, 0x01,                         // current channel

    // RSN information
    /*  83 -  84 */ 0x30, 0x18,
    /*  85 -  86 */ 0x01, 0x00,
    /*  87 -  90 */ 0x00, 0x0f, 0xac, 0x02,                 // group cipher
    /*  91 -  92 */ 0x02, 0x00,
    /*  93 - 100 */ 0x00, 0x0f, 0xac, 0x04, 0x00, 0x0f, 0xac, 0x04, // pairwise: CCMP
    /* 101 - 102 */ 0x01, 0x00,
    /* 103 - 106 */ 0x00, 0x0f, 0xac, 0x02,                 // AKM: PSK
    /* 107 - 108 */ 0x00, 0x00,
];

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Same address with the last octet replaced.
    pub fn with_suffix(mut self, last: u8) -> Self {
        self.0[5] = last;
        self
    }

    /// Locally administered unicast address from arbitrary bytes.
    pub fn local_unicast(mut bytes: [u8; 6]) -> Self {
        bytes[0] = (bytes[0] & 0xfe) | 0x02;
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    Open,
    /// Advertises WPA2-PSK/CCMP. No handshake is ever performed.
    Wpa2Claim,
}

impl SecurityMode {
    pub fn from_wpa2(wpa2: bool) -> Self {
        if wpa2 {
            SecurityMode::Wpa2Claim
        } else {
            SecurityMode::Open
        }
    }

    /// Frame length with a full 32 byte SSID.
    pub fn base_len(self) -> usize {
        match self {
            SecurityMode::Open => OPEN_FRAME_LEN,
            SecurityMode::Wpa2Claim => MAX_FRAME_LEN,
        }
    }

    fn tail_len(self) -> usize {
        match self {
            SecurityMode::Open => TAIL_OPEN_LEN,
            SecurityMode::Wpa2Claim => TAIL_OPEN_LEN + RSN_LEN,
        }
    }

    fn capability(self) -> u8 {
        match self {
            SecurityMode::Open => CAPABILITY_OPEN,
            SecurityMode::Wpa2Claim => CAPABILITY_WPA2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsidLayout {
    /// SSID padded with spaces to 32 bytes, every frame has the same length.
    Padded,
    /// SSID length byte is the real length, the tail follows immediately.
    Packed,
}

impl SsidLayout {
    pub fn from_append_spaces(append_spaces: bool) -> Self {
        if append_spaces {
            SsidLayout::Padded
        } else {
            SsidLayout::Packed
        }
    }
}

/// Writes beacon frames into a caller owned [`FrameBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct FrameBuilder {
    mode: SecurityMode,
    layout: SsidLayout,
}

impl FrameBuilder {
    pub fn new(mode: SecurityMode, layout: SsidLayout) -> Self {
        Self { mode, layout }
    }

    /// Builds one beacon into `scratch` and returns the number of bytes to send.
    ///
    /// Names longer than 32 bytes are cut at 32 bytes. `channel` is written
    /// as-is; keeping it within 1..=14 is up to the caller.
    pub fn build(
        &self,
        scratch: &mut FrameBuffer,
        ssid: &[u8],
        mac: MacAddress,
        channel: u8,
    ) -> usize {
        let ssid = &ssid[..ssid.len().min(SSID_MAX_LEN)];

        scratch[..SSID_OFFSET].copy_from_slice(&BEACON_TEMPLATE[..SSID_OFFSET]);
        scratch[SRC_ADDR_OFFSET..SRC_ADDR_OFFSET + 6].copy_from_slice(&mac.0);
        scratch[BSSID_OFFSET..BSSID_OFFSET + 6].copy_from_slice(&mac.0);
        scratch[CAPABILITY_OFFSET] = self.mode.capability();

        let ssid_field_len = match self.layout {
            SsidLayout::Padded => {
                let field = &mut scratch[SSID_OFFSET..SSID_OFFSET + SSID_MAX_LEN];
                field.fill(b' ');
                field[..ssid.len()].copy_from_slice(ssid);
                SSID_MAX_LEN
            }
            SsidLayout::Packed => {
                scratch[SSID_OFFSET..SSID_OFFSET + ssid.len()].copy_from_slice(ssid);
                ssid.len()
            }
        };
        scratch[SSID_LEN_OFFSET] = ssid_field_len as u8;

        let tail_start = SSID_OFFSET + ssid_field_len;
        let tail_len = self.mode.tail_len();
        scratch[tail_start..tail_start + tail_len]
            .copy_from_slice(&BEACON_TEMPLATE[TAIL_OFFSET..TAIL_OFFSET + tail_len]);
        scratch[tail_start + TAIL_CHANNEL_OFFSET] = channel;

        tail_start + tail_len
    }
}
