//! One raw BLE advertising payload and its AD structure.
//!
//! An advertising payload is a sequence of TLV sub-structures
//! (`len | type | value...`), at most 31 bytes in total. The bridge cares
//! about two of them: the optional AD-flag structure (type 0x01) and the
//! data structure carrying the codec body (manufacturer data, 16-bit UUID
//! list or service data).

use log::debug;

/// Maximum size of a legacy advertising payload.
pub const MAX_PACKET_LEN: usize = 31;

pub const AD_TYPE_FLAG: u8 = 0x01;
pub const AD_TYPE_SVC_16: u8 = 0x03;
pub const AD_TYPE_SVC_DATA: u8 = 0x16;
pub const AD_TYPE_MANUFACTURER: u8 = 0xFF;

/// Default on-air window for an outbound frame, in milliseconds.
pub const DEFAULT_DURATION_MS: u64 = 100;

/// How long a received frame stays in the dedupe window.
pub const SCAN_DEDUPE_MS: u64 = 60_000;

/// A fixed advertising payload plus the offsets of its flag and data
/// sub-structures.
///
/// Frames are move-only on purpose: one frame represents a unique
/// reservation on the radio, handed from controller to scheduler without
/// copies.
#[derive(Debug)]
pub struct Frame {
    buf: [u8; MAX_PACKET_LEN],
    len: usize,
    // MAX_PACKET_LEN is the "absent" sentinel for both offsets
    ad_flag_index: usize,
    data_index: usize,
    /// For an outbound frame: how long the scheduler keeps it on air, in
    /// milliseconds. For a received frame: the absolute expiry of its
    /// dedupe window (milliseconds since process start).
    pub duration_ms: u64,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            buf: [0; MAX_PACKET_LEN],
            len: 0,
            ad_flag_index: MAX_PACKET_LEN,
            data_index: MAX_PACKET_LEN,
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

impl Frame {
    /// Build from raw scanned bytes, locating the flag and data structures.
    ///
    /// Malformed structures are tolerated: offsets are simply left absent
    /// and the frame is later dropped as "not ours".
    pub fn from_raw(raw: &[u8]) -> Self {
        let mut frame = Self::default();
        frame.len = raw.len().min(MAX_PACKET_LEN);
        frame.buf[..frame.len].copy_from_slice(&raw[..frame.len]);

        let mut cur = 0;
        while cur + 2 < frame.len {
            let sub_len = usize::from(frame.buf[cur]);
            if cur + sub_len >= frame.len {
                // would point outside of the buffer, malformed
                break;
            }
            match frame.buf[cur + 1] {
                AD_TYPE_FLAG => frame.ad_flag_index = cur,
                AD_TYPE_MANUFACTURER | AD_TYPE_SVC_16 | AD_TYPE_SVC_DATA => frame.data_index = cur,
                _ => {}
            }
            cur += sub_len + 1;
        }
        frame
    }

    /// Build from a user hex string, stripped of spaces, dots, a leading
    /// `0x` and any trailing `(...)` annotation.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let cleaned = raw.split('(').next().unwrap_or("");
        let cleaned: String = cleaned.chars().filter(|c| *c != '.' && *c != ' ').collect();
        let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
        match hex::decode(cleaned) {
            Ok(bytes) => Some(Self::from_raw(&bytes)),
            Err(err) => {
                debug!("malformed hex input '{}': {}", raw, err);
                None
            }
        }
    }

    /// Start an outbound frame: write the TLV headers for the configured
    /// AD flag (0 = none) and data type, leaving the data body to the codec.
    pub fn with_ble_param(ad_flag: u8, data_type: u8) -> Self {
        let mut frame = Self::default();
        if ad_flag != 0 {
            frame.ad_flag_index = 0;
            frame.buf[0] = 2;
            frame.buf[1] = AD_TYPE_FLAG;
            frame.buf[2] = ad_flag;
            frame.data_index = 3;
            frame.buf[4] = data_type;
        } else {
            frame.data_index = 0;
            frame.buf[1] = data_type;
        }
        frame
    }

    /// Finalise the data TLV once the codec has written `len` value bytes
    /// (type byte included in the stored length).
    pub fn set_data_len(&mut self, len: usize) {
        self.buf[self.data_index] = (len + 1) as u8;
        self.len = len + 2 + if self.has_ad_flag() { 3 } else { 0 };
    }

    pub fn has_ad_flag(&self) -> bool {
        self.ad_flag_index != MAX_PACKET_LEN
    }

    pub fn ad_flag(&self) -> u8 {
        self.buf[self.ad_flag_index + 2]
    }

    pub fn has_data(&self) -> bool {
        self.data_index != MAX_PACKET_LEN
    }

    pub fn data_len(&self) -> usize {
        usize::from(self.buf[self.data_index]).saturating_sub(1)
    }

    pub fn data_type(&self) -> u8 {
        self.buf[self.data_index + 1]
    }

    /// The data TLV value (codec header + body).
    pub fn data(&self) -> &[u8] {
        let start = self.data_index + 2;
        &self.buf[start..(start + self.data_len()).min(MAX_PACKET_LEN)]
    }

    /// Writable view from the start of the data value to the end of the
    /// buffer; the codec fills it and then calls [`Frame::set_data_len`].
    pub fn data_mut(&mut self) -> &mut [u8] {
        let start = self.data_index + 2;
        &mut self.buf[start..]
    }

    /// The whole payload as configured for the radio.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Equality on the data slice only, ignoring AD-flag differences. Used
    /// by the scan dedupe: some remotes alternate the flag byte between
    /// repetitions of one logical frame.
    pub fn is_data_equal(&self, other: &Frame) -> bool {
        self.has_data()
            && other.has_data()
            && self.data_len() == other.data_len()
            && self.data() == other.data()
    }

    /// Hex rendering for logs.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.bytes())
    }
}

/// Bytewise equality over the full fixed buffer.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.buf == other.buf
    }
}

impl Eq for Frame {}
