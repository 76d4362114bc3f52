//! Shared codec machinery: the per-vendor dialect wrapper, the registry and
//! the obfuscation primitive toolbox.
//!
//! Every dialect produces and consumes the value of a single advertising
//! data TLV: a fixed vendor header followed by a packed body. Encoding
//! builds the TLV wrapper, writes the body, computes checksums and applies
//! the vendor obfuscation; decoding reverses the obfuscation on a working
//! copy and refuses on any mismatch, so an unknown frame is simply "not
//! ours" and the next codec gets to try.

use log::debug;

use crate::codecs::Body;
use crate::frame::{Frame, MAX_PACKET_LEN};
use crate::translate::Translate;
use crate::{ControllerParams, EncCmd, GenCmd};

/// Why a decode attempt refused a frame.
///
/// All of these are silent and local: the dispatcher just moves on to the
/// next codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Data TLV length does not match this dialect.
    Length { need: usize, actual: usize },
    /// Vendor header bytes differ.
    Header,
    /// Body prefix byte(s) differ.
    Prefix,
    /// A rolling sum checksum failed.
    Checksum,
    /// A CRC16 failed.
    Crc,
    /// An expected constant byte (0xFF filler, zero filler) differs.
    Constant,
    /// The literal trailing padding sequence differs.
    Padding,
    /// The embedded MAC / address window differs.
    Mac,
    /// The recomputed scrambling pivot differs from the stored one.
    Pivot,
    /// A duplicated-byte invariant failed.
    Duplicate,
    /// Group command, cannot be disambiguated on receive.
    GroupCommand,
}

/// Pseudo-variant meaning "every variant of this encoding".
pub const VARIANT_ALL: &str = "All";

/// Registry id of a codec, `"<encoding> - <variant>"`.
pub fn codec_id(encoding: &str, variant: &str) -> String {
    format!("{} - {}", encoding, variant)
}

/// One vendor dialect: BLE parameters, fixed header, packed body layout and
/// the translator to the abstract command space.
pub struct Codec {
    id: String,
    encoding: String,
    variant: String,
    ad_flag: u8,
    data_type: u8,
    header: Vec<u8>,
    translator: Box<dyn Translate>,
    body: Body,
}

impl Codec {
    pub fn new(
        encoding: &str,
        variant: &str,
        ad_flag: u8,
        data_type: u8,
        header: Vec<u8>,
        translator: Box<dyn Translate>,
        body: Body,
    ) -> Self {
        Self {
            id: codec_id(encoding, variant),
            encoding: encoding.to_owned(),
            variant: variant.to_owned(),
            ad_flag,
            data_type,
            header,
            translator,
            body,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Encode one vendor command into a ready-to-air frame.
    pub fn encode(&self, enc: &EncCmd, cont: &ControllerParams) -> Frame {
        let header_len = self.header.len();
        let body_len = self.body.body_len();
        let mut frame = Frame::with_ble_param(self.ad_flag, self.data_type);
        let data = frame.data_mut();
        data[..header_len].copy_from_slice(&self.header);
        self.body
            .encode_body(&mut data[header_len..header_len + body_len], &self.header, enc, cont);
        frame.set_data_len(header_len + body_len);
        debug!(
            "[{}] id: 0x{:X}, index: {}, tx: {}, enc: {}",
            self.id,
            cont.id,
            cont.index,
            cont.tx_count,
            self.body.cmd_str(enc)
        );
        frame
    }

    /// Try to decode a received frame as this dialect.
    ///
    /// Works on a copy of the data slice; the caller's frame is never
    /// mutated, so the next codec sees it untouched.
    pub fn decode(&self, frame: &Frame) -> Result<(EncCmd, ControllerParams), DecodeError> {
        let header_len = self.header.len();
        let body_len = self.body.body_len();
        let need = header_len + body_len;
        let actual = frame.data_len();
        if actual != need {
            return Err(DecodeError::Length { need, actual });
        }
        let data = frame.data();
        if data[..header_len] != self.header[..] {
            return Err(DecodeError::Header);
        }
        let mut scratch = [0u8; MAX_PACKET_LEN];
        scratch[..body_len].copy_from_slice(&data[header_len..need]);
        self.body.decode_body(&mut scratch[..body_len], &self.header)
    }

    /// Abstract command to vendor command(s); empty when this codec does
    /// not carry the command.
    pub fn g2e(&self, gen: &GenCmd) -> Vec<EncCmd> {
        self.translator.g2e(gen).into_iter().collect()
    }

    /// Vendor command back to the abstract space.
    pub fn e2g(&self, enc: &EncCmd) -> Option<GenCmd> {
        self.translator.e2g(enc)
    }

    /// Vendor-flavoured rendering of a command for logs.
    pub fn cmd_str(&self, enc: &EncCmd) -> String {
        self.body.cmd_str(enc)
    }
}

/// Process-wide map of all known codecs, keyed by id.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<Codec>,
}

impl CodecRegistry {
    pub fn add(&mut self, codec: Codec) {
        self.codecs.push(codec);
    }

    pub fn get(&self, id: &str) -> Option<&Codec> {
        self.codecs.iter().find(|c| c.id() == id)
    }

    /// All selectable ids for an encoding, the `All` pseudo-variant first.
    pub fn ids(&self, encoding: &str) -> Vec<String> {
        let mut ids = vec![codec_id(encoding, VARIANT_ALL)];
        ids.extend(
            self.codecs
                .iter()
                .filter(|c| c.encoding() == encoding)
                .map(|c| c.id().to_owned()),
        );
        ids
    }

    /// Resolve a selected id to concrete codecs: the `All` pseudo-variant
    /// expands to every variant of its encoding.
    pub fn resolve(&self, id: &str) -> Vec<&Codec> {
        let all_suffix = format!(" - {}", VARIANT_ALL);
        if let Some(encoding) = id.strip_suffix(all_suffix.as_str()) {
            self.codecs.iter().filter(|c| c.encoding() == encoding).collect()
        } else {
            self.get(id).into_iter().collect()
        }
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }
}

// Obfuscation primitive toolbox. The vendors all reuse the same few tricks;
// seeds and windows are dialect-specific and load-bearing.

/// BLE-style whitening: 7-bit LFSR, taps 0x11, seeded per dialect. XOR based
/// and therefore its own inverse.
pub fn whiten(buf: &mut [u8], seed: u8) {
    let mut r = seed;
    for byte in buf.iter_mut() {
        let mut mask = 0u8;
        for j in 0..8 {
            r <<= 1;
            if r & 0x80 != 0 {
                r ^= 0x11;
                mask |= 1 << j;
            }
            r &= 0x7F;
        }
        *byte ^= mask;
    }
}

/// Reflect the bits within one byte: `1100_1010` -> `0101_0011`.
pub fn reverse_byte(mut x: u8) -> u8 {
    x = ((x & 0x55) << 1) | ((x & 0xAA) >> 1);
    x = ((x & 0x33) << 2) | ((x & 0xCC) >> 2);
    x = ((x & 0x0F) << 4) | ((x & 0xF0) >> 4);
    x
}

/// Reflect the bits of every byte in place.
pub fn reverse_all(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = reverse_byte(*byte);
    }
}

/// Low 8 bits of the byte sum.
pub fn sum_check(buf: &[u8]) -> u8 {
    buf.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// CRC16-CCITT, reflected form (poly 0x8408), caller-supplied seed.
pub fn crc16_r(buf: &[u8], seed: u16) -> u16 {
    let mut crc = seed;
    for &b in buf {
        crc ^= u16::from(b);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8408 } else { crc >> 1 };
        }
    }
    crc
}

/// CRC16, MSB-first (poly 0x1021), caller-supplied seed.
pub fn crc16_be(buf: &[u8], seed: u16) -> u16 {
    let mut crc = seed;
    for &b in buf {
        crc ^= u16::from(b) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    crc
}

/// XOR every byte with a position-independent pivot.
pub fn xor_all(buf: &mut [u8], pivot: u8) {
    for byte in buf.iter_mut() {
        *byte ^= pivot;
    }
}
