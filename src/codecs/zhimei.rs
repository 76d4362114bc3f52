//! Zhimei dialects (v0, v1, v2).
//!
//! v0 is a plain checksummed body. v1 layers a 16-entry substitution-box
//! cascade over two windows of the body. v2 scrambles an 8-byte txdata
//! block with a content-derived pivot, whitens, and uses a bit-reversed,
//! final-XORed CRC16.

use super::CodecBody;
use crate::codec::{crc16_be, reverse_all, reverse_byte, sum_check, whiten, DecodeError};
use crate::frame::MAX_PACKET_LEN;
use crate::{ControllerParams, EncCmd};

/// v0: 9-byte body `index | tx_count | id:u16 | cmd | args[3] | checksum`.
/// The sum checksum covers the codec header bytes as well.
pub struct ZhimeiV0;

impl ZhimeiV0 {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    fn checksum(header: &[u8], buf: &[u8]) -> u8 {
        sum_check(header).wrapping_add(sum_check(buf))
    }
}

impl CodecBody for ZhimeiV0 {
    fn body_len(&self) -> usize {
        9
    }

    fn encode_body(&self, buf: &mut [u8], header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        buf[0] = cont.index;
        buf[1] = cont.tx_count;
        buf[2..4].copy_from_slice(&((cont.id & 0xFFFF) as u16).to_le_bytes());
        buf[4] = enc.cmd;
        buf[5..8].copy_from_slice(&enc.args);
        buf[8] = Self::checksum(header, &buf[..8]);
    }

    fn decode_body(&self, buf: &mut [u8], header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        if Self::checksum(header, &buf[..8]) != buf[8] {
            return Err(DecodeError::Checksum);
        }
        let enc = EncCmd::new(buf[4]).with_args([buf[5], buf[6], buf[7]]);
        let cont = ControllerParams {
            id: u32::from(u16::from_le_bytes([buf[2], buf[3]])),
            tx_count: buf[1],
            index: buf[0],
            ..Default::default()
        };
        Ok((enc, cont))
    }
}

const MATRIX: [u8; 16] = [29, 4, 17, 32, 152, 117, 40, 70, 11, 175, 67, 172, 214, 190, 137, 142];

/// Pairing command, broadcast before the device knows the key material: its
/// inner window stays clear.
const CMD_PAIR_CLEAR: u8 = 0xB4;

const V1_LEN: usize = 22;
const V1_PAD: usize = 6;

/// v1: 22-byte body
///
/// ```norust
/// 0    | 1    | 2        | 3..7   | 7   | 8     | 9    | 10  | 11..14  | 14..16 | 16..22
/// 0xFF | seed | tx_count | id:u32 | cmd | index | 0xFF | tx2 | args[3] | crc16  | padding
/// ```
///
/// `tx2` duplicates `tx_count`; the padding is the literal sequence 16..=21.
/// Bytes [0..16) are substitution-box encrypted with key 6, bytes [9..14)
/// with key 10 first (except for the pairing command). Both windows start
/// with an 0xFF filler, which is what lets the decryptor recover the pivot.
pub struct ZhimeiV1;

impl ZhimeiV1 {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    fn encrypt(buf: &mut [u8], key: u8) {
        let pivot = MATRIX[usize::from(((buf[1] >> 4) & 15) ^ (buf[1] & 15))];
        for i in 0..buf.len() {
            buf[i] = (buf[i] ^ pivot).wrapping_add(MATRIX[(usize::from(key) + i) & 0xF]);
        }
    }

    fn decrypt(buf: &mut [u8], key: u8) {
        let pivot = buf[0].wrapping_sub(MATRIX[usize::from(key) & 0xF]) ^ 0xFF;
        for i in 0..buf.len() {
            buf[i] = buf[i].wrapping_sub(MATRIX[(usize::from(key) + i) & 0xF]) ^ pivot;
        }
    }
}

impl CodecBody for ZhimeiV1 {
    fn body_len(&self) -> usize {
        V1_LEN
    }

    fn encode_body(&self, buf: &mut [u8], _header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        let data_len = V1_LEN - V1_PAD;
        buf[0] = 0xFF;
        buf[1] = (cont.seed & 0xFF) as u8;
        buf[2] = cont.tx_count;
        buf[3..7].copy_from_slice(&cont.id.to_le_bytes());
        buf[7] = enc.cmd;
        buf[8] = cont.index;
        buf[9] = 0xFF;
        buf[10] = cont.tx_count;
        buf[11..14].copy_from_slice(&enc.args);
        for i in 0..V1_PAD {
            buf[data_len + i] = (data_len + i) as u8;
        }

        if enc.cmd != CMD_PAIR_CLEAR {
            Self::encrypt(&mut buf[9..14], 10);
        }
        let crc = crc16_be(&buf[..data_len - 3], 0);
        buf[14..16].copy_from_slice(&crc.to_le_bytes());
        Self::encrypt(&mut buf[..data_len], 6);
    }

    fn decode_body(&self, buf: &mut [u8], _header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        let data_len = V1_LEN - V1_PAD;
        Self::decrypt(&mut buf[..data_len], 6);

        let crc = crc16_be(&buf[..data_len - 3], 0);

        if buf[7] != CMD_PAIR_CLEAR {
            Self::decrypt(&mut buf[9..14], 10);
            if buf[2] != buf[10] {
                return Err(DecodeError::Duplicate);
            }
        }

        if crc != u16::from_le_bytes([buf[14], buf[15]]) {
            return Err(DecodeError::Crc);
        }
        if buf[0] != 0xFF || buf[9] != 0xFF {
            return Err(DecodeError::Constant);
        }
        for i in 0..V1_PAD {
            if buf[data_len + i] != (data_len + i) as u8 {
                return Err(DecodeError::Padding);
            }
        }

        let enc = EncCmd::new(buf[7]).with_args([buf[11], buf[12], buf[13]]);
        let cont = ControllerParams {
            id: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
            tx_count: buf[2],
            index: buf[8],
            seed: u16::from(buf[1]),
            ..Default::default()
        };
        Ok((enc, cont))
    }
}

const V2_LEN: usize = 23;
const V2_PAD: usize = 10;
const V2_PREFIX: [u8; 3] = [0x33, 0xAA, 0x55];

/// v2: 23-byte body `33 AA 55 | txdata(8) | crc16 | padding(10)`, whitened
/// with seed 0x48 over everything but the padding; 16-bit id.
pub struct ZhimeiV2;

impl ZhimeiV2 {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    /// CRC16 of the bit-reversed input, seed 0xFFFF, with the result bytes
    /// swapped, bit-reversed and final-XORed.
    fn crc16(buf: &[u8]) -> u16 {
        let mut rev = [0u8; MAX_PACKET_LEN];
        let rev = &mut rev[..buf.len()];
        rev.copy_from_slice(buf);
        reverse_all(rev);
        let pre = crc16_be(rev, 0xFFFF);
        0xFFFF
            ^ ((u16::from(reverse_byte((pre & 0xFF) as u8)) << 8)
                | u16::from(reverse_byte((pre >> 8) as u8)))
    }
}

impl CodecBody for ZhimeiV2 {
    fn body_len(&self) -> usize {
        V2_LEN
    }

    fn encode_body(&self, buf: &mut [u8], _header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        let pivot = enc.args[2] ^ cont.tx_count;
        let id_lo = (cont.id & 0xFF) as u8;
        let id_hi = ((cont.id >> 8) & 0xFF) as u8;
        let txdata = &mut buf[3..11];
        txdata[0] = id_lo ^ pivot;
        txdata[1] = enc.args[0] ^ pivot;
        txdata[2] = cont.index ^ pivot;
        txdata[3] = enc.args[1] ^ pivot;
        txdata[4] = enc.cmd ^ pivot;
        txdata[5] = id_hi ^ pivot;
        txdata[6] = enc.args[2] ^ id_lo;
        txdata[7] = enc.args[0] ^ cont.tx_count;

        for i in 0..V2_PAD {
            buf[V2_LEN - V2_PAD + i] = (V2_LEN - V2_PAD + i + 3) as u8;
        }
        buf[..3].copy_from_slice(&V2_PREFIX);

        let crc = Self::crc16(&buf[..V2_LEN - V2_PAD - 2]);
        buf[11..13].copy_from_slice(&crc.to_le_bytes());
        whiten(&mut buf[..V2_LEN - V2_PAD], 0x48);
    }

    fn decode_body(&self, buf: &mut [u8], _header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        whiten(&mut buf[..V2_LEN - V2_PAD], 0x48);

        if buf[..3] != V2_PREFIX {
            return Err(DecodeError::Prefix);
        }
        let crc = Self::crc16(&buf[..V2_LEN - V2_PAD - 2]);
        if crc != u16::from_le_bytes([buf[11], buf[12]]) {
            return Err(DecodeError::Crc);
        }
        for i in 0..V2_PAD {
            if buf[V2_LEN - V2_PAD + i] != (V2_LEN - V2_PAD + i + 3) as u8 {
                return Err(DecodeError::Padding);
            }
        }

        let txdata = &buf[3..11];
        let pivot = txdata[0] ^ txdata[1] ^ txdata[6] ^ txdata[7];
        let enc = EncCmd::new(txdata[4] ^ pivot).with_args([
            txdata[1] ^ pivot,
            txdata[3] ^ pivot,
            txdata[6] ^ txdata[0] ^ pivot,
        ]);
        let cont = ControllerParams {
            id: (u32::from(txdata[5] ^ pivot) << 8) | u32::from(txdata[0] ^ pivot),
            tx_count: txdata[7] ^ txdata[1] ^ pivot,
            index: txdata[2] ^ pivot,
            ..Default::default()
        };
        Ok((enc, cont))
    }
}
