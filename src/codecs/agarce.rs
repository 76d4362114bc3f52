//! Agarce dialect.
//!
//! 18-byte body:
//!
//! ```norust
//! 0      | 1..3     | 3        | 4       | 5..7    | 7..11  | 11  | 12..15  | 15  | 16       | 17
//! prefix | seed:u16 | tx_count | restart | rem_seq | id:u32 | tx0 | args[3] | tx4 | checksum | checksum2
//! ```
//!
//! Bytes 3..=16 are XORed with an 8-byte matrix and the alternating halves
//! of the per-frame seed. Two checksum layers: the inner sum is computed
//! before the XOR cascade, the outer one after, so a receiver can cheaply
//! reject foreign frames without undoing the cascade.

use modular_bitfield::prelude::*;

use super::CodecBody;
use crate::codec::{sum_check, DecodeError};
use crate::{ControllerParams, EncCmd};

const BODY_LEN: usize = 18;

const MATRIX: [u8; 8] = [0xAA, 0xBB, 0xCC, 0xDD, 0x5A, 0xA5, 0xA5, 0x5A];

/// Command high nibble packed with the low nibble of the device index.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct Tx0 {
    index_lo: B4,
    cmd_hi: B4,
}

/// High nibble of the device index plus the group-command flag bits.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct Tx4 {
    index_hi: B4,
    flags: B4,
}

pub struct Agarce {
    /// Dialect prefix byte (0x03 / 0x04 / 0x83 / 0x84 observed); group
    /// commands carry only its low nibble.
    prefix: u8,
}

impl Agarce {
    pub fn new(prefix: u8) -> Self {
        Self { prefix }
    }

    fn crypt(buf: &mut [u8], seed: u16) {
        let pivot0 = (seed & 0xFF) as u8;
        let pivot1 = (seed >> 8) as u8;
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= MATRIX[i % 8] ^ if ((i + 1) / 2) % 2 == 0 { pivot0 } else { pivot1 };
        }
    }
}

impl CodecBody for Agarce {
    fn body_len(&self) -> usize {
        BODY_LEN
    }

    fn encode_body(&self, buf: &mut [u8], _header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        let mut tx0 = Tx0::new().with_cmd_hi(enc.cmd >> 4);
        let mut tx4 = Tx4::new().with_index_hi((cont.index >> 4) & 0x0F);
        buf[12..15].copy_from_slice(&enc.args);
        if enc.cmd == 0x00 {
            // group command: the prefix nibbles and the index low nibble
            // travel in the argument bytes
            buf[13] = (self.prefix >> 4) & 0x0F;
            buf[14] = cont.index & 0x0F;
            tx4 = tx4.with_flags(0x0C);
            buf[0] = self.prefix & 0x0F;
        } else {
            tx0 = tx0.with_index_lo(cont.index & 0x0F);
            buf[0] = self.prefix;
        }
        buf[11] = tx0.into_bytes()[0];
        buf[15] = tx4.into_bytes()[0];

        buf[3] = cont.tx_count;
        buf[4] = cont.restart_count;
        buf[5..7].copy_from_slice(&0x1000u16.to_le_bytes());
        buf[7..11].copy_from_slice(&cont.id.to_le_bytes());
        let seed = if cont.seed == 0 { rand::random::<u16>() } else { cont.seed };
        buf[1..3].copy_from_slice(&seed.to_le_bytes());
        buf[16] = sum_check(&buf[3..16]);

        Self::crypt(&mut buf[3..17], seed);
        buf[17] = sum_check(&buf[..17]);
    }

    fn decode_body(&self, buf: &mut [u8], _header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        if sum_check(&buf[..17]) != buf[17] {
            return Err(DecodeError::Checksum);
        }
        let seed = u16::from_le_bytes([buf[1], buf[2]]);
        Self::crypt(&mut buf[3..17], seed);
        if sum_check(&buf[3..16]) != buf[16] {
            return Err(DecodeError::Checksum);
        }

        let tx0 = Tx0::from_bytes([buf[11]]);
        let cmd = tx0.cmd_hi() << 4;
        let args = [buf[12], buf[13], buf[14]];
        // group commands cannot be disambiguated between controllers
        if cmd == 0x00 && args[1] == 0x00 {
            return Err(DecodeError::GroupCommand);
        }
        if cmd != 0x00 && buf[0] != self.prefix {
            return Err(DecodeError::Prefix);
        }
        if cmd == 0x00 && buf[0] != self.prefix & 0x0F {
            return Err(DecodeError::Prefix);
        }

        let tx4 = Tx4::from_bytes([buf[15]]);
        let mut index = tx4.index_hi() << 4;
        index |= if cmd == 0x00 { args[2] } else { tx0.index_lo() };

        let enc = EncCmd::new(cmd).with_args(args);
        let cont = ControllerParams {
            id: u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]),
            tx_count: buf[3],
            restart_count: buf[4],
            index,
            seed,
        };
        Ok((enc, cont))
    }
}
