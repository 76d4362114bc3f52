//! Generic remote dialect: the simplest frames on the air, sent by cheap
//! dedicated remotes.
//!
//! 8-byte body `tx_count | id:u32 | cmd_byte | press_count | checksum`,
//! where the command byte packs the 6-bit button code with 2 press flag
//! bits (hold / release).

use modular_bitfield::prelude::*;

use super::CodecBody;
use crate::codec::{sum_check, DecodeError};
use crate::{ControllerParams, EncCmd};

const BODY_LEN: usize = 8;

pub const PRESS_HOLD: u8 = 0x40;
pub const PRESS_RELEASE: u8 = 0x80;

#[bitfield]
#[derive(Debug, Clone, Copy)]
struct CmdByte {
    cmd: B6,
    press: B2,
}

pub struct Remote;

impl Remote {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl CodecBody for Remote {
    fn body_len(&self) -> usize {
        BODY_LEN
    }

    fn encode_body(&self, buf: &mut [u8], _header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        buf[0] = cont.tx_count;
        buf[1..5].copy_from_slice(&cont.id.to_le_bytes());
        buf[5] = CmdByte::new()
            .with_cmd(enc.cmd & 0x3F)
            .with_press(enc.args[1] >> 6)
            .into_bytes()[0];
        buf[6] = enc.args[0];
        buf[7] = sum_check(&buf[..7]);
    }

    fn decode_body(&self, buf: &mut [u8], _header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        if sum_check(&buf[..7]) != buf[7] {
            return Err(DecodeError::Checksum);
        }
        let cmd_byte = CmdByte::from_bytes([buf[5]]);
        let enc = EncCmd::new(cmd_byte.cmd()).with_args([buf[6], cmd_byte.press() << 6, 0]);
        let cont = ControllerParams {
            id: u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]),
            tx_count: buf[0],
            ..Default::default()
        };
        Ok((enc, cont))
    }

    fn cmd_str(&self, enc: &EncCmd) -> String {
        let mut out = format!("0x{:02X}", enc.cmd);
        if enc.args[0] != 0 {
            out.push_str(&format!(" - {} t.u.", enc.args[0]));
        }
        if enc.args[1] != 0 {
            out.push_str(if enc.args[1] == PRESS_HOLD { " - HOLD" } else { " - RELEASE" });
        }
        out
    }
}
