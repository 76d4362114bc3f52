//! The vendor dialects and the default codec set.
//!
//! Each dialect module implements [`CodecBody`] for its packed body layout;
//! [`default_registry`] wires them up with their BLE parameters, headers and
//! translators. Header bytes, embedded MAC constants and translator tables
//! are construction parameters throughout, so hosts with different captures
//! can register their own variants.

use crate::codec::{Codec, CodecRegistry, DecodeError};
use crate::frame::{AD_TYPE_MANUFACTURER, AD_TYPE_SVC_16, AD_TYPE_SVC_DATA};
use crate::translate::{AgarceTranslator, ArgStyle, CmdMap, CmdRow};
use crate::{CommandType, ControllerParams, EncCmd, EntityType};

pub mod agarce;
pub mod remote;
pub mod zhijia;
pub mod zhimei;

pub use agarce::Agarce;
pub use remote::Remote;
pub use zhijia::{ZhijiaRemote, ZhijiaV0, ZhijiaV1, ZhijiaV2};
pub use zhimei::{ZhimeiV0, ZhimeiV1, ZhimeiV2};

/// The packed body of one dialect: everything between the vendor header and
/// the end of the data TLV.
pub trait CodecBody {
    fn body_len(&self) -> usize;

    /// Fill `buf` (exactly `body_len` bytes) from a vendor command and the
    /// controller identity, checksum it and apply the obfuscation.
    fn encode_body(&self, buf: &mut [u8], header: &[u8], enc: &EncCmd, cont: &ControllerParams);

    /// Reverse the obfuscation in place and validate every expected
    /// equality; `buf` is a scratch copy owned by the caller.
    fn decode_body(&self, buf: &mut [u8], header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError>;

    /// Vendor-flavoured command rendering for logs.
    fn cmd_str(&self, enc: &EncCmd) -> String {
        format!(
            "0x{:02X} - args[{},{},{}]",
            enc.cmd, enc.args[0], enc.args[1], enc.args[2]
        )
    }
}

/// Tagged variant over all dialect bodies, dispatching [`CodecBody`].
pub enum Body {
    Agarce(Agarce),
    ZhijiaV0(ZhijiaV0),
    ZhijiaV1(ZhijiaV1),
    ZhijiaV2(ZhijiaV2),
    ZhijiaRemote(ZhijiaRemote),
    ZhimeiV0(ZhimeiV0),
    ZhimeiV1(ZhimeiV1),
    ZhimeiV2(ZhimeiV2),
    Remote(Remote),
}

impl Body {
    fn inner(&self) -> &dyn CodecBody {
        match self {
            Body::Agarce(b) => b,
            Body::ZhijiaV0(b) => b,
            Body::ZhijiaV1(b) => b,
            Body::ZhijiaV2(b) => b,
            Body::ZhijiaRemote(b) => b,
            Body::ZhimeiV0(b) => b,
            Body::ZhimeiV1(b) => b,
            Body::ZhimeiV2(b) => b,
            Body::Remote(b) => b,
        }
    }

    pub fn body_len(&self) -> usize {
        self.inner().body_len()
    }

    pub fn encode_body(&self, buf: &mut [u8], header: &[u8], enc: &EncCmd, cont: &ControllerParams) {
        self.inner().encode_body(buf, header, enc, cont)
    }

    pub fn decode_body(&self, buf: &mut [u8], header: &[u8]) -> Result<(EncCmd, ControllerParams), DecodeError> {
        self.inner().decode_body(buf, header)
    }

    pub fn cmd_str(&self, enc: &EncCmd) -> String {
        self.inner().cmd_str(enc)
    }
}

// Default translator tables. The abstract-to-vendor command values below are
// the ones this crate pairs and broadcasts with; register codecs with your
// own tables if your devices were paired by another app generation.

static AGARCE_ROWS: &[CmdRow] = &[
    CmdRow::new(CommandType::Pair, EntityType::Controller, 0x50, ArgStyle::Const([1, 0, 0])),
    CmdRow::new(CommandType::Unpair, EntityType::Controller, 0x50, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::On, EntityType::Light, 0x10, ArgStyle::Const([1, 0, 0])),
    CmdRow::new(CommandType::Off, EntityType::Light, 0x10, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Timer, EntityType::Controller, 0x40, ArgStyle::Int(1)),
    CmdRow::new(CommandType::LightCwwColdWarm, EntityType::Light, 0x20, ArgStyle::Percent(2)),
];

static ZHIJIA_ROWS: &[CmdRow] = &[
    CmdRow::new(CommandType::Pair, EntityType::Controller, 0xA2, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Unpair, EntityType::Controller, 0xA3, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::On, EntityType::Light, 0xA5, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Off, EntityType::Light, 0xA6, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::LightCwwDim, EntityType::Light, 0xAD, ArgStyle::Percent(1)).with_param(0),
    CmdRow::new(CommandType::LightCwwCct, EntityType::Light, 0xAE, ArgStyle::Percent(1)).with_param(0),
    CmdRow::new(CommandType::LightCwwColdWarm, EntityType::Light, 0xA8, ArgStyle::Percent(2)),
    CmdRow::new(CommandType::Timer, EntityType::Controller, 0xD4, ArgStyle::Int(1)),
    CmdRow::new(CommandType::FanOnoffSpeed, EntityType::Fan, 0xA7, ArgStyle::Int(2)),
    CmdRow::new(CommandType::FanDir, EntityType::Fan, 0xA9, ArgStyle::Int(1)),
    CmdRow::new(CommandType::FanOsc, EntityType::Fan, 0xAA, ArgStyle::Int(1)),
];

static ZHIMEI_ROWS: &[CmdRow] = &[
    CmdRow::new(CommandType::Pair, EntityType::Controller, 0xB4, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Unpair, EntityType::Controller, 0xB0, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::On, EntityType::Light, 0xB3, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Off, EntityType::Light, 0xB2, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::LightCwwDim, EntityType::Light, 0xB5, ArgStyle::Percent(1)).with_param(0),
    CmdRow::new(CommandType::LightCwwCct, EntityType::Light, 0xB7, ArgStyle::Percent(1)).with_param(0),
    CmdRow::new(CommandType::Timer, EntityType::Controller, 0xD9, ArgStyle::Int(1)),
    CmdRow::new(CommandType::FanOnoffSpeed, EntityType::Fan, 0xD2, ArgStyle::Int(2)),
    CmdRow::new(CommandType::FanDir, EntityType::Fan, 0xD3, ArgStyle::Int(1)),
    CmdRow::new(CommandType::FanOsc, EntityType::Fan, 0xD4, ArgStyle::Int(1)),
];

static REMOTE_ROWS: &[CmdRow] = &[
    CmdRow::new(CommandType::Toggle, EntityType::Light, 0x0A, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::On, EntityType::Light, 0x08, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::Off, EntityType::Light, 0x06, ArgStyle::Const([0, 0, 0])),
    CmdRow::new(CommandType::LightCwwDim, EntityType::Light, 0x02, ArgStyle::Int(1)).with_param(1),
    CmdRow::new(CommandType::LightCwwDim, EntityType::Light, 0x03, ArgStyle::Int(1)).with_param(2),
    CmdRow::new(CommandType::LightCwwCct, EntityType::Light, 0x04, ArgStyle::Int(1)).with_param(1),
    CmdRow::new(CommandType::LightCwwCct, EntityType::Light, 0x05, ArgStyle::Int(1)).with_param(2),
    CmdRow::new(CommandType::FanOnoffSpeed, EntityType::Fan, 0x0C, ArgStyle::Int(2)),
];

// MAC constants embedded in the Zhijia dialects.
const ZHIJIA_MAC3: [u8; 3] = [0xC6, 0x3A, 0x5A];
const ZHIJIA_MAC6: [u8; 6] = [0x1B, 0x2B, 0x3B, 0x4B, 0x5B, 0x6B];

/// The full built-in codec set.
pub fn default_registry() -> CodecRegistry {
    let mut reg = CodecRegistry::default();

    reg.add(Codec::new(
        "agarce",
        "v0",
        0x06,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x09],
        Box::new(AgarceTranslator::new(AGARCE_ROWS)),
        Body::Agarce(Agarce::new(0x04)),
    ));
    reg.add(Codec::new(
        "agarce",
        "v1",
        0x06,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x09],
        Box::new(AgarceTranslator::new(AGARCE_ROWS)),
        Body::Agarce(Agarce::new(0x83)),
    ));

    reg.add(Codec::new(
        "zhijia",
        "v0",
        0x00,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x08, 0x49],
        Box::new(CmdMap::new(ZHIJIA_ROWS)),
        Body::ZhijiaV0(ZhijiaV0::new(ZHIJIA_MAC3)),
    ));
    reg.add(Codec::new(
        "zhijia",
        "v1",
        0x00,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x08, 0x49],
        Box::new(CmdMap::new(ZHIJIA_ROWS)),
        Body::ZhijiaV1(ZhijiaV1::new(ZHIJIA_MAC6, 3)),
    ));
    reg.add(Codec::new(
        "zhijia",
        "v2",
        0x00,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x08, 0x49],
        Box::new(CmdMap::new(ZHIJIA_ROWS)),
        Body::ZhijiaV2(ZhijiaV2::new([ZHIJIA_MAC6[0], ZHIJIA_MAC6[1], ZHIJIA_MAC6[2]])),
    ));
    reg.add(Codec::new(
        "zhijia",
        "remote",
        0x00,
        AD_TYPE_MANUFACTURER,
        vec![0xF9, 0x08, 0x49],
        Box::new(CmdMap::new(REMOTE_ROWS)),
        Body::ZhijiaRemote(ZhijiaRemote::new([ZHIJIA_MAC6[0], ZHIJIA_MAC6[1], ZHIJIA_MAC6[2]])),
    ));

    reg.add(Codec::new(
        "zhimei",
        "v0",
        0x06,
        AD_TYPE_SVC_DATA,
        vec![0x55, 0x18],
        Box::new(CmdMap::new(ZHIMEI_ROWS)),
        Body::ZhimeiV0(ZhimeiV0::new()),
    ));
    reg.add(Codec::new(
        "zhimei",
        "v1",
        0x06,
        AD_TYPE_SVC_DATA,
        vec![0x55, 0x18],
        Box::new(CmdMap::new(ZHIMEI_ROWS)),
        Body::ZhimeiV1(ZhimeiV1::new()),
    ));
    reg.add(Codec::new(
        "zhimei",
        "v2",
        0x06,
        AD_TYPE_SVC_DATA,
        vec![0x55, 0x18],
        Box::new(CmdMap::new(ZHIMEI_ROWS)),
        Body::ZhimeiV2(ZhimeiV2::new()),
    ));

    reg.add(Codec::new(
        "remote",
        "v0",
        0x06,
        AD_TYPE_SVC_16,
        vec![0x50, 0x4D],
        Box::new(CmdMap::new(REMOTE_ROWS)),
        Body::Remote(Remote::new()),
    ));

    reg
}
