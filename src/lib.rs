//! Bidirectional bridge between a home-automation layer and BLE-advertising
//! controlled ceiling lights, fans and RGB strips.
//!
//! These devices are driven by connectionless broadcasts only: each vendor
//! family defines an opaque 20-31 byte advertising frame with its own
//! obfuscation (whitening, XOR cascades, rolling checksums, substitution
//! tables), and the device never acknowledges. Reliability comes from
//! repeating the broadcast for a configurable window.
//!
//! The crate is organised around:
//!  - [`frame::Frame`]: one raw advertising payload and its AD structure
//!  - [`codec`]: the per-vendor encode/decode dialects and their registry
//!  - [`controller::Controller`]: one logical device, its identity and its
//!    outbound queue
//!  - [`scheduler::Scheduler`]: the process-wide advertiser/listener that
//!    time-slices the single radio and deduplicates received frames
//!  - [`bridge::Bridge`]: assembly of the above plus the service surface

pub mod frame;

pub mod codec;
pub mod codecs;
pub mod translate;

pub mod controller;
pub mod scheduler;

pub mod bridge;
pub mod entity;
pub mod store;

pub use bridge::Bridge;
pub use codec::{Codec, CodecRegistry, DecodeError};
pub use controller::Controller;
pub use frame::Frame;
pub use scheduler::{RadioDriver, ScanMailbox, Scheduler};

/// Which kind of entity a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityType {
    NoType = 0,
    Controller = 1,
    Light = 2,
    Fan = 3,
    /// Matches any entity, whatever its index.
    All = 10,
}

/// The closed abstract command set shared by all codecs.
///
/// Codec translators map between these and the vendor byte-level commands;
/// entities produce and consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    NoCmd = 0,
    // controller handled commands
    Pair = 1,
    Unpair = 2,
    Custom = 3,
    Timer = 6,
    // generic entity commands
    Toggle = 10,
    On = 11,
    Off = 12,
    // light commands
    LightCwwDim = 13,
    LightCwwWarm = 14,
    LightCwwColdWarm = 15,
    LightCwwWarmDim = 16,
    LightCwwCct = 20,
    LightRgbFull = 17,
    LightRgbDim = 18,
    LightRgbRgb = 19,
    // fan commands
    FanFull = 32,
    FanOnoffSpeed = 33,
    FanDir = 34,
    FanOsc = 35,
    FanDirToggle = 36,
    FanOscToggle = 37,
}

/// Bitmask values for [`GenCmd::param`] on [`CommandType::FanFull`]: which
/// parts of the full fan state were actually modified by the user.
pub mod fan_sub_cmd {
    pub const STATE: u8 = 0x01;
    pub const SPEED: u8 = 0x02;
    pub const DIR: u8 = 0x04;
    pub const OSC: u8 = 0x08;
}

/// Abstract command, the exchange currency between entities, controllers and
/// codec translators.
///
/// `args` carry fractions in `[0, 1]` for continuous quantities (brightness,
/// color channels) and small integers for discrete ones (fan speed, minutes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenCmd {
    pub cmd: CommandType,
    pub ent_type: EntityType,
    pub ent_index: u8,
    pub param: u8,
    pub args: [f32; 3],
}

impl GenCmd {
    pub fn new(cmd: CommandType, ent_type: EntityType) -> Self {
        Self {
            cmd,
            ent_type,
            ent_index: 0,
            param: 0,
            args: [0.0; 3],
        }
    }

    pub fn with_args(mut self, args: [f32; 3]) -> Self {
        self.args = args;
        self
    }
}

impl Default for GenCmd {
    fn default() -> Self {
        Self::new(CommandType::NoCmd, EntityType::NoType)
    }
}

impl core::fmt::Display for GenCmd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:?}/{} - {:?}/0x{:02X} [{}, {}, {}]",
            self.ent_type, self.ent_index, self.cmd, self.param, self.args[0], self.args[1], self.args[2]
        )
    }
}

/// Vendor-specific command, the byte-level counterpart of [`GenCmd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncCmd {
    pub cmd: u8,
    pub param1: u8,
    pub args: [u8; 3],
}

impl EncCmd {
    /// Sentinel for "no command".
    pub const NO_CMD: u8 = 0xFF;

    pub fn new(cmd: u8) -> Self {
        Self {
            cmd,
            param1: 0,
            args: [0; 3],
        }
    }

    pub fn with_args(mut self, args: [u8; 3]) -> Self {
        self.args = args;
        self
    }
}

impl Default for EncCmd {
    fn default() -> Self {
        Self::new(Self::NO_CMD)
    }
}

impl core::fmt::Display for EncCmd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "cmd: 0x{:02X} - param1: 0x{:02X} - args: [{}, {}, {}]",
            self.cmd, self.param1, self.args[0], self.args[1], self.args[2]
        )
    }
}

/// Identity and counters of one logical controller, as carried inside the
/// frames themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerParams {
    /// 32-bit identifier taught to the device by the PAIR broadcast. Defaults
    /// to [`fnv1_hash`] of the configured name when not forced.
    pub id: u32,
    /// Rolling transmission counter, stepped on every command. Wraps from 126
    /// back through 0, bumping `restart_count`.
    pub tx_count: u8,
    pub restart_count: u8,
    /// Sub-address so one `id` can drive several devices.
    pub index: u8,
    /// Per-frame randomness for the codecs that need it; 0 lets the codec
    /// draw its own.
    pub seed: u16,
}

/// 32-bit FNV-1 hash, used to derive controller ids and persistence keys
/// from configured names.
pub fn fnv1_hash(s: &str) -> u32 {
    let mut hash = 2166136261u32;
    for b in s.bytes() {
        hash = hash.wrapping_mul(16777619);
        hash ^= u32::from(b);
    }
    hash
}
