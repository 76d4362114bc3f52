//! Entity adapters: the thin state holders behind a controller.
//!
//! An entity consumes decoded commands (a remote press, another phone) and
//! produces the abstract commands its own state changes require. The
//! returned commands flow back through [`crate::Controller::enqueue`],
//! which suppresses them while republishing a listened command.

use log::debug;

use crate::{fan_sub_cmd, CommandType, EntityType, GenCmd};

/// Something a controller can route commands to.
pub trait Entity {
    fn ent_type(&self) -> EntityType;
    fn index(&self) -> u8;

    /// `All` matches anything, otherwise type and index must both match.
    fn matches(&self, gen: &GenCmd) -> bool {
        gen.ent_type == EntityType::All
            || (gen.ent_type == self.ent_type() && gen.ent_index == self.index())
    }

    /// Apply a command to the entity state; the returned commands are the
    /// broadcasts this state change calls for.
    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd>;
}

fn ensure_range(f: f32) -> f32 {
    f.clamp(0.0, 1.0)
}

/// A pending state change for a light, all values in device space.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightCall {
    pub state: Option<bool>,
    pub brightness: Option<f32>,
    /// Warm fraction of the white channel mix.
    pub warm: Option<f32>,
    pub red: Option<f32>,
    pub green: Option<f32>,
    pub blue: Option<f32>,
}

/// Cold/warm white light with a configurable floor below which the device
/// visibly flickers.
pub struct CwwLight {
    index: u8,
    reversed: bool,
    constant_brightness: bool,
    min_brightness: f32,
    is_off: bool,
    brightness: f32,
    warm_color: f32,
}

impl CwwLight {
    pub fn new(index: u8, reversed: bool, constant_brightness: bool, min_brightness: f32) -> Self {
        Self {
            index,
            reversed,
            constant_brightness,
            min_brightness,
            is_off: true,
            brightness: 0.0,
            warm_color: 0.0,
        }
    }

    pub fn min_brightness(&self) -> f32 {
        self.min_brightness
    }

    pub fn set_min_brightness(&mut self, min_brightness: f32) {
        self.min_brightness = min_brightness;
    }

    /// Device brightness back to user scale.
    pub fn user_brightness(&self, device_brightness: f32) -> f32 {
        ensure_range(
            (ensure_range(device_brightness).max(self.min_brightness) - self.min_brightness)
                / (1.0 - self.min_brightness),
        )
        .max(0.01)
    }

    /// User brightness to the device scale honoring the floor.
    pub fn device_brightness(&self, user_brightness: f32) -> f32 {
        ensure_range(self.min_brightness + ensure_range(user_brightness) * (1.0 - self.min_brightness))
    }

    fn cmd(&self, cmd: CommandType) -> GenCmd {
        let mut gen = GenCmd::new(cmd, EntityType::Light);
        gen.ent_index = self.index;
        gen
    }

    /// Apply a state change and produce the commands to broadcast. The
    /// white mix is emitted through several mutually exclusive command
    /// options; each codec's translator picks the one it carries.
    pub fn control(&mut self, call: LightCall) -> Vec<GenCmd> {
        let mut out = Vec::new();
        if let Some(state) = call.state {
            if !state {
                debug!("light {} switch off", self.index);
                self.is_off = true;
                out.push(self.cmd(CommandType::Off));
                return out;
            }
            if self.is_off {
                debug!("light {} switch on", self.index);
                self.is_off = false;
                out.push(self.cmd(CommandType::On));
            }
        } else if self.is_off {
            return out;
        }

        let brightness_diff = call.brightness.map_or(false, |b| b != self.brightness);
        let warm_diff = call.warm.map_or(false, |w| {
            (if self.reversed { 1.0 - w } else { w }) != self.warm_color
        });
        if let Some(b) = call.brightness {
            self.brightness = ensure_range(b);
        }
        if let Some(w) = call.warm {
            self.warm_color = ensure_range(if self.reversed { 1.0 - w } else { w });
        }
        if !brightness_diff && !warm_diff {
            return out;
        }

        // option 1 and 2: both channels in one message, either as raw
        // cold/warm levels or as warm fraction plus brightness
        let mut warm = self.brightness * self.warm_color;
        let mut cold = self.brightness * (1.0 - self.warm_color);
        if !self.constant_brightness {
            let max = warm.max(cold);
            if max > 0.0 {
                warm = warm * self.brightness / max;
                cold = cold * self.brightness / max;
            }
        }
        debug!("light {} cold: {:.0}%, warm: {:.0}%", self.index, cold * 100.0, warm * 100.0);
        out.push(
            self.cmd(CommandType::LightCwwColdWarm)
                .with_args([cold, warm, 0.0]),
        );
        out.push(
            self.cmd(CommandType::LightCwwWarmDim)
                .with_args([self.warm_color, self.brightness, 0.0]),
        );

        // option 3: two separate messages, each only when it changed
        if warm_diff {
            out.push(self.cmd(CommandType::LightCwwCct).with_args([self.warm_color, 0.0, 0.0]));
        }
        if brightness_diff {
            out.push(self.cmd(CommandType::LightCwwDim).with_args([self.brightness, 0.0, 0.0]));
        }
        out
    }
}

impl Entity for CwwLight {
    fn ent_type(&self) -> EntityType {
        EntityType::Light
    }

    fn index(&self) -> u8 {
        self.index
    }

    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd> {
        let mut call = LightCall::default();
        match gen.cmd {
            CommandType::On => call.state = Some(true),
            CommandType::Off => call.state = Some(false),
            CommandType::Toggle => call.state = Some(self.is_off),
            _ if self.is_off => {
                debug!("light {}: change ignored as entity is off", self.index);
                return Vec::new();
            }
            CommandType::LightCwwCct | CommandType::LightCwwWarm => match gen.param {
                0 | 3 => call.warm = Some(gen.args[0]),
                1 => call.warm = Some(self.warm_color + gen.args[0]),
                2 => call.warm = Some(self.warm_color - gen.args[0]),
                _ => return Vec::new(),
            },
            CommandType::LightCwwDim => match gen.param {
                0 | 3 => call.brightness = Some(gen.args[0]),
                1 => call.brightness = Some(self.brightness + gen.args[0]),
                2 => call.brightness = Some(self.brightness - gen.args[0]),
                _ => return Vec::new(),
            },
            CommandType::LightCwwColdWarm => {
                let total = gen.args[0] + gen.args[1];
                if total > 0.0 {
                    call.warm = Some(gen.args[1] / total);
                }
                call.brightness = Some(gen.args[0].max(gen.args[1]));
            }
            CommandType::LightCwwWarmDim => {
                call.warm = Some(gen.args[0]);
                call.brightness = Some(gen.args[1]);
            }
            _ => return Vec::new(),
        }
        self.control(call)
    }
}

/// RGB strip.
pub struct RgbLight {
    index: u8,
    is_off: bool,
    brightness: f32,
    red: f32,
    green: f32,
    blue: f32,
}

impl RgbLight {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            is_off: true,
            brightness: 0.0,
            red: 0.0,
            green: 0.0,
            blue: 0.0,
        }
    }

    fn cmd(&self, cmd: CommandType) -> GenCmd {
        let mut gen = GenCmd::new(cmd, EntityType::Light);
        gen.ent_index = self.index;
        gen
    }

    pub fn control(&mut self, call: LightCall) -> Vec<GenCmd> {
        let mut out = Vec::new();
        if let Some(state) = call.state {
            if !state {
                self.is_off = true;
                out.push(self.cmd(CommandType::Off));
                return out;
            }
            if self.is_off {
                self.is_off = false;
                out.push(self.cmd(CommandType::On));
            }
        } else if self.is_off {
            return out;
        }

        let brightness_diff = call.brightness.map_or(false, |b| b != self.brightness);
        let rgb_diff = call.red.map_or(false, |r| r != self.red)
            || call.green.map_or(false, |g| g != self.green)
            || call.blue.map_or(false, |b| b != self.blue);
        if let Some(b) = call.brightness {
            self.brightness = ensure_range(b);
        }
        if let Some(r) = call.red {
            self.red = ensure_range(r);
        }
        if let Some(g) = call.green {
            self.green = ensure_range(g);
        }
        if let Some(b) = call.blue {
            self.blue = ensure_range(b);
        }
        if !brightness_diff && !rgb_diff {
            return out;
        }

        // option 1: the effective channel levels in one message
        out.push(self.cmd(CommandType::LightRgbFull).with_args([
            self.red * self.brightness,
            self.green * self.brightness,
            self.blue * self.brightness,
        ]));
        // option 2: split brightness / color messages, each only if needed
        if brightness_diff {
            out.push(self.cmd(CommandType::LightRgbDim).with_args([self.brightness, 0.0, 0.0]));
        }
        if rgb_diff {
            out.push(self.cmd(CommandType::LightRgbRgb).with_args([self.red, self.green, self.blue]));
        }
        out
    }
}

impl Entity for RgbLight {
    fn ent_type(&self) -> EntityType {
        EntityType::Light
    }

    fn index(&self) -> u8 {
        self.index
    }

    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd> {
        let mut call = LightCall::default();
        match gen.cmd {
            CommandType::On => call.state = Some(true),
            CommandType::Off => call.state = Some(false),
            CommandType::Toggle => call.state = Some(self.is_off),
            _ if self.is_off => {
                debug!("light {}: change ignored as entity is off", self.index);
                return Vec::new();
            }
            CommandType::LightRgbDim => call.brightness = Some(gen.args[0]),
            CommandType::LightRgbRgb => {
                call.red = Some(gen.args[0]);
                call.green = Some(gen.args[1]);
                call.blue = Some(gen.args[2]);
            }
            CommandType::LightRgbFull => {
                let brightness = gen.args[0].max(gen.args[1]).max(gen.args[2]);
                call.brightness = Some(brightness);
                if brightness > 0.0 {
                    call.red = Some(gen.args[0] / brightness);
                    call.green = Some(gen.args[1] / brightness);
                    call.blue = Some(gen.args[2] / brightness);
                }
            }
            _ => return Vec::new(),
        }
        self.control(call)
    }
}

/// On/off only light.
pub struct BinaryLight {
    index: u8,
    is_off: bool,
}

impl BinaryLight {
    pub fn new(index: u8) -> Self {
        Self { index, is_off: true }
    }
}

impl Entity for BinaryLight {
    fn ent_type(&self) -> EntityType {
        EntityType::Light
    }

    fn index(&self) -> u8 {
        self.index
    }

    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd> {
        let state = match gen.cmd {
            CommandType::On => true,
            CommandType::Off => false,
            CommandType::Toggle => self.is_off,
            _ => return Vec::new(),
        };
        self.is_off = !state;
        let mut cmd = GenCmd::new(
            if state { CommandType::On } else { CommandType::Off },
            EntityType::Light,
        );
        cmd.ent_index = self.index;
        vec![cmd]
    }
}

/// A pending state change for a fan.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanCall {
    pub state: Option<bool>,
    pub speed: Option<u8>,
    pub direction_reverse: Option<bool>,
    pub oscillating: Option<bool>,
}

/// Speed scale assumed when a received command does not carry one.
const REF_SPEED: f32 = 6.0;

pub struct Fan {
    index: u8,
    speed_count: u8,
    supports_direction: bool,
    supports_oscillation: bool,
    /// Re-send direction and oscillation when switching on; some devices
    /// forget them while off.
    forced_refresh_on_start: bool,

    state: bool,
    speed: u8,
    direction_reverse: bool,
    oscillating: bool,
}

impl Fan {
    pub fn new(index: u8, speed_count: u8, supports_direction: bool, supports_oscillation: bool) -> Self {
        Self {
            index,
            speed_count,
            supports_direction,
            supports_oscillation,
            forced_refresh_on_start: false,
            state: false,
            speed: 0,
            direction_reverse: false,
            oscillating: false,
        }
    }

    pub fn set_forced_refresh_on_start(&mut self, forced: bool) {
        self.forced_refresh_on_start = forced;
    }

    fn cmd(&self, cmd: CommandType) -> GenCmd {
        let mut gen = GenCmd::new(cmd, EntityType::Fan);
        gen.ent_index = self.index;
        gen
    }

    /// Apply a state change and produce the commands to broadcast: the
    /// per-field commands for what was requested plus the full-state
    /// command carrying the modified-field bitmask (mutually exclusive at
    /// translator level).
    pub fn control(&mut self, call: FanCall) -> Vec<GenCmd> {
        let mut out = Vec::new();
        let mut sub_cmds = 0u8;
        let mut direction_refresh = false;
        let mut oscillation_refresh = false;

        if let Some(state) = call.state {
            sub_cmds |= fan_sub_cmd::STATE;
            if !self.state && state && self.forced_refresh_on_start {
                direction_refresh = true;
                oscillation_refresh = true;
            }
            self.state = state;
            if let Some(speed) = call.speed {
                sub_cmds |= fan_sub_cmd::SPEED;
                self.speed = speed;
            }
            debug!(
                "fan {}: setting {} with speed {}",
                self.index,
                if self.state { "on" } else { "off" },
                self.speed
            );
            out.push(self.cmd(CommandType::FanOnoffSpeed).with_args([
                if self.state { f32::from(self.speed) } else { 0.0 },
                f32::from(self.speed_count),
                0.0,
            ]));
        }

        if let Some(reverse) = call.direction_reverse {
            sub_cmds |= fan_sub_cmd::DIR;
            self.direction_reverse = reverse;
            direction_refresh = true;
        }
        if direction_refresh && self.supports_direction {
            debug!("fan {}: setting direction {}", self.index, if self.direction_reverse { "rev" } else { "fwd" });
            out.push(
                self.cmd(CommandType::FanDir)
                    .with_args([if self.direction_reverse { 1.0 } else { 0.0 }, 0.0, 0.0]),
            );
        }

        if let Some(oscillating) = call.oscillating {
            sub_cmds |= fan_sub_cmd::OSC;
            self.oscillating = oscillating;
            oscillation_refresh = true;
        }
        if oscillation_refresh && self.supports_oscillation {
            debug!("fan {}: setting oscillation {}", self.index, self.oscillating);
            out.push(
                self.cmd(CommandType::FanOsc)
                    .with_args([if self.oscillating { 1.0 } else { 0.0 }, 0.0, 0.0]),
            );
        }

        let mut full = self.cmd(CommandType::FanFull).with_args([
            if self.state { f32::from(self.speed) } else { 0.0 },
            if self.direction_reverse { 1.0 } else { 0.0 },
            if self.oscillating { 1.0 } else { 0.0 },
        ]);
        full.param = sub_cmds;
        out.push(full);
        out
    }
}

impl Entity for Fan {
    fn ent_type(&self) -> EntityType {
        EntityType::Fan
    }

    fn index(&self) -> u8 {
        self.index
    }

    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd> {
        let mut call = FanCall::default();
        match gen.cmd {
            CommandType::On => call.state = Some(true),
            CommandType::Off => call.state = Some(false),
            CommandType::Toggle => call.state = Some(!self.state),
            CommandType::FanOnoffSpeed => {
                if gen.args[0] == 0.0 {
                    call.state = Some(false);
                } else {
                    let max_speed = if gen.args[1] == 0.0 { REF_SPEED } else { gen.args[1] };
                    let speed = (gen.args[0] * f32::from(self.speed_count) / max_speed + 0.5) as u8;
                    call.speed = Some(speed);
                    call.state = Some(true);
                }
            }
            CommandType::FanFull => {
                if gen.args[0] == 0.0 {
                    call.state = Some(false);
                } else {
                    call.state = Some(true);
                    call.speed = Some(gen.args[0] as u8);
                    call.direction_reverse = Some(gen.args[1] != 0.0);
                    call.oscillating = Some(gen.args[2] != 0.0);
                }
            }
            CommandType::FanDir if self.state => call.direction_reverse = Some(gen.args[0] != 0.0),
            CommandType::FanDirToggle if self.state => call.direction_reverse = Some(!self.direction_reverse),
            CommandType::FanOsc if self.state => call.oscillating = Some(gen.args[0] != 0.0),
            CommandType::FanOscToggle if self.state => call.oscillating = Some(!self.oscillating),
            _ => {
                debug!("fan {}: change ignored as entity is off", self.index);
                return Vec::new();
            }
        }
        self.control(call)
    }
}
