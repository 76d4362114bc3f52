//! One logical device: identity, outbound queue, timers and the entities
//! listening behind it.

use core::time::Duration;
use std::collections::VecDeque;

use log::{debug, error};

use crate::codec::CodecRegistry;
use crate::entity::Entity;
use crate::frame::Frame;
use crate::scheduler::Scheduler;
use crate::{fnv1_hash, CommandType, ControllerParams, EncCmd, EntityType, GenCmd};

/// Observer fired for every vendor command actually sent.
pub type SentHook = Box<dyn FnMut(&GenCmd, &EncCmd)>;

/// One pending broadcast: the abstract command identity used for
/// coalescing plus the frames produced for it, one per active codec.
struct QueueItem {
    cmd: CommandType,
    ent_type: EntityType,
    ent_index: u8,
    frames: Vec<Frame>,
}

impl QueueItem {
    fn new(cmd: CommandType, ent_type: EntityType, ent_index: u8) -> Self {
        Self {
            cmd,
            ent_type,
            ent_index,
            frames: Vec::new(),
        }
    }

    fn custom() -> Self {
        Self::new(CommandType::Custom, EntityType::NoType, 0)
    }

    fn matches(&self, gen: &GenCmd) -> bool {
        gen.cmd == self.cmd && gen.ent_type == self.ent_type && gen.ent_index == self.ent_index
    }
}

/// Construction-time settings of a controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub name: String,
    /// Selected codec id, possibly the `All` pseudo-variant of an encoding.
    pub codec_id: String,
    /// Forced 32-bit identity; hash of `name` when absent.
    pub forced_id: Option<u32>,
    pub index: u8,
    pub min_tx_duration_ms: u64,
    pub max_tx_duration_ms: u64,
    /// Per-frame rotation window used when several codec variants share one
    /// `min_tx_duration` slot.
    pub seq_duration_ms: u64,
    /// Swap the cold/warm channels for lights wired the other way around.
    pub reversed: bool,
    pub cancel_timer_on_any_change: bool,
}

impl ControllerConfig {
    pub fn new(name: &str, codec_id: &str) -> Self {
        Self {
            name: name.to_owned(),
            codec_id: codec_id.to_owned(),
            forced_id: None,
            index: 0,
            min_tx_duration_ms: 100,
            max_tx_duration_ms: 3000,
            seq_duration_ms: 150,
            reversed: false,
            cancel_timer_on_any_change: false,
        }
    }
}

/// One physical device to control. Entities reference it as their parent to
/// perform commands; it chooses the codec(s), owns the outbound queue and
/// interacts with the scheduler.
pub struct Controller {
    name: String,
    params: ControllerParams,
    codec_id: String,
    min_tx_duration_ms: u64,
    max_tx_duration_ms: u64,
    seq_duration_ms: u64,
    reversed: bool,
    cancel_timer_on_any_change: bool,

    queue: VecDeque<QueueItem>,
    // on-air bookkeeping
    adv_start: Option<Duration>,
    adv_id: u16,

    off_deadline: Option<Duration>,
    // set while republishing a listened command, so entity feedback does
    // not re-broadcast to the device that just told us about it
    skip_commands: bool,

    entities: Vec<Box<dyn Entity>>,
    sent_hooks: Vec<SentHook>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let params = ControllerParams {
            id: config.forced_id.unwrap_or_else(|| fnv1_hash(&config.name)),
            index: config.index,
            ..Default::default()
        };
        Self {
            name: config.name,
            params,
            codec_id: config.codec_id,
            min_tx_duration_ms: config.min_tx_duration_ms,
            max_tx_duration_ms: config.max_tx_duration_ms,
            seq_duration_ms: config.seq_duration_ms,
            reversed: config.reversed,
            cancel_timer_on_any_change: config.cancel_timer_on_any_change,
            queue: VecDeque::new(),
            adv_start: None,
            adv_id: 0,
            off_deadline: None,
            skip_commands: false,
            entities: Vec::new(),
            sent_hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    /// Mutable identity access, for hosts forcing counters or pinning the
    /// per-frame seed.
    pub fn params_mut(&mut self) -> &mut ControllerParams {
        &mut self.params
    }

    pub fn codec_id(&self) -> &str {
        &self.codec_id
    }

    pub fn set_codec_id(&mut self, id: &str) {
        self.codec_id = id.to_owned();
    }

    pub fn min_tx_duration_ms(&self) -> u64 {
        self.min_tx_duration_ms
    }

    pub fn set_min_tx_duration_ms(&mut self, ms: u64) {
        self.min_tx_duration_ms = ms;
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn add_entity(&mut self, entity: Box<dyn Entity>) {
        self.entities.push(entity);
    }

    pub fn add_sent_hook(&mut self, hook: SentHook) {
        self.sent_hooks.push(hook);
    }

    /// The pending command identities, front of the queue first.
    pub fn queued_commands(&self) -> Vec<(CommandType, EntityType, u8)> {
        self.queue.iter().map(|q| (q.cmd, q.ent_type, q.ent_index)).collect()
    }

    /// Whether a decoded frame from `codec_id` with identity `cont`
    /// addresses this controller.
    pub fn is_eligible(&self, codec_id: &str, cont: &ControllerParams, registry: &CodecRegistry) -> bool {
        registry.resolve(&self.codec_id).iter().any(|c| c.id() == codec_id)
            && cont.id == self.params.id
            && cont.index == self.params.index
    }

    fn increase_counter(&mut self) {
        if self.params.restart_count == 0 {
            self.params.restart_count = rand::random();
        }
        // reset tx count near the limit
        if self.params.tx_count > 126 {
            self.params.tx_count = 0;
            self.params.restart_count = self.params.restart_count.wrapping_add(1);
        }
        self.params.tx_count += 1;
    }

    /// Queue one abstract command: coalesce with any pending command of the
    /// same identity, translate and encode through every active codec.
    /// Returns whether any frame was produced.
    pub fn enqueue(&mut self, gen: &GenCmd, registry: &CodecRegistry) -> bool {
        if self.cancel_timer_on_any_change && gen.ent_type != EntityType::Controller {
            self.cancel_timer();
        }

        if self.skip_commands {
            debug!("[{}] publishing mode - no command sent to the device", self.name);
            return false;
        }

        let before = self.queue.len();
        self.queue.retain(|q| !q.matches(gen));
        if before != self.queue.len() {
            debug!("[{}] removed {} previous pending command(s)", self.name, before - self.queue.len());
        }

        let mut item = QueueItem::new(gen.cmd, gen.ent_type, gen.ent_index);
        self.increase_counter();
        let codecs = registry.resolve(&self.codec_id);
        if codecs.is_empty() {
            error!("[{}] no codec with id '{}'", self.name, self.codec_id);
        }
        for codec in codecs {
            for enc in codec.g2e(gen) {
                for hook in &mut self.sent_hooks {
                    hook(gen, &enc);
                }
                item.frames.push(codec.encode(&enc, &self.params));
            }
        }
        let produced = !item.frames.is_empty();
        self.queue.push_back(item);
        produced
    }

    /// Queue ready-made frames (automation hooks, replays).
    pub fn enqueue_frames(&mut self, frames: Vec<Frame>) {
        let mut item = QueueItem::custom();
        item.frames = frames;
        self.queue.push_back(item);
    }

    /// Bypass translation: run one vendor command through every active
    /// codec as-is.
    pub fn custom_cmd(&mut self, enc: &EncCmd, registry: &CodecRegistry) {
        debug!("[{}] custom command: {}", self.name, enc);
        let mut item = QueueItem::custom();
        self.increase_counter();
        for codec in registry.resolve(&self.codec_id) {
            item.frames.push(codec.encode(enc, &self.params));
        }
        self.queue.push_back(item);
    }

    pub fn custom_cmd_floats(&mut self, args: [f32; 5], registry: &CodecRegistry) {
        let mut enc = EncCmd::new(args[0] as u8);
        enc.param1 = args[1] as u8;
        enc.args = [args[2] as u8, args[3] as u8, args[4] as u8];
        self.custom_cmd(&enc, registry);
    }

    /// Bypass translation and encoding: queue a literal frame from a hex
    /// string. Malformed input is logged and dropped.
    pub fn inject_raw(&mut self, raw: &str) {
        debug!("[{}] raw injection", self.name);
        if let Some(frame) = Frame::from_hex(raw) {
            let mut item = QueueItem::custom();
            item.frames.push(frame);
            self.queue.push_back(item);
        }
    }

    fn controller_command(&mut self, gen: GenCmd, registry: &CodecRegistry) {
        debug!("[{}] controller cmd: {}", self.name, gen);
        self.enqueue(&gen, registry);
    }

    pub fn pair(&mut self, registry: &CodecRegistry) {
        self.controller_command(GenCmd::new(CommandType::Pair, EntityType::Controller), registry);
    }

    pub fn unpair(&mut self, registry: &CodecRegistry) {
        self.controller_command(GenCmd::new(CommandType::Unpair, EntityType::Controller), registry);
    }

    pub fn all_on(&mut self, registry: &CodecRegistry) {
        self.publish_to_entities(&GenCmd::new(CommandType::On, EntityType::All), registry);
    }

    pub fn all_off(&mut self, registry: &CodecRegistry) {
        self.publish_to_entities(&GenCmd::new(CommandType::Off, EntityType::All), registry);
    }

    /// Queue the vendor TIMER command and arm the local OFF publication
    /// `minutes` from `now`. A zero duration only cancels.
    pub fn set_timer(&mut self, minutes: f32, now: Duration, registry: &CodecRegistry) {
        self.cancel_timer();
        if minutes == 0.0 {
            return;
        }
        let mut gen = GenCmd::new(CommandType::Timer, EntityType::Controller);
        gen.args[0] = minutes;
        self.controller_command(gen, registry);
        self.off_deadline = Some(now + Duration::from_millis((minutes * 60_000.0) as u64));
    }

    pub fn cancel_timer(&mut self) {
        if self.off_deadline.take().is_some() {
            debug!("[{}] timer cancelled", self.name);
        }
    }

    /// Inbound path: apply a decoded (or host-side) command to the matching
    /// entities. With `apply` false the entities update their state but
    /// their feedback commands are not re-broadcast.
    pub fn publish(&mut self, gen: &GenCmd, apply: bool, now: Duration, registry: &CodecRegistry) {
        self.skip_commands = !apply;
        if gen.cmd == CommandType::Timer && gen.ent_type == EntityType::Controller {
            self.set_timer(gen.args[0], now, registry);
        } else if gen.ent_type != EntityType::Controller {
            self.publish_to_entities(gen, registry);
        }
        self.skip_commands = false;
    }

    fn publish_to_entities(&mut self, gen: &GenCmd, registry: &CodecRegistry) {
        let mut entities = std::mem::take(&mut self.entities);
        for entity in entities.iter_mut() {
            if entity.matches(gen) {
                for cmd in entity.publish(gen) {
                    self.enqueue(&cmd, registry);
                }
            }
        }
        self.entities = entities;
    }

    /// One main-loop step: fire the OFF timer, hand the front queue item to
    /// the scheduler when the radio slot is free, and release an expired
    /// on-air reservation.
    pub fn tick(&mut self, now: Duration, scheduler: &mut Scheduler, registry: &CodecRegistry) {
        if let Some(deadline) = self.off_deadline {
            if now >= deadline {
                self.off_deadline = None;
                self.publish(&GenCmd::new(CommandType::Off, EntityType::All), false, now, registry);
            }
        }

        match self.adv_start {
            None => {
                if let Some(mut item) = self.queue.pop_front() {
                    if !item.frames.is_empty() {
                        let use_seq =
                            self.seq_duration_ms > 0 && self.seq_duration_ms < self.min_tx_duration_ms;
                        let duration = if use_seq { self.seq_duration_ms } else { self.min_tx_duration_ms };
                        for frame in &mut item.frames {
                            frame.duration_ms = duration;
                        }
                        self.adv_id = scheduler.add(item.frames);
                        self.adv_start = Some(now);
                    }
                }
            }
            Some(start) => {
                // with nothing else queued the reservation lingers for the
                // full max duration, otherwise hand the radio over quickly
                let lifetime = if self.queue.is_empty() {
                    self.max_tx_duration_ms
                } else {
                    self.min_tx_duration_ms
                };
                if now > start + Duration::from_millis(lifetime) {
                    self.adv_start = None;
                    scheduler.remove(self.adv_id);
                }
            }
        }
    }
}
