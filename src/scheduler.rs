//! The process-wide advertiser scheduler and scan listener.
//!
//! A single component owns the radio: it serializes outbound frames from
//! every controller onto it, fair round-robin when several are pending, and
//! it funnels scan results from the radio thread through one mutex-guarded
//! mailbox into the main loop, where frames are deduplicated, decoded and
//! routed to the matching controllers.

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::codec::{Codec, CodecRegistry};
use crate::controller::Controller;
use crate::frame::{Frame, SCAN_DEDUPE_MS};
use crate::{ControllerParams, EncCmd, GenCmd};

/// Non-OK status from the radio driver; the scheduler logs it and retries
/// on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioError(pub i32);

/// Contract of the raw BLE GAP advertising driver. The scheduler never
/// reconfigures a running broadcast: every transition goes through
/// stop, then configure-and-start.
pub trait RadioDriver {
    fn advertise_start(&mut self, payload: &[u8]) -> Result<(), RadioError>;
    fn advertise_stop(&mut self) -> Result<(), RadioError>;
}

/// The only cross-thread contact point: the radio thread appends raw scan
/// results, the main loop drains them.
#[derive(Clone, Default)]
pub struct ScanMailbox {
    inner: Arc<Mutex<Vec<Frame>>>,
}

impl ScanMailbox {
    /// Called from the radio thread for every scan result.
    pub fn push(&self, raw: &[u8], now: Duration) {
        let mut frame = Frame::from_raw(raw);
        frame.duration_ms = now.as_millis() as u64 + SCAN_DEDUPE_MS;
        match self.inner.try_lock() {
            Ok(mut list) => list.push(frame),
            Err(_) => warn!("scan mailbox: failed to take lock, scan result dropped"),
        }
    }

    fn drain(&self) -> Vec<Frame> {
        match self.inner.try_lock() {
            Ok(mut list) => std::mem::take(&mut *list),
            Err(_) => {
                warn!("scan mailbox: failed to take lock, deferring to next tick");
                Vec::new()
            }
        }
    }
}

/// A decoded incoming frame, as handed to observer hooks.
pub struct Decoded {
    pub gen: GenCmd,
    pub enc: EncCmd,
    pub encoding: String,
    pub variant: String,
    pub cont: ControllerParams,
}

pub type RawHook = Box<dyn FnMut(&Frame)>;
pub type DecodedHook = Box<dyn FnMut(&Decoded)>;

struct AdvEntry {
    frame: Frame,
    id: u16,
    processed_once: bool,
    to_be_removed: bool,
}

/// Process-wide singleton in spirit: create one and share it with every
/// controller by reference.
pub struct Scheduler {
    inflight: VecDeque<AdvEntry>,
    id_count: u16,
    adv_stop_time: Option<Duration>,

    mailbox: ScanMailbox,
    processed: Vec<Frame>,
    check_reencoding: bool,

    raw_hooks: Vec<RawHook>,
    decoded_hooks: Vec<DecodedHook>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inflight: VecDeque::new(),
            id_count: 1,
            adv_stop_time: None,
            mailbox: ScanMailbox::default(),
            processed: Vec::new(),
            check_reencoding: false,
            raw_hooks: Vec::new(),
            decoded_hooks: Vec::new(),
        }
    }

    /// Re-run `encode(translate(decode(x)))` on every decoded frame and log
    /// discrepancies, a self-test for codec symmetry.
    pub fn set_check_reencoding(&mut self, check: bool) {
        self.check_reencoding = check;
    }

    /// Handle for the radio thread's scan callback.
    pub fn mailbox(&self) -> ScanMailbox {
        self.mailbox.clone()
    }

    pub fn add_raw_hook(&mut self, hook: RawHook) {
        self.raw_hooks.push(hook);
    }

    pub fn add_decoded_hook(&mut self, hook: DecodedHook) {
        self.decoded_hooks.push(hook);
    }

    /// Take ownership of frames to broadcast under a fresh id.
    pub fn add(&mut self, frames: Vec<Frame>) -> u16 {
        self.id_count = self.id_count.wrapping_add(1);
        let id = self.id_count;
        for frame in frames {
            debug!("request start advertising - {}: {}", id, frame.to_hex());
            self.inflight.push_back(AdvEntry {
                frame,
                id,
                processed_once: false,
                to_be_removed: false,
            });
        }
        id
    }

    /// Mark every frame of a broadcast for removal; it is dropped once off
    /// air.
    pub fn remove(&mut self, id: u16) {
        debug!("request stop advertising - {}", id);
        for entry in &mut self.inflight {
            if entry.id == id {
                entry.to_be_removed = true;
            }
        }
    }

    /// How many frames are currently in flight (on air or waiting for a
    /// slot).
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// Advertiser half of the main-loop tick.
    pub fn adv_tick(&mut self, now: Duration, radio: &mut dyn RadioDriver) {
        match self.adv_stop_time {
            None => {
                // nothing on air: clean up, then start the front frame
                self.inflight.retain(|e| !(e.processed_once && e.to_be_removed));
                if let Some(front) = self.inflight.front_mut() {
                    match radio.advertise_start(front.frame.bytes()) {
                        Ok(()) => {
                            self.adv_stop_time =
                                Some(now + Duration::from_millis(front.frame.duration_ms));
                            front.processed_once = true;
                        }
                        Err(err) => error!("advertise start failed: {:?}", err),
                    }
                }
            }
            Some(stop_time) => {
                // switch to the next frame once the window expired, and only
                // if there is anything to switch to (a lone frame lingers)
                let multi = self.inflight.len() > 1;
                let front_removed = self.inflight.front().map_or(false, |e| e.to_be_removed);
                if now > stop_time && (multi || front_removed) {
                    match radio.advertise_stop() {
                        Ok(()) => {
                            self.adv_stop_time = None;
                            if front_removed {
                                self.inflight.pop_front();
                            } else if let Some(front) = self.inflight.pop_front() {
                                self.inflight.push_back(front);
                            }
                        }
                        Err(err) => error!("advertise stop failed: {:?}", err),
                    }
                }
            }
        }
    }

    /// Listener half of the main-loop tick: evict expired dedupe entries,
    /// drain the mailbox and dispatch whatever is new.
    pub fn listen_tick(
        &mut self,
        now: Duration,
        registry: &CodecRegistry,
        controllers: &mut [Controller],
    ) {
        let now_ms = now.as_millis() as u64;
        self.processed.retain(|p| p.duration_ms >= now_ms);

        let new_packets = self.mailbox.drain();
        for packet in new_packets {
            let seen = self
                .processed
                .iter()
                .any(|p| *p == packet || p.is_data_equal(&packet));
            if !seen {
                self.handle_raw(&packet, true, now, registry, controllers);
                self.processed.push(packet);
            }
        }
    }

    /// Walk the codecs over one raw frame; on every match, publish to the
    /// eligible controllers (when `publish`) and fire the observer hooks.
    /// Returns whether any codec matched.
    pub fn handle_raw(
        &mut self,
        frame: &Frame,
        publish: bool,
        now: Duration,
        registry: &CodecRegistry,
        controllers: &mut [Controller],
    ) -> bool {
        debug!("raw - {}", frame.to_hex());
        if !frame.has_data() {
            debug!("malformed raw frame - ignored");
            return false;
        }
        for hook in &mut self.raw_hooks {
            hook(frame);
        }

        let mut matched = false;
        for codec in registry.codecs() {
            let (enc, cont) = match codec.decode(frame) {
                Ok(decoded) => decoded,
                Err(_) => continue,
            };
            matched = true;
            let gen = codec.e2g(&enc).unwrap_or_default();
            debug!(
                "[{}] decoded OK - tx: {}, gen: {}, enc: {}",
                codec.id(),
                cont.tx_count,
                gen,
                codec.cmd_str(&enc)
            );
            if publish {
                for controller in controllers.iter_mut() {
                    if controller.is_eligible(codec.id(), &cont, registry) {
                        controller.publish(&gen, false, now, registry);
                    }
                }
            }
            debug!(
                "config - encoding: {}, variant: {}, id: 0x{:X}, index: {}",
                codec.encoding(),
                codec.variant(),
                cont.id,
                cont.index
            );
            for hook in &mut self.decoded_hooks {
                hook(&Decoded {
                    gen,
                    enc,
                    encoding: codec.encoding().to_owned(),
                    variant: codec.variant().to_owned(),
                    cont,
                });
            }
            if self.check_reencoding {
                reencode_check(codec, &gen, &cont, frame);
            }
        }
        matched
    }
}

fn reencode_check(codec: &Codec, gen: &GenCmd, cont: &ControllerParams, frame: &Frame) {
    let enc_cmds = codec.g2e(gen);
    if enc_cmds.is_empty() {
        debug!("no corresponding command to re-encode");
    }
    for enc in enc_cmds {
        let re_encoded = codec.encode(&enc, cont);
        debug!("enc - {}", re_encoded.to_hex());
        if re_encoded.data() == frame.data() {
            info!("decoded / re-encoded with no diff");
        } else {
            error!("diff after decode / re-encode");
        }
    }
}
