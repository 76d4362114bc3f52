//! Top-level assembly: the codec registry, the scheduler, the controllers
//! and the host-facing service surface.
//!
//! The host owns the main loop and the transports; it feeds scan results
//! into [`Bridge::mailbox`] from the radio thread, drives [`Bridge::tick`]
//! with a monotonic time, and routes its CLI/API calls through
//! [`Bridge::handle_service`].

use core::time::Duration;

use log::debug;

use crate::codec::CodecRegistry;
use crate::controller::{Controller, ControllerConfig};
use crate::frame::Frame;
use crate::scheduler::{RadioDriver, ScanMailbox, Scheduler};
use crate::store::ConfigStore;
use crate::fnv1_hash;

pub struct Bridge {
    registry: CodecRegistry,
    scheduler: Scheduler,
    controllers: Vec<Controller>,
    store: Box<dyn ConfigStore>,
    radio: Box<dyn RadioDriver>,
}

impl Bridge {
    pub fn new(registry: CodecRegistry, radio: Box<dyn RadioDriver>, store: Box<dyn ConfigStore>) -> Self {
        Self {
            registry,
            scheduler: Scheduler::new(),
            controllers: Vec::new(),
            store,
            radio,
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Handle for the radio thread's scan callback.
    pub fn mailbox(&self) -> ScanMailbox {
        self.scheduler.mailbox()
    }

    fn encoding_key(name: &str) -> u32 {
        fnv1_hash(&format!("{}/encoding", name))
    }

    fn duration_key(name: &str) -> u32 {
        fnv1_hash(&format!("{}/duration", name))
    }

    /// Create a controller, restoring its persisted codec selection and
    /// transmission duration when present.
    pub fn add_controller(&mut self, config: ControllerConfig) -> &mut Controller {
        let mut controller = Controller::new(config);
        if let Some(saved) = self.store.load_str(Self::encoding_key(controller.name())) {
            if !self.registry.resolve(&saved).is_empty() {
                controller.set_codec_id(&saved);
            }
        }
        if let Some(saved) = self.store.load_f32(Self::duration_key(controller.name())) {
            controller.set_min_tx_duration_ms(saved as u64);
        }
        let index = self.controllers.len();
        self.controllers.push(controller);
        &mut self.controllers[index]
    }

    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.name() == name)
    }

    pub fn controller_mut(&mut self, name: &str) -> Option<&mut Controller> {
        self.controllers.iter_mut().find(|c| c.name() == name)
    }

    /// Change a controller's codec selection; persisted on success.
    pub fn set_encoding(&mut self, name: &str, codec_id: &str) -> bool {
        if self.registry.resolve(codec_id).is_empty() {
            return false;
        }
        let key = Self::encoding_key(name);
        match self.controllers.iter_mut().find(|c| c.name() == name) {
            Some(controller) => {
                controller.set_codec_id(codec_id);
                self.store.save_str(key, codec_id);
                true
            }
            None => false,
        }
    }

    /// Change a controller's minimum transmission duration; persisted.
    pub fn set_min_tx_duration(&mut self, name: &str, ms: u64) -> bool {
        let key = Self::duration_key(name);
        match self.controllers.iter_mut().find(|c| c.name() == name) {
            Some(controller) => {
                controller.set_min_tx_duration_ms(ms);
                self.store.save_f32(key, ms as f32);
                true
            }
            None => false,
        }
    }

    /// Persist the minimum brightness of a light entity; hosts apply it
    /// when constructing the light.
    pub fn save_min_brightness(&mut self, light_name: &str, value: f32) {
        self.store
            .save_f32(fnv1_hash(&format!("{}/min_brightness", light_name)), value);
    }

    pub fn load_min_brightness(&self, light_name: &str) -> Option<f32> {
        self.store
            .load_f32(fnv1_hash(&format!("{}/min_brightness", light_name)))
    }

    /// One cooperative main-loop step: dispatch received frames, let every
    /// controller progress its queue, then drive the radio.
    pub fn tick(&mut self, now: Duration) {
        self.scheduler.listen_tick(now, &self.registry, &mut self.controllers);
        for controller in &mut self.controllers {
            controller.tick(now, &mut self.scheduler, &self.registry);
        }
        self.scheduler.adv_tick(now, self.radio.as_mut());
    }

    /// The service names this bridge answers to, for host-side
    /// registration.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec!["raw_decode".into(), "raw_listen".into()];
        for controller in &self.controllers {
            let n = controller.name();
            names.push(format!("pair_{}", n));
            names.push(format!("unpair_{}", n));
            names.push(format!("all_on_{}", n));
            names.push(format!("all_off_{}", n));
            names.push(format!("set_timer_{}", n));
            names.push(format!("cmd_{}", n));
            names.push(format!("inject_raw_{}", n));
        }
        names
    }

    /// Route one host service call. Returns whether the name was ours;
    /// malformed arguments are logged at debug and swallowed.
    pub fn handle_service(&mut self, service: &str, args: &[&str], now: Duration) -> bool {
        match service {
            "raw_decode" => {
                if let Some(frame) = args.first().and_then(|raw| Frame::from_hex(raw)) {
                    self.scheduler
                        .handle_raw(&frame, false, now, &self.registry, &mut self.controllers);
                }
                return true;
            }
            "raw_listen" => {
                if let Some(frame) = args.first().and_then(|raw| Frame::from_hex(raw)) {
                    self.scheduler
                        .handle_raw(&frame, true, now, &self.registry, &mut self.controllers);
                }
                return true;
            }
            _ => {}
        }

        let index = |bridge: &Self, name: &str| bridge.controllers.iter().position(|c| c.name() == name);

        if let Some(name) = service.strip_prefix("pair_") {
            if let Some(i) = index(self, name) {
                self.controllers[i].pair(&self.registry);
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("unpair_") {
            if let Some(i) = index(self, name) {
                self.controllers[i].unpair(&self.registry);
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("all_on_") {
            if let Some(i) = index(self, name) {
                self.controllers[i].all_on(&self.registry);
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("all_off_") {
            if let Some(i) = index(self, name) {
                self.controllers[i].all_off(&self.registry);
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("set_timer_") {
            if let Some(i) = index(self, name) {
                match args.first().map(|a| a.parse::<f32>()) {
                    Some(Ok(minutes)) => self.controllers[i].set_timer(minutes, now, &self.registry),
                    _ => debug!("set_timer_{}: malformed arguments {:?}", name, args),
                }
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("cmd_") {
            if let Some(i) = index(self, name) {
                let mut floats = [0.0f32; 5];
                let parsed = args.len() == 5
                    && args.iter().enumerate().all(|(j, a)| match a.parse::<f32>() {
                        Ok(v) => {
                            floats[j] = v;
                            true
                        }
                        Err(_) => false,
                    });
                if parsed {
                    self.controllers[i].custom_cmd_floats(floats, &self.registry);
                } else {
                    debug!("cmd_{}: malformed arguments {:?}", name, args);
                }
                return true;
            }
        }
        if let Some(name) = service.strip_prefix("inject_raw_") {
            if let Some(i) = index(self, name) {
                if let Some(raw) = args.first() {
                    self.controllers[i].inject_raw(raw);
                } else {
                    debug!("inject_raw_{}: missing argument", name);
                }
                return true;
            }
        }
        false
    }
}
