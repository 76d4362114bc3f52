//! Service surface routing and settings persistence.

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use ble_adv::codecs::default_registry;
use ble_adv::controller::ControllerConfig;
use ble_adv::scheduler::{RadioDriver, RadioError};
use ble_adv::store::{ConfigStore, MemoryStore};
use ble_adv::{Bridge, CommandType, EntityType};

struct NullRadio;

impl RadioDriver for NullRadio {
    fn advertise_start(&mut self, _payload: &[u8]) -> Result<(), RadioError> {
        Ok(())
    }

    fn advertise_stop(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
}

/// In-memory store shareable across bridge restarts within a test.
#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<MemoryStore>>);

impl ConfigStore for SharedStore {
    fn load_str(&self, key: u32) -> Option<String> {
        self.0.borrow().load_str(key)
    }

    fn save_str(&mut self, key: u32, value: &str) {
        self.0.borrow_mut().save_str(key, value)
    }

    fn load_f32(&self, key: u32) -> Option<f32> {
        self.0.borrow().load_f32(key)
    }

    fn save_f32(&mut self, key: u32, value: f32) {
        self.0.borrow_mut().save_f32(key, value)
    }
}

fn bridge_with(store: SharedStore) -> Bridge {
    let mut bridge = Bridge::new(default_registry(), Box::new(NullRadio), Box::new(store));
    bridge.add_controller(ControllerConfig::new("kitchen", "zhimei - v1"));
    bridge
}

#[test]
fn service_routing() {
    let mut bridge = bridge_with(SharedStore::default());
    let now = Duration::ZERO;

    assert!(bridge.handle_service("pair_kitchen", &[], now));
    assert!(bridge.handle_service("set_timer_kitchen", &["2.0"], now));
    assert!(bridge.handle_service("cmd_kitchen", &["16", "0", "1", "0", "0"], now));
    assert!(bridge.handle_service("inject_raw_kitchen", &["02.01.06.03.FF.AA.BB"], now));
    assert!(bridge.handle_service("raw_decode", &["02 01 06 03 FF AA BB"], now));
    assert!(!bridge.handle_service("pair_bathroom", &[], now));
    assert!(!bridge.handle_service("unrelated", &[], now));

    let queued = bridge.controller("kitchen").expect("registered").queued_commands();
    assert!(queued.contains(&(CommandType::Pair, EntityType::Controller, 0)));
    assert!(queued.contains(&(CommandType::Timer, EntityType::Controller, 0)));
    // the custom command and the raw injection queue untyped items
    assert_eq!(
        queued
            .iter()
            .filter(|(cmd, _, _)| *cmd == CommandType::Custom)
            .count(),
        2
    );
}

#[test]
fn malformed_service_arguments_are_swallowed() {
    let mut bridge = bridge_with(SharedStore::default());
    let now = Duration::ZERO;

    assert!(bridge.handle_service("set_timer_kitchen", &["soon"], now));
    assert!(bridge.handle_service("cmd_kitchen", &["16", "0"], now));
    assert!(bridge.handle_service("inject_raw_kitchen", &["not hex"], now));

    let queued = bridge.controller("kitchen").expect("registered").queued_commands();
    assert!(queued.is_empty());
}

#[test]
fn encoding_selection_persists() {
    let store = SharedStore::default();

    let mut bridge = bridge_with(store.clone());
    assert!(bridge.set_encoding("kitchen", "zhimei - All"));
    assert!(!bridge.set_encoding("kitchen", "nonsense - v9"));
    assert!(bridge.set_min_tx_duration("kitchen", 750));

    // a fresh bridge over the same store restores the selection
    let bridge = bridge_with(store);
    let controller = bridge.controller("kitchen").expect("registered");
    assert_eq!(controller.codec_id(), "zhimei - All");
    assert_eq!(controller.min_tx_duration_ms(), 750);
}
