//! Controller queue, advertiser rotation, dedupe window and timer behavior,
//! driven tick by tick with a synthetic clock.

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use ble_adv::codecs::default_registry;
use ble_adv::controller::{Controller, ControllerConfig};
use ble_adv::entity::Entity;
use ble_adv::scheduler::{RadioDriver, RadioError, Scheduler};
use ble_adv::{fnv1_hash, CommandType, ControllerParams, EntityType, GenCmd};

#[derive(Default)]
struct MockRadio {
    starts: Vec<Vec<u8>>,
    stops: usize,
}

impl RadioDriver for MockRadio {
    fn advertise_start(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.starts.push(payload.to_vec());
        Ok(())
    }

    fn advertise_stop(&mut self) -> Result<(), RadioError> {
        self.stops += 1;
        Ok(())
    }
}

struct CountingEntity {
    count: Rc<RefCell<usize>>,
    last: Rc<RefCell<Option<GenCmd>>>,
    feedback: Vec<GenCmd>,
}

impl CountingEntity {
    fn new(count: Rc<RefCell<usize>>, last: Rc<RefCell<Option<GenCmd>>>) -> Self {
        Self {
            count,
            last,
            feedback: Vec::new(),
        }
    }
}

impl Entity for CountingEntity {
    fn ent_type(&self) -> EntityType {
        EntityType::Light
    }

    fn index(&self) -> u8 {
        0
    }

    fn publish(&mut self, gen: &GenCmd) -> Vec<GenCmd> {
        *self.count.borrow_mut() += 1;
        *self.last.borrow_mut() = Some(*gen);
        self.feedback.clone()
    }
}

fn on_cmd() -> GenCmd {
    GenCmd::new(CommandType::On, EntityType::Light)
}

fn off_cmd() -> GenCmd {
    GenCmd::new(CommandType::Off, EntityType::Light)
}

/// Coalescing: a later enqueue of the same command identity replaces the
/// earlier one, later state wins.
#[test]
fn enqueue_coalesces_same_command() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("kitchen", "zhimei - v1"));

    assert!(controller.enqueue(&on_cmd(), &registry));
    assert!(controller.enqueue(&on_cmd(), &registry));
    assert!(controller.enqueue(&off_cmd(), &registry));

    assert_eq!(
        controller.queued_commands(),
        vec![
            (CommandType::On, EntityType::Light, 0),
            (CommandType::Off, EntityType::Light, 0),
        ]
    );
}

#[test]
fn tx_count_rollover_bumps_restart_count() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("kitchen", "zhimei - v1"));
    controller.params_mut().tx_count = 127;
    controller.params_mut().restart_count = 5;

    controller.enqueue(&on_cmd(), &registry);

    assert_eq!(controller.params().tx_count, 1);
    assert_eq!(controller.params().restart_count, 6);
}

/// Two controllers share the radio fairly: with one pending item each, the
/// frames alternate in `min_tx_duration` slices.
#[test]
fn round_robin_between_controllers() {
    let registry = default_registry();

    let mut config_a = ControllerConfig::new("living", "zhimei - v1");
    config_a.min_tx_duration_ms = 200;
    config_a.seq_duration_ms = 0;
    let mut config_b = ControllerConfig::new("bedroom", "zhimei - v1");
    config_b.min_tx_duration_ms = 200;
    config_b.seq_duration_ms = 0;

    let mut controller_a = Controller::new(config_a);
    let mut controller_b = Controller::new(config_b);
    assert!(controller_a.enqueue(&on_cmd(), &registry));
    assert!(controller_b.enqueue(&on_cmd(), &registry));

    let mut scheduler = Scheduler::new();
    let mut radio = MockRadio::default();
    for t in (0..=1200).step_by(50) {
        let now = Duration::from_millis(t);
        controller_a.tick(now, &mut scheduler, &registry);
        controller_b.tick(now, &mut scheduler, &registry);
        scheduler.adv_tick(now, &mut radio);
    }

    assert!(radio.starts.len() >= 4, "expected at least four slots, got {}", radio.starts.len());
    for window in radio.starts.windows(2) {
        assert_ne!(window[0], window[1], "adjacent slots must alternate");
    }
    let first = radio.starts[0].clone();
    let first_count = radio.starts.iter().filter(|s| **s == first).count();
    assert!(first_count >= 2);
    assert!(radio.starts.len() - first_count >= 2);
}

/// A lone frame lingers on air: no stop/start churn while nothing else
/// wants the radio.
#[test]
fn single_frame_lingers() {
    let registry = default_registry();
    let mut config = ControllerConfig::new("living", "zhimei - v1");
    config.min_tx_duration_ms = 200;
    config.seq_duration_ms = 0;
    let mut controller = Controller::new(config);
    assert!(controller.enqueue(&on_cmd(), &registry));

    let mut scheduler = Scheduler::new();
    let mut radio = MockRadio::default();
    for t in (0..=1000).step_by(50) {
        let now = Duration::from_millis(t);
        controller.tick(now, &mut scheduler, &registry);
        scheduler.adv_tick(now, &mut radio);
    }

    assert_eq!(radio.starts.len(), 1);
    assert_eq!(radio.stops, 0);
}

/// Past `max_tx_duration` with an empty queue, the controller releases its
/// reservation and the scheduler drops the frame.
#[test]
fn frame_removed_after_max_duration() {
    let registry = default_registry();
    let mut config = ControllerConfig::new("living", "zhimei - v1");
    config.min_tx_duration_ms = 100;
    config.max_tx_duration_ms = 300;
    config.seq_duration_ms = 0;
    let mut controller = Controller::new(config);
    assert!(controller.enqueue(&on_cmd(), &registry));

    let mut scheduler = Scheduler::new();
    let mut radio = MockRadio::default();
    for t in (0..=600).step_by(50) {
        let now = Duration::from_millis(t);
        controller.tick(now, &mut scheduler, &registry);
        scheduler.adv_tick(now, &mut radio);
    }

    assert_eq!(radio.starts.len(), 1);
    assert_eq!(radio.stops, 1);
    assert_eq!(scheduler.inflight_len(), 0);
}

fn listened_frame(registry: &ble_adv::CodecRegistry, name: &str) -> Vec<u8> {
    let codec = registry.get("zhimei - v1").expect("zhimei v1 registered");
    let cont = ControllerParams {
        id: fnv1_hash(name),
        tx_count: 5,
        restart_count: 1,
        index: 0,
        seed: 0x2A,
    };
    let enc_cmds = codec.g2e(&on_cmd());
    codec.encode(&enc_cmds[0], &cont).bytes().to_vec()
}

/// Dedupe window: the device's natural repetition within 60 s produces one
/// publish; after eviction the same bytes publish again.
#[test]
fn dedupe_window_evicts_after_60s() {
    let registry = default_registry();
    let raw = listened_frame(&registry, "living");

    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    controller.add_entity(Box::new(CountingEntity::new(count.clone(), last.clone())));
    let mut controllers = vec![controller];

    let mut scheduler = Scheduler::new();
    let mailbox = scheduler.mailbox();

    mailbox.push(&raw, Duration::ZERO);
    scheduler.listen_tick(Duration::ZERO, &registry, &mut controllers);
    assert_eq!(*count.borrow(), 1);
    assert_eq!(last.borrow().map(|g| g.cmd), Some(CommandType::On));

    mailbox.push(&raw, Duration::from_secs(30));
    scheduler.listen_tick(Duration::from_secs(30), &registry, &mut controllers);
    assert_eq!(*count.borrow(), 1, "repetition within the window must not republish");

    mailbox.push(&raw, Duration::from_secs(61));
    scheduler.listen_tick(Duration::from_secs(61), &registry, &mut controllers);
    assert_eq!(*count.borrow(), 2, "after eviction the frame publishes again");
}

/// Frames differing only in the AD-flag byte are the same frame to the
/// dedupe filter.
#[test]
fn dedupe_by_data_ignores_ad_flag() {
    let registry = default_registry();
    let raw = listened_frame(&registry, "living");
    let mut raw_other_flag = raw.clone();
    // byte 2 is the AD-flag value of the leading flag structure
    raw_other_flag[2] = 0x1A;

    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    controller.add_entity(Box::new(CountingEntity::new(count.clone(), last)));
    let mut controllers = vec![controller];

    let mut scheduler = Scheduler::new();
    let mailbox = scheduler.mailbox();

    mailbox.push(&raw, Duration::ZERO);
    scheduler.listen_tick(Duration::ZERO, &registry, &mut controllers);
    mailbox.push(&raw_other_flag, Duration::from_secs(1));
    scheduler.listen_tick(Duration::from_secs(1), &registry, &mut controllers);

    assert_eq!(*count.borrow(), 1);
}

/// A frame from an unknown identity decodes but is not routed to anyone.
#[test]
fn foreign_identity_not_published() {
    let registry = default_registry();
    let raw = listened_frame(&registry, "someone-else");

    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    controller.add_entity(Box::new(CountingEntity::new(count.clone(), last)));
    let mut controllers = vec![controller];

    let mut scheduler = Scheduler::new();
    let mailbox = scheduler.mailbox();
    mailbox.push(&raw, Duration::ZERO);
    scheduler.listen_tick(Duration::ZERO, &registry, &mut controllers);

    assert_eq!(*count.borrow(), 0);
}

/// OFF timer: armed by `set_timer`, fires exactly at the minute mark,
/// cancellable before it.
#[test]
fn off_timer_fires_at_deadline() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    controller.add_entity(Box::new(CountingEntity::new(count.clone(), last.clone())));

    controller.set_timer(1.0, Duration::ZERO, &registry);
    assert!(controller
        .queued_commands()
        .contains(&(CommandType::Timer, EntityType::Controller, 0)));

    let mut scheduler = Scheduler::new();
    controller.tick(Duration::from_millis(59_999), &mut scheduler, &registry);
    assert_eq!(*count.borrow(), 0);

    controller.tick(Duration::from_millis(60_000), &mut scheduler, &registry);
    assert_eq!(*count.borrow(), 1);
    assert_eq!(last.borrow().map(|g| g.cmd), Some(CommandType::Off));
    assert_eq!(last.borrow().map(|g| g.ent_type), Some(EntityType::All));
}

#[test]
fn off_timer_cancellable() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    controller.add_entity(Box::new(CountingEntity::new(count.clone(), last)));

    controller.set_timer(1.0, Duration::ZERO, &registry);
    controller.cancel_timer();

    let mut scheduler = Scheduler::new();
    controller.tick(Duration::from_millis(60_000), &mut scheduler, &registry);
    assert_eq!(*count.borrow(), 0);
}

/// Inbound publishes must not re-broadcast: entity feedback is only queued
/// when the command is applied on behalf of the user.
#[test]
fn publish_without_apply_suppresses_feedback() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("living", "zhimei - v1"));
    let count = Rc::new(RefCell::new(0));
    let last = Rc::new(RefCell::new(None));
    let mut entity = CountingEntity::new(count.clone(), last);
    entity.feedback = vec![off_cmd()];
    controller.add_entity(Box::new(entity));

    controller.publish(&GenCmd::new(CommandType::Off, EntityType::All), false, Duration::ZERO, &registry);
    assert_eq!(*count.borrow(), 1);
    assert!(controller.queued_commands().is_empty());

    controller.publish(&GenCmd::new(CommandType::Off, EntityType::All), true, Duration::ZERO, &registry);
    assert_eq!(*count.borrow(), 2);
    assert_eq!(
        controller.queued_commands(),
        vec![(CommandType::Off, EntityType::Light, 0)]
    );
}

/// The `All` pseudo-variant broadcasts through every variant of the
/// encoding and accepts a frame from any of them.
#[test]
fn all_variant_selection() {
    let registry = default_registry();
    let mut controller = Controller::new(ControllerConfig::new("strip", "zhimei - All"));
    assert!(controller.enqueue(&on_cmd(), &registry));

    let cont = ControllerParams {
        id: fnv1_hash("strip"),
        index: 0,
        ..Default::default()
    };
    assert!(controller.is_eligible("zhimei - v0", &cont, &registry));
    assert!(controller.is_eligible("zhimei - v2", &cont, &registry));
    assert!(!controller.is_eligible("zhijia - v1", &cont, &registry));
}
