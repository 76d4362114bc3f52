//! AD-structure parsing and construction.

use ble_adv::frame::{Frame, AD_TYPE_MANUFACTURER};

#[test]
fn from_raw_locates_flag_and_data() {
    // 02 01 06 | 04 FF AA BB CC
    let raw = [0x02, 0x01, 0x06, 0x04, 0xFF, 0xAA, 0xBB, 0xCC];
    let frame = Frame::from_raw(&raw);

    assert!(frame.has_ad_flag());
    assert_eq!(frame.ad_flag(), 0x06);
    assert!(frame.has_data());
    assert_eq!(frame.data_type(), 0xFF);
    assert_eq!(frame.data_len(), 3);
    assert_eq!(frame.data(), &[0xAA, 0xBB, 0xCC]);
}

#[test]
fn from_raw_tolerates_malformed_input() {
    // sub-structure length pointing outside of the buffer
    let raw = [0x1F, 0xFF, 0x01];
    let frame = Frame::from_raw(&raw);
    assert!(!frame.has_data());
    assert!(!frame.has_ad_flag());

    let frame = Frame::from_raw(&[]);
    assert!(!frame.has_data());
}

#[test]
fn from_raw_skips_unknown_structures() {
    // 02 0A 00 (tx power, ignored) | 03 16 12 34 (service data)
    let raw = [0x02, 0x0A, 0x00, 0x03, 0x16, 0x12, 0x34];
    let frame = Frame::from_raw(&raw);
    assert!(!frame.has_ad_flag());
    assert_eq!(frame.data_type(), 0x16);
    assert_eq!(frame.data(), &[0x12, 0x34]);
}

#[test]
fn from_hex_strips_decorations() {
    let frame = Frame::from_hex("0x02.01.06 04 FF AA BB CC (captured)").expect("valid hex");
    assert_eq!(frame.bytes(), &[0x02, 0x01, 0x06, 0x04, 0xFF, 0xAA, 0xBB, 0xCC]);
    assert!(frame.has_data());

    assert!(Frame::from_hex("zz not hex").is_none());
}

#[test]
fn built_frame_reparses_identically() {
    let mut frame = Frame::with_ble_param(0x06, AD_TYPE_MANUFACTURER);
    let body = [0xDE, 0xAD, 0xBE, 0xEF];
    frame.data_mut()[..body.len()].copy_from_slice(&body);
    frame.set_data_len(body.len());

    assert_eq!(frame.len(), 3 + 2 + body.len());
    let reparsed = Frame::from_raw(frame.bytes());
    assert_eq!(reparsed.ad_flag(), 0x06);
    assert_eq!(reparsed.data(), &body);
    assert!(frame.is_data_equal(&reparsed));
}

#[test]
fn built_frame_without_flag() {
    let mut frame = Frame::with_ble_param(0x00, AD_TYPE_MANUFACTURER);
    frame.data_mut()[..2].copy_from_slice(&[0x11, 0x22]);
    frame.set_data_len(2);

    assert!(!frame.has_ad_flag());
    assert_eq!(frame.len(), 4);
    assert_eq!(frame.bytes(), &[0x03, 0xFF, 0x11, 0x22]);
}

#[test]
fn data_equality_ignores_ad_flag() {
    let a = Frame::from_raw(&[0x02, 0x01, 0x06, 0x03, 0xFF, 0xAA, 0xBB]);
    let b = Frame::from_raw(&[0x02, 0x01, 0x1A, 0x03, 0xFF, 0xAA, 0xBB]);
    assert_ne!(a, b);
    assert!(a.is_data_equal(&b));

    let c = Frame::from_raw(&[0x02, 0x01, 0x06, 0x03, 0xFF, 0xAA, 0xCC]);
    assert!(!a.is_data_equal(&c));
}
