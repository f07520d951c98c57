//! Integration tests for Boks device queries.
//!
//! These tests require a real Boks to be connected.
//! Run with: cargo test -p boks-device --test device_queries -- --ignored --nocapture

use std::time::{Duration, Instant};

use boks_device::{open, HostEnvironment, OpenOptions, ResponseBox, Timeout};

/// Open the autodetected Boks, identified and configured
fn open_boks() -> Box<dyn ResponseBox> {
    let options = OpenOptions {
        read_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    open(&options, HostEnvironment::default()).expect("No Boks found - plug in a device")
}

#[test]
#[ignore] // requires hardware
fn identity_is_reported() {
    let boks = open_boks();
    let info = boks.info().clone();
    println!("firmware {} model {}", info.firmware_version, info.model);
    assert_eq!(info.firmware_version.len(), 5);
    assert!(!info.model.is_empty());
    boks.close().unwrap();
}

#[test]
#[ignore] // requires hardware
fn queries_answer() {
    let mut boks = open_boks();
    let count = boks.button_count().unwrap();
    println!("buttons: {count}");
    assert!(count == 4 || count == 8);

    let selected = boks.get_buttons().unwrap();
    println!("selected: {selected}");
    let state = boks.get_button_state().unwrap();
    println!("held: {state}");
    boks.close().unwrap();
}

/// A short timeout with nobody pressing returns within the timeout
#[test]
#[ignore] // requires hardware
fn press_times_out() {
    let mut boks = open_boks();
    boks.set_timeout(Timeout::Millis(200)).unwrap();
    assert_eq!(boks.get_timeout().unwrap(), 200.0);

    let start = Instant::now();
    let event = boks.get_button_press().unwrap();
    let elapsed = start.elapsed();
    println!("event {event:?} after {elapsed:?}");
    if event.timed_out() {
        assert!(elapsed < Duration::from_secs(2));
    }
    boks.close().unwrap();
}
