//! Initialize / deinitialize cycles against the mock radio.

use std::thread;
use std::time::Duration;

use ieee802154_transceiver::radio::RadioOp;
use ieee802154_transceiver::{Error, State, Transceiver, TransceiverConfig};

use crate::mock_radio::{Call, MockRadio, data_frame};

fn transceiver() -> Transceiver<MockRadio> {
    Transceiver::new(MockRadio::new(), TransceiverConfig::default())
}

#[test]
fn init_deinit_cycles_across_the_band() {
    let mut t = transceiver();
    for channel in 11..=26u8 {
        t.radio().clear_calls();
        t.initialize(channel).unwrap();
        assert_eq!(t.state(), State::Listening);
        assert_eq!(t.channel().map(|c| c.get()), Some(channel));
        assert!(t.radio().is_attached());

        t.deinitialize().unwrap();
        assert_eq!(t.state(), State::Disabled);
        assert_eq!(t.channel(), None);
        assert!(!t.radio().is_attached());
        assert_eq!(t.radio().calls().last(), Some(&Call::Disable));
    }
}

#[test]
fn bring_up_applies_configured_modes() {
    let config = TransceiverConfig {
        promiscuous: false,
        coordinator: true,
        rx_when_idle: false,
        ..TransceiverConfig::default()
    };
    let mut t = Transceiver::new(MockRadio::new(), config);
    t.initialize(20).unwrap();
    assert_eq!(t.radio().calls(), vec![
        Call::Enable,
        Call::SetCoordinator(true),
        Call::SetPromiscuous(false),
        Call::SetRxWhenIdle(false),
        Call::SetChannel(20),
        Call::Receive,
    ]);
    t.deinitialize().unwrap();
}

#[test]
fn out_of_band_channels_touch_nothing() {
    for channel in [0u8, 10, 27, 255] {
        let mut t = transceiver();
        assert!(matches!(t.initialize(channel), Err(Error::InvalidArgument(_))));
        assert!(t.radio().calls().is_empty(), "channel {channel} reached the radio");
        assert_eq!(t.state(), State::Uninitialized);
    }
}

#[test]
fn invalid_config_is_rejected_before_bring_up() {
    let config = TransceiverConfig {
        rx_poll_interval_ms: 0,
        ..TransceiverConfig::default()
    };
    let mut t = Transceiver::new(MockRadio::new(), config);
    assert!(matches!(t.initialize(11), Err(Error::InvalidArgument(_))));
    assert!(t.radio().calls().is_empty());
}

#[test]
fn enable_failure_never_disables() {
    let mut t = transceiver();
    t.radio().fail(RadioOp::Enable, 0x103);
    assert_eq!(
        t.initialize(11),
        Err(Error::HardwareRejected {
            op: RadioOp::Enable,
            code: 0x103
        })
    );
    assert_eq!(t.radio().calls(), vec![Call::Enable]);
    assert_eq!(t.state(), State::Uninitialized);
}

#[test]
fn receive_failure_rolls_back_everything() {
    let mut t = transceiver();
    t.radio().fail(RadioOp::Receive, -1);
    assert!(matches!(
        t.initialize(11),
        Err(Error::HardwareRejected {
            op: RadioOp::Receive,
            ..
        })
    ));
    assert!(!t.radio().is_attached());
    assert_eq!(t.radio().calls().last(), Some(&Call::Disable));
    assert_eq!(t.channel(), None);

    // Recovers once the radio behaves.
    t.radio().heal();
    t.initialize(11).unwrap();
    assert_eq!(t.state(), State::Listening);
    t.deinitialize().unwrap();
}

#[test]
fn disable_failure_is_reported_and_retried() {
    let mut t = transceiver();
    t.initialize(11).unwrap();
    t.radio().fail(RadioOp::Disable, -7);
    assert!(matches!(t.deinitialize(), Err(Error::HardwareRejected { .. })));
    assert!(!t.radio().is_attached());

    t.radio().heal();
    t.radio().clear_calls();
    t.deinitialize().unwrap();
    assert_eq!(t.radio().calls().last(), Some(&Call::Disable));

    // Nothing left to release.
    t.radio().clear_calls();
    t.deinitialize().unwrap();
    assert!(t.radio().calls().is_empty());
}

#[test]
fn frames_after_deinitialize_are_released_not_queued() {
    let mut t = transceiver();
    t.initialize(11).unwrap();
    let sink = t.interrupt_sink();
    t.deinitialize().unwrap();

    // A late interrupt through a stale sink reference.
    let raw = crate::mock_radio::encode(&data_frame(1, b"late"));
    sink.receive_done(&raw, &Default::default());
    assert_eq!(t.radio().released(), 1);
    assert_eq!(t.relay_stats().dropped, 1);
    assert_eq!(t.relay_stats().received, 0);
}

#[test]
fn operations_before_initialize_are_rejected() {
    let t = transceiver();
    let frame = data_frame(1, b"x");
    assert_eq!(t.transmit(&frame), Err(Error::InvalidState(State::Uninitialized)));
    assert_eq!(t.set_channel(15), Err(Error::InvalidState(State::Uninitialized)));
    assert_eq!(t.resume_listening(), Err(Error::InvalidState(State::Uninitialized)));
    assert!(t.radio().calls().is_empty());
}

#[test]
fn dropping_the_transceiver_shuts_it_down() {
    let mut t = transceiver();
    t.initialize(11).unwrap();
    let handle = t.handle();
    drop(t);
    assert_eq!(handle.state(), State::Disabled);
    assert_eq!(handle.channel(), None);
}

fn wait_for_call(t: &Transceiver<MockRadio>, call: &Call) {
    while !t.radio().calls().contains(call) {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn deinitialize_waits_for_a_retune_in_progress() {
    let mut t = transceiver();
    t.initialize(11).unwrap();
    t.radio().slow_set_channel(Duration::from_millis(100));

    let handle = t.handle();
    let retune = thread::spawn(move || handle.set_channel(12));
    wait_for_call(&t, &Call::SetChannel(12));
    t.deinitialize().unwrap();

    assert_eq!(retune.join().unwrap(), Ok(()));
    assert_eq!(t.state(), State::Disabled);
    assert_eq!(t.radio().calls().last(), Some(&Call::Disable));

    t.radio().slow_set_channel(Duration::ZERO);
    t.initialize(13).unwrap();
    assert_eq!(t.state(), State::Listening);
    assert_eq!(t.channel().map(|c| c.get()), Some(13));
    t.deinitialize().unwrap();
}

#[test]
fn deinitialize_waits_for_a_transmit_in_progress() {
    let mut t = transceiver();
    t.initialize(11).unwrap();
    t.radio().slow_set_channel(Duration::from_millis(100));

    let handle = t.handle();
    let send = thread::spawn(move || handle.transmit_on_channel(&data_frame(1, b"x"), 20));
    wait_for_call(&t, &Call::SetChannel(20));
    t.deinitialize().unwrap();

    assert_eq!(send.join().unwrap(), Ok(()));
    assert_eq!(t.state(), State::Disabled);
    assert_eq!(t.radio().calls().last(), Some(&Call::Disable));
    assert_eq!(
        t.wait_transmit_done(Duration::from_millis(5)),
        Err(Error::InvalidState(State::Disabled))
    );

    t.radio().slow_set_channel(Duration::ZERO);
    t.initialize(11).unwrap();
    assert_eq!(t.state(), State::Listening);
    t.deinitialize().unwrap();
}
