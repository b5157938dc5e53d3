mod common;

use std::thread;
use std::time::{Duration as StdDuration, Instant as StdInstant};

use embassy_futures::block_on;
use embassy_time::Duration;
use gpadc_core::regs::{GPADC_CTRL1, GPADC_DATA, GPADC_INT_FIFOC, GPADC_TEMP_DATA};
use gpadc_core::variant::{SUN4I_A10, SUN6I_A31, SUN8I_A33};
use gpadc_core::{GpadcError, GpadcEvent, IrqReturn, ReadKind};

use common::{VOLTAGE_BASE, attach, fast_config, with_irq_pump};

#[test]
fn voltage_read_returns_value_for_requested_channel() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());

    with_irq_pump(&device, &handles.irq, || {
        for channel in 0..4 {
            let raw = block_on(device.read_raw_voltage(channel)).expect("voltage read");
            assert_eq!(raw, VOLTAGE_BASE + u32::from(channel));
        }
    });

    assert_eq!(device.last_raw_voltage(), VOLTAGE_BASE + 3);
}

#[test]
fn one_hot_channel_select_is_decoded_per_revision() {
    let (device, handles) = attach(&SUN6I_A31, fast_config());

    let raw = with_irq_pump(&device, &handles.irq, || block_on(device.read_raw_voltage(2)));

    assert_eq!(raw, Ok(VOLTAGE_BASE + 2));
    let ctrl1 = device.bus().get(GPADC_CTRL1);
    assert_eq!(ctrl1 & SUN6I_A31.channel_mask, 0b0100);
    assert_ne!(ctrl1 & SUN6I_A31.tp_adc_select, 0);
}

#[test]
fn concurrent_readers_never_see_another_channel() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());

    with_irq_pump(&device, &handles.irq, || {
        thread::scope(|scope| {
            for channel in 0..4u8 {
                let device = &device;
                scope.spawn(move || {
                    for _ in 0..5 {
                        let raw = block_on(device.read_raw_voltage(channel))
                            .expect("concurrent voltage read");
                        assert_eq!(
                            raw,
                            VOLTAGE_BASE + u32::from(channel),
                            "channel {channel} returned a sample armed for another session"
                        );
                    }
                });
            }
            let device = &device;
            scope.spawn(move || {
                for _ in 0..5 {
                    block_on(device.read_temperature_raw(0)).expect("concurrent temperature read");
                }
            });
        });
    });

    let stats = block_on(device.session_stats());
    assert_eq!(stats.completed, 25);
    assert_eq!(stats.timed_out, 0);
}

#[test]
fn overlapping_sessions_are_serialized() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());

    with_irq_pump(&device, &handles.irq, || {
        thread::scope(|scope| {
            for channel in 0..3u8 {
                let device = &device;
                scope.spawn(move || {
                    for _ in 0..3 {
                        block_on(device.read_raw_voltage(channel)).expect("voltage read");
                    }
                });
            }
        });
    });

    let mut open: Option<ReadKind> = None;
    let mut sessions = 0;
    device.telemetry().with(|recorder| {
        for record in recorder.oldest_first() {
            match record.event {
                GpadcEvent::SessionArmed(kind) => {
                    assert_eq!(open, None, "{kind} armed while another session was open");
                    open = Some(kind);
                }
                GpadcEvent::SessionCompleted(kind) => {
                    assert_eq!(open, Some(kind), "completion for a session that was not open");
                    open = None;
                    sessions += 1;
                }
                _ => {}
            }
        }
    });
    assert_eq!(open, None);
    assert_eq!(sessions, 9);
}

#[test]
fn timeout_releases_lock_and_line_for_next_read() {
    let config = fast_config().with_read_timeout(Duration::from_millis(30));
    let (device, handles) = attach(&SUN4I_A10, config);
    let idle_depth = handles.irq.0.disable_depth();

    handles.irq.0.mute(true);
    let timed_out = with_irq_pump(&device, &handles.irq, || block_on(device.read_raw_voltage(1)));
    assert_eq!(timed_out, Err(GpadcError::Timeout));
    assert_eq!(handles.irq.0.disable_depth(), idle_depth, "line left enabled after timeout");
    assert_eq!(device.resume_holds(), 0);

    handles.irq.0.mute(false);
    let recovered = with_irq_pump(&device, &handles.irq, || block_on(device.read_raw_voltage(1)));
    assert_eq!(recovered, Ok(VOLTAGE_BASE + 1));

    let stats = block_on(device.session_stats());
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.completed, 1);
}

#[test]
fn register_failure_aborts_session_without_enabling_line() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());
    let enables_before = handles.irq.0.enables();

    device.bus().fail_reads_at(Some(GPADC_CTRL1));
    let result = with_irq_pump(&device, &handles.irq, || block_on(device.read_raw_voltage(0)));

    assert!(matches!(result, Err(GpadcError::Io(err)) if err.offset == GPADC_CTRL1));
    assert_eq!(handles.irq.0.enables(), enables_before);
    assert_eq!(device.resume_holds(), 0);

    device.bus().fail_reads_at(None);
    let result = with_irq_pump(&device, &handles.irq, || block_on(device.read_raw_voltage(0)));
    assert_eq!(result, Ok(VOLTAGE_BASE));
}

#[test]
fn armed_interrupt_is_claimed_even_when_data_read_fails() {
    let config = fast_config().with_read_timeout(Duration::from_millis(100));
    let (device, handles) = attach(&SUN4I_A10, config);
    device.bus().fail_reads_at(Some(GPADC_DATA));

    thread::scope(|scope| {
        let reader = scope.spawn(|| block_on(device.read_raw_voltage(1)));

        let deadline = StdInstant::now() + StdDuration::from_secs(2);
        while !handles.irq.0.is_enabled() {
            assert!(StdInstant::now() < deadline, "session never enabled the line");
            thread::yield_now();
        }
        assert_eq!(device.handle_irq(), IrqReturn::Handled);

        let result = reader.join().expect("reader thread");
        assert_eq!(result, Err(GpadcError::Timeout));
    });

    device.bus().fail_reads_at(None);
    assert_eq!(device.handle_irq(), IrqReturn::None, "nothing armed after the timeout");
}

#[test]
fn temperature_session_uses_touchscreen_mode_and_conversion() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());
    device.bus().set(GPADC_TEMP_DATA, 1943);

    let millicelsius = with_irq_pump(&device, &handles.irq, || block_on(device.temperature(0)));

    assert_eq!(millicelsius, Ok(1463));
    assert_eq!(device.bus().get(GPADC_CTRL1), SUN4I_A10.tp_mode_en);
    assert_eq!(device.bus().get(GPADC_INT_FIFOC), ReadKind::Temperature(0).irq_source());
    assert_eq!(device.last_raw_temperature(), 1943);
}

#[test]
fn every_session_rearms_the_interrupt_source() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());

    with_irq_pump(&device, &handles.irq, || {
        block_on(device.read_raw_voltage(2)).expect("first read");
        device.bus().clear_writes();
        block_on(device.read_raw_voltage(2)).expect("second read");
    });

    let rearms = device
        .bus()
        .writes()
        .iter()
        .filter(|(offset, value)| {
            *offset == GPADC_INT_FIFOC && *value == ReadKind::Voltage(2).irq_source()
        })
        .count();
    assert_eq!(rearms, 1);
}

#[test]
fn settle_delays_apply_only_on_channel_or_mode_change() {
    let config = fast_config().with_settle(Duration::from_millis(1), Duration::from_millis(2));
    let (device, handles) = attach(&SUN4I_A10, config);

    with_irq_pump(&device, &handles.irq, || {
        block_on(device.read_raw_voltage(1)).expect("switch into adc mode");
        block_on(device.read_raw_voltage(1)).expect("same channel");
        block_on(device.read_raw_voltage(2)).expect("channel switch");
        block_on(device.read_temperature_raw(0)).expect("switch to touchscreen mode");
    });

    let stats = block_on(device.session_stats());
    assert_eq!(stats.channel_switches, 2);
    assert_eq!(stats.mode_switches, 2);
}

#[test]
fn invalid_requests_are_rejected_before_touching_hardware() {
    let (device, _handles) = attach(&SUN4I_A10, fast_config());
    device.bus().clear_writes();

    assert_eq!(
        block_on(device.read_raw_voltage(4)),
        Err(GpadcError::InvalidChannel(4))
    );
    assert_eq!(
        block_on(device.read_temperature_raw(1)),
        Err(GpadcError::InvalidSensor(1))
    );
    assert!(device.bus().writes().is_empty());

    let (thermal_only, _handles) = attach(&SUN8I_A33, fast_config());
    assert_eq!(
        block_on(thermal_only.read_raw_voltage(0)),
        Err(GpadcError::Unsupported)
    );
}
