mod common;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use gpadc_core::regs::{GPADC_DATA, GPADC_INT_FIFOC, GPADC_TEMP_DATA, GPADC_TPR, THS_TDATA0};
use gpadc_core::variant::{SUN4I_A10, SUN8I_H3};
use gpadc_core::{AutosuspendPoll, GpadcError, GpadcEvent, PowerState};

use common::{attach, fast_config, with_irq_pump};

#[test]
fn block_starts_suspended_and_resumes_once_for_back_to_back_reads() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());
    assert_eq!(device.power_state(), PowerState::Suspended);
    device.bus().clear_writes();

    with_irq_pump(&device, &handles.irq, || {
        block_on(device.read_raw_voltage(0)).expect("first read");
        block_on(device.read_raw_voltage(1)).expect("second read");
    });

    assert_eq!(device.power_state(), PowerState::Resumed);
    assert_eq!(device.power_counters().resumes, 1);
    assert_eq!(device.resume_holds(), 0);

    let writes = device.bus().writes();
    let resume_done = writes
        .iter()
        .position(|(offset, _)| *offset == GPADC_TPR)
        .expect("resume program ran");
    let first_flush = writes
        .iter()
        .position(|(offset, _)| *offset == GPADC_INT_FIFOC)
        .expect("session programmed the fifo");
    assert!(
        resume_done < first_flush,
        "session touched the fifo before the block was resumed"
    );
}

#[test]
fn resume_program_is_idempotent() {
    let (device, _handles) = attach(&SUN4I_A10, fast_config());
    let data = [GPADC_DATA, GPADC_TEMP_DATA];

    block_on(device.runtime_resume()).expect("resume");
    block_on(device.runtime_suspend()).expect("suspend");
    block_on(device.runtime_resume()).expect("resume again");
    let first = device.bus().snapshot(&data);

    block_on(device.runtime_suspend()).expect("suspend");
    block_on(device.runtime_resume()).expect("resume a third time");
    let second = device.bus().snapshot(&data);

    assert_eq!(first, second);
    assert_eq!(device.power_counters().resumes, 3);
    assert_eq!(device.power_counters().suspends, 2);
}

#[test]
fn repeated_suspend_is_a_no_op() {
    let (device, _handles) = attach(&SUN4I_A10, fast_config());

    block_on(device.runtime_suspend()).expect("already suspended");
    block_on(device.runtime_resume()).expect("resume");
    block_on(device.runtime_suspend()).expect("suspend");
    block_on(device.runtime_suspend()).expect("suspend again");

    assert_eq!(device.power_counters().suspends, 1);
    assert_eq!(device.power_state(), PowerState::Suspended);
}

#[test]
fn idle_block_autosuspends_after_delay() {
    let config = fast_config().with_autosuspend_delay(Duration::from_millis(100));
    let (device, handles) = attach(&SUN4I_A10, config);

    with_irq_pump(&device, &handles.irq, || {
        block_on(device.read_raw_voltage(0)).expect("voltage read");
    });

    let now = Instant::now();
    assert!(matches!(
        block_on(device.poll_autosuspend(now)),
        Ok(AutosuspendPoll::Pending(deadline)) if deadline > now
    ));
    assert_eq!(device.power_state(), PowerState::Resumed);

    thread::sleep(StdDuration::from_millis(150));
    assert_eq!(
        block_on(device.poll_autosuspend(Instant::now())),
        Ok(AutosuspendPoll::Suspended)
    );
    assert_eq!(device.power_state(), PowerState::Suspended);
    assert_eq!(device.bus().get(GPADC_TPR), 0);
    assert_eq!(
        block_on(device.poll_autosuspend(Instant::now())),
        Ok(AutosuspendPoll::NotIdle)
    );
}

#[test]
fn autosuspend_worker_suspends_after_last_reader() {
    let (device, handles) = attach(&SUN4I_A10, fast_config());

    with_irq_pump(&device, &handles.irq, || {
        let reader = async {
            device.read_raw_voltage(2).await.expect("voltage read");
            Timer::after(Duration::from_millis(100)).await;
        };
        match block_on(select(device.autosuspend_worker(), reader)) {
            Either::First(never) => never,
            Either::Second(()) => {}
        }
    });

    assert_eq!(device.power_state(), PowerState::Suspended);
    let suspended = device.telemetry().with(|recorder| {
        recorder
            .oldest_first()
            .filter(|record| record.event == GpadcEvent::Suspended)
            .count()
    });
    assert_eq!(suspended, 1);
}

#[test]
fn forced_suspend_is_refused_while_a_reader_holds_the_block() {
    let config = fast_config().with_read_timeout(Duration::from_millis(150));
    let (device, handles) = attach(&SUN4I_A10, config);
    handles.irq.0.mute(true);

    thread::scope(|scope| {
        let reader = scope.spawn(|| block_on(device.read_raw_voltage(0)));
        while device.resume_holds() == 0 {
            thread::yield_now();
        }
        assert_eq!(block_on(device.runtime_suspend()), Err(GpadcError::Busy));
        assert_eq!(reader.join().expect("reader thread"), Err(GpadcError::Timeout));
    });

    assert_eq!(device.resume_holds(), 0);
    block_on(device.runtime_suspend()).expect("idle block suspends");
    assert_eq!(device.power_state(), PowerState::Suspended);
}

#[test]
fn suspend_gates_clocks_and_resume_restores_them() {
    let (device, handles) = attach(&SUN8I_H3, fast_config());
    device.bus().set(THS_TDATA0, 1500);
    assert!(handles.module_clock.0.enabled.load(Ordering::SeqCst));
    assert_eq!(
        handles.module_clock.0.rate.load(Ordering::SeqCst),
        device.config().module_clock_hz()
    );

    block_on(device.read_temperature_raw(0)).expect("first read");
    block_on(device.runtime_suspend()).expect("suspend");
    assert!(!handles.bus_clock.0.enabled.load(Ordering::SeqCst));
    assert!(!handles.module_clock.0.enabled.load(Ordering::SeqCst));

    block_on(device.read_temperature_raw(0)).expect("read after suspend");
    assert!(handles.bus_clock.0.enabled.load(Ordering::SeqCst));
    assert!(handles.module_clock.0.enabled.load(Ordering::SeqCst));
    assert_eq!(handles.module_clock.0.enables.load(Ordering::SeqCst), 2);
    assert_eq!(device.power_counters().resumes, 2);
}

#[test]
fn failed_resume_releases_the_hold() {
    let (device, _handles) = attach(&SUN4I_A10, fast_config());
    device.bus().fail_writes_at(Some(GPADC_TPR));

    let result = block_on(device.read_raw_voltage(0));

    assert!(matches!(result, Err(GpadcError::Io(err)) if err.offset == GPADC_TPR));
    assert_eq!(device.resume_holds(), 0);
    assert_eq!(device.power_state(), PowerState::Suspended);
}
