use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::timer::{TimerKey, TimerService};

fn wait_for<F: Fn() -> bool>(done: F) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn one_shot_timer_fires_once_off_the_caller_thread() {
    let service = TimerService::start().unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let on_caller = Arc::new(AtomicUsize::new(0));
    let caller = thread::current().id();

    let mut timer = service.timer();
    {
        let fired = Arc::clone(&fired);
        let on_caller = Arc::clone(&on_caller);
        timer.attach(Duration::from_millis(10), false, move || {
            if thread::current().id() == caller {
                on_caller.fetch_add(1, Ordering::SeqCst);
            }
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert!(timer.is_armed());

    wait_for(|| fired.load(Ordering::SeqCst) == 1);
    thread::sleep(Duration::from_millis(40));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(on_caller.load(Ordering::SeqCst), 0);
    assert!(!timer.is_armed());
    assert_eq!(service.active(), 0);
}

#[test]
fn dropping_a_pending_timer_cancels_it() {
    let service = TimerService::start().unwrap();
    let fired = Arc::new(AtomicUsize::new(0));

    {
        let mut timer = service.timer();
        let fired = Arc::clone(&fired);
        timer.attach(Duration::from_millis(30), false, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(service.active(), 1);
    }

    assert_eq!(service.active(), 0);
    thread::sleep(Duration::from_millis(80));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn attach_on_armed_timer_replaces_previous_arming() {
    let service = TimerService::start().unwrap();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let mut timer = service.timer();
    {
        let first = Arc::clone(&first);
        timer.attach(Duration::from_millis(30), false, move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let second = Arc::clone(&second);
        timer.attach(Duration::from_millis(10), false, move || {
            second.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(service.active(), 1);

    wait_for(|| second.load(Ordering::SeqCst) == 1);
    thread::sleep(Duration::from_millis(60));

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn repeating_timer_keeps_firing_until_detached() {
    let service = TimerService::start().unwrap();
    let ticks = Arc::new(AtomicUsize::new(0));

    let mut timer = service.timer();
    {
        let ticks = Arc::clone(&ticks);
        timer.attach(Duration::from_millis(5), true, move || {
            ticks.fetch_add(1, Ordering::SeqCst);
        });
    }

    wait_for(|| ticks.load(Ordering::SeqCst) >= 4);
    assert!(ticks.load(Ordering::SeqCst) >= 4);
    assert!(timer.is_armed());

    timer.detach();
    assert_eq!(service.active(), 0);
    let settled = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    // one callback may already have been in flight when detach ran
    assert!(ticks.load(Ordering::SeqCst) <= settled + 1);
}

#[test]
fn panicking_callback_does_not_kill_the_timer_thread() {
    let service = TimerService::start().unwrap();
    let handle = service.handle();
    let fired = Arc::new(AtomicUsize::new(0));

    handle.arm_detached(Duration::from_millis(1), false, || panic!("timer failure"));
    {
        let fired = Arc::clone(&fired);
        handle.arm_detached(Duration::from_millis(20), false, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    wait_for(|| fired.load(Ordering::SeqCst) == 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn entry_cancelled_by_an_earlier_callback_of_the_same_batch_does_not_fire() {
    let service = TimerService::start().unwrap();
    let handle = service.handle();
    let busy = Arc::new(AtomicUsize::new(0));
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let victim: Arc<Mutex<Option<TimerKey>>> = Arc::default();

    // Hold the timer thread so both entries below fall due together.
    {
        let busy = Arc::clone(&busy);
        handle.arm_detached(Duration::ZERO, false, move || {
            busy.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(60));
        });
    }
    wait_for(|| busy.load(Ordering::SeqCst) == 1);

    {
        let first = Arc::clone(&first);
        let victim = Arc::clone(&victim);
        let canceller = handle.clone();
        handle.arm_detached(Duration::from_millis(1), false, move || {
            first.fetch_add(1, Ordering::SeqCst);
            if let Some(key) = victim.lock().unwrap().take() {
                assert!(canceller.cancel(key));
            }
        });
    }
    {
        let second = Arc::clone(&second);
        let key = handle.arm_detached(Duration::from_millis(1), false, move || {
            second.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock().unwrap() = Some(key);
    }

    wait_for(|| first.load(Ordering::SeqCst) == 1);
    thread::sleep(Duration::from_millis(40));

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
    assert_eq!(service.active(), 0);
}

#[test]
fn stopping_the_service_discards_pending_entries() {
    let service = TimerService::start().unwrap();
    let handle = service.handle();
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = Arc::clone(&fired);
        handle.arm_detached(Duration::from_millis(20), true, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    drop(service);
    thread::sleep(Duration::from_millis(60));

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(handle.active(), 0);
}
