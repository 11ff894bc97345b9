//! Timer wheel driven by simulated clocks

use bsp_core::test_utils::virtual_clock::VirtualClock;
use bsp_core::{start_scan_timer, rearm_scan_timer, TimerId, TimerWheel, SCAN_FIRST_DELAY_MS};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Job {
    Scan,
    Blink,
    Once,
}

proptest! {
    #[test]
    fn prop_self_rearming_timer_never_bursts(period in 1u64..50, step in 1u64..10) {
        let clock = VirtualClock::new();
        let mut wheel: TimerWheel<_, Job, 2> = TimerWheel::new(clock.clone());
        let id = wheel.register(Job::Scan).unwrap();
        wheel.start(id, period).unwrap();

        let mut fired_at = Vec::new();
        let mut handler = |wheel: &mut TimerWheel<VirtualClock, Job, 2>, id: TimerId, _job: Job| {
            fired_at.push(wheel.now_ms());
            wheel.start(id, period).unwrap();
        };
        while clock_now(&clock) < 1_000 {
            clock.advance(step);
            prop_assert!(wheel.update(&mut handler) <= 1);
        }

        // first fire on the first update at or after `period`
        let first = *fired_at.first().unwrap();
        prop_assert!(first >= period && first < period + step);
        for pair in fired_at.windows(2) {
            let gap = pair[1] - pair[0];
            prop_assert!(gap >= period);
            prop_assert!(gap < period + step);
        }
    }
}

fn clock_now(clock: &VirtualClock) -> u64 {
    use bsp_core::TickSource;
    clock.now_ms()
}

#[test]
fn test_slow_handler_delays_the_rest_of_the_scan() {
    println!("\n=== Slow handler inside one update ===");
    let clock = VirtualClock::new();
    let mut wheel: TimerWheel<_, Job, 4> = TimerWheel::new(clock.clone());
    let slow = wheel.register(Job::Once).unwrap();
    let blink = wheel.register(Job::Blink).unwrap();
    wheel.start(slow, 5).unwrap();
    wheel.start_periodic(blink, 6).unwrap();

    let mut seen = Vec::new();
    let handler_clock = clock.clone();
    let mut handler = |wheel: &mut TimerWheel<VirtualClock, Job, 4>, _id: TimerId, job: Job| {
        seen.push((job, wheel.now_ms()));
        if job == Job::Once {
            // 7 ms of work inside the callback
            handler_clock.advance(7);
        }
    };

    clock.set(6);
    assert_eq!(wheel.update(&mut handler), 2);
    assert_eq!(seen, [(Job::Once, 6), (Job::Blink, 13)]);
    // periodic re-arm is relative to the scan start, so it is already late
    assert_eq!(wheel.remaining_ms(blink), Some(0));
    println!("✓ handlers ran in deadline order, second one 7 ms late");
}

#[test]
fn test_install_replaces_tick_source() {
    let first = VirtualClock::new();
    let mut wheel: TimerWheel<_, Job, 1> = TimerWheel::new(first.clone());
    let id = wheel.register(Job::Once).unwrap();
    wheel.start(id, 100).unwrap();

    let second = VirtualClock::new();
    second.set(99);
    wheel.install(second.clone());
    assert_eq!(wheel.remaining_ms(id), Some(1));

    let mut fired = 0;
    let mut handler = |_: &mut TimerWheel<VirtualClock, Job, 1>, _: TimerId, _: Job| fired += 1;
    second.advance(1);
    wheel.update(&mut handler);
    assert_eq!(fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooperative_loop_on_tokio_clock() {
    println!("\n=== Cooperative 1 ms loop on a paused tokio clock ===");
    let start = tokio::time::Instant::now();
    let tick = move || start.elapsed().as_millis() as u64;
    let mut wheel: TimerWheel<_, Job, 4> = TimerWheel::new(tick);

    let scan = start_scan_timer(&mut wheel, Job::Scan).unwrap();
    let blink = wheel.register(Job::Blink).unwrap();
    wheel.start_periodic(blink, 100).unwrap();

    let mut scans = Vec::new();
    let mut blinks = 0;
    for _ in 0..500 {
        tokio::time::advance(Duration::from_millis(1)).await;
        wheel.update(&mut |wheel: &mut TimerWheel<_, Job, 4>, id: TimerId, job: Job| match job {
            Job::Scan => {
                scans.push(wheel.now_ms());
                rearm_scan_timer(wheel, id).unwrap();
            }
            Job::Blink => blinks += 1,
            Job::Once => {}
        });
    }

    assert_eq!(scans.first(), Some(&SCAN_FIRST_DELAY_MS));
    assert!(scans.windows(2).all(|pair| pair[1] - pair[0] == 5));
    assert_eq!(scans.len(), 99);
    assert_eq!(blinks, 5);
    assert!(wheel.is_active(scan));
    println!("✓ {} scans, {} blinks in 500 ms", scans.len(), blinks);
}

#[tokio::test(start_paused = true)]
async fn test_idle_sleep_until_next_expiry() {
    let start = tokio::time::Instant::now();
    let mut wheel: TimerWheel<_, Job, 2> = TimerWheel::new(move || start.elapsed().as_millis() as u64);
    let once = wheel.register(Job::Once).unwrap();
    wheel.start(once, 250).unwrap();

    let mut fired = Vec::new();
    while let Some(wait) = wheel.next_expiry_in() {
        tokio::time::sleep(Duration::from_millis(wait)).await;
        wheel.update(&mut |wheel: &mut TimerWheel<_, Job, 2>, _: TimerId, job: Job| {
            fired.push((job, wheel.now_ms()))
        });
    }
    assert_eq!(fired, [(Job::Once, 250)]);
}
