//! Embassy tick source under the embassy-time mock driver
//!
//! The mock driver is process-global, so everything that advances it lives
//! in one test.

use bsp_core::{EmbassyTicks, TickSource, TimerId, TimerWheel};
use embassy_time::{Duration, MockDriver};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Job {
    Blink,
}

#[test]
fn test_embassy_ticks_drive_the_wheel() {
    println!("\n=== TimerWheel on EmbassyTicks ===");
    let driver = MockDriver::get();
    let base = EmbassyTicks.now_ms();

    driver.advance(Duration::from_millis(42));
    assert_eq!(EmbassyTicks.now_ms() - base, 42);

    let mut wheel: TimerWheel<EmbassyTicks, Job, 2> = TimerWheel::new(EmbassyTicks);
    let blink = wheel.register(Job::Blink).unwrap();
    wheel.start_periodic(blink, 250).unwrap();

    let mut fired = Vec::new();
    for _ in 0..1_000 {
        driver.advance(Duration::from_millis(1));
        wheel.update(&mut |wheel: &mut TimerWheel<EmbassyTicks, Job, 2>, _: TimerId, job: Job| {
            fired.push((job, wheel.now_ms() - base))
        });
    }
    assert_eq!(
        fired,
        [(Job::Blink, 292), (Job::Blink, 542), (Job::Blink, 792), (Job::Blink, 1042)]
    );
    println!("✓ periodic timer followed the embassy clock");
}
