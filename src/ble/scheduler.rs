//! Multi-rate notification scheduler.
//!
//! One min-heap of (deadline, timer) entries drives the three notification
//! streams: Indoor Bike Data at 4 Hz, RSC at 2 Hz, and CPS adaptively at one
//! notification per crank revolution capped at 4 Hz. The scheduler is a pure
//! state machine polled with explicit instants; the async driver that sleeps
//! between deadlines lives with the binary.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Indoor Bike Data notification period.
const FTMS_PERIOD: Duration = Duration::from_millis(250);
/// RSC Measurement notification period.
const RSC_PERIOD: Duration = Duration::from_millis(500);
/// CPS fallback period (also the floor of the adaptive period).
const CPS_MIN_PERIOD_S: f64 = 0.25;

/// The three notification streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    Ftms,
    Cps,
    Rsc,
}

/// Callbacks the scheduler drives.
///
/// `current_cadence` is queried fresh after every CPS tick so the CPS rate
/// tracks the rider; all callbacks run on the caller's thread.
pub trait SchedulerDelegate {
    fn on_ftms_tick(&mut self);
    fn on_cps_tick(&mut self);
    fn on_rsc_tick(&mut self);
    fn current_cadence(&self) -> f64;
}

/// Deadline-ordered timer set. Dropping it cancels everything.
#[derive(Debug, Default)]
pub struct NotificationScheduler {
    heap: BinaryHeap<Reverse<(Instant, TimerKind)>>,
    running: bool,
}

impl NotificationScheduler {
    /// Idle scheduler; nothing fires until [`start`](Self::start).
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm all three timers. Idempotent: a second start is a no-op.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.heap.push(Reverse((now + FTMS_PERIOD, TimerKind::Ftms)));
        self.heap.push(Reverse((now + RSC_PERIOD, TimerKind::Rsc)));
        self.heap.push(Reverse((
            now + Duration::from_secs_f64(CPS_MIN_PERIOD_S),
            TimerKind::Cps,
        )));
    }

    /// Cancel and clear all timers.
    pub fn stop(&mut self) {
        self.running = false;
        self.heap.clear();
    }

    /// True between start and stop.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Fire every timer due at `now`, invoking the delegate for each.
    ///
    /// FTMS and RSC reschedule at their fixed periods anchored to the
    /// previous deadline (no drift). The CPS timer is one-shot: after its
    /// callback the delegate's cadence decides the next interval, one
    /// notification per crank revolution but never faster than 4 Hz.
    pub fn poll(&mut self, now: Instant, delegate: &mut dyn SchedulerDelegate) {
        while let Some(Reverse((deadline, timer))) = self.heap.peek().copied() {
            if deadline > now || !self.running {
                break;
            }
            self.heap.pop();
            match timer {
                TimerKind::Ftms => {
                    delegate.on_ftms_tick();
                    self.heap.push(Reverse((deadline + FTMS_PERIOD, TimerKind::Ftms)));
                }
                TimerKind::Rsc => {
                    delegate.on_rsc_tick();
                    self.heap.push(Reverse((deadline + RSC_PERIOD, TimerKind::Rsc)));
                }
                TimerKind::Cps => {
                    delegate.on_cps_tick();
                    let cadence = delegate.current_cadence();
                    let period_s = if cadence > 0.0 {
                        (60.0 / cadence).max(CPS_MIN_PERIOD_S)
                    } else {
                        CPS_MIN_PERIOD_S
                    };
                    self.heap.push(Reverse((
                        deadline + Duration::from_secs_f64(period_s),
                        TimerKind::Cps,
                    )));
                }
            }
        }
    }
}
