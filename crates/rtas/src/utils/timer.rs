use std::time::{Duration, Instant};

use super::counter::CounterTime;

pub struct TimedResult<T> {
    pub res: T,
    pub elapsed: Duration,
}

pub fn timed_scope<R, F: FnOnce() -> R>(f: F) -> TimedResult<R> {
    let begin = Instant::now();
    let res = f();

    TimedResult {
        res,
        elapsed: begin.elapsed(),
    }
}

/// Runs `f` and logs how long it took at debug level
pub fn timed_scope_log<R, F: FnOnce() -> R>(label: &str, f: F) -> R {
    let TimedResult { res, elapsed } = timed_scope(f);
    log::debug!(target: "scoped timer", "{}: {}", label, format_elapsed(elapsed));
    res
}

pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_millis(1) {
        let micro = elapsed.as_secs_f32() * 1000. * 1000.;
        format!("{micro:.3}µs")
    } else if elapsed < Duration::from_secs(1) {
        let milli = elapsed.as_secs_f32() * 1000.;
        format!("{milli:.3}ms")
    } else if elapsed < Duration::from_secs(60) {
        let s = elapsed.as_secs_f32();
        format!("{s:.3}s")
    } else {
        let secs = elapsed.as_secs();
        let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
        format!("{h}h{m}m{s}s")
    }
}

pub fn timed_scope_accumulate_<R, F: FnOnce() -> R>(timer: &CounterTime, f: F) -> R {
    let TimedResult { res, elapsed } = timed_scope(f);
    timer.add(elapsed);
    res
}

/// Runs the closure, adding its duration to the timer named `$descr` when `counter_time` is enabled
#[macro_export]
macro_rules! timed_scope_accumulate {
    ($descr:literal, $($arg: tt)+) => {
        if cfg!(feature = "counter_time") {
            use $crate::utils::counter::{insert_counter, lazy_static, Counter, CounterTime};
            use $crate::utils::timer::timed_scope_accumulate_;
            lazy_static::lazy_static! {
                static ref COUNTER_REF: std::sync::Arc<Counter> = {
                    insert_counter($descr, Counter::CounterTime(CounterTime::new()))
                };
            }
            if let Counter::CounterTime(c) = &**COUNTER_REF {
                timed_scope_accumulate_(c, $($arg)*)
            } else {
                unreachable!("timer {} registered with another kind", $descr)
            }
        } else {
            #[allow(clippy::redundant_closure_call)]
            ($($arg)+) ()
        }
    };
}

pub use timed_scope_accumulate;
