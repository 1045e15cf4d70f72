use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

pub enum Counter {
    CounterU64(CounterU64),
    CounterTime(CounterTime),
}

impl Counter {
    pub fn format(&self) -> String {
        match self {
            Counter::CounterU64(a) => a.value().to_string(),
            Counter::CounterTime(a) => super::timer::format_elapsed(a.value()),
        }
    }
}

#[derive(Default)]
pub struct CounterU64 {
    atomic: AtomicU64,
}

impl CounterU64 {
    pub const fn new() -> Self {
        Self {
            atomic: AtomicU64::new(0),
        }
    }
    pub fn add(&self, n: u64) {
        // Additions commute, no ordering needed
        self.atomic.fetch_add(n, Ordering::Relaxed);
    }
    pub fn value(&self) -> u64 {
        self.atomic.load(Ordering::Acquire)
    }
}

#[derive(Default)]
pub struct CounterTime {
    nanos: AtomicU64,
}

impl CounterTime {
    pub const fn new() -> Self {
        Self {
            nanos: AtomicU64::new(0),
        }
    }
    pub fn add(&self, dur: std::time::Duration) {
        self.nanos
            .fetch_add(dur.as_nanos() as u64, Ordering::Relaxed);
    }
    pub fn value(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

lazy_static::lazy_static! {
    pub static ref __COUNTERS: Mutex<BTreeMap<&'static str, Arc<Counter>>> = Mutex::new(BTreeMap::new());
}

// A worker panicking while holding the lock must not take the report down with it
fn counters() -> MutexGuard<'static, BTreeMap<&'static str, Arc<Counter>>> {
    __COUNTERS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logs every registered counter, sorted by name
pub fn report_counters() {
    for (counter_name, counter) in counters().iter() {
        log::info!(target: "counter_report", "{}: {}", counter_name, counter.format())
    }
}

/// Current value of a u64 counter, None if it was never hit
pub fn counter_value(descr: &str) -> Option<u64> {
    match counters().get(descr).map(|c| &**c) {
        Some(Counter::CounterU64(c)) => Some(c.value()),
        _ => None,
    }
}

pub fn insert_counter(descr: &'static str, counter: Counter) -> Arc<Counter> {
    counters().entry(descr).or_insert_with(|| Arc::new(counter)).clone()
}

/// Increments the counter named `$descr`, by `$n` if given
#[macro_export]
macro_rules! counter {
    ($descr:literal) => {
        $crate::counter!($descr, 1)
    };
    ($descr:literal, $n:expr) => {
        if cfg!(feature = "counter") {
            use $crate::utils::counter::{insert_counter, lazy_static, Counter, CounterU64};
            lazy_static::lazy_static! {
                static ref COUNTER_REF: std::sync::Arc<Counter> = {
                    insert_counter($descr, Counter::CounterU64(CounterU64::new()))
                };
            }

            if let Counter::CounterU64(c) = &**COUNTER_REF {
                c.add($n as u64);
            } else {
                unreachable!("counter {} registered with another kind", $descr)
            };
        };
    };
}

pub use counter;
// Reexport for ease of use
pub use lazy_static;

#[cfg(all(test, feature = "counter"))]
mod tests {
    use super::counter_value;

    #[test]
    fn counts() {
        for _ in 0..3 {
            counter!("test counter");
        }
        counter!("test counter", 4);
        assert_eq!(counter_value("test counter"), Some(7));
        assert_eq!(counter_value("never hit"), None);
    }
}
