use std::{cell::Cell, rc::Rc, time::Duration};

/// A monotonic source of elapsed time. Implementations must never go backwards.
pub trait TimeSource {
    /// Get the amount of time that has passed since this source was created.
    fn elapsed(&self) -> Duration;
}

/// An opaque value representing a snapshot in time captured from the underlying
/// platform.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
struct Timestamp {
    /// Normal non-wasm time measurement provided by std
    #[cfg(not(target_arch = "wasm32"))]
    instant: std::time::Instant,
    /// JavaScript measures time since January 1, 1970 00:00:00 UTC in
    /// milliseconds.
    #[cfg(target_arch = "wasm32")]
    millis_since_epoch: f64,
}

impl Timestamp {
    fn now() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                Self {
                    millis_since_epoch: js_sys::Date::now()
                }
            } else {
                Self {
                    instant: std::time::Instant::now()
                }
            }
        }
    }
}

impl std::ops::Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Self::Output {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                // Wall clock time can jump backwards on the web.
                Duration::from_secs_f64(
                    ((self.millis_since_epoch - rhs.millis_since_epoch) / 1000.0).max(0.0),
                )
            } else {
                self.instant - rhs.instant
            }
        }
    }
}

/// Measures real time elapsed using the platform clock.
#[derive(Debug)]
pub struct SystemTimeSource {
    start: Timestamp,
    /// The largest value returned so far, used to keep the source monotonic.
    high_water: Cell<Duration>,
}

impl SystemTimeSource {
    /// Start measuring time from now.
    pub fn new() -> Self {
        Self {
            start: Timestamp::now(),
            high_water: Cell::new(Duration::ZERO),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn elapsed(&self) -> Duration {
        let elapsed = (Timestamp::now() - self.start).max(self.high_water.get());
        self.high_water.set(elapsed);
        elapsed
    }
}

/// A time source that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualTimeSource {
    elapsed: Rc<Cell<Duration>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Default::default()
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.elapsed.set(self.elapsed.get() + delta);
    }
}

impl TimeSource for ManualTimeSource {
    fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}
