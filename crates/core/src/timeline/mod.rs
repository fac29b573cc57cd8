use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time reading, measured from an arbitrary fixed origin.
pub trait TimeSource {
    fn now(&self) -> Duration;
}

/// [`TimeSource`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }
}

/// Hand-driven [`TimeSource`]. Clones share the same reading, so a test or a
/// replay can keep one handle and give the other to a [`Clock`].
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Rc<Cell<Duration>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds));
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Timing handed to every tick, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockSample {
    /// Time accumulated while running since the last reset. Never decreases.
    pub elapsed: f64,
    /// Time since the previous sample; `0.0` on the first sample after a start.
    pub delta: f64,
}

/// Pausable monotonic clock.
///
/// Elapsed time only accumulates between samples taken while running, and
/// the first sample after a start anchors the clock, so paused time never
/// shows up as a delta. Only [`Clock::reset`] (or [`Clock::restart`]) brings
/// elapsed back to zero.
pub struct Clock {
    source: Box<dyn TimeSource>,
    running: bool,
    elapsed: Duration,
    last: Option<Duration>,
}

impl Clock {
    pub fn new(source: impl TimeSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            running: false,
            elapsed: Duration::ZERO,
            last: None,
        }
    }

    /// Clock reading real monotonic time.
    pub fn monotonic() -> Self {
        Self::new(MonotonicTime::new())
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Resumes the clock without touching accumulated time.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last = None;
        }
    }

    /// Freezes accumulated time.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.last = None;
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.last = None;
    }

    pub fn restart(&mut self) {
        self.reset();
        self.running = true;
    }

    /// Last accumulated elapsed time, without sampling.
    pub fn elapsed(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Takes a sample. A stopped clock reports its frozen elapsed time and
    /// a zero delta.
    pub fn sample(&mut self) -> ClockSample {
        if !self.running {
            return ClockSample {
                elapsed: self.elapsed.as_secs_f64(),
                delta: 0.0,
            };
        }

        let now = self.source.now();
        let delta = match self.last {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        self.elapsed += delta;

        ClockSample {
            elapsed: self.elapsed.as_secs_f64(),
            delta: delta.as_secs_f64(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::monotonic()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("running", &self.running)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}
