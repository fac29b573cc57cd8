//! Frame scheduling.
//!
//! The platform tells the session when the next frame may be produced; the
//! [`FrameScheduler`] turns those notifications into a controlled loop that
//! can be stopped and restarted.

use std::fmt;

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::events::RuntimeEvent;
use crate::timeline::{Clock, ClockSample};

/// Platform per-frame notification, e.g. a display-refresh callback.
pub trait FrameSource {
    /// Arranges for `waker` to be woken once the next frame is due. It must
    /// eventually be woken unless the host itself is tearing down.
    fn schedule_next(&mut self, waker: FrameWaker);
}

/// One-shot handle that signals the next frame to the session it came from.
#[derive(Debug)]
pub struct FrameWaker {
    sender: Sender<RuntimeEvent>,
    chain: u64,
}

impl FrameWaker {
    pub fn wake(self) {
        // A closed queue means the session is gone; nothing left to wake.
        let _ = self.sender.send(RuntimeEvent::Frame { chain: self.chain });
    }
}

type Tick = Box<dyn FnMut(ClockSample)>;

/// Restartable frame loop over a [`FrameSource`].
///
/// Each `start` opens a new scheduling chain; wakes that belong to an older
/// chain, or arrive after `stop`, are ignored. At most one chain is live at
/// a time and `tick` is never re-entered.
pub struct FrameScheduler {
    clock: Clock,
    source: Box<dyn FrameSource>,
    sender: Sender<RuntimeEvent>,
    tick: Option<Tick>,
    running: bool,
    chain: u64,
    frames: u64,
}

impl FrameScheduler {
    pub(crate) fn new(
        clock: Clock,
        source: Box<dyn FrameSource>,
        sender: Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            clock,
            source,
            sender,
            tick: None,
            running: false,
            chain: 0,
            frames: 0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Ticks delivered since the last start.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Starts the loop with a fresh clock. Returns `false` without doing
    /// anything if already running.
    pub fn start(&mut self, tick: impl FnMut(ClockSample) + 'static) -> bool {
        if self.running {
            debug!("frame scheduler already running, start ignored");
            return false;
        }

        self.clock.restart();
        self.tick = Some(Box::new(tick));
        self.running = true;
        self.frames = 0;
        self.chain += 1;
        debug!(chain = self.chain, "frame scheduler started");

        self.schedule_next();
        true
    }

    /// Stops the loop. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }

        self.clock.stop();
        self.running = false;
        self.tick = None;
        debug!(chain = self.chain, frames = self.frames, "frame scheduler stopped");
        true
    }

    /// Runs one loop step for a wake on `chain`. Returns whether a tick was
    /// delivered.
    pub(crate) fn on_frame(&mut self, chain: u64) -> bool {
        if !self.running || chain != self.chain {
            debug!(chain, current = self.chain, "ignoring stale frame wake");
            return false;
        }

        let sample = self.clock.sample();
        if let Some(tick) = self.tick.as_mut() {
            trace!(elapsed = sample.elapsed, delta = sample.delta, "tick");
            tick(sample);
        }
        self.frames += 1;

        self.schedule_next();
        true
    }

    fn schedule_next(&mut self) {
        let waker = FrameWaker {
            sender: self.sender.clone(),
            chain: self.chain,
        };
        self.source.schedule_next(waker);
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("running", &self.running)
            .field("chain", &self.chain)
            .field("frames", &self.frames)
            .field("clock", &self.clock)
            .finish()
    }
}
