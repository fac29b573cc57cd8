//! Session event queue.
//!
//! Load completions and frame wakes may be produced anywhere (inline in a
//! loader, on a worker thread, from a platform timer), but they are all
//! funnelled through one queue and handled one at a time on the thread that
//! owns the session.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::pipeline::Completion;

/// Something the session must react to.
#[derive(Debug)]
pub(crate) enum RuntimeEvent {
    /// A load request resolved.
    Content(Completion),
    /// The platform signalled the next frame for the given scheduling chain.
    Frame { chain: u64 },
}

#[derive(Debug)]
pub(crate) struct EventQueue {
    sender: Sender<RuntimeEvent>,
    receiver: Receiver<RuntimeEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<RuntimeEvent> {
        self.sender.clone()
    }

    /// Takes every event queued so far. Events posted while the returned
    /// batch is being handled wait for the next drain.
    pub fn drain(&self) -> Vec<RuntimeEvent> {
        self.receiver.try_iter().collect()
    }

    /// Blocks up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<RuntimeEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            // The queue keeps its own sender alive, so disconnection cannot
            // happen while it exists.
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_events_in_post_order() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        sender.send(RuntimeEvent::Frame { chain: 1 }).unwrap();
        sender.send(RuntimeEvent::Frame { chain: 2 }).unwrap();

        let chains: Vec<u64> = queue
            .drain()
            .into_iter()
            .map(|event| match event {
                RuntimeEvent::Frame { chain } => chain,
                RuntimeEvent::Content(_) => unreachable!(),
            })
            .collect();
        assert_eq!(chains, [1, 2]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn wait_times_out_on_an_empty_queue() {
        let queue = EventQueue::new();
        assert!(queue.wait(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn events_can_be_posted_from_another_thread() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.send(RuntimeEvent::Frame { chain: 7 }).unwrap();
        })
        .join()
        .unwrap();

        assert!(matches!(
            queue.wait(Duration::from_secs(1)),
            Some(RuntimeEvent::Frame { chain: 7 })
        ));
    }
}
