//! Session lifecycle state machine.
//!
//! ```text
//!   Init ──load──> Loading ──(content ready)──> Ready ──play──> Running
//!                                                                  │
//!   Finished <──(unload complete)── Unloading <──────finalize───────┘
//! ```
//!
//! Triggers fired from the wrong state are ignored, never reported as
//! errors. Callers that care compare [`StateMachine::state`] before and
//! after.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coarse phase of a session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Init,
    Loading,
    Ready,
    Running,
    Unloading,
    Finished,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 6] = [
        LifecycleState::Init,
        LifecycleState::Loading,
        LifecycleState::Ready,
        LifecycleState::Running,
        LifecycleState::Unloading,
        LifecycleState::Finished,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Init => "init",
            LifecycleState::Loading => "loading",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::Unloading => "unloading",
            LifecycleState::Finished => "finished",
        }
    }

    /// No transition leaves this state.
    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Finished
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event that may move the lifecycle along one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Load,
    /// Internal: the content pipeline settled.
    LoadComplete,
    Play,
    Finalize,
    /// Internal: the registry has been cleared.
    UnloadComplete,
}

impl Trigger {
    pub const ALL: [Trigger; 5] = [
        Trigger::Load,
        Trigger::LoadComplete,
        Trigger::Play,
        Trigger::Finalize,
        Trigger::UnloadComplete,
    ];

    /// The single edge this trigger may take, as `(from, to)`.
    pub fn edge(self) -> (LifecycleState, LifecycleState) {
        use LifecycleState::*;
        match self {
            Trigger::Load => (Init, Loading),
            Trigger::LoadComplete => (Loading, Ready),
            Trigger::Play => (Ready, Running),
            Trigger::Finalize => (Running, Unloading),
            Trigger::UnloadComplete => (Unloading, Finished),
        }
    }
}

/// Current state plus the transition table.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: LifecycleState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.current
    }

    /// Whether some trigger leads from the current state to `target`.
    pub fn permits(&self, target: LifecycleState) -> bool {
        Trigger::ALL
            .iter()
            .any(|trigger| trigger.edge() == (self.current, target))
    }

    /// Moves to `target` if the table has that edge; otherwise leaves the
    /// state alone. Returns the state after the call.
    pub fn set_state(&mut self, target: LifecycleState) -> LifecycleState {
        if self.permits(target) {
            self.current = target;
        } else {
            debug!(from = %self.current, to = %target, "transition not in table, ignored");
        }
        self.current
    }

    /// Fires `trigger`. Returns the edge taken, or `None` if the trigger is
    /// not legal from the current state.
    pub fn fire(&mut self, trigger: Trigger) -> Option<(LifecycleState, LifecycleState)> {
        let (from, to) = trigger.edge();
        if self.current != from {
            debug!(?trigger, state = %self.current, "trigger ignored");
            return None;
        }
        self.current = to;
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(state: LifecycleState) -> StateMachine {
        StateMachine { current: state }
    }

    #[test]
    fn starts_in_init() {
        assert_eq!(StateMachine::new().state(), LifecycleState::Init);
    }

    #[test]
    fn walks_the_whole_lifecycle() {
        let mut machine = StateMachine::new();
        for trigger in Trigger::ALL {
            let (from, to) = trigger.edge();
            assert_eq!(machine.fire(trigger), Some((from, to)));
            assert_eq!(machine.state(), to);
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn illegal_triggers_leave_the_state_unchanged() {
        for state in LifecycleState::ALL {
            for trigger in Trigger::ALL {
                if trigger.edge().0 == state {
                    continue;
                }
                let mut machine = machine_in(state);
                assert_eq!(machine.fire(trigger), None);
                assert_eq!(machine.state(), state, "{trigger:?} from {state}");
            }
        }
    }

    #[test]
    fn set_state_only_follows_table_edges() {
        for from in LifecycleState::ALL {
            for to in LifecycleState::ALL {
                let mut machine = machine_in(from);
                let legal = Trigger::ALL.iter().any(|t| t.edge() == (from, to));
                let expected = if legal { to } else { from };
                assert_eq!(machine.set_state(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn nothing_leaves_finished() {
        let machine = machine_in(LifecycleState::Finished);
        for target in LifecycleState::ALL {
            assert!(!machine.permits(target));
        }
    }

    #[test]
    fn repeated_load_is_a_no_op() {
        let mut machine = StateMachine::new();
        assert!(machine.fire(Trigger::Load).is_some());
        assert!(machine.fire(Trigger::Load).is_none());
        assert_eq!(machine.state(), LifecycleState::Loading);
    }
}
