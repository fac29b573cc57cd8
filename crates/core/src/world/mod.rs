//! Collaborators driven once per tick while a session is running.
//!
//! The runtime only decides when these run; what they simulate or draw is
//! entirely up to the host.

/// World simulation, advanced once per tick.
pub trait WorldCollaborator {
    /// `elapsed` and `delta` are in seconds; see [`crate::ClockSample`].
    fn update(&mut self, elapsed: f64, delta: f64);
}

/// Rendering surface, drawn once per tick after the world update.
pub trait DisplayCollaborator {
    fn draw(&mut self);

    /// The viewport changed size; recompute projection and surface size.
    fn refresh(&mut self) {}
}
