//! Core runtime for Delve.
//!
//! A session moves through a fixed lifecycle (init, loading, ready, running,
//! unloading, finished). While loading, the content pipeline enumerates the
//! manifest and fills the registry from host-provided loaders; while running,
//! the frame scheduler ticks the world and display collaborators once per
//! platform frame. Everything the host provides is injected through the
//! traits re-exported here, and every asynchronous answer comes back through
//! the session's event queue.

pub mod config;
pub mod content;
pub mod error;
pub mod frame;
pub mod game;
pub mod lifecycle;
pub mod observer;
pub mod pipeline;
pub mod timeline;
pub mod world;

mod events;

pub use config::{ContentConfig, FrameConfig, LoadingConfig, RuntimeConfig};
pub use content::{
    ContentCategory, ContentItem, ContentRegistry, ManifestSource, Payload, StaticManifest,
};
pub use error::{LoadError, Result, RuntimeError, SourceUnavailable};
pub use frame::{FrameScheduler, FrameSource, FrameWaker};
pub use game::{GameBuilder, GameLifecycle};
pub use lifecycle::{LifecycleState, StateMachine, Trigger};
pub use observer::{LoggingObserver, SessionObserver};
pub use pipeline::{
    CategoryLoader, DocumentResponder, DocumentStatus, ItemResponder, LoadProgress, LoadReport,
    LoaderTable, RunId, TemplateLoader,
};
pub use timeline::{Clock, ClockSample, ManualTime, MonotonicTime, TimeSource};
pub use world::{DisplayCollaborator, WorldCollaborator};
