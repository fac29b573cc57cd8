//! Session context: the lifecycle state machine wired to a content pipeline,
//! a frame scheduler and the host's collaborators.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::content::{ContentCategory, ContentRegistry, ManifestSource};
use crate::error::SourceUnavailable;
use crate::events::{EventQueue, RuntimeEvent};
use crate::frame::{FrameScheduler, FrameSource};
use crate::lifecycle::{LifecycleState, StateMachine, Trigger};
use crate::observer::{LoggingObserver, SessionObserver};
use crate::pipeline::{
    CategoryLoader, ContentPipeline, LoadProgress, LoadReport, LoaderTable, RunId, TemplateLoader,
};
use crate::timeline::Clock;
use crate::world::{DisplayCollaborator, WorldCollaborator};
use crate::{Result, RuntimeError};

type SharedWorld = Rc<RefCell<dyn WorldCollaborator>>;
type SharedDisplay = Rc<RefCell<dyn DisplayCollaborator>>;

/// Assembles a [`GameLifecycle`] from its collaborators.
///
/// The manifest, the three category loaders, the template loader, the frame
/// source and both world and display collaborators are required. The
/// observer defaults to [`LoggingObserver`] and the clock to
/// [`Clock::monotonic`].
#[must_use]
pub struct GameBuilder {
    config: RuntimeConfig,
    manifest: Option<Box<dyn ManifestSource>>,
    model: Option<Box<dyn CategoryLoader>>,
    texture: Option<Box<dyn CategoryLoader>>,
    audio: Option<Box<dyn CategoryLoader>>,
    template: Option<Box<dyn TemplateLoader>>,
    frames: Option<Box<dyn FrameSource>>,
    world: Option<SharedWorld>,
    display: Option<SharedDisplay>,
    observer: Option<Box<dyn SessionObserver>>,
    clock: Option<Clock>,
}

impl GameBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            manifest: None,
            model: None,
            texture: None,
            audio: None,
            template: None,
            frames: None,
            world: None,
            display: None,
            observer: None,
            clock: None,
        }
    }

    pub fn with_manifest(mut self, manifest: impl ManifestSource + 'static) -> Self {
        self.manifest = Some(Box::new(manifest));
        self
    }

    /// Installs the loader for `category`. Only models, textures and audio
    /// take a loader; anything else is ignored with a warning.
    pub fn with_loader(
        mut self,
        category: ContentCategory,
        loader: impl CategoryLoader + 'static,
    ) -> Self {
        let slot = match category {
            ContentCategory::Model => &mut self.model,
            ContentCategory::Texture => &mut self.texture,
            ContentCategory::Audio => &mut self.audio,
            ContentCategory::Template | ContentCategory::Invalid => {
                warn!(%category, "category has no item loader, ignoring");
                return self;
            }
        };
        *slot = Some(Box::new(loader));
        self
    }

    pub fn with_template_loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.template = Some(Box::new(loader));
        self
    }

    pub fn with_frame_source(mut self, frames: impl FrameSource + 'static) -> Self {
        self.frames = Some(Box::new(frames));
        self
    }

    /// The session drives the world through a shared handle so the host can
    /// keep inspecting it between pumps.
    pub fn with_world<W: WorldCollaborator + 'static>(mut self, world: Rc<RefCell<W>>) -> Self {
        self.world = Some(world);
        self
    }

    pub fn with_display<D: DisplayCollaborator + 'static>(
        mut self,
        display: Rc<RefCell<D>>,
    ) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<GameLifecycle> {
        let manifest = self
            .manifest
            .ok_or(RuntimeError::MissingCollaborator("manifest source"))?;
        let model = self
            .model
            .ok_or(RuntimeError::MissingCollaborator("model loader"))?;
        let texture = self
            .texture
            .ok_or(RuntimeError::MissingCollaborator("texture loader"))?;
        let audio = self
            .audio
            .ok_or(RuntimeError::MissingCollaborator("audio loader"))?;
        let template = self
            .template
            .ok_or(RuntimeError::MissingCollaborator("template loader"))?;
        let frames = self
            .frames
            .ok_or(RuntimeError::MissingCollaborator("frame source"))?;
        let world = self
            .world
            .ok_or(RuntimeError::MissingCollaborator("world collaborator"))?;
        let display = self
            .display
            .ok_or(RuntimeError::MissingCollaborator("display collaborator"))?;

        let queue = EventQueue::new();
        let pipeline = ContentPipeline::new(
            manifest,
            LoaderTable::new(model, texture, audio),
            template,
            self.config.content.template.clone(),
            queue.sender(),
        );
        let scheduler = FrameScheduler::new(
            self.clock.unwrap_or_else(Clock::monotonic),
            frames,
            queue.sender(),
        );

        Ok(GameLifecycle {
            config: self.config,
            machine: StateMachine::new(),
            pipeline,
            scheduler,
            world,
            display,
            observer: self
                .observer
                .unwrap_or_else(|| Box::new(LoggingObserver)),
            queue,
            manifest_error: None,
        })
    }
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// One game session.
///
/// Triggers (`load`, `play`, `finalize`, `retry_load`) never fail: fired
/// from the wrong state they do nothing and return the unchanged state.
/// Asynchronous work only makes progress inside [`GameLifecycle::pump`] and
/// [`GameLifecycle::wait_and_pump`], which handle queued events one at a
/// time on the calling thread.
pub struct GameLifecycle {
    config: RuntimeConfig,
    machine: StateMachine,
    pipeline: ContentPipeline,
    scheduler: FrameScheduler,
    world: SharedWorld,
    display: SharedDisplay,
    observer: Box<dyn SessionObserver>,
    queue: EventQueue,
    manifest_error: Option<SourceUnavailable>,
}

impl GameLifecycle {
    pub fn builder(config: RuntimeConfig) -> GameBuilder {
        GameBuilder::new(config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.machine.state()
    }

    pub fn registry(&self) -> &ContentRegistry {
        self.pipeline.registry()
    }

    pub fn progress(&self) -> LoadProgress {
        self.pipeline.progress()
    }

    pub fn report(&self) -> LoadReport {
        self.pipeline.report()
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.pipeline.current_run()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Why the last load attempt aborted, while it stays unresolved.
    pub fn manifest_error(&self) -> Option<&SourceUnavailable> {
        self.manifest_error.as_ref()
    }

    /// Init → Loading, then starts the content pipeline. Ready is only
    /// reached once the pipeline completes during a later pump.
    pub fn load(&mut self) -> LifecycleState {
        if self.fire(Trigger::Load) {
            self.start_pipeline();
        }
        self.state()
    }

    /// Re-runs the pipeline after a manifest failure left the session stuck
    /// in Loading. Does nothing otherwise.
    pub fn retry_load(&mut self) -> LifecycleState {
        if self.state() != LifecycleState::Loading || self.manifest_error.is_none() {
            debug!(state = %self.state(), "nothing to retry");
            return self.state();
        }
        self.start_pipeline();
        self.state()
    }

    /// Ready → Running, then starts the frame loop. Each tick updates the
    /// world and then draws.
    pub fn play(&mut self) -> LifecycleState {
        if self.fire(Trigger::Play) {
            let world = Rc::clone(&self.world);
            let display = Rc::clone(&self.display);
            self.scheduler.start(move |sample| {
                world.borrow_mut().update(sample.elapsed, sample.delta);
                display.borrow_mut().draw();
            });
        }
        self.state()
    }

    /// Running → Unloading → Finished. The frame loop is stopped before
    /// unloading starts and the registry is empty when this returns.
    pub fn finalize(&mut self) -> LifecycleState {
        if self.state() != LifecycleState::Running {
            debug!(state = %self.state(), "finalize ignored");
            return self.state();
        }

        self.scheduler.stop();
        self.fire(Trigger::Finalize);
        self.pipeline.unload();
        self.fire(Trigger::UnloadComplete);
        self.state()
    }

    /// Gives up on every load request still unanswered, failing each one.
    /// This is how a host applies its loading timeout; answers that show up
    /// later are discarded. Only meaningful while Loading.
    pub fn abandon_pending(&mut self) -> LifecycleState {
        if self.state() != LifecycleState::Loading {
            debug!(state = %self.state(), "nothing to abandon");
            return self.state();
        }
        if self.pipeline.abandon_pending(self.observer.as_mut()) {
            self.fire(Trigger::LoadComplete);
        }
        self.state()
    }

    /// Forwards a viewport size change to the display.
    pub fn refresh_display(&mut self) {
        self.display.borrow_mut().refresh();
    }

    /// Handles the events queued so far. Events posted while handling wait
    /// for the next call. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let events = self.queue.drain();
        let handled = events.len();
        for event in events {
            self.dispatch(event);
        }
        handled
    }

    /// Blocks up to `timeout` for an event, then handles it together with
    /// everything else already queued. Returns how many were handled.
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        match self.queue.wait(timeout) {
            Some(event) => {
                self.dispatch(event);
                1 + self.pump()
            }
            None => 0,
        }
    }

    fn dispatch(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Content(completion) => {
                let completed = self.pipeline.accept(completion, self.observer.as_mut());
                if completed && self.state() == LifecycleState::Loading {
                    self.fire(Trigger::LoadComplete);
                }
            }
            RuntimeEvent::Frame { chain } => {
                self.scheduler.on_frame(chain);
            }
        }
    }

    fn start_pipeline(&mut self) {
        match self.pipeline.run(self.observer.as_mut()) {
            Ok(run) => {
                self.manifest_error = None;
                debug!(%run, "loading content");
            }
            Err(RuntimeError::ManifestUnavailable(error)) => {
                self.manifest_error = Some(error);
            }
            Err(error) => warn!(%error, "content pipeline did not start"),
        }
    }

    fn fire(&mut self, trigger: Trigger) -> bool {
        match self.machine.fire(trigger) {
            Some((from, to)) => {
                info!(%from, %to, "lifecycle transition");
                self.observer.on_transition(from, to);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for GameLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLifecycle")
            .field("state", &self.state())
            .field("pipeline", &self.pipeline)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
