//! Content pipeline.
//!
//! One run enumerates the manifest, requests every listed item from its
//! category loader, requests the template document, and registers what
//! succeeds. Completions may arrive in any order; they are buffered per
//! category and registered in manifest order.

use std::collections::HashSet;
use std::fmt;

use crossbeam_channel::Sender;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::content::{ContentCategory, ContentItem, ContentRegistry, ManifestSource, Payload};
use crate::error::{LoadError, SourceUnavailable};
use crate::events::RuntimeEvent;
use crate::observer::SessionObserver;
use crate::{Result, RuntimeError};

mod loader;

pub(crate) use loader::Completion;
pub use loader::{CategoryLoader, DocumentResponder, ItemResponder, LoaderTable, TemplateLoader};

/// Identity of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Successful registrations against the number of items the run expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub count: usize,
    pub total: usize,
}

impl LoadProgress {
    /// Whole percentage, rounded down. Zero when nothing is expected.
    pub fn percent(&self) -> usize {
        if self.total > 0 {
            self.count * 100 / self.total
        } else {
            0
        }
    }
}

impl fmt::Display for LoadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} ({} %)", self.count, self.total, self.percent())
    }
}

/// State of the template document request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DocumentStatus {
    #[default]
    Pending,
    Loaded,
    Failed(LoadError),
}

/// Snapshot of a run. Failures are reported next to progress, never folded
/// into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub progress: LoadProgress,
    /// Items that resolved, successfully or not.
    pub attempted: usize,
    pub failed: usize,
    pub document: DocumentStatus,
    /// Completions dropped because their run was no longer current.
    pub late_discarded: usize,
}

enum Slot {
    Pending(ContentItem),
    Loaded(ContentItem),
    Failed,
    Flushed,
}

struct CategoryBatch {
    category: ContentCategory,
    slots: Vec<Slot>,
    cursor: usize,
}

impl CategoryBatch {
    /// Registers every resolved slot at the head of the batch, stopping at
    /// the first one still pending.
    fn flush(
        &mut self,
        registry: &mut ContentRegistry,
        progress: &mut LoadProgress,
        observer: &mut dyn SessionObserver,
    ) {
        while let Some(slot) = self.slots.get_mut(self.cursor) {
            match std::mem::replace(slot, Slot::Flushed) {
                Slot::Loaded(item) => {
                    if let Some(item) = registry.insert(item) {
                        progress.count += 1;
                        observer.on_item_loaded(item);
                        observer.on_progress(*progress);
                    }
                }
                Slot::Failed | Slot::Flushed => {}
                pending @ Slot::Pending(_) => {
                    *slot = pending;
                    break;
                }
            }
            self.cursor += 1;
        }
    }
}

struct PipelineRun {
    id: RunId,
    batches: Vec<CategoryBatch>,
    progress: LoadProgress,
    attempted: usize,
    failed: usize,
    document: DocumentStatus,
    completed: bool,
}

fn batch_mut(
    batches: &mut [CategoryBatch],
    category: ContentCategory,
) -> Option<&mut CategoryBatch> {
    batches.iter_mut().find(|batch| batch.category == category)
}

impl PipelineRun {

    /// Applies an item completion. Returns `false` if it targets no pending
    /// slot of this run.
    fn resolve_item(
        &mut self,
        category: ContentCategory,
        index: usize,
        result: std::result::Result<Payload, LoadError>,
        registry: &mut ContentRegistry,
        observer: &mut dyn SessionObserver,
    ) -> bool {
        let Some(batch) = batch_mut(&mut self.batches, category) else {
            return false;
        };
        let Some(slot) = batch.slots.get_mut(index) else {
            return false;
        };

        match std::mem::replace(slot, Slot::Flushed) {
            Slot::Pending(mut item) => match result {
                Ok(payload) => {
                    debug!(item = %item, "content loaded");
                    item.attach(payload);
                    *slot = Slot::Loaded(item);
                }
                Err(error) => {
                    warn!(item = %item, %error, "content failed to load");
                    observer.on_item_failed(category, item.name(), &error);
                    self.failed += 1;
                    *slot = Slot::Failed;
                }
            },
            resolved => {
                *slot = resolved;
                return false;
            }
        }

        self.attempted += 1;
        batch.flush(registry, &mut self.progress, observer);
        true
    }

    /// Applies the template document completion and resolves the template
    /// entries that depend on it.
    fn resolve_document(
        &mut self,
        result: std::result::Result<Value, LoadError>,
        registry: &mut ContentRegistry,
        observer: &mut dyn SessionObserver,
    ) -> bool {
        if self.document != DocumentStatus::Pending {
            return false;
        }

        match &result {
            Ok(document) => observer.on_document(Ok(document)),
            Err(error) => {
                warn!(%error, "template document failed to load");
                observer.on_document(Err(error));
            }
        }

        let mut attempted = 0;
        let mut failed = 0;
        let mut batch = batch_mut(&mut self.batches, ContentCategory::Template);
        if let Some(batch) = batch.as_deref_mut() {
            for slot in batch.slots.iter_mut() {
                let Slot::Pending(item) = slot else {
                    continue;
                };
                attempted += 1;

                let entry = match &result {
                    Ok(document) => document.get(item.name()).cloned().ok_or_else(|| {
                        LoadError::MissingEntry {
                            name: item.name().to_string(),
                        }
                    }),
                    Err(error) => Err(error.clone()),
                };

                match entry {
                    Ok(value) => {
                        let Slot::Pending(mut item) = std::mem::replace(slot, Slot::Flushed) else {
                            continue;
                        };
                        item.attach(Payload::new(value));
                        *slot = Slot::Loaded(item);
                    }
                    Err(error) => {
                        warn!(item = %item, %error, "template entry failed to resolve");
                        observer.on_item_failed(ContentCategory::Template, item.name(), &error);
                        failed += 1;
                        *slot = Slot::Failed;
                    }
                }
            }
        }
        self.attempted += attempted;
        self.failed += failed;

        match result {
            Ok(document) => {
                info!(run = %self.id, "template document loaded");
                registry.set_document(document);
                self.document = DocumentStatus::Loaded;
            }
            Err(error) => self.document = DocumentStatus::Failed(error),
        }

        if let Some(batch) = batch {
            batch.flush(registry, &mut self.progress, observer);
        }
        true
    }

    fn is_settled(&self) -> bool {
        self.attempted == self.progress.total && self.document != DocumentStatus::Pending
    }
}

/// Orchestrates content loading for one session and owns its registry.
pub struct ContentPipeline {
    manifest: Box<dyn ManifestSource>,
    loaders: LoaderTable,
    template_loader: Box<dyn TemplateLoader>,
    template_path: String,
    sender: Sender<RuntimeEvent>,
    registry: ContentRegistry,
    run: Option<PipelineRun>,
    next_run: u64,
    late_discarded: usize,
}

impl ContentPipeline {
    pub(crate) fn new(
        manifest: Box<dyn ManifestSource>,
        loaders: LoaderTable,
        template_loader: Box<dyn TemplateLoader>,
        template_path: impl Into<String>,
        sender: Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            manifest,
            loaders,
            template_loader,
            template_path: template_path.into(),
            sender,
            registry: ContentRegistry::new(),
            run: None,
            next_run: 1,
            late_discarded: 0,
        }
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn template_path(&self) -> &str {
        &self.template_path
    }

    /// Identity of the current run, if one has been started and not torn down.
    pub fn current_run(&self) -> Option<RunId> {
        self.run.as_ref().map(|run| run.id)
    }

    pub fn in_flight(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.completed)
    }

    pub fn is_complete(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.completed)
    }

    pub fn progress(&self) -> LoadProgress {
        self.run.as_ref().map(|run| run.progress).unwrap_or_default()
    }

    pub fn report(&self) -> LoadReport {
        let mut report = self
            .run
            .as_ref()
            .map(|run| LoadReport {
                progress: run.progress,
                attempted: run.attempted,
                failed: run.failed,
                document: run.document.clone(),
                late_discarded: 0,
            })
            .unwrap_or_default();
        report.late_discarded = self.late_discarded;
        report
    }

    /// Starts a run: enumerates the manifest, then issues every request.
    ///
    /// If any category cannot be listed the run is aborted before a single
    /// request goes out.
    pub(crate) fn run(&mut self, observer: &mut dyn SessionObserver) -> Result<RunId> {
        if self.in_flight() {
            return Err(RuntimeError::PipelineBusy);
        }

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(error) => {
                warn!(%error, "content manifest unavailable, run aborted");
                observer.on_manifest_unavailable(&error);
                return Err(error.into());
            }
        };

        let id = RunId(self.next_run);
        self.next_run += 1;
        self.registry.clear();

        let total: usize = plan.iter().map(|(_, names)| names.len()).sum();
        info!(run = %id, total, "content pipeline started");

        let mut batches = Vec::with_capacity(plan.len());
        for (category, names) in plan {
            let mut slots = Vec::with_capacity(names.len());
            for (index, name) in names.into_iter().enumerate() {
                let item = ContentItem::new(category, name);
                if let Some(loader) = self.loaders.get_mut(category) {
                    let path = item.path();
                    let responder =
                        ItemResponder::new(self.sender.clone(), id, category, index, path.clone());
                    loader.request(&path, responder);
                }
                slots.push(Slot::Pending(item));
            }
            batches.push(CategoryBatch {
                category,
                slots,
                cursor: 0,
            });
        }

        let responder = DocumentResponder::new(self.sender.clone(), id, self.template_path.clone());
        self.template_loader.request(&self.template_path, responder);

        self.run = Some(PipelineRun {
            id,
            batches,
            progress: LoadProgress { count: 0, total },
            attempted: 0,
            failed: 0,
            document: DocumentStatus::Pending,
            completed: false,
        });
        Ok(id)
    }

    /// Handles one completion. Returns `true` exactly once per run: when the
    /// completion settles the last outstanding request.
    pub(crate) fn accept(
        &mut self,
        completion: Completion,
        observer: &mut dyn SessionObserver,
    ) -> bool {
        let id = completion.run();
        let Some(run) = self.run.as_mut().filter(|run| run.id == id && !run.completed) else {
            self.discard_late(id, observer);
            return false;
        };

        let applied = match completion {
            Completion::Item {
                category,
                index,
                result,
                ..
            } => run.resolve_item(category, index, result, &mut self.registry, observer),
            Completion::Document { result, .. } => {
                run.resolve_document(result, &mut self.registry, observer)
            }
        };
        if !applied {
            self.late_discarded += 1;
            warn!(run = %id, "discarding completion that targets no pending request");
            observer.on_late_completion(id);
            return false;
        }
        self.finish_if_settled(observer)
    }

    /// Gives up on every request of the current run that is still
    /// unanswered, failing it with [`LoadError::Abandoned`]. Answers that
    /// arrive for them afterwards are discarded as late. Returns `true` if
    /// this completed the run.
    pub(crate) fn abandon_pending(&mut self, observer: &mut dyn SessionObserver) -> bool {
        let template_path = self.template_path.clone();
        let Some(run) = self.run.as_mut().filter(|run| !run.completed) else {
            return false;
        };

        let pending: Vec<(ContentCategory, usize, String)> = run
            .batches
            .iter()
            .flat_map(|batch| {
                batch.slots.iter().enumerate().filter_map(move |(index, slot)| match slot {
                    Slot::Pending(item) if batch.category != ContentCategory::Template => {
                        Some((batch.category, index, item.path()))
                    }
                    _ => None,
                })
            })
            .collect();
        warn!(run = %run.id, count = pending.len(), "abandoning unanswered requests");

        for (category, index, path) in pending {
            let error = LoadError::Abandoned { path };
            run.resolve_item(category, index, Err(error), &mut self.registry, observer);
        }
        if run.document == DocumentStatus::Pending {
            let error = LoadError::Abandoned {
                path: template_path,
            };
            run.resolve_document(Err(error), &mut self.registry, observer);
        }
        self.finish_if_settled(observer)
    }

    fn finish_if_settled(&mut self, observer: &mut dyn SessionObserver) -> bool {
        let Some(run) = self.run.as_mut().filter(|run| !run.completed) else {
            return false;
        };
        if !run.is_settled() {
            return false;
        }
        run.completed = true;
        info!(
            run = %run.id,
            progress = %run.progress,
            failed = run.failed,
            "content pipeline complete"
        );
        let report = self.report();
        observer.on_complete(&report);
        true
    }

    /// Drops the registry and forgets the current run; completions still in
    /// flight for it will be discarded when they arrive.
    pub(crate) fn unload(&mut self) {
        if let Some(run) = self.run.take() {
            debug!(run = %run.id, "content pipeline run torn down");
        }
        self.registry.clear();
    }

    fn discard_late(&mut self, run: RunId, observer: &mut dyn SessionObserver) {
        self.late_discarded += 1;
        warn!(%run, "discarding late completion");
        observer.on_late_completion(run);
    }

    fn plan(
        &mut self,
    ) -> std::result::Result<Vec<(ContentCategory, Vec<String>)>, SourceUnavailable> {
        self.manifest.begin();
        ContentCategory::LOADABLE
            .iter()
            .map(|&category| {
                let names = self.manifest.list(category)?;
                Ok((category, sanitize(category, names)))
            })
            .collect()
    }
}

/// Drops empty and repeated names; the first occurrence wins.
fn sanitize(category: ContentCategory, names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| {
            if name.is_empty() {
                warn!(%category, "skipping empty manifest entry");
                return false;
            }
            if !seen.insert(name.clone()) {
                warn!(%category, name = %name, "skipping duplicate manifest entry");
                return false;
            }
            true
        })
        .collect()
}

impl fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPipeline")
            .field("template_path", &self.template_path)
            .field("run", &self.current_run())
            .field("progress", &self.progress())
            .field("registry", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::content::StaticManifest;
    use crate::events::EventQueue;

    type Held = Rc<RefCell<HashMap<String, ItemResponder>>>;

    /// Loader that keeps every responder so the test picks completion order.
    fn holding_loader(held: &Held) -> Box<dyn CategoryLoader> {
        let held = held.clone();
        Box::new(move |path: &str, responder: ItemResponder| {
            held.borrow_mut().insert(path.to_string(), responder);
        })
    }

    #[derive(Default)]
    struct Recorder {
        loaded: Vec<String>,
        failed: Vec<(ContentCategory, String)>,
        percents: Vec<usize>,
        completions: usize,
        late: usize,
        manifest_failures: usize,
    }

    impl SessionObserver for Recorder {
        fn on_item_loaded(&mut self, item: &ContentItem) {
            self.loaded.push(item.to_string());
        }

        fn on_item_failed(&mut self, category: ContentCategory, name: &str, _error: &LoadError) {
            self.failed.push((category, name.to_string()));
        }

        fn on_progress(&mut self, progress: LoadProgress) {
            self.percents.push(progress.percent());
        }

        fn on_complete(&mut self, _report: &LoadReport) {
            self.completions += 1;
        }

        fn on_manifest_unavailable(&mut self, _error: &SourceUnavailable) {
            self.manifest_failures += 1;
        }

        fn on_late_completion(&mut self, _run: RunId) {
            self.late += 1;
        }
    }

    struct Harness {
        queue: EventQueue,
        items: Held,
        document: Rc<RefCell<Option<DocumentResponder>>>,
        pipeline: ContentPipeline,
        observer: Recorder,
    }

    impl Harness {
        fn new(manifest: impl ManifestSource + 'static) -> Self {
            let queue = EventQueue::new();
            let items: Held = Rc::default();
            let document: Rc<RefCell<Option<DocumentResponder>>> = Rc::default();
            let slot = document.clone();
            let pipeline = ContentPipeline::new(
                Box::new(manifest),
                LoaderTable::new(
                    holding_loader(&items),
                    holding_loader(&items),
                    holding_loader(&items),
                ),
                Box::new(move |_: &str, responder: DocumentResponder| {
                    *slot.borrow_mut() = Some(responder);
                }),
                "world/gamedata.json",
                queue.sender(),
            );
            Self {
                queue,
                items,
                document,
                pipeline,
                observer: Recorder::default(),
            }
        }

        fn run(&mut self) -> Result<RunId> {
            self.pipeline.run(&mut self.observer)
        }

        fn resolve(&mut self, path: &str) -> bool {
            let responder = self.items.borrow_mut().remove(path).expect("request issued");
            responder.resolve(Payload::new(path.to_string()));
            self.deliver()
        }

        fn reject(&mut self, path: &str) -> bool {
            let responder = self.items.borrow_mut().remove(path).expect("request issued");
            responder.reject(LoadError::NotFound {
                path: path.to_string(),
            });
            self.deliver()
        }

        fn resolve_document(&mut self, document: Value) -> bool {
            let responder = self.document.borrow_mut().take().expect("document requested");
            responder.resolve(document);
            self.deliver()
        }

        /// Feeds queued completions to the pipeline; true if one completed the run.
        fn deliver(&mut self) -> bool {
            let mut completed = false;
            for event in self.queue.drain() {
                if let RuntimeEvent::Content(completion) = event {
                    completed |= self.pipeline.accept(completion, &mut self.observer);
                }
            }
            completed
        }

        fn registered(&self, category: ContentCategory) -> Vec<String> {
            self.pipeline
                .registry()
                .items(category)
                .iter()
                .map(|item| item.name().to_string())
                .collect()
        }
    }

    fn dungeon_manifest() -> StaticManifest {
        StaticManifest::new()
            .with(ContentCategory::Model, &[])
            .with(ContentCategory::Texture, &["a", "b"])
            .with(ContentCategory::Audio, &["x", "y", "z"])
            .with(ContentCategory::Template, &["t"])
    }

    #[test]
    fn progress_counts_successes_against_the_manifest_total() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();
        assert_eq!(h.pipeline.progress(), LoadProgress { count: 0, total: 6 });
        assert_eq!(h.items.borrow().len(), 5);

        for path in ["textures/a", "textures/b", "audio/x", "audio/y", "audio/z"] {
            assert!(!h.resolve(path));
        }
        assert_eq!(h.observer.percents, [16, 33, 50, 66, 83]);
        assert_eq!(h.observer.completions, 0);

        assert!(h.resolve_document(json!({ "t": { "width": 128 } })));
        assert_eq!(h.observer.completions, 1);
        assert_eq!(h.pipeline.progress(), LoadProgress { count: 6, total: 6 });
        assert!(h.pipeline.is_complete());

        let template = h.pipeline.registry().get(ContentCategory::Template, "t").unwrap();
        let entry = template.payload().and_then(|p| p.downcast_ref::<Value>());
        assert_eq!(entry, Some(&json!({ "width": 128 })));
        assert!(h.pipeline.registry().document().is_some());
    }

    #[test]
    fn out_of_order_completions_register_in_manifest_order() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();

        h.resolve("audio/z");
        h.resolve("audio/x");
        assert_eq!(h.registered(ContentCategory::Audio), ["x"]);
        assert_eq!(h.pipeline.progress().count, 1);

        h.resolve("audio/y");
        assert_eq!(h.registered(ContentCategory::Audio), ["x", "y", "z"]);
        assert_eq!(h.pipeline.progress().count, 3);
    }

    #[test]
    fn item_failures_do_not_stop_the_batch() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();

        h.reject("textures/a");
        h.resolve("textures/b");
        h.resolve("audio/x");
        h.reject("audio/y");
        h.resolve("audio/z");
        assert!(h.resolve_document(json!({ "t": {} })));

        assert_eq!(h.registered(ContentCategory::Texture), ["b"]);
        assert_eq!(h.registered(ContentCategory::Audio), ["x", "z"]);
        assert_eq!(
            h.observer.failed,
            [
                (ContentCategory::Texture, "a".to_string()),
                (ContentCategory::Audio, "y".to_string())
            ]
        );

        let report = h.pipeline.report();
        assert_eq!(report.progress, LoadProgress { count: 4, total: 6 });
        assert_eq!(report.failed, 2);
        assert_eq!(report.attempted, 6);
        assert_eq!(report.document, DocumentStatus::Loaded);
    }

    #[test]
    fn completion_waits_for_the_template_document() {
        let mut h = Harness::new(StaticManifest::new().with(ContentCategory::Texture, &["a"]));
        h.run().unwrap();

        assert!(!h.resolve("textures/a"));
        assert!(!h.pipeline.is_complete());

        let responder = h.document.borrow_mut().take().unwrap();
        responder.reject(LoadError::msg("bad json"));
        assert!(h.deliver());
        assert_eq!(h.observer.completions, 1);
        assert_eq!(
            h.pipeline.report().document,
            DocumentStatus::Failed(LoadError::msg("bad json"))
        );
    }

    #[test]
    fn template_entries_fail_with_the_document() {
        let mut h = Harness::new(
            StaticManifest::new().with(ContentCategory::Template, &["gameData", "missing"]),
        );
        h.run().unwrap();

        assert!(h.resolve_document(json!({ "gameData": { "world": "dungeon" } })));
        assert_eq!(h.registered(ContentCategory::Template), ["gameData"]);
        assert_eq!(
            h.observer.failed,
            [(ContentCategory::Template, "missing".to_string())]
        );
        assert_eq!(h.pipeline.report().failed, 1);
    }

    #[test]
    fn template_entries_register_in_manifest_order_with_progress() {
        let mut h = Harness::new(
            StaticManifest::new().with(ContentCategory::Template, &["zone", "actors"]),
        );
        h.run().unwrap();

        assert!(h.resolve_document(json!({ "actors": [], "zone": "crypt" })));
        assert_eq!(h.registered(ContentCategory::Template), ["zone", "actors"]);
        assert_eq!(h.observer.percents, [50, 100]);
        assert_eq!(h.pipeline.progress(), LoadProgress { count: 2, total: 2 });
    }

    #[test]
    fn manifest_failure_aborts_before_any_request() {
        struct Offline;
        impl ManifestSource for Offline {
            fn list(
                &self,
                category: ContentCategory,
            ) -> std::result::Result<Vec<String>, SourceUnavailable> {
                match category {
                    ContentCategory::Audio => Err(SourceUnavailable::new(category, "offline")),
                    _ => Ok(vec!["a".to_string()]),
                }
            }
        }

        let mut h = Harness::new(Offline);
        let err = h.run().unwrap_err();
        assert!(matches!(err, RuntimeError::ManifestUnavailable(_)));
        assert!(h.items.borrow().is_empty());
        assert!(h.document.borrow().is_none());
        assert_eq!(h.observer.manifest_failures, 1);
        assert_eq!(h.pipeline.current_run(), None);
    }

    #[test]
    fn late_completions_are_discarded_after_unload() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();
        h.resolve("textures/a");

        h.pipeline.unload();
        assert!(h.pipeline.registry().is_empty());

        assert!(!h.resolve("textures/b"));
        assert!(!h.resolve_document(json!({ "t": {} })));
        assert!(h.pipeline.registry().is_empty());
        assert_eq!(h.pipeline.report().late_discarded, 2);
        assert_eq!(h.observer.late, 2);
    }

    #[test]
    fn completions_from_an_older_run_are_discarded() {
        let mut h = Harness::new(StaticManifest::new().with(ContentCategory::Audio, &["x"]));
        h.run().unwrap();
        let stale = h.items.borrow_mut().remove("audio/x").unwrap();
        let stale_document = h.document.borrow_mut().take().unwrap();

        h.pipeline.unload();
        let second = h.run().unwrap();
        assert_eq!(h.pipeline.current_run(), Some(second));

        stale.resolve(Payload::new(()));
        stale_document.resolve(json!({}));
        assert!(!h.deliver());
        assert!(h.registered(ContentCategory::Audio).is_empty());
        assert_eq!(h.pipeline.report().late_discarded, 2);

        assert!(!h.resolve("audio/x"));
        assert!(h.resolve_document(json!({})));
        assert_eq!(h.registered(ContentCategory::Audio), ["x"]);
    }

    #[test]
    fn abandoning_settles_the_run_and_later_answers_are_late() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();
        h.resolve("textures/a");
        let straggler = h.items.borrow_mut().remove("audio/y").unwrap();

        assert!(h.pipeline.abandon_pending(&mut h.observer));
        assert!(h.pipeline.is_complete());
        let report = h.pipeline.report();
        assert_eq!(report.progress, LoadProgress { count: 1, total: 6 });
        assert_eq!(report.failed, 5);
        assert_eq!(
            report.document,
            DocumentStatus::Failed(LoadError::Abandoned {
                path: "world/gamedata.json".to_string()
            })
        );

        straggler.resolve(Payload::new(()));
        assert!(!h.deliver());
        assert!(h.registered(ContentCategory::Audio).is_empty());
        assert_eq!(h.observer.late, 1);
        assert!(!h.pipeline.abandon_pending(&mut h.observer));
    }

    #[test]
    fn every_run_takes_one_manifest_snapshot() {
        struct Counting {
            begins: Rc<RefCell<usize>>,
            lists: Rc<RefCell<Vec<usize>>>,
        }

        impl ManifestSource for Counting {
            fn begin(&mut self) {
                *self.begins.borrow_mut() += 1;
            }

            fn list(
                &self,
                _category: ContentCategory,
            ) -> std::result::Result<Vec<String>, SourceUnavailable> {
                self.lists.borrow_mut().push(*self.begins.borrow());
                Ok(Vec::new())
            }
        }

        let begins = Rc::new(RefCell::new(0));
        let lists = Rc::new(RefCell::new(Vec::new()));
        let mut h = Harness::new(Counting {
            begins: begins.clone(),
            lists: lists.clone(),
        });

        h.run().unwrap();
        assert!(h.resolve_document(json!({})));
        h.pipeline.unload();
        h.run().unwrap();

        assert_eq!(*begins.borrow(), 2);
        assert_eq!(*lists.borrow(), [1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn a_second_run_is_refused_while_one_is_in_flight() {
        let mut h = Harness::new(dungeon_manifest());
        h.run().unwrap();
        assert!(matches!(h.run(), Err(RuntimeError::PipelineBusy)));
    }

    #[test]
    fn empty_and_duplicate_names_are_dropped_from_the_total() {
        let manifest = StaticManifest::new().with(ContentCategory::Texture, &["a", "", "a", "b"]);
        let mut h = Harness::new(manifest);
        h.run().unwrap();
        assert_eq!(h.pipeline.progress().total, 2);
        assert_eq!(h.items.borrow().len(), 2);
    }

    #[test]
    fn an_empty_manifest_completes_on_the_document_alone() {
        let mut h = Harness::new(StaticManifest::new());
        h.run().unwrap();
        assert!(h.resolve_document(json!({})));
        assert_eq!(h.pipeline.progress().percent(), 0);
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(LoadProgress { count: 1, total: 6 }.percent(), 16);
        assert_eq!(LoadProgress { count: 2, total: 3 }.percent(), 66);
        assert_eq!(LoadProgress { count: 0, total: 0 }.percent(), 0);
        assert_eq!(LoadProgress { count: 6, total: 6 }.to_string(), "6 of 6 (100 %)");
    }
}
