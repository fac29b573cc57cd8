use serde_json::Value;
use tracing::info;

use crate::content::{ContentCategory, ContentItem};
use crate::error::{LoadError, SourceUnavailable};
use crate::lifecycle::LifecycleState;
use crate::pipeline::{LoadProgress, LoadReport, RunId};

/// Hooks into a session's lifecycle and content loading.
///
/// Every hook has an empty default, so implementors only override what they
/// need. Hooks run on the session's thread, one at a time.
pub trait SessionObserver {
    /// The lifecycle moved from `from` to `to`.
    fn on_transition(&mut self, _from: LifecycleState, _to: LifecycleState) {}

    /// An item was registered. Called in manifest order within a category.
    fn on_item_loaded(&mut self, _item: &ContentItem) {}

    fn on_item_failed(&mut self, _category: ContentCategory, _name: &str, _error: &LoadError) {}

    /// Called after every registration, following `on_item_loaded`.
    fn on_progress(&mut self, _progress: LoadProgress) {}

    /// The template document request resolved.
    fn on_document(&mut self, _result: Result<&Value, &LoadError>) {}

    /// Every request of the run has resolved. Called at most once per run.
    fn on_complete(&mut self, _report: &LoadReport) {}

    /// The manifest could not be enumerated and the run was aborted.
    fn on_manifest_unavailable(&mut self, _error: &SourceUnavailable) {}

    /// A completion arrived for a run that is no longer current and was dropped.
    fn on_late_completion(&mut self, _run: RunId) {}
}

/// Default observer: reports load progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_progress(&mut self, progress: LoadProgress) {
        info!("Progress: {progress}");
    }

    fn on_complete(&mut self, report: &LoadReport) {
        info!(
            loaded = report.progress.count,
            failed = report.failed,
            "content ready"
        );
    }
}
