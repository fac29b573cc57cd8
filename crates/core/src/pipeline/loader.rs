use crossbeam_channel::Sender;
use serde_json::Value;

use super::RunId;
use crate::content::{ContentCategory, Payload};
use crate::error::LoadError;
use crate::events::RuntimeEvent;

/// Loads the items of one content category (models, textures or audio).
///
/// A request may be answered inline or later from any thread; either way the
/// answer reaches the session through `responder`.
pub trait CategoryLoader {
    fn request(&mut self, path: &str, responder: ItemResponder);
}

impl<F> CategoryLoader for F
where
    F: FnMut(&str, ItemResponder),
{
    fn request(&mut self, path: &str, responder: ItemResponder) {
        self(path, responder)
    }
}

/// Loads the single structured template document of a session.
pub trait TemplateLoader {
    fn request(&mut self, path: &str, responder: DocumentResponder);
}

impl<F> TemplateLoader for F
where
    F: FnMut(&str, DocumentResponder),
{
    fn request(&mut self, path: &str, responder: DocumentResponder) {
        self(path, responder)
    }
}

/// Per-category loader lookup. Only models, textures and audio have
/// loaders; template entries are resolved from the template document.
pub struct LoaderTable {
    model: Box<dyn CategoryLoader>,
    texture: Box<dyn CategoryLoader>,
    audio: Box<dyn CategoryLoader>,
}

impl LoaderTable {
    pub fn new(
        model: Box<dyn CategoryLoader>,
        texture: Box<dyn CategoryLoader>,
        audio: Box<dyn CategoryLoader>,
    ) -> Self {
        Self {
            model,
            texture,
            audio,
        }
    }

    pub(crate) fn get_mut(&mut self, category: ContentCategory) -> Option<&mut dyn CategoryLoader> {
        match category {
            ContentCategory::Model => Some(self.model.as_mut()),
            ContentCategory::Texture => Some(self.texture.as_mut()),
            ContentCategory::Audio => Some(self.audio.as_mut()),
            ContentCategory::Template | ContentCategory::Invalid => None,
        }
    }
}

impl std::fmt::Debug for LoaderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderTable").finish_non_exhaustive()
    }
}

/// Result of a load request, tagged with the run that issued it.
#[derive(Debug)]
pub(crate) enum Completion {
    Item {
        run: RunId,
        category: ContentCategory,
        index: usize,
        result: Result<Payload, LoadError>,
    },
    Document {
        run: RunId,
        result: Result<Value, LoadError>,
    },
}

impl Completion {
    pub fn run(&self) -> RunId {
        match self {
            Completion::Item { run, .. } | Completion::Document { run, .. } => *run,
        }
    }
}

/// One-shot answer channel for a content item request.
///
/// Consumed by [`ItemResponder::resolve`] or [`ItemResponder::reject`].
/// Dropping it unanswered rejects the request with [`LoadError::Abandoned`].
#[derive(Debug)]
pub struct ItemResponder {
    sender: Option<Sender<RuntimeEvent>>,
    run: RunId,
    category: ContentCategory,
    index: usize,
    path: String,
}

impl ItemResponder {
    pub(crate) fn new(
        sender: Sender<RuntimeEvent>,
        run: RunId,
        category: ContentCategory,
        index: usize,
        path: String,
    ) -> Self {
        Self {
            sender: Some(sender),
            run,
            category,
            index,
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn resolve(self, payload: Payload) {
        self.complete(Ok(payload))
    }

    pub fn reject(self, error: LoadError) {
        self.complete(Err(error))
    }

    pub fn complete(mut self, result: Result<Payload, LoadError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<Payload, LoadError>) {
        if let Some(sender) = self.sender.take() {
            // The session may already be gone; there is nobody to tell.
            let _ = sender.send(RuntimeEvent::Content(Completion::Item {
                run: self.run,
                category: self.category,
                index: self.index,
                result,
            }));
        }
    }
}

impl Drop for ItemResponder {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let path = self.path.clone();
            self.send(Err(LoadError::Abandoned { path }));
        }
    }
}

/// One-shot answer channel for the template document request.
#[derive(Debug)]
pub struct DocumentResponder {
    sender: Option<Sender<RuntimeEvent>>,
    run: RunId,
    path: String,
}

impl DocumentResponder {
    pub(crate) fn new(sender: Sender<RuntimeEvent>, run: RunId, path: String) -> Self {
        Self {
            sender: Some(sender),
            run,
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resolve(self, document: Value) {
        self.complete(Ok(document))
    }

    pub fn reject(self, error: LoadError) {
        self.complete(Err(error))
    }

    pub fn complete(mut self, result: Result<Value, LoadError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<Value, LoadError>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(RuntimeEvent::Content(Completion::Document {
                run: self.run,
                result,
            }));
        }
    }
}

impl Drop for DocumentResponder {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let path = self.path.clone();
            self.send(Err(LoadError::Abandoned { path }));
        }
    }
}
