//! Categorised content descriptors and the store that holds them once loaded.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

mod manifest;
mod registry;

pub use manifest::{ManifestSource, StaticManifest};
pub use registry::ContentRegistry;

/// Kind of a loadable content item.
///
/// `Invalid` is the unset value: it is never loaded and any item carrying it
/// reports itself as invalid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Model,
    Texture,
    Audio,
    Template,
    #[default]
    Invalid,
}

impl ContentCategory {
    /// Categories a pipeline run enumerates, in dispatch order.
    pub const LOADABLE: [ContentCategory; 4] = [
        ContentCategory::Model,
        ContentCategory::Texture,
        ContentCategory::Audio,
        ContentCategory::Template,
    ];

    pub fn is_valid(self) -> bool {
        self != ContentCategory::Invalid
    }

    /// Directory (and manifest key) the category's items are stored under.
    pub fn store(self) -> &'static str {
        match self {
            ContentCategory::Model => "models",
            ContentCategory::Texture => "textures",
            ContentCategory::Audio => "audio",
            ContentCategory::Template => "templates",
            ContentCategory::Invalid => "",
        }
    }

    /// Inverse of [`ContentCategory::store`]. Unknown stores map to `Invalid`.
    pub fn from_store(store: &str) -> Self {
        match store {
            "models" => ContentCategory::Model,
            "textures" => ContentCategory::Texture,
            "audio" => ContentCategory::Audio,
            "templates" => ContentCategory::Template,
            _ => ContentCategory::Invalid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::Model => "model",
            ContentCategory::Texture => "texture",
            ContentCategory::Audio => "audio",
            ContentCategory::Template => "template",
            ContentCategory::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to decoded content produced by a loader.
///
/// The core never looks inside; hosts downcast to whatever their decoders
/// produce.
pub struct Payload {
    inner: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Payload {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.type_name).finish()
    }
}

/// A single named, categorised unit of content.
///
/// The payload is attached exactly once, when its load succeeds.
#[derive(Debug)]
pub struct ContentItem {
    category: ContentCategory,
    name: String,
    payload: Option<Payload>,
}

impl ContentItem {
    pub fn new(category: ContentCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            payload: None,
        }
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location handed to the loader, derived from category and name only.
    pub fn path(&self) -> String {
        if self.category.is_valid() {
            format!("{}/{}", self.category.store(), self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.category.is_valid()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    /// Attaches the loaded payload. Returns `false` and leaves the item
    /// untouched if a payload is already present.
    pub(crate) fn attach(&mut self, payload: Payload) -> bool {
        if self.payload.is_some() {
            return false;
        }
        self.payload = Some(payload);
        true
    }
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.category, self.name)
    }
}
