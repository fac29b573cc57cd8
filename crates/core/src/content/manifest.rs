use std::collections::BTreeMap;

use tracing::warn;

use super::ContentCategory;
use crate::error::SourceUnavailable;
use crate::Result;

/// Enumerable source of content names per category.
pub trait ManifestSource {
    /// Called once at the start of every pipeline run, before any category
    /// is listed. Sources backed by mutable storage take their snapshot here
    /// so all categories of a run see the same manifest.
    fn begin(&mut self) {}

    /// Names available in `category`, in manifest order. A category the
    /// source knows nothing about lists as empty.
    fn list(&self, category: ContentCategory) -> std::result::Result<Vec<String>, SourceUnavailable>;
}

/// Manifest held in memory, typically parsed from a JSON object keyed by
/// store name:
///
/// ```json
/// { "models": [], "textures": ["dungeon_01.jpg"], "audio": [], "templates": ["gameData"] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticManifest {
    entries: BTreeMap<ContentCategory, Vec<String>>,
}

impl StaticManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: ContentCategory, names: &[&str]) -> Self {
        self.insert(category, names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn insert(&mut self, category: ContentCategory, names: Vec<String>) {
        if !category.is_valid() {
            warn!("ignoring manifest entries for the invalid category");
            return;
        }
        self.entries.insert(category, names);
    }

    /// Parses a manifest JSON object. Unknown store keys are skipped.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut manifest = Self::new();
        for (store, names) in raw {
            match ContentCategory::from_store(&store) {
                ContentCategory::Invalid => warn!(store = %store, "unknown manifest store, skipping"),
                category => manifest.insert(category, names),
            }
        }
        Ok(manifest)
    }
}

impl ManifestSource for StaticManifest {
    fn list(&self, category: ContentCategory) -> std::result::Result<Vec<String>, SourceUnavailable> {
        Ok(self.entries.get(&category).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_keyed_json() {
        let manifest = StaticManifest::from_json_str(
            r#"{
                "models": [],
                "textures": ["dungeon_01.jpg", "dungeon_02.jpg"],
                "audio": ["cricket_01.ogg"],
                "templates": ["gameData"],
                "shaders": ["ignored.wgsl"]
            }"#,
        )
        .unwrap();

        assert!(manifest.list(ContentCategory::Model).unwrap().is_empty());
        assert_eq!(
            manifest.list(ContentCategory::Texture).unwrap(),
            ["dungeon_01.jpg", "dungeon_02.jpg"]
        );
        assert_eq!(manifest.list(ContentCategory::Template).unwrap(), ["gameData"]);
        assert!(manifest.list(ContentCategory::Invalid).unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(StaticManifest::from_json_str(r#"{ "textures": "a.jpg" }"#).is_err());
    }
}
