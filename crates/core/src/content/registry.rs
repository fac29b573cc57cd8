use std::collections::BTreeMap;

use serde_json::Value;

use super::{ContentCategory, ContentItem};

/// Loaded content for one session, grouped by category.
///
/// Items keep the order they were inserted in, which the pipeline guarantees
/// to be manifest order. The registry is only ever cleared as a whole.
#[derive(Debug, Default)]
pub struct ContentRegistry {
    items: BTreeMap<ContentCategory, Vec<ContentItem>>,
    document: Option<Value>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items of `category` in insertion order.
    pub fn items(&self, category: ContentCategory) -> &[ContentItem] {
        self.items
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, category: ContentCategory, name: &str) -> Option<&ContentItem> {
        self.items(category).iter().find(|item| item.name() == name)
    }

    pub fn contains(&self, category: ContentCategory, name: &str) -> bool {
        self.get(category, name).is_some()
    }

    /// Categories that hold at least one item.
    pub fn categories(&self) -> impl Iterator<Item = ContentCategory> + '_ {
        self.items
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(category, _)| *category)
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.document.is_none()
    }

    /// The structured template document of the session, once resolved.
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Appends a valid item to its category and returns a reference to it.
    /// Invalid items are refused.
    pub(crate) fn insert(&mut self, item: ContentItem) -> Option<&ContentItem> {
        if !item.is_valid() {
            return None;
        }
        let items = self.items.entry(item.category()).or_default();
        items.push(item);
        items.last()
    }

    pub(crate) fn set_document(&mut self, document: Value) {
        self.document = Some(document);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.document = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Payload;

    fn loaded(category: ContentCategory, name: &str) -> ContentItem {
        let mut item = ContentItem::new(category, name);
        item.attach(Payload::new(()));
        item
    }

    #[test]
    fn keeps_insertion_order_per_category() {
        let mut registry = ContentRegistry::new();
        registry.insert(loaded(ContentCategory::Audio, "cricket_02.ogg"));
        registry.insert(loaded(ContentCategory::Texture, "dungeon_01.jpg"));
        registry.insert(loaded(ContentCategory::Audio, "cricket_01.ogg"));

        let names: Vec<_> = registry
            .items(ContentCategory::Audio)
            .iter()
            .map(ContentItem::name)
            .collect();
        assert_eq!(names, ["cricket_02.ogg", "cricket_01.ogg"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(ContentCategory::Texture, "dungeon_01.jpg"));
        assert!(!registry.contains(ContentCategory::Model, "dungeon_01.jpg"));
    }

    #[test]
    fn refuses_invalid_items() {
        let mut registry = ContentRegistry::new();
        assert!(registry.insert(ContentItem::new(ContentCategory::Invalid, "x")).is_none());
        assert!(registry.is_empty());
        assert!(registry.items(ContentCategory::Invalid).is_empty());
    }

    #[test]
    fn clear_empties_every_category_and_the_document() {
        let mut registry = ContentRegistry::new();
        registry.insert(loaded(ContentCategory::Model, "crate.glb"));
        registry.set_document(serde_json::json!({ "gameData": {} }));
        assert_eq!(registry.categories().collect::<Vec<_>>(), [ContentCategory::Model]);

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.document().is_none());
        for category in ContentCategory::LOADABLE {
            assert!(registry.items(category).is_empty());
        }
    }
}
