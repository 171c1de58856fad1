use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::config::UntaggedPolicy;
use super::item::NormalizedItem;
use super::palette::{color_for_key, Rgb};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagInfo {
    pub name: String,
    pub count: usize,
    pub color: Rgb,
}

/// Every tag used by the loaded items, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    tags: IndexMap<String, TagInfo>,
    untagged: usize,
}

impl TagCatalog {
    pub fn from_items(items: &[NormalizedItem]) -> Self {
        let mut catalog = Self::default();
        let mut by_input: Vec<&NormalizedItem> = items.iter().collect();
        by_input.sort_by_key(|item| item.input_order);
        for item in by_input {
            if item.tags.is_empty() {
                catalog.untagged += 1;
            }
            for tag in &item.tags {
                catalog
                    .tags
                    .entry(tag.clone())
                    .or_insert_with(|| TagInfo {
                        name: tag.clone(),
                        count: 0,
                        color: color_for_key(tag),
                    })
                    .count += 1;
            }
        }
        catalog
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagInfo> {
        self.tags.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&TagInfo> {
        self.tags.get(name)
    }

    pub fn get_index(&self, index: usize) -> Option<&TagInfo> {
        self.tags.get_index(index).map(|(_, info)| info)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn untagged_count(&self) -> usize {
        self.untagged
    }
}

/// The active-tag predicate. An item passes when any of its tags is active;
/// items without tags follow the untagged policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TagFilter {
    active: IndexSet<String>,
    untagged: UntaggedPolicy,
}

impl TagFilter {
    pub fn new<I, S>(active: I, untagged: UntaggedPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            active: active.into_iter().map(Into::into).collect(),
            untagged,
        }
    }

    pub fn all(catalog: &TagCatalog, untagged: UntaggedPolicy) -> Self {
        Self::new(catalog.names(), untagged)
    }

    pub fn admits(&self, item: &NormalizedItem) -> bool {
        if item.tags.is_empty() {
            return self.untagged == UntaggedPolicy::Show;
        }
        item.tags.iter().any(|tag| self.active.contains(tag))
    }

    pub fn is_active(&self, tag: &str) -> bool {
        self.active.contains(tag)
    }

    /// Returns whether the set changed.
    pub fn set(&mut self, tag: &str, on: bool) -> bool {
        if on {
            self.active.insert(tag.to_string())
        } else {
            self.active.shift_remove(tag)
        }
    }

    pub fn replace<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: IndexSet<String> = tags.into_iter().map(Into::into).collect();
        let changed = next.len() != self.active.len() || !next.iter().all(|t| self.active.contains(t));
        self.active = next;
        changed
    }

    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn untagged_policy(&self) -> UntaggedPolicy {
        self.untagged
    }
}
