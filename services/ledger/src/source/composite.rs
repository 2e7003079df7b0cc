//! Composite source — priority stack with deduplication
//!
//! Children are added in priority order. For an identifier held by several
//! children, the first-added child that holds it serves it; later copies
//! are shadowed. Adding archive sources before the live directory therefore
//! prefers validated backup copies over raw captures.

use super::{SnapshotSource, SourceError};
use crate::naming::sort_by_content;
use std::collections::HashMap;

/// Ordered stack of sources presenting one deduplicated feed.
#[derive(Default)]
pub struct CompositeSource {
    sources: Vec<Box<dyn SnapshotSource>>,
    /// Identifier -> index of the winning source.
    entries: HashMap<String, usize>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source below every source added so far.
    pub fn add(&mut self, source: Box<dyn SnapshotSource>) {
        let index = self.sources.len();
        for name in source.list() {
            self.entries.entry(name).or_insert(index);
        }
        self.sources.push(source);
    }

    /// Builder-style [`CompositeSource::add`].
    pub fn with(mut self, source: impl SnapshotSource + 'static) -> Self {
        self.add(Box::new(source));
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Label of the source that serves `name`, if any.
    pub fn provider_of(&self, name: &str) -> Option<String> {
        self.entries
            .get(name)
            .map(|&index| self.sources[index].describe())
    }
}

impl SnapshotSource for CompositeSource {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        sort_by_content(&mut names);
        names
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        match self.entries.get(name) {
            Some(&index) => self.sources[index].get(name),
            None => Err(SourceError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        let children: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("composite[{}]", children.join(", "))
    }
}
