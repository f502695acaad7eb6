//! Narrow interfaces to the collaborators living outside the canvas core:
//! the content generator, the navigator, and the background indexer.

pub mod indexing;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
}

/// Supplies `{title, content}` pairs to be placed around a parent node.
pub trait ContentGenerator {
    fn generate(&mut self, prompt: &str) -> anyhow::Result<Vec<GeneratedContent>>;
}

/// Opaque `{source, metadata}` tuple handed to the navigator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub source: String,
    pub metadata: BTreeMap<String, String>,
}

pub trait Navigator {
    fn navigate(&mut self, target: NavigationTarget);
}

// Records every target; handy as a default sink and in tests
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pub visited: Vec<NavigationTarget>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&mut self, target: NavigationTarget) {
        log::debug!("navigate to {}", target.source);
        self.visited.push(target);
    }
}
