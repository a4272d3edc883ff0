// Retry counter entity
// Consecutive failed polls per source since the last success

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::SourceKey;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryCounter(BTreeMap<SourceKey, u32>);

impl RetryCounter {
    pub fn with_sources<'a>(sources: impl IntoIterator<Item = &'a SourceKey>) -> Self {
        let mut counter = Self::default();
        counter.ensure_sources(sources);
        counter
    }

    /// Adds missing sources at zero; existing counts are kept.
    pub fn ensure_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a SourceKey>) {
        for source in sources {
            self.0.entry(source.clone()).or_insert(0);
        }
    }

    pub fn get(&self, source: &SourceKey) -> u32 {
        self.0.get(source).copied().unwrap_or(0)
    }

    pub fn set(&mut self, source: &SourceKey, value: u32) {
        self.0.insert(source.clone(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceKey, u32)> {
        self.0.iter().map(|(key, value)| (key, *value))
    }
}
