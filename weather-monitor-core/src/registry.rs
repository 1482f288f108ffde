//! Fixed list of configured weather sources plus the single active selection.

use chrono::{DateTime, Utc};

use crate::error::RegistryError;
use crate::source::{Source, SourceStatus};

/// Holds every configured [`Source`] in registration order.
///
/// At most one source is active. Nothing is forced active at start-up; the
/// only way to change the selection is [`select`](Self::select) (or its
/// by-name twin).
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    active: Option<usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Intended for start-up only; registering an already
    /// active source does not change the current selection.
    pub fn register(&mut self, mut source: Source) {
        source.set_active(false);
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn select(&mut self, index: usize) -> Result<&Source, RegistryError> {
        let len = self.sources.len();
        if index >= len {
            return Err(RegistryError::InvalidIndex { index, len });
        }

        for (i, source) in self.sources.iter_mut().enumerate() {
            source.set_active(i == index);
        }
        self.active = Some(index);

        Ok(&self.sources[index])
    }

    pub fn select_by_name(&mut self, name: &str) -> Result<&Source, RegistryError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| RegistryError::UnknownSource { name: name.to_string() })?;
        self.select(index)
    }

    pub fn active(&self) -> Option<&Source> {
        self.active.and_then(|i| self.sources.get(i))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Registration order, not sorted by priority.
    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    /// Sources ordered by priority (lower first), ties kept in registration order.
    pub fn by_priority(&self) -> Vec<&Source> {
        let mut sorted: Vec<&Source> = self.sources.iter().collect();
        sorted.sort_by_key(|s| s.priority());
        sorted
    }

    pub fn get(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name() == name)
    }

    /// Write a probe outcome onto the named source. Returns the updated source,
    /// or `None` if no source has that name.
    pub(crate) fn record_status(
        &mut self,
        name: &str,
        status: SourceStatus,
        at: DateTime<Utc>,
    ) -> Option<&Source> {
        let source = self.sources.iter_mut().find(|s| s.name() == name)?;
        source.record_status(status, at);
        Some(source)
    }
}
