//! crates/learning_progress_core/src/sequencer.rs
//!
//! Derives the ordered reading view of a learner's assigned topics.

use uuid::Uuid;

use crate::domain::is_complete;

/// One topic of a learning sequence together with the learner's stored page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    pub topic_id: Uuid,
    pub name: String,
    pub current_page: u32,
    pub total_pages: u32,
}

impl SequenceEntry {
    pub fn new(topic_id: Uuid, name: impl Into<String>, current_page: u32, total_pages: u32) -> Self {
        Self {
            topic_id,
            name: name.into(),
            current_page,
            total_pages,
        }
    }

    pub fn is_complete(&self) -> bool {
        is_complete(self.current_page, self.total_pages)
    }

    /// The highest page the navigator may show. Zero-page documents still show one page.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    /// Where reading resumes: the stored page, or 1 if the topic was never opened.
    pub fn resume_page(&self) -> u32 {
        self.current_page.clamp(1, self.last_page())
    }
}

/// An ordered view over a learner's topics: completed topics first, then the
/// incomplete ones, each group keeping its assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSequence {
    entries: Vec<SequenceEntry>,
}

impl TopicSequence {
    pub fn new(entries: Vec<SequenceEntry>) -> Self {
        let (mut ordered, incomplete): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(SequenceEntry::is_complete);
        ordered.extend(incomplete);
        Self { entries: ordered }
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<SequenceEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, topic_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.topic_id == topic_id)
    }

    /// The first incomplete topic, else the last topic. `None` for an empty sequence.
    pub fn active_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| !e.is_complete())
            .or_else(|| self.entries.len().checked_sub(1))
    }

    pub fn active(&self) -> Option<&SequenceEntry> {
        self.active_index().map(|i| &self.entries[i])
    }

    /// An explicitly requested topic wins when it is part of the sequence;
    /// otherwise falls back to [`TopicSequence::active_index`].
    pub fn select_active(&self, requested: Option<Uuid>) -> Option<usize> {
        requested
            .and_then(|id| self.position(id))
            .or_else(|| self.active_index())
    }

    pub fn completed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_complete()).count()
    }

    /// Pages read over pages available, as a percentage in `[0, 100]`.
    pub fn percent_complete(&self) -> f64 {
        let (read, total) = self.entries.iter().fold((0u64, 0u64), |(read, total), e| {
            (
                read + u64::from(e.current_page.min(e.total_pages)),
                total + u64::from(e.total_pages),
            )
        });
        if total == 0 {
            return 0.0;
        }
        read as f64 * 100.0 / total as f64
    }
}
