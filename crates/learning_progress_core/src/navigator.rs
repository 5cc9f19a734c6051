//! crates/learning_progress_core/src/navigator.rs
//!
//! The page-turning state machine for a multi-topic reading sequence.
//!
//! The navigator owns the sequence and keeps each entry's stored page in step
//! with what it reports, so it doubles as the local copy of the learner's
//! progress. It never talks to the network itself: every transition returns the
//! [`PageUpdate`]s the caller must push to the server.

use uuid::Uuid;

use crate::sequencer::{SequenceEntry, TopicSequence};

/// A page number to persist for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageUpdate {
    pub topic_id: Uuid,
    pub page: u32,
}

/// The outcome of a single `advance` or `retreat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing moved. Either the sequence is empty or the learner is at an edge.
    Stay,
    /// The page changed within the active topic.
    Page { topic_id: Uuid, page: u32 },
    /// The active topic changed. `left` holds the page persisted for the topic
    /// being left.
    Topic {
        left: PageUpdate,
        topic_id: Uuid,
        page: u32,
    },
}

impl Transition {
    /// The writes the remote store needs to mirror this transition.
    pub fn updates(&self) -> Vec<PageUpdate> {
        match *self {
            Transition::Stay => Vec::new(),
            Transition::Page { topic_id, page } => vec![PageUpdate { topic_id, page }],
            Transition::Topic { left, .. } => vec![left],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageNavigator {
    entries: Vec<SequenceEntry>,
    active: usize,
    page: u32,
}

impl PageNavigator {
    /// Builds a navigator positioned on the sequence's default active topic.
    pub fn new(sequence: TopicSequence) -> Self {
        Self::starting_at(sequence, None)
    }

    /// Builds a navigator positioned on `requested` if it is part of the
    /// sequence, else on the default active topic.
    pub fn starting_at(sequence: TopicSequence, requested: Option<Uuid>) -> Self {
        let active = sequence.select_active(requested).unwrap_or(0);
        let entries = sequence.into_entries();
        let page = entries.get(active).map_or(1, SequenceEntry::resume_page);
        Self {
            entries,
            active,
            page,
        }
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn active_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.active)
    }

    pub fn active_topic(&self) -> Option<&SequenceEntry> {
        self.entries.get(self.active)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_next_topic(&self) -> bool {
        self.active + 1 < self.entries.len()
    }

    pub fn has_previous_topic(&self) -> bool {
        self.active > 0 && !self.entries.is_empty()
    }

    /// Progress through the active topic as a percentage.
    pub fn topic_percent(&self) -> f64 {
        match self.active_topic() {
            Some(entry) => f64::from(self.page) * 100.0 / f64::from(entry.last_page()),
            None => 0.0,
        }
    }

    pub fn advance(&mut self) -> Transition {
        let Some(entry) = self.entries.get(self.active) else {
            return Transition::Stay;
        };
        let (topic_id, total_pages, last_page) = (entry.topic_id, entry.total_pages, entry.last_page());

        if self.page < last_page {
            self.page += 1;
            return self.record_page();
        }
        if !self.has_next_topic() {
            return Transition::Stay;
        }

        let left = PageUpdate {
            topic_id,
            page: total_pages,
        };
        self.entries[self.active].current_page = total_pages;
        self.switch_to(self.active + 1, left)
    }

    pub fn retreat(&mut self) -> Transition {
        let Some(topic_id) = self.entries.get(self.active).map(|e| e.topic_id) else {
            return Transition::Stay;
        };

        if self.page > 1 {
            self.page -= 1;
            return self.record_page();
        }
        if !self.has_previous_topic() {
            return Transition::Stay;
        }

        let left = PageUpdate {
            topic_id,
            page: self.page,
        };
        self.entries[self.active].current_page = self.page;
        self.switch_to(self.active - 1, left)
    }

    fn record_page(&mut self) -> Transition {
        let entry = &mut self.entries[self.active];
        entry.current_page = self.page;
        Transition::Page {
            topic_id: entry.topic_id,
            page: self.page,
        }
    }

    fn switch_to(&mut self, index: usize, left: PageUpdate) -> Transition {
        self.active = index;
        let entry = &self.entries[index];
        self.page = entry.resume_page();
        Transition::Topic {
            left,
            topic_id: entry.topic_id,
            page: self.page,
        }
    }
}
