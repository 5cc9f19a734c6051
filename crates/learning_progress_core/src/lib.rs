pub mod domain;
pub mod navigator;
pub mod ports;
pub mod sequencer;
pub mod tracker;

pub use domain::{Document, LearningHistory, Topic, TopicWithDocument, User, UserDocumentProgress};
pub use navigator::{PageNavigator, PageUpdate, Transition};
pub use ports::{DatabaseService, DocumentStorage, PortError, PortResult, ProgressSync};
pub use sequencer::{SequenceEntry, TopicSequence};
pub use tracker::ProgressTracker;
