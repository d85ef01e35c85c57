use log::{Level, log};

use crate::processor::Action;

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    PageFetched { item_count: usize },
    ItemProcessed { id: String, file_name: String },
    ItemFailed { id: String, file_name: String, error: String },
    NoMoreItems,
    Finished { total: u64 },
}

pub trait Reporter {
    fn report(&self, action: &Action, event: RunEvent);
}

/// Writes run events to the log.
pub struct LogReporter {
    noun: &'static str,
}

impl LogReporter {
    pub fn new(noun: &'static str) -> LogReporter {
        LogReporter { noun }
    }

    fn line(&self, action: &Action, event: RunEvent) -> (Level, String) {
        let noun = self.noun;
        match event {
            RunEvent::PageFetched { item_count } => (
                Level::Info,
                format!(
                    "Found {item_count} {noun} on this page. {verb}...",
                    verb = action.present_participle()
                ),
            ),
            RunEvent::ItemProcessed { id, file_name } => (
                Level::Info,
                format!("{verb}: {file_name} (ID: {id})", verb = action.past_tense()),
            ),
            RunEvent::ItemFailed {
                id,
                file_name,
                error,
            } => (
                Level::Error,
                format!(
                    "Error {verb} {file_name} (ID: {id}): {error}",
                    verb = action.present_participle().to_lowercase()
                ),
            ),
            RunEvent::NoMoreItems => (Level::Info, format!("No more {noun} found.")),
            RunEvent::Finished { total } => (
                Level::Info,
                format!(
                    "Total {noun} {verb}: {total}",
                    verb = action.past_tense().to_lowercase()
                ),
            ),
        }
    }
}

impl Reporter for LogReporter {
    fn report(&self, action: &Action, event: RunEvent) {
        let (level, line) = self.line(action, event);
        log!(level, "{line}");
    }
}
