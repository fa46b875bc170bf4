use crate::types::{Entry, ExchangeId, Message};

/// Surface the conversation controller renders into.
///
/// Messages are append-only. The only entries that ever leave the view are
/// pending indicators, and only the one belonging to the given exchange.
pub trait ChatView {
    fn append(&mut self, message: Message);
    fn show_pending(&mut self, exchange: ExchangeId);
    /// Returns false when no indicator for `exchange` is on screen.
    fn remove_pending(&mut self, exchange: ExchangeId) -> bool;
    fn clear_input(&mut self);
    fn scroll_to_end(&mut self);
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    input: String,
    scrolled_to: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(msg) => Some(msg),
            Entry::Pending { .. } => None,
        })
    }

    pub fn pending(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Pending { exchange } => Some(*exchange),
            Entry::Message(_) => None,
        })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// True when the last scroll happened after the latest change.
    pub fn is_scrolled_to_end(&self) -> bool {
        self.scrolled_to == self.entries.len()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> &[Entry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

impl ChatView for Transcript {
    fn append(&mut self, message: Message) {
        self.entries.push(Entry::Message(message));
    }

    fn show_pending(&mut self, exchange: ExchangeId) {
        self.entries.push(Entry::Pending { exchange });
    }

    fn remove_pending(&mut self, exchange: ExchangeId) -> bool {
        let pos = self
            .entries
            .iter()
            .position(|entry| matches!(entry, Entry::Pending { exchange: e } if *e == exchange));
        match pos {
            Some(pos) => {
                self.entries.remove(pos);
                if self.scrolled_to > pos {
                    self.scrolled_to -= 1;
                }
                true
            }
            None => false,
        }
    }

    fn clear_input(&mut self) {
        self.input.clear();
    }

    fn scroll_to_end(&mut self) {
        self.scrolled_to = self.entries.len();
    }
}
