use chrono::{Local, Timelike};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

/// Wall-clock hour and minute captured when a message is submitted.
///
/// Displays without zero padding, so 9:05 renders as `9:5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    hour: u32,
    minute: u32,
}

impl Timestamp {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn now() -> Self {
        let now = Local::now();
        Self::new(now.hour(), now.minute())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hour, self.minute)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub author: Author,
    pub text: String,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn user(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            timestamp,
        }
    }

    pub fn bot(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            author: Author::Bot,
            text: text.into(),
            timestamp,
        }
    }
}

/// Submission sequence number of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ExchangeId(pub u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    Message(Message),
    Pending { exchange: ExchangeId },
}
