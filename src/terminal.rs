use crate::render::{self, MarkupPolicy};
use crate::transcript::{ChatView, Transcript};
use crate::types::{Entry, ExchangeId, Message};
use std::collections::HashSet;
use std::io::{self, Write};
use tracing::warn;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const PROMPT: &str = "> ";

/// Transcript shown in a terminal.
///
/// On an ANSI terminal every scroll-to-end clears the screen and redraws
/// the tail of the conversation followed by a bare input prompt. Line
/// editing belongs to the terminal, so characters typed but not yet sent
/// stay in its line buffer and are submitted with the next Enter even if a
/// redraw has wiped them from the screen.
///
/// Otherwise output is a plain stream: each message is printed once, in
/// transcript order, and each pending indicator is announced once when it
/// first appears.
pub struct TerminalView<W: Write> {
    transcript: Transcript,
    out: W,
    policy: MarkupPolicy,
    history_lines: usize,
    ansi: bool,
    // Plain mode only: messages and indicators already written.
    printed: usize,
    announced: HashSet<ExchangeId>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, policy: MarkupPolicy, history_lines: usize, ansi: bool) -> Self {
        Self {
            transcript: Transcript::new(),
            out,
            policy,
            history_lines,
            ansi,
            printed: 0,
            announced: HashSet::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn redraw(&mut self) -> io::Result<()> {
        if !self.ansi {
            return self.print_new_entries();
        }

        self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        for entry in self.transcript.tail(self.history_lines) {
            let line = render::entry_line(entry, self.policy, self.ansi);
            writeln!(self.out, "{line}")?;
        }
        self.out.write_all(PROMPT.as_bytes())?;
        self.out.flush()
    }

    fn print_new_entries(&mut self) -> io::Result<()> {
        let mut seen = 0;
        for entry in self.transcript.entries() {
            match entry {
                Entry::Message(msg) => {
                    if seen == self.printed {
                        let line = render::message_line(msg, self.policy, false);
                        writeln!(self.out, "{line}")?;
                        self.printed += 1;
                    }
                    seen += 1;
                }
                Entry::Pending { exchange } => {
                    if self.announced.insert(*exchange) {
                        let line = render::entry_line(entry, self.policy, false);
                        writeln!(self.out, "{line}")?;
                    }
                }
            }
        }
        self.out.flush()
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn append(&mut self, message: Message) {
        self.transcript.append(message);
    }

    fn show_pending(&mut self, exchange: ExchangeId) {
        self.transcript.show_pending(exchange);
    }

    fn remove_pending(&mut self, exchange: ExchangeId) -> bool {
        self.transcript.remove_pending(exchange)
    }

    fn clear_input(&mut self) {
        self.transcript.clear_input();
    }

    fn scroll_to_end(&mut self) {
        self.transcript.scroll_to_end();
        if let Err(err) = self.redraw() {
            warn!("terminal redraw failed: {err}");
        }
    }
}
