//! Line handlers — raw physical lines in, transport-ready messages out.
//!
//! The handler sits between the byte reader and the downstream
//! transport. Three variants exist, selected at construction:
//! - [`SingleLineHandler`]: one output per input, over-limit truncation
//! - [`MultiLineHandler`]: aggregates consecutive inputs into one output
//!   behind a "new message begins here" pattern
//! - [`AutoMultilineHandler`]: probes the first inputs against a
//!   timestamp catalogue, then commits to single- or multi-line handling
//!
//! Every handler is a single-owner worker fed through a bounded channel:
//! `handle` enqueues one input, `start` spawns the worker, `stop` closes
//! the input side. The worker drains outstanding inputs, flushes, and
//! closes the output sink exactly once.

pub mod auto_multiline;
pub mod multi_line;
pub mod single_line;
pub mod timestamps;

use std::time::Duration;

use regex::bytes::Regex;
use tokio::sync::mpsc;

use crate::config::{AgentConfig, ConfigError};
use crate::message::Message;

pub use auto_multiline::AutoMultilineHandler;
pub use multi_line::MultiLineHandler;
pub use single_line::SingleLineHandler;

/// Flag appended to the tail of a truncated output and prepended to the
/// head of the output carrying its continuation.
pub const TRUNCATED_FLAG: &[u8] = b"...TRUNCATED...";

/// Escaped line feed inserted between aggregated lines. The transport
/// frames messages with a real line feed, so embedded ones are escaped.
pub const ESCAPED_LINE_FEED: &[u8] = b"\\n";

/// How long a multi-line buffer may sit idle before it is flushed.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Capacity of the handler's input channel. One slot: backpressure from
/// the downstream sink reaches `handle` callers, nothing queues up.
pub(crate) const CHANNEL_SLOTS: usize = 1;

/// Strip leading and trailing ASCII whitespace (space, tab, CR, LF,
/// vertical tab, form feed). `u8::is_ascii_whitespace` excludes the
/// vertical tab, so the predicate is spelled out.
pub(crate) fn trim_whitespace(content: &[u8]) -> &[u8] {
    fn is_space(b: u8) -> bool {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
    }
    let start = match content.iter().position(|&b| !is_space(b)) {
        Some(start) => start,
        None => return &[],
    };
    let end = content.iter().rposition(|&b| !is_space(b)).unwrap_or(0) + 1;
    &content[start..end]
}

/// A constructed line handler, one of the three variants.
pub enum LineHandler {
    SingleLine(SingleLineHandler),
    MultiLine(MultiLineHandler),
    AutoMultiline(AutoMultilineHandler),
}

impl LineHandler {
    /// Pick and build the handler variant the configuration asks for:
    /// an explicit multi-line pattern wins, auto-sensing comes next,
    /// single-line is the fallback.
    pub fn from_config(
        output_tx: mpsc::Sender<Message>,
        config: &AgentConfig,
    ) -> Result<Self, ConfigError> {
        let multiline = &config.multiline;
        if multiline.enabled {
            if let Some(pattern) = &multiline.pattern {
                let new_content_re =
                    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                return Ok(Self::MultiLine(MultiLineHandler::new(
                    output_tx,
                    new_content_re,
                    Duration::from_millis(multiline.flush_timeout_ms),
                    config.line_limit,
                )));
            }
            if multiline.auto_detect {
                return Ok(Self::AutoMultiline(AutoMultilineHandler::new(
                    output_tx,
                    config.line_limit,
                    multiline.sample_lines,
                )));
            }
        }
        Ok(Self::SingleLine(SingleLineHandler::new(
            output_tx,
            config.line_limit,
        )))
    }

    /// Spawn the worker.
    pub fn start(&mut self) {
        match self {
            Self::SingleLine(h) => h.start(),
            Self::MultiLine(h) => h.start(),
            Self::AutoMultiline(h) => h.start(),
        }
    }

    /// Enqueue one input for processing.
    pub async fn handle(&self, input: Message) {
        match self {
            Self::SingleLine(h) => h.handle(input).await,
            Self::MultiLine(h) => h.handle(input).await,
            Self::AutoMultiline(h) => h.handle(input).await,
        }
    }

    /// Close the input side. The worker drains, flushes, and closes the
    /// output sink.
    pub fn stop(&mut self) {
        match self {
            Self::SingleLine(h) => h.stop(),
            Self::MultiLine(h) => h.stop(),
            Self::AutoMultiline(h) => h.stop(),
        }
    }
}
