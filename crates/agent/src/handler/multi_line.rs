//! Multi-line aggregation behind a "new message begins here" pattern.
//!
//! Consecutive physical lines are joined with an escaped line feed into
//! one logical message. A line matching the new-content pattern ships
//! whatever is buffered first; an idle flush timer ships incomplete
//! messages when the stream goes quiet.

use std::time::Duration;

use bytes::BytesMut;
use regex::bytes::Regex;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use super::{trim_whitespace, CHANNEL_SLOTS, ESCAPED_LINE_FEED, TRUNCATED_FLAG};
use crate::message::Message;

pub struct MultiLineHandler {
    input_tx: Option<mpsc::Sender<Message>>,
    startup: Option<Startup>,
}

struct Startup {
    input_rx: mpsc::Receiver<Message>,
    aggregator: MultiLineAggregator,
    flush_timeout: Duration,
}

impl MultiLineHandler {
    pub fn new(
        output_tx: mpsc::Sender<Message>,
        new_content_re: Regex,
        flush_timeout: Duration,
        line_limit: usize,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(CHANNEL_SLOTS);
        Self {
            input_tx: Some(input_tx),
            startup: Some(Startup {
                input_rx,
                aggregator: MultiLineAggregator::new(output_tx, new_content_re, line_limit),
                flush_timeout,
            }),
        }
    }

    /// Spawn the worker consuming queued inputs.
    pub fn start(&mut self) {
        let Startup {
            input_rx,
            aggregator,
            flush_timeout,
        } = self.startup.take().expect("start() called twice");
        tokio::spawn(run(input_rx, aggregator, flush_timeout));
    }

    /// Enqueue one input. Suspends while the worker is busy, so
    /// backpressure from the output sink reaches the caller.
    pub async fn handle(&self, input: Message) {
        let input_tx = self.input_tx.as_ref().expect("handle() called after stop()");
        input_tx
            .send(input)
            .await
            .expect("line handler worker exited");
    }

    /// Close the input side. The worker drains outstanding inputs,
    /// issues one terminal flush, and closes the output sink.
    pub fn stop(&mut self) {
        self.input_tx.take();
    }
}

/// Consumer loop: owns the input channel, the idle timer, and the
/// terminal flush. Runs until the input side closes. Also adopted by
/// the auto-sensing handler once it commits to multi-line mode.
pub(crate) async fn run(
    mut input_rx: mpsc::Receiver<Message>,
    mut aggregator: MultiLineAggregator,
    flush_timeout: Duration,
) {
    let idle = sleep(flush_timeout);
    tokio::pin!(idle);
    loop {
        tokio::select! {
            maybe_input = input_rx.recv() => match maybe_input {
                Some(input) => {
                    aggregator.process(input).await;
                    idle.as_mut().reset(Instant::now() + flush_timeout);
                }
                None => break,
            },
            // No line for a while: whatever is buffered is complete.
            // The guard keeps an empty buffer from spinning the timer.
            () = idle.as_mut(), if aggregator.has_pending() => {
                trace!("idle flush");
                aggregator.flush().await;
            }
        }
    }
    // Input closed, possibly between two timer ticks: emit what is
    // buffered, then close the sink by dropping the output sender.
    aggregator.flush().await;
}

/// The aggregation state machine, kept separate from the channel
/// plumbing so the auto-sensing handler can adopt it mid-stream.
pub(crate) struct MultiLineAggregator {
    output_tx: mpsc::Sender<Message>,
    new_content_re: Regex,
    buffer: BytesMut,
    line_limit: usize,
    should_truncate: bool,
    raw_data_len: usize,
    status: String,
    timestamp: String,
}

impl MultiLineAggregator {
    pub(crate) fn new(
        output_tx: mpsc::Sender<Message>,
        new_content_re: Regex,
        line_limit: usize,
    ) -> Self {
        Self {
            output_tx,
            new_content_re,
            buffer: BytesMut::new(),
            line_limit,
            should_truncate: false,
            raw_data_len: 0,
            status: String::new(),
            timestamp: String::new(),
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.raw_data_len > 0
    }

    /// Fold one input into the buffer, shipping the previous message
    /// when this line starts a new one and cutting the buffer when it
    /// crosses the line limit.
    pub(crate) async fn process(&mut self, input: Message) {
        if self.new_content_re.is_match(&input.content) {
            // This line is part of a new message; ship the buffer.
            self.flush().await;
        }

        let was_truncated = self.should_truncate;
        self.should_truncate = false;

        // Offset accounting follows every input, even ones whose
        // payload later trims away.
        self.raw_data_len += input.raw_data_len;
        self.timestamp = input.timestamp;
        self.status = input.status;

        if !self.buffer.is_empty() {
            // Not the first line of the message: escape the join so the
            // transport sees a single frame.
            self.buffer.extend_from_slice(ESCAPED_LINE_FEED);
        }

        if was_truncated {
            // The previous flush cut this message at the limit; the new
            // bytes are a remainder.
            self.buffer.extend_from_slice(TRUNCATED_FLAG);
        }

        self.buffer.extend_from_slice(&input.content);

        if self.buffer.len() >= self.line_limit {
            debug!(line_limit = self.line_limit, "multi-line message over the limit, truncating");
            self.buffer.extend_from_slice(TRUNCATED_FLAG);
            self.flush().await;
            self.should_truncate = true;
        }
    }

    /// Emit the buffered aggregate when it carries payload or offset
    /// progress, then reset. Whitespace-only buffers still advance the
    /// offset accounting so restarts resume at the right byte.
    pub(crate) async fn flush(&mut self) {
        let content = trim_whitespace(&self.buffer).to_vec();
        if !content.is_empty() || self.raw_data_len > 0 {
            let output = Message::new(
                content,
                self.status.clone(),
                self.raw_data_len,
                self.timestamp.clone(),
            );
            self.output_tx
                .send(output)
                .await
                .expect("output sink closed before the handler stopped");
        }
        self.buffer.clear();
        self.raw_data_len = 0;
        self.should_truncate = false;
    }
}
