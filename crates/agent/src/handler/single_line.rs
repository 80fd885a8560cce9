//! Single-line handling: one output per input, over-limit truncation.
//!
//! Tracks line length against the configured limit and cuts over-long
//! content, while keeping `raw_data_len` true to the source bytes so
//! the tailer restarts from the right offset.

use tokio::sync::mpsc;
use tracing::trace;

use super::{trim_whitespace, CHANNEL_SLOTS, TRUNCATED_FLAG};
use crate::message::Message;

pub struct SingleLineHandler {
    input_tx: Option<mpsc::Sender<Message>>,
    startup: Option<Startup>,
}

/// Everything the worker takes with it on `start`.
struct Startup {
    input_rx: mpsc::Receiver<Message>,
    processor: SingleLineProcessor,
}

impl SingleLineHandler {
    pub fn new(output_tx: mpsc::Sender<Message>, line_limit: usize) -> Self {
        let (input_tx, input_rx) = mpsc::channel(CHANNEL_SLOTS);
        Self {
            input_tx: Some(input_tx),
            startup: Some(Startup {
                input_rx,
                processor: SingleLineProcessor::new(output_tx, line_limit),
            }),
        }
    }

    /// Spawn the worker consuming queued inputs.
    pub fn start(&mut self) {
        let Startup {
            mut input_rx,
            mut processor,
        } = self.startup.take().expect("start() called twice");
        tokio::spawn(async move {
            while let Some(input) = input_rx.recv().await {
                processor.process(input).await;
            }
            // Input side closed: dropping the processor releases the
            // output sender, which closes the sink downstream.
        });
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

    /// Close the input side. The worker drains outstanding inputs and
    /// then closes the output sink.
    pub fn stop(&mut self) {
        self.input_tx.take();
    }
}

/// The truncation state machine, kept separate from the channel
/// plumbing so the auto-sensing handler can drive it inline while
/// probing.
pub(crate) struct SingleLineProcessor {
    output_tx: mpsc::Sender<Message>,
    line_limit: usize,
    should_truncate: bool,
}

impl SingleLineProcessor {
    pub(crate) fn new(output_tx: mpsc::Sender<Message>, line_limit: usize) -> Self {
        Self {
            output_tx,
            line_limit,
            should_truncate: false,
        }
    }

    /// Surrender the output sender. Used by the auto-sensing handler
    /// when it commits to multi-line mode; the sink stays open across
    /// the switch.
    pub(crate) fn into_output(self) -> mpsc::Sender<Message> {
        self.output_tx
    }

    /// Emit the input, trimmed and cut to the line limit. The content
    /// may shrink; `raw_data_len` never does — it tracks source bytes,
    /// not payload bytes.
    pub(crate) async fn process(&mut self, mut input: Message) {
        let was_truncated = self.should_truncate;
        self.should_truncate = false;

        let trimmed = trim_whitespace(&input.content);

        let mut content = if was_truncated {
            // The previous line was cut at the limit; this input is the
            // remainder and carries the flag at its head.
            let mut content = Vec::with_capacity(TRUNCATED_FLAG.len() + trimmed.len());
            content.extend_from_slice(TRUNCATED_FLAG);
            content.extend_from_slice(trimmed);
            content
        } else {
            trimmed.to_vec()
        };

        if content.len() < self.line_limit {
            input.content = content;
            self.send(input).await;
        } else {
            // Too long: cut here and flag the next input as remainder.
            trace!(line_limit = self.line_limit, "line over the limit, truncating");
            content.extend_from_slice(TRUNCATED_FLAG);
            input.content = content;
            self.send(input).await;
            self.should_truncate = true;
        }
    }

    async fn send(&self, output: Message) {
        self.output_tx
            .send(output)
            .await
            .expect("output sink closed before the handler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &[u8], raw_data_len: usize) -> Message {
        Message::new(content.to_vec(), "info", raw_data_len, "2021-01-01T00:00:00Z")
    }

    async fn drain(output_rx: &mut mpsc::Receiver<Message>) -> Vec<Message> {
        let mut outputs = Vec::new();
        while let Some(output) = output_rx.recv().await {
            outputs.push(output);
        }
        outputs
    }

    // ─── Pass-through ───────────────────────────────────────────

    #[tokio::test]
    async fn test_short_lines_pass_through_trimmed() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 100);
        handler.start();

        handler.handle(msg(b"  hello world \t", 16)).await;
        handler.stop();

        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].content, b"hello world");
        assert_eq!(outputs[0].raw_data_len, 16);
        assert_eq!(outputs[0].status, "info");
        assert_eq!(outputs[0].timestamp, "2021-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_empty_after_trim_still_emitted() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 100);
        handler.start();

        handler.handle(msg(b"   \t  ", 7)).await;
        handler.stop();

        // Blank lines still advance the offset accounting.
        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].content.is_empty());
        assert_eq!(outputs[0].raw_data_len, 7);
    }

    // ─── Truncation chains ──────────────────────────────────────

    #[tokio::test]
    async fn test_exact_limit_line_is_flagged_both_sides() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 20);
        handler.start();

        handler.handle(msg(&[b'a'; 20], 21)).await;
        handler.handle(msg(b"tail!", 6)).await;
        handler.stop();

        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].content.ends_with(TRUNCATED_FLAG));
        assert_eq!(outputs[0].content.len(), 20 + TRUNCATED_FLAG.len());
        assert!(outputs[1].content.starts_with(TRUNCATED_FLAG));
    }

    #[tokio::test]
    async fn test_naturally_short_input_closes_the_chain() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 50);
        handler.start();

        handler.handle(msg(&[b'a'; 60], 61)).await;
        handler.handle(msg(b"tail", 5)).await;
        handler.handle(msg(b"fresh line", 11)).await;
        handler.stop();

        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].content.ends_with(TRUNCATED_FLAG));
        // The remainder closes the chain: flagged head, plain tail.
        let mut expected = TRUNCATED_FLAG.to_vec();
        expected.extend_from_slice(b"tail");
        assert_eq!(outputs[1].content, expected);
        assert_eq!(outputs[2].content, b"fresh line");
    }

    #[tokio::test]
    async fn test_long_run_keeps_chaining() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 30);
        handler.start();

        handler.handle(msg(&[b'x'; 30], 30)).await;
        handler.handle(msg(&[b'y'; 30], 30)).await;
        handler.handle(msg(b"end", 4)).await;
        handler.stop();

        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].content.ends_with(TRUNCATED_FLAG));
        assert!(outputs[1].content.starts_with(TRUNCATED_FLAG));
        assert!(outputs[1].content.ends_with(TRUNCATED_FLAG));
        assert!(outputs[2].content.starts_with(TRUNCATED_FLAG));
        assert!(outputs[2].content.ends_with(b"end"));
    }

    // ─── Invariants ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_raw_data_len_is_conserved() {
        let (output_tx, mut output_rx) = mpsc::channel(16);
        let mut handler = SingleLineHandler::new(output_tx, 25);
        handler.start();

        let inputs = vec![
            msg(b"plain", 6),
            msg(&[b'z'; 25], 26),
            msg(b"remainder", 10),
            msg(b"   ", 4),
        ];
        let total: usize = inputs.iter().map(|m| m.raw_data_len).sum();
        for input in inputs {
            handler.handle(input).await;
        }
        handler.stop();

        let outputs = drain(&mut output_rx).await;
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs.iter().map(|m| m.raw_data_len).sum::<usize>(), total);
    }

    #[tokio::test]
    async fn test_stop_closes_output_once() {
        let (output_tx, mut output_rx) = mpsc::channel(8);
        let mut handler = SingleLineHandler::new(output_tx, 100);
        handler.start();
        handler.stop();

        assert!(output_rx.recv().await.is_none());
    }
}
