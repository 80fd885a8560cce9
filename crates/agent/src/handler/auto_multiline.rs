//! Multi-line auto-sensing: single-line until a stable timestamp
//! prefix emerges.
//!
//! The first inputs are probed against the built-in timestamp
//! catalogue while being forwarded single-line — probing is passive,
//! nothing is withheld. Once enough consecutive inputs match one
//! surviving pattern the handler commits to multi-line mode with that
//! pattern; the first input matching none commits to single-line mode
//! for good.

use regex::bytes::Regex;
use tokio::sync::mpsc;
use tracing::debug;

use super::multi_line::{self, MultiLineAggregator};
use super::single_line::SingleLineProcessor;
use super::{timestamps, CHANNEL_SLOTS, DEFAULT_FLUSH_TIMEOUT};
use crate::message::Message;

pub struct AutoMultilineHandler {
    input_tx: Option<mpsc::Sender<Message>>,
    startup: Option<Startup>,
}

struct Startup {
    input_rx: mpsc::Receiver<Message>,
    single: SingleLineProcessor,
    probe: Probe,
    line_limit: usize,
}

impl AutoMultilineHandler {
    pub fn new(
        output_tx: mpsc::Sender<Message>,
        line_limit: usize,
        lines_to_assess: usize,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(CHANNEL_SLOTS);
        Self {
            input_tx: Some(input_tx),
            startup: Some(Startup {
                input_rx,
                single: SingleLineProcessor::new(output_tx, line_limit),
                probe: Probe::new(lines_to_assess),
                line_limit,
            }),
        }
    }

    /// Spawn the worker consuming queued inputs.
    pub fn start(&mut self) {
        let Startup {
            input_rx,
            single,
            probe,
            line_limit,
        } = self.startup.take().expect("start() called twice");
        tokio::spawn(run(input_rx, single, probe, line_limit));
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

    /// Close the input side. Whichever mode is active drains, flushes,
    /// and closes the output sink.
    pub fn stop(&mut self) {
        self.input_tx.take();
    }
}

/// Probing state: the catalogue entries still alive and how many
/// inputs have been assessed.
struct Probe {
    surviving: Vec<Regex>,
    lines_tested: usize,
    lines_to_assess: usize,
}

enum Verdict {
    Undecided,
    StaySingleLine,
    SwitchToMultiLine(Regex),
}

impl Probe {
    fn new(lines_to_assess: usize) -> Self {
        Self {
            surviving: timestamps::catalogue().to_vec(),
            lines_tested: 0,
            lines_to_assess,
        }
    }

    /// Assess one input's original content (as it arrived, before any
    /// trim or flag mutation). Probing is passive: the caller forwards
    /// the input to the single-line processor whatever this returns.
    fn assess(&mut self, content: &[u8]) -> Verdict {
        self.surviving.retain(|re| re.is_match(content));

        if self.surviving.is_empty() {
            // Strict policy: one miss and auto-sensing is over.
            debug!("no timestamp pattern matched during auto-sensing, staying single-line");
            return Verdict::StaySingleLine;
        }

        self.lines_tested += 1;
        if self.lines_tested == self.lines_to_assess {
            // Tie-break among survivors: first in catalogue order.
            let chosen = self.surviving[0].clone();
            debug!(
                pattern = chosen.as_str(),
                lines = self.lines_tested,
                "timestamp pattern held across sampled lines, switching to multi-line"
            );
            return Verdict::SwitchToMultiLine(chosen);
        }

        Verdict::Undecided
    }
}

/// Worker loop. Owns the input receiver throughout, so exactly one
/// reader ever touches the input channel, and the output sender moves
/// with whichever mode is active — the switch never closes the sink,
/// and end of stream closes it once.
async fn run(
    mut input_rx: mpsc::Receiver<Message>,
    mut single: SingleLineProcessor,
    mut probe: Probe,
    line_limit: usize,
) {
    // Probing phase: behave as single-line while assessing inputs.
    loop {
        let Some(input) = input_rx.recv().await else {
            // Stream ended before a decision; dropping the processor
            // closes the sink.
            return;
        };
        let verdict = probe.assess(&input.content);
        single.process(input).await;
        match verdict {
            Verdict::Undecided => {}
            Verdict::StaySingleLine => break,
            Verdict::SwitchToMultiLine(new_content_re) => {
                // Adopt the same input and output channels so nothing
                // in flight is lost, duplicated, or reordered.
                let aggregator =
                    MultiLineAggregator::new(single.into_output(), new_content_re, line_limit);
                multi_line::run(input_rx, aggregator, DEFAULT_FLUSH_TIMEOUT).await;
                return;
            }
        }
    }

    // Probing abandoned: plain single-line from here on.
    while let Some(input) = input_rx.recv().await {
        single.process(input).await;
    }
}
