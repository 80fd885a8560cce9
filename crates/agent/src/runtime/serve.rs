//! Serve — pump stdin through the line handler to stdout.

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::AgentConfig;
use crate::handler::LineHandler;
use crate::message::Message;

/// Read physical lines from stdin, feed them through the configured
/// handler, and frame each structured message on stdout with a real
/// line feed. Runs until stdin closes, then drains and exits.
pub async fn serve(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (output_tx, mut output_rx) = mpsc::channel(1);
    let mut handler = LineHandler::from_config(output_tx, &config)?;
    handler.start();

    // Transport stand-in: one line-feed-delimited frame per message.
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        let mut frames: u64 = 0;
        while let Some(output) = output_rx.recv().await {
            stdout.write_all(&output.content).await?;
            stdout.write_all(b"\n").await?;
            frames += 1;
        }
        stdout.flush().await?;
        Ok::<u64, std::io::Error>(frames)
    });

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut read: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        // The reader consumed the line plus its delimiter.
        let raw_data_len = line.len() + 1;
        let timestamp = chrono::Utc::now().to_rfc3339();
        handler
            .handle(Message::new(line.into_bytes(), "info", raw_data_len, timestamp))
            .await;
        read += 1;
    }

    info!("Input closed after {} lines, draining", read);
    handler.stop();
    let frames = writer.await??;
    info!("Forwarded {} structured messages", frames);
    Ok(())
}
