//! Trigger names read line by line from a blocking source.
//!
//! The reader runs on its own named thread and hands lines to async code
//! over a bounded `tokio::sync::mpsc` channel. A read that never returns
//! only parks that thread, so the caller's runtime can still shut down.

use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines buffered between the reader thread and the consumer.
pub const TRIGGER_BUFFER: usize = 64;

/// Spawn a thread reading trigger names from `reader`.
///
/// Lines are trimmed and empty lines skipped. The channel closes at EOF,
/// on a read error, or once the receiver is dropped and the next line
/// arrives.
pub fn spawn_trigger_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
    thread::Builder::new()
        .name("trigger-reader".to_string())
        .spawn(move || read_triggers(reader, &tx))?;
    Ok(rx)
}

fn read_triggers<R: BufRead>(reader: R, tx: &mpsc::Sender<String>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Trigger input failed");
                return;
            }
        };
        let trigger = line.trim();
        if trigger.is_empty() {
            continue;
        }
        if tx.blocking_send(trigger.to_string()).is_err() {
            debug!("Trigger consumer gone");
            return;
        }
    }
    debug!("Trigger input closed");
}
