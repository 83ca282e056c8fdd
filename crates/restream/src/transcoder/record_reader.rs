//! Record-oriented reading of child process output.
//!
//! ffmpeg rewrites its status line with carriage returns. A plain
//! `lines()` reader would sit on those updates until the next `\n`, so records
//! here end at either `\n` or `\r`.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{OutputLine, OutputStream};

/// Records longer than this are emitted in pieces.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Yields trimmed, non-empty text records delimited by `\n` or `\r`.
pub struct RecordReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
        }
    }

    /// Next record, or `None` at end of stream.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                let rest = std::mem::take(&mut self.pending);
                return Ok(to_record(&rest));
            }

            match buf.iter().position(|&b| matches!(b, b'\n' | b'\r')) {
                Some(idx) => {
                    self.pending.extend_from_slice(&buf[..idx]);
                    self.reader.consume(idx + 1);
                    let record = std::mem::take(&mut self.pending);
                    if let Some(text) = to_record(&record) {
                        return Ok(Some(text));
                    }
                }
                None => {
                    let len = buf.len();
                    self.pending.extend_from_slice(buf);
                    self.reader.consume(len);
                    if self.pending.len() >= MAX_RECORD_LEN {
                        let record = std::mem::take(&mut self.pending);
                        if let Some(text) = to_record(&record) {
                            return Ok(Some(text));
                        }
                    }
                }
            }
        }
    }
}

fn to_record(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Forward every record of `reader` into `tx`, tagged with `stream`.
///
/// Stops at end of stream, on a read error, or once the receiver is gone.
pub(crate) fn spawn_forwarder<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::Sender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut records = RecordReader::new(reader);
        loop {
            match records.next_record().await {
                Ok(Some(text)) => {
                    if tx.send(OutputLine { stream, text }).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Stopped reading transcoder {}: {}", stream, e);
                    break;
                }
            }
        }
    })
}
