//! text/event-stream decoding
//!
//! Only the `data` field matters to the sync protocol. Consecutive `data`
//! lines are joined with `\n`, lines starting with `:` are comments
//! (keep-alives), and a blank line ends the event. An event without data
//! is not dispatched, and neither is a trailing event cut off by the end
//! of the body.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{stream, Stream, StreamExt};

use super::errors::{ClientError, ClientResult};

/// Incremental decoder over raw body chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the data of every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&*line);
            if let Some(data) = self.process_line(line) {
                events.push(data);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let data = self.data.join("\n");
            self.data.clear();
            return Some(data);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Turn a chunked body into a stream of event data strings.
///
/// A body error is yielded once as [`ClientError::Transport`] and ends the
/// stream.
pub fn event_data_stream<S, B, E>(body: S) -> impl Stream<Item = ClientResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = (body, SseDecoder::new(), VecDeque::new(), false);
    stream::unfold(state, |(mut body, mut decoder, mut ready, mut done)| async move {
        loop {
            if let Some(data) = ready.pop_front() {
                return Some((Ok(data), (body, decoder, ready, done)));
            }
            if done {
                return None;
            }
            match body.next().await {
                Some(Ok(chunk)) => ready.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    done = true;
                    let err = ClientError::Transport(e.to_string());
                    return Some((Err(err), (body, decoder, ready, done)));
                }
                None => done = true,
            }
        }
    })
}
