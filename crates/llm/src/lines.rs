//! Line framing for streamed HTTP bodies.
//!
//! SSE (Anthropic, OpenAI) and NDJSON (Ollama) are both line oriented, but
//! network chunks split lines, and even UTF-8 sequences, at arbitrary
//! points. Bytes are buffered until a full line is available.

use chatloop_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use std::pin::Pin;

struct LineState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    eof: bool,
}

/// Turn a stream of byte chunks into a stream of complete lines.
///
/// Line terminators (`\n` or `\r\n`) are stripped. A trailing line without a
/// terminator is emitted at end of input. A transport error is yielded once
/// and ends the stream.
pub fn lines<S, B, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = LineState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        eof: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = state.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some((Ok(String::from_utf8_lossy(&line).into_owned()), state));
            }

            if state.eof {
                if state.buffer.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut state.buffer);
                return Some((Ok(String::from_utf8_lossy(&rest).into_owned()), state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.eof = true;
                    state.buffer.clear();
                    return Some((Err(AppError::Llm(format!("Stream error: {}", e))), state));
                }
                None => state.eof = true,
            }
        }
    })
}

/// Payload of an SSE `data:` line, if this is one.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
