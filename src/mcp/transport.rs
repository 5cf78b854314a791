//! stdio transport for the MCP bridge.
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - Lines longer than [`MAX_MESSAGE_BYTES`] are discarded unread
//! - stdin: receives messages from client
//! - stdout: sends messages to client, flushed after every message
//! - stderr: logging only
//!
//! The reader and writer are generic so the loop can be driven from memory
//! in tests.

use std::io;

use serde::Serialize;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse};

/// Default limit on one input line, newline excluded.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// One line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// A line within the size limit, terminator stripped.
    Text(String),
    /// A line over the size limit. Only its length was kept.
    Oversized {
        /// Length of the discarded line, newline excluded.
        bytes: usize,
    },
}

/// A line-delimited JSON-RPC transport.
pub struct StdioTransport<R = BufReader<tokio::io::Stdin>, W = tokio::io::Stdout> {
    /// Buffered input.
    reader: R,
    /// Output sink.
    writer: W,
    /// Longest accepted line.
    max_line_bytes: usize,
}

impl StdioTransport {
    /// Creates a transport over the process stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
            max_line_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over arbitrary I/O.
    pub const fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            max_line_bytes: MAX_MESSAGE_BYTES,
        }
    }

    /// Sets the longest accepted line.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Longest accepted line.
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Consumes the transport, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Reads the next message line.
    ///
    /// Returns `None` on EOF. At most `max_line_bytes + 1` bytes of a line
    /// are buffered; the rest of an oversized line is skipped. Invalid UTF-8
    /// is replaced rather than treated as a fatal read error.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the input fails.
    pub async fn read_line(&mut self) -> io::Result<Option<InputLine>> {
        let mut buf = Vec::new();
        let limit = self.max_line_bytes as u64 + 1;
        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        } else if buf.len() > self.max_line_bytes {
            let bytes = buf.len() + self.skip_line().await?;
            return Ok(Some(InputLine::Oversized { bytes }));
        }

        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Input line is not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(Some(InputLine::Text(line)))
    }

    /// Discards input up to and including the next newline, returning the
    /// number of bytes skipped before it.
    async fn skip_line(&mut self) -> io::Result<usize> {
        let mut skipped = 0;
        loop {
            let (consumed, done) = {
                let chunk = self.reader.fill_buf().await?;
                if chunk.is_empty() {
                    return Ok(skipped);
                }
                match chunk.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (chunk.len(), false),
                }
            };
            self.reader.consume(consumed);
            if done {
                return Ok(skipped + consumed - 1);
            }
            skipped += consumed;
        }
    }

    /// Writes a JSON-RPC response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        self.write_message(response).await
    }

    /// Writes a JSON-RPC error.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> io::Result<()> {
        self.write_message(error).await
    }

    /// Writes an arbitrary JSON value.
    ///
    /// Used for responses relayed from the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_json(&mut self, value: &serde_json::Value) -> io::Result<()> {
        self.write_message(value).await
    }

    async fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.write_raw(&json).await
    }

    /// Writes a raw JSON string with newline termination and flushes.
    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    fn memory(input: &[u8]) -> StdioTransport<&[u8], Vec<u8>> {
        StdioTransport::with_io(input, Vec::new())
    }

    fn text(line: &str) -> InputLine {
        InputLine::Text(line.to_string())
    }

    #[test]
    fn transport_default() {
        let _transport = StdioTransport::default();
    }

    #[tokio::test]
    async fn reads_lines_and_strips_terminators() {
        let mut transport = memory(b"first\r\nsecond\nlast");
        assert_eq!(transport.read_line().await.unwrap(), Some(text("first")));
        assert_eq!(transport.read_line().await.unwrap(), Some(text("second")));
        assert_eq!(transport.read_line().await.unwrap(), Some(text("last")));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_lines_are_skipped_whole() {
        let mut transport =
            memory(b"12345678\n123456789abc\nnext\n0123456789").with_max_line_bytes(8);
        assert_eq!(transport.read_line().await.unwrap(), Some(text("12345678")));
        assert_eq!(
            transport.read_line().await.unwrap(),
            Some(InputLine::Oversized { bytes: 12 })
        );
        assert_eq!(transport.read_line().await.unwrap(), Some(text("next")));
        assert_eq!(
            transport.read_line().await.unwrap(),
            Some(InputLine::Oversized { bytes: 10 })
        );
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let mut transport = memory(b"ab\xffcd\n");
        let line = transport.read_line().await.unwrap().unwrap();
        assert_eq!(line, text("ab\u{fffd}cd"));
    }

    #[tokio::test]
    async fn writes_one_line_per_message() {
        let mut transport = memory(b"");
        let response = JsonRpcResponse::success(
            Some(RequestId::from(1)),
            serde_json::json!({
                "message": "hello\nworld",
                "nested": {"key": "value"}
            }),
        );
        transport.write_response(&response).await.unwrap();
        transport
            .write_error(&JsonRpcError::method_not_found(
                Some(RequestId::from(2)),
                "test/method",
            ))
            .await
            .unwrap();

        let out = String::from_utf8(transport.into_writer()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(out.ends_with('\n'));
        assert!(lines[0].contains(r#""id":1"#));
        assert!(lines[1].contains(r#""code":-32601"#));
    }
}
