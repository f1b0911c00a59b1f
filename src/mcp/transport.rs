//! Newline-delimited JSON transport.
//!
//! Each message is one line of UTF-8 JSON: requests arrive on the reader
//! (stdin), replies leave on the writer (stdout). stderr is left to the log
//! output.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Line transport over any buffered reader and writer.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

/// The transport the server runs on.
pub type StdioTransport = Transport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over the given reader and writer.
    pub const fn with_io(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next line, without its line terminator.
    ///
    /// Returns `None` once the reader is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// Serialises `message` onto a single line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let json = encode(message)?;

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Consumes the transport and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn encode<T: Serialize>(message: &T) -> io::Result<String> {
    let json =
        serde_json::to_string(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug_assert!(!json.contains('\n'), "message must fit on one line");
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

    #[test]
    fn transport_default() {
        let _transport = StdioTransport::default();
    }

    #[test]
    fn encoded_messages_have_no_newlines() {
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "text": "line one\nline two",
                "nested": {"key": "value"}
            }),
        );
        assert!(!encode(&response).unwrap().contains('\n'));

        let error = JsonRpcError::method_not_found(RequestId::Number(1), "tools/unknown");
        assert!(!encode(&error).unwrap().contains('\n'));
    }

    #[tokio::test]
    async fn read_lines_until_eof() {
        let input: &[u8] = b"{\"id\":1}\r\n\nlast";
        let mut transport = Transport::with_io(input, Vec::new());

        assert_eq!(
            transport.read_line().await.unwrap().as_deref(),
            Some("{\"id\":1}")
        );
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_one_message_per_line() {
        let mut transport = Transport::with_io(&b""[..], Vec::new());

        transport
            .write_message(&JsonRpcResponse::success(
                RequestId::Number(2),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        transport
            .write_message(&JsonRpcError::parse_error())
            .await
            .unwrap();

        let written = String::from_utf8(transport.into_writer()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":2,"result":{}}"#);
        assert!(lines[1].contains("-32700"));
    }
}
