//! Prompt-delimited framing for the FReD front-end
//!
//! The front-end is an interactive console: every reply ends when it prints
//! its prompt again, without a trailing newline.
//! ```text
//! > p solution\n
//! < $1 = 4950\n(fred)
//! ```

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Upper bound on one reply; anything larger means the framing was lost
const MAX_REPLY_BYTES: usize = 16 * 1024 * 1024;

/// Splits a byte stream into prompt-terminated replies
pub struct PromptReader<R> {
    inner: R,
    prompt: Vec<u8>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PromptReader<R> {
    pub fn new(inner: R, prompt: &str) -> Self {
        Self {
            inner,
            prompt: prompt.as_bytes().to_vec(),
            pending: Vec::with_capacity(4096),
        }
    }

    /// Read until the next prompt and return everything before it
    pub async fn read_reply(&mut self) -> Result<String, Error> {
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(end) = find(&self.pending, &self.prompt) {
                let reply: Vec<u8> = self.pending.drain(..end + self.prompt.len()).collect();
                return Ok(String::from_utf8_lossy(&reply[..end]).into_owned());
            }

            if self.pending.len() > MAX_REPLY_BYTES {
                return Err(Error::Internal(format!(
                    "Debugger reply exceeded {} bytes without a prompt",
                    MAX_REPLY_BYTES
                )));
            }

            let n = self.inner.read(&mut chunk).await.map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::DebuggerExited
                } else {
                    Error::Io(e)
                }
            })?;

            if n == 0 {
                return Err(Error::DebuggerExited);
            }

            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Write one command line
pub async fn write_command<W: AsyncWrite + Unpin>(writer: &mut W, command: &str) -> Result<(), Error> {
    if command.contains('\n') {
        return Err(Error::invalid_directive(command, "embedded newline"));
    }

    writer.write_all(command.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_read_reply() {
        let mut reader = PromptReader::new(Cursor::new(b"$1 = 4950\n(fred) ".to_vec()), "(fred) ");
        let reply = reader.read_reply().await.unwrap();
        assert_eq!(reply, "$1 = 4950\n");
    }

    #[tokio::test]
    async fn test_read_reply_empty_and_consecutive() {
        let data = b"(fred) Breakpoint 1, main () at a.c:10\n(fred) ".to_vec();
        let mut reader = PromptReader::new(Cursor::new(data), "(fred) ");
        assert_eq!(reader.read_reply().await.unwrap(), "");
        assert_eq!(
            reader.read_reply().await.unwrap(),
            "Breakpoint 1, main () at a.c:10\n"
        );
    }

    #[tokio::test]
    async fn test_read_reply_eof_means_debugger_exited() {
        let mut reader = PromptReader::new(Cursor::new(b"partial output".to_vec()), "(fred) ");
        let err = reader.read_reply().await.unwrap_err();
        assert!(matches!(err, Error::DebuggerExited));
    }

    #[tokio::test]
    async fn test_write_command() {
        let mut output = Vec::new();
        write_command(&mut output, "fred-restart 1").await.unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "fred-restart 1\n");
    }

    #[tokio::test]
    async fn test_write_command_rejects_newlines() {
        let mut output = Vec::new();
        assert!(write_command(&mut output, "c\nquit").await.is_err());
        assert!(output.is_empty());
    }
}
