//! Line-oriented duplex channel to the EDA tool's command interpreter.
//!
//! The bridge process is spawned by the tool, so the channel is the
//! process's own standard streams: commands go out on stdout, replies come
//! in on stdin, and diagnostics go out on stderr where the tool displays
//! them. The streams are generic so tests can substitute in-memory pipes.
//!
//! # Sub-protocol
//!
//! - Write: the full text of one command expression, flushed immediately;
//!   no trailing framing at this layer.
//! - Read: the tool writes one line containing a decimal byte count,
//!   followed by exactly that many bytes of message text. A trailing
//!   newline is stripped.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin,
    Stdout,
};
use tokio::time::{sleep, Duration};

use crate::error::{BridgeError, Result};

/// Duplex channel to the tool interpreter.
///
/// Owns all three streams for the lifetime of the bridge; there is no
/// concurrent access.
pub struct ToolChannel<R, W, E> {
    replies: BufReader<R>,
    commands: W,
    diagnostics: E,
}

/// Tool channel over the process's standard streams, as wired up when the
/// tool spawns the bridge.
pub type StdioToolChannel = ToolChannel<Stdin, Stdout, Stderr>;

impl StdioToolChannel {
    /// Build the channel over stdin/stdout/stderr.
    pub fn from_stdio() -> Self {
        Self::new(
            tokio::io::stdin(),
            tokio::io::stdout(),
            tokio::io::stderr(),
        )
    }
}

impl<R, W, E> ToolChannel<R, W, E>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    /// Build a channel from a reply reader, command writer, and diagnostic
    /// writer.
    pub fn new(replies: R, commands: W, diagnostics: E) -> Self {
        Self {
            replies: BufReader::new(replies),
            commands,
            diagnostics,
        }
    }

    /// Send one command expression to the tool for evaluation.
    pub async fn send_command(&mut self, expr: &str) -> Result<()> {
        self.commands.write_all(expr.as_bytes()).await?;
        self.commands.flush().await?;
        Ok(())
    }

    /// Receive one reply from the tool: a decimal byte-count line, then
    /// exactly that many bytes, with a trailing newline stripped.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ConnectionBroken`] if the stream ends before the
    ///   count line or the full message arrives.
    /// - [`BridgeError::Serialization`] if the count line is not a decimal
    ///   number or the message is not valid UTF-8.
    pub async fn recv_reply(&mut self) -> Result<String> {
        let mut count_line = String::new();
        let read = self.replies.read_line(&mut count_line).await?;
        if read == 0 {
            return Err(BridgeError::ConnectionBroken("reading a tool reply length"));
        }

        let count: usize = count_line.trim().parse().map_err(|_| {
            BridgeError::Serialization(format!(
                "tool reply length is not a decimal number: {:?}",
                count_line.trim()
            ))
        })?;

        let mut body = vec![0u8; count];
        self.replies.read_exact(&mut body).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                BridgeError::ConnectionBroken("reading a tool reply")
            } else {
                BridgeError::Io(err)
            }
        })?;

        let mut msg = String::from_utf8(body)
            .map_err(|_| BridgeError::Serialization("tool reply is not valid UTF-8".into()))?;

        if msg.ends_with('\n') {
            msg.pop();
        }

        Ok(msg)
    }

    /// Send a warning to the tool's diagnostic channel.
    pub async fn send_warning(&mut self, warn: &str) -> Result<()> {
        self.diagnostics.write_all(warn.as_bytes()).await?;
        self.diagnostics.flush().await?;
        Ok(())
    }

    /// Send a debug message to the diagnostic channel, after a fixed
    /// one-second delay so it lands after the tool's own output settles.
    pub async fn send_debug(&mut self, msg: &str) -> Result<()> {
        sleep(Duration::from_secs(1)).await;
        self.send_warning(&format!("[Debug] {msg}")).await
    }

    /// Flush and release the outgoing streams at end of conversation.
    pub async fn close(&mut self) -> Result<()> {
        self.commands.shutdown().await?;
        self.diagnostics.shutdown().await?;
        Ok(())
    }
}
