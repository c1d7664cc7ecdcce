//! Bridge endpoint: the server role embedded inside the EDA tool.
//!
//! The tool spawns the bridge as a co-process and owns its standard
//! streams; the bridge proves the tool side is live, accepts exactly one
//! driver connection, and then relays each logical request through the
//! [`Translator`](crate::translate::Translator) to the tool's interpreter
//! and the matching response back to the driver.
//!
//! # Lifecycle
//!
//! ```text
//! AwaitingTool → AwaitingClient → Connected → (WaitRequest ⇄ Processing) → Closed
//! ```
//!
//! Every terminal path, the sanctioned `exit` request or a fatal error,
//! funnels through one teardown that releases the client socket, then the
//! tool streams, exactly once. The returned exit code reports what ended
//! the conversation; the first error wins.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{read_frame, write_frame, Message, Request};
use crate::tool::ToolChannel;
use crate::translate::{ToolCommand, Translator};

/// Conversation ended by the sanctioned `exit` request.
pub const EXIT_OK: i32 = 0;
/// The listening socket (or the tool channel) could not be set up.
pub const EXIT_SOCKET_SETUP: i32 = 1;
/// The client connection or handshake failed.
pub const EXIT_CONNECTION: i32 = 2;
/// Transport failure during the main loop.
pub const EXIT_TRANSPORT: i32 = 3;
/// The client sent an operation the bridge does not support.
pub const EXIT_UNSUPPORTED: i32 = 4;
/// The client sent a request that could not be decoded.
pub const EXIT_MALFORMED: i32 = 5;

/// Server endpoint translating driver requests into tool commands.
pub struct Bridge<R, W, E> {
    tool: ToolChannel<R, W, E>,
    translator: Translator,
    config: BridgeConfig,
}

impl<R, W, E> Bridge<R, W, E>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    /// Build a bridge from its tool channel and configuration.
    pub fn new(tool: ToolChannel<R, W, E>, config: BridgeConfig) -> Self {
        let translator = Translator::new(&config);
        Self {
            tool,
            translator,
            config,
        }
    }

    /// Run the full bridge lifecycle and return the process exit code.
    pub async fn run(mut self) -> i32 {
        let code = self.conversation().await;

        // Single teardown for every terminal path: the client socket has
        // already dropped inside `conversation`, the tool streams go last.
        let _ = self
            .tool
            .send_warning("Connection with the client ended!\n\n")
            .await;
        let _ = self.tool.close().await;

        code
    }

    async fn conversation(&mut self) -> i32 {
        // AwaitingTool: prove the co-process side is live before opening
        // the listening socket.
        if let Err(err) = self.liveness_exchange().await {
            error!("tool liveness exchange failed: {err}");
            let _ = self.tool.send_warning(&format!("[TOOL ERROR] {err}\n")).await;
            return EXIT_SOCKET_SETUP;
        }

        let listener =
            match TcpListener::bind((self.config.host.as_str(), self.config.port)).await {
                Ok(listener) => listener,
                Err(err) => {
                    error!(
                        "failed to bind {}:{}: {err}",
                        self.config.host, self.config.port
                    );
                    let _ = self
                        .tool
                        .send_warning(&format!("[SOCKET ERROR] {err}\n"))
                        .await;
                    return EXIT_SOCKET_SETUP;
                }
            };

        // AwaitingClient → Connected.
        let mut conn = match self.accept_client(listener).await {
            Ok(conn) => conn,
            Err(err) => {
                error!("client connection failed: {err}");
                let _ = self
                    .tool
                    .send_warning(&format!("[CONNECTION ERROR] {err}\n"))
                    .await;
                return EXIT_CONNECTION;
            }
        };

        match self.serve(&mut conn).await {
            Ok(()) => EXIT_OK,
            Err(err) => {
                let (code, label) = classify(&err);
                error!("conversation failed: {err}");
                let _ = self.tool.send_warning(&format!("{label} {err}\n")).await;
                code
            }
        }
    }

    /// Read the tool's greeting and echo it back, exercising both
    /// directions of the co-process pipe.
    async fn liveness_exchange(&mut self) -> Result<()> {
        let greeting = self.tool.recv_reply().await?;
        self.tool.send_command(&greeting).await?;
        debug!("tool channel is live");
        Ok(())
    }

    /// Accept the single client connection and complete the address
    /// handshake: send the peer address observed by `accept`, then wait
    /// for the client's own address.
    ///
    /// The listener is dropped after the accept; any further connection
    /// attempt is refused at the socket layer.
    async fn accept_client(&mut self, listener: TcpListener) -> Result<TcpStream> {
        let (mut conn, peer) = listener.accept().await.map_err(BridgeError::Io)?;
        drop(listener);

        write_frame(&mut conn, &Message::handshake(peer).encode()?).await?;

        let hello = Message::decode(&read_frame(&mut conn).await?)?;
        let (host, port) = hello.handshake_addr()?;
        info!("client connected from {host}:{port}");

        // The tool displays evaluated text, so the connectivity note goes
        // out on the command stream where the operator can see it.
        self.tool
            .send_command(&format!("Connected to client with address {host}:{port}"))
            .await?;

        Ok(conn)
    }

    /// WaitRequest ⇄ Processing loop.
    ///
    /// An `Info("exit")` request terminates cleanly with no response frame;
    /// every other request is translated, relayed to the tool, and answered
    /// with exactly one response frame.
    async fn serve(&mut self, conn: &mut TcpStream) -> Result<()> {
        loop {
            let msg = Message::decode(&read_frame(conn).await?)?;
            let req = Request::try_from(msg)?;
            debug!(kind = req.kind(), "handling request");

            match self.translator.translate_request(&req)? {
                ToolCommand::Exit => {
                    info!("exit requested, ending conversation");
                    return Ok(());
                }
                ToolCommand::Eval(expr) => {
                    self.tool.send_command(&expr).await?;
                    let reply = self.tool.recv_reply().await?;
                    let response = self.translator.translate_reply(&reply)?;
                    write_frame(conn, &response.into_message()?.encode()?).await?;
                }
            }
        }
    }
}

/// Map an error to its exit code and diagnostic label.
fn classify(err: &BridgeError) -> (i32, &'static str) {
    match err {
        BridgeError::ConnectionFailed(_)
        | BridgeError::ConnectionBroken(_)
        | BridgeError::Io(_) => (EXIT_TRANSPORT, "[CONNECTION ERROR]"),
        BridgeError::Unsupported(_) | BridgeError::Protocol(_) => {
            (EXIT_UNSUPPORTED, "[UNSUPPORTED OPERATION]")
        }
        BridgeError::Serialization(_) => (EXIT_MALFORMED, "[MALFORMED REQUEST]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Reserve a port for the bridge to bind.
    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let port = listener.local_addr().expect("local_addr").port();
        drop(listener);
        port
    }

    fn test_config(port: u16, dir: &std::path::Path) -> BridgeConfig {
        BridgeConfig {
            host: "127.0.0.1".to_string(),
            port,
            load_script: dir.join("loadSimulator.ocn"),
            run_script: dir.join("run.ocn"),
            var_file: dir.join("vars.ocn"),
            results_file: dir.join("sim_res"),
        }
    }

    /// Spawn a bridge whose tool channel is fed by the returned writer.
    /// The tool's greeting is already queued.
    async fn spawn_bridge(
        port: u16,
        dir: &std::path::Path,
    ) -> (
        tokio::task::JoinHandle<i32>,
        tokio::io::DuplexStream,
        tokio::io::DuplexStream,
    ) {
        let (mut tool_replies_tx, replies) = tokio::io::duplex(4096);
        let (commands, tool_commands_rx) = tokio::io::duplex(4096);

        tool_replies_tx
            .write_all(b"6\nhello\n")
            .await
            .expect("greeting write failed");

        let bridge = Bridge::new(
            ToolChannel::new(replies, commands, Vec::new()),
            test_config(port, dir),
        );
        let handle = tokio::spawn(bridge.run());

        (handle, tool_replies_tx, tool_commands_rx)
    }

    async fn connect_and_handshake(port: u16) -> TcpStream {
        // The bridge needs a moment to pass the liveness exchange and bind.
        let mut conn = None;
        for _ in 0..50 {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => {
                    conn = Some(stream);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let mut conn = conn.expect("bridge never started listening");

        let hello = Message::decode(&read_frame(&mut conn).await.expect("handshake read"))
            .expect("handshake decode");
        hello.handshake_addr().expect("handshake addr");

        let local = conn.local_addr().expect("local_addr");
        write_frame(&mut conn, &Message::handshake(local).encode().unwrap())
            .await
            .expect("handshake write");

        conn
    }

    #[tokio::test]
    async fn test_exit_request_yields_code_zero_and_no_response() {
        let dir = tempfile::tempdir().expect("tempdir");
        let port = free_port().await;
        let (handle, _tool_tx, _tool_rx) = spawn_bridge(port, dir.path()).await;

        let mut conn = connect_and_handshake(port).await;

        let exit = Request::Info("exit".to_string()).into_message().unwrap();
        write_frame(&mut conn, &exit.encode().unwrap())
            .await
            .expect("exit send failed");

        let code = timeout(TEST_TIMEOUT, handle)
            .await
            .expect("Test timed out")
            .expect("bridge task failed");
        assert_eq!(code, EXIT_OK);

        // No response frame: the bridge closed without writing anything
        // else, so the next read hits end-of-stream.
        let result = read_frame(&mut conn).await;
        assert!(matches!(result, Err(BridgeError::ConnectionBroken(_))));
    }

    #[tokio::test]
    async fn test_unknown_kind_yields_code_four() {
        let dir = tempfile::tempdir().expect("tempdir");
        let port = free_port().await;
        let (handle, _tool_tx, _tool_rx) = spawn_bridge(port, dir.path()).await;

        let mut conn = connect_and_handshake(port).await;

        let bogus = Message {
            kind: "selfDestruct".to_string(),
            payload: serde_json::Value::Null,
        };
        write_frame(&mut conn, &bogus.encode().unwrap())
            .await
            .expect("send failed");

        let code = timeout(TEST_TIMEOUT, handle)
            .await
            .expect("Test timed out")
            .expect("bridge task failed");
        assert_eq!(code, EXIT_UNSUPPORTED);
    }

    #[tokio::test]
    async fn test_malformed_request_yields_code_five() {
        let dir = tempfile::tempdir().expect("tempdir");
        let port = free_port().await;
        let (handle, _tool_tx, _tool_rx) = spawn_bridge(port, dir.path()).await;

        let mut conn = connect_and_handshake(port).await;

        write_frame(&mut conn, b"{\"kind\":\"info\"}")
            .await
            .expect("send failed");

        let code = timeout(TEST_TIMEOUT, handle)
            .await
            .expect("Test timed out")
            .expect("bridge task failed");
        assert_eq!(code, EXIT_MALFORMED);
    }

    #[tokio::test]
    async fn test_client_disconnect_yields_code_three() {
        let dir = tempfile::tempdir().expect("tempdir");
        let port = free_port().await;
        let (handle, _tool_tx, _tool_rx) = spawn_bridge(port, dir.path()).await;

        let conn = connect_and_handshake(port).await;
        drop(conn);

        let code = timeout(TEST_TIMEOUT, handle)
            .await
            .expect("Test timed out")
            .expect("bridge task failed");
        assert_eq!(code, EXIT_TRANSPORT);
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(
            classify(&BridgeError::ConnectionBroken("sending a frame")).0,
            EXIT_TRANSPORT
        );
        assert_eq!(
            classify(&BridgeError::Unsupported("nope".to_string())).0,
            EXIT_UNSUPPORTED
        );
        assert_eq!(
            classify(&BridgeError::Serialization("bad".to_string())).0,
            EXIT_MALFORMED
        );
    }
}
