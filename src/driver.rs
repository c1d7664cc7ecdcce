//! Driver endpoint: the client role of the bridge protocol.
//!
//! The driver opens the TCP connection, exchanges the address handshake,
//! and then issues the logical operations one at a time, strictly
//! request-then-response: no pipelining, no concurrent outstanding
//! requests.
//!
//! # Connection lifecycle
//!
//! - [`Driver::connect`] - open the transport and complete the handshake
//! - [`Driver::load_simulator`] / [`Driver::update_and_run`] - one
//!   operation per call, each blocking for its matching response
//! - [`Driver::shutdown`] - send the sanctioned `exit` request and close
//!
//! The state machine `Disconnected → Connected → HandshakeDone → (Idle ⇄
//! AwaitingResponse) → Closed` is enforced structurally: `connect` only
//! returns a handshaken driver, and each operation method sends and then
//! receives before returning, so an awaiting-response state never escapes
//! a call.
//!
//! # Example
//!
//! ```ignore
//! use simbridge::config::DriverConfig;
//! use simbridge::driver::Driver;
//!
//! let mut driver = Driver::connect(&DriverConfig::default()).await?;
//! let variables = driver.load_simulator().await?;
//! let results = driver.update_and_run(&variables).await?;
//! driver.shutdown().await?;
//! ```

use std::collections::BTreeMap;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{read_frame, write_frame, Message, Request, Response};

/// Client endpoint issuing logical requests to the bridge.
pub struct Driver {
    stream: TcpStream,
}

impl Driver {
    /// Connect to the bridge and complete the address handshake.
    ///
    /// The handshake sends this endpoint's local address as an `info`
    /// message and waits for the peer's address in return; it pairs the two
    /// independently bound sockets and is purely informational (the address
    /// is logged, not otherwise used).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionFailed`] if the transport cannot be
    /// opened, and transport/serialization errors from the handshake.
    pub async fn connect(config: &DriverConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(BridgeError::ConnectionFailed)?;

        let mut driver = Self { stream };
        driver.handshake().await?;
        Ok(driver)
    }

    /// Exchange local addresses with the bridge.
    async fn handshake(&mut self) -> Result<()> {
        let local = self.stream.local_addr().map_err(BridgeError::Io)?;
        self.send_message(Message::handshake(local)).await?;

        let reply = self.recv_message().await?;
        let (host, port) = reply.handshake_addr()?;
        info!("connected to bridge at {host}:{port}");
        Ok(())
    }

    /// Load the simulation environment.
    ///
    /// Returns the variables most recently written to the variable file, so
    /// the driver starts from the values the environment was saved with.
    pub async fn load_simulator(&mut self) -> Result<BTreeMap<String, f64>> {
        match self.call(Request::LoadSimulator).await? {
            Response::LoadSimulator(vars) => Ok(vars),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Push variable values, run one simulation, and return its results.
    pub async fn update_and_run(
        &mut self,
        vars: &BTreeMap<String, f64>,
    ) -> Result<BTreeMap<String, f64>> {
        match self.call(Request::UpdateAndRun(vars.clone())).await? {
            Response::UpdateAndRun(results) => Ok(results),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Send the sanctioned `exit` request and close the connection.
    ///
    /// The bridge ends its loop without answering, so no response is read.
    pub async fn shutdown(mut self) -> Result<()> {
        self.send_message(Request::Info("exit".to_string()).into_message()?)
            .await?;
        debug!("exit request sent, closing connection");
        Ok(())
    }

    /// Issue one request and block for its matching response.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the decoded message kind does
    /// not match the kind of the outstanding request.
    async fn call(&mut self, req: Request) -> Result<Response> {
        let expected = req.kind();
        self.send_message(req.into_message()?).await?;

        let reply = self.recv_message().await?;
        if reply.kind != expected {
            return Err(BridgeError::Protocol(format!(
                "expected a {expected:?} response, got {:?}",
                reply.kind
            )));
        }

        Response::try_from(reply)
    }

    async fn send_message(&mut self, msg: Message) -> Result<()> {
        write_frame(&mut self.stream, &msg.encode()?).await
    }

    async fn recv_message(&mut self) -> Result<Message> {
        Message::decode(&read_frame(&mut self.stream).await?)
    }
}

fn unexpected_response(resp: &Response) -> BridgeError {
    BridgeError::Protocol(format!("response kind {:?} does not match request", resp.kind()))
}
