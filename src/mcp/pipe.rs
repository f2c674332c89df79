//! Pipe binding: newline-delimited JSON over a child process's stdin/stdout
//!
//! One JSON request per line goes to the server's stdin. Responses are read
//! line by line from its stdout; lines that are not a JSON object (log
//! output, banners) are skipped, up to `max_read_attempts` lines per call.
//!
//! There is no per-call timeout: a server that stops writing blocks the
//! caller until it exits or the session is interrupted.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use super::process::{ServerCommand, ServerProcess};
use super::protocol::{RpcRequest, RpcResponse};
use super::transport::{Transport, TransportError};

/// Pipe binding settings
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Lines read per request before giving up
    pub max_read_attempts: usize,
    /// Pause after spawning before the first request
    pub startup_delay: Duration,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            max_read_attempts: 10,
            startup_delay: Duration::from_millis(500),
        }
    }
}

/// Transport speaking to a server it spawned over stdin/stdout
pub struct PipeTransport {
    process: ServerProcess,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    config: PipeConfig,
}

impl PipeTransport {
    /// Spawn the server with piped stdio and wait out the start-up delay
    pub async fn spawn(command: &ServerCommand, config: PipeConfig) -> Result<Self, TransportError> {
        let mut transport = Self::launch(command, config).await?;
        transport.warm_up().await;
        Ok(transport)
    }

    /// Spawn the server with piped stdio; the start-up delay is [`Transport::warm_up`]
    pub async fn launch(command: &ServerCommand, config: PipeConfig) -> Result<Self, TransportError> {
        let mut process =
            ServerProcess::spawn(command, Stdio::piped(), Stdio::piped(), Stdio::null())?;

        let child = process.child_mut();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        let (stdin, stdout) = match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                process.terminate().await;
                return Err(TransportError::Unavailable(
                    "tool server stdio was not captured".to_string(),
                ));
            }
        };

        info!(pid = process.id(), "Pipe transport started");

        Ok(Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            config,
        })
    }

    async fn write_request(&mut self, request: &RpcRequest) -> Result<(), TransportError> {
        let mut line = request.to_line()?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Unavailable(format!("failed to write request: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| TransportError::Unavailable(format!("failed to flush request: {}", e)))?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<RpcResponse, TransportError> {
        let mut buf = Vec::new();

        for attempt in 1..=self.config.max_read_attempts {
            buf.clear();
            let n = self.stdout.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                return Err(TransportError::Unavailable(
                    "tool server closed its output".to_string(),
                ));
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    debug!(attempt, bytes = n, "Skipping non-UTF-8 line from tool server");
                    continue;
                }
            };

            let trimmed = line.trim();
            if !trimmed.starts_with('{') {
                debug!(attempt, line = %trimmed, "Skipping non-JSON line from tool server");
                continue;
            }

            let value = match serde_json::from_str::<Value>(trimmed) {
                Ok(value) if value.is_object() => value,
                _ => {
                    debug!(attempt, "Skipping unparseable line from tool server");
                    continue;
                }
            };

            let response = RpcResponse::from_value(value);
            if response.id != Some(id) {
                warn!(expected = id, got = ?response.id, "Skipping response with foreign id");
                continue;
            }

            return Ok(response);
        }

        Err(TransportError::Exhausted {
            attempts: self.config.max_read_attempts,
        })
    }
}

#[async_trait]
impl Transport for PipeTransport {
    fn name(&self) -> &'static str {
        "pipe"
    }

    async fn send(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        self.write_request(request).await?;
        self.read_response(request.id).await
    }

    async fn warm_up(&mut self) {
        if !self.config.startup_delay.is_zero() {
            tokio::time::sleep(self.config.startup_delay).await;
        }
        info!(pid = self.process.id(), "Pipe transport ready");
    }

    async fn shutdown(&mut self) {
        self.process.terminate().await;
    }
}
