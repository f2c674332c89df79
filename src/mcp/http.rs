//! Network binding: one JSON-RPC request per `POST /mcp`
//!
//! Session start probes the server's base URL once with a short timeout.
//! Any HTTP response means a server is already running and is reused;
//! otherwise the server binary is spawned in network mode and given a
//! fixed warm-up before the first real request.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::process::{ServerCommand, ServerProcess};
use super::protocol::{RpcMethod, RpcRequest, RpcResponse};
use super::transport::{Transport, TransportError};
use crate::metrics::SERVER_LAUNCHES;

/// Network binding settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the server, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Deadline for the start-up connectivity probe
    pub probe_timeout: Duration,
    /// Deadline for `tools/list`
    pub list_timeout: Duration,
    /// Deadline for `tools/call`
    pub call_timeout: Duration,
    /// Wait after spawning before issuing requests
    pub warmup: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            probe_timeout: Duration::from_secs(1),
            list_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            warmup: Duration::from_secs(3),
        }
    }
}

impl HttpConfig {
    fn endpoint(&self) -> String {
        format!("{}/mcp", self.base_url.trim_end_matches('/'))
    }

    fn timeout_for(&self, method: RpcMethod) -> Duration {
        match method {
            RpcMethod::List => self.list_timeout,
            RpcMethod::Call => self.call_timeout,
        }
    }
}

/// What session start found at the base URL
#[derive(Debug)]
pub enum ServerLaunch {
    /// A server was already answering; nothing to clean up
    Reused,
    /// This session spawned the server and owns it
    Spawned(ServerProcess),
}

impl ServerLaunch {
    pub fn label(&self) -> &'static str {
        match self {
            ServerLaunch::Reused => "reused",
            ServerLaunch::Spawned(_) => "spawned",
        }
    }

    /// Probe `config.base_url`; spawn `command` only if nothing answers.
    ///
    /// Returns as soon as the process exists; the warm-up wait is
    /// [`Transport::warm_up`].
    pub async fn establish(
        config: &HttpConfig,
        command: &ServerCommand,
    ) -> Result<Self, TransportError> {
        let launch = if probe(&config.base_url, config.probe_timeout).await {
            info!(url = %config.base_url, "Tool server already running");
            ServerLaunch::Reused
        } else {
            info!(url = %config.base_url, "No tool server answering, spawning one");
            // No await between the spawn and handing the process to the caller
            let process =
                ServerProcess::spawn(command, Stdio::null(), Stdio::null(), Stdio::null())?;
            ServerLaunch::Spawned(process)
        };

        SERVER_LAUNCHES.with_label_values(&[launch.label()]).inc();
        Ok(launch)
    }

    async fn release(&mut self) {
        if let ServerLaunch::Spawned(process) = self {
            process.terminate().await;
        }
        // Nothing left to reap
        *self = ServerLaunch::Reused;
    }
}

/// Unauthenticated GET against the base URL; any response counts as alive
pub async fn probe(base_url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build probe client");
            return false;
        }
    };

    match client.get(base_url).send().await {
        Ok(response) => {
            debug!(status = %response.status(), "Probe answered");
            true
        }
        Err(e) => {
            debug!(error = %e, "Probe failed");
            false
        }
    }
}

/// Transport posting each request to `<base_url>/mcp`
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    config: HttpConfig,
    launch: ServerLaunch,
}

impl HttpTransport {
    /// Build a transport against a server that is known to be running
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        Self::with_launch(config, ServerLaunch::Reused)
    }

    /// Probe and spawn if needed, without waiting for a spawned server to warm up
    pub async fn establish(config: HttpConfig, command: &ServerCommand) -> Result<Self, TransportError> {
        let launch = ServerLaunch::establish(&config, command).await?;
        Self::with_launch(config, launch)
    }

    /// Probe, spawn if needed, and return a ready transport
    pub async fn connect(config: HttpConfig, command: &ServerCommand) -> Result<Self, TransportError> {
        let mut transport = Self::establish(config, command).await?;
        transport.warm_up().await;
        Ok(transport)
    }

    fn with_launch(config: HttpConfig, launch: ServerLaunch) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
            config,
            launch,
        })
    }

    /// How the server was obtained
    pub fn launch(&self) -> &ServerLaunch {
        &self.launch
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.config.timeout_for(request.method))
            .json(request)
            .send()
            .await?;

        let body = response.text().await?;
        debug!(
            method = %request.method,
            id = request.id,
            bytes = body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tool server responded"
        );

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| TransportError::Malformed(format!("{} (body: {})", e, body)))?;
        if !value.is_object() {
            return Err(TransportError::Malformed(format!("expected a JSON object, got: {}", body)));
        }

        Ok(RpcResponse::from_value(value))
    }

    async fn warm_up(&mut self) {
        if matches!(self.launch, ServerLaunch::Spawned(_)) && !self.config.warmup.is_zero() {
            debug!(warmup_ms = self.config.warmup.as_millis() as u64, "Waiting for tool server to start");
            tokio::time::sleep(self.config.warmup).await;
        }
    }

    async fn shutdown(&mut self) {
        self.launch.release().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::{json, Map};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> HttpConfig {
        HttpConfig {
            base_url: server.uri(),
            list_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_secs(2),
            warmup: Duration::ZERO,
            ..HttpConfig::default()
        }
    }

    fn unused_command() -> ServerCommand {
        ServerCommand::new("/nonexistent/k8s-mcp-server")
    }

    #[tokio::test]
    async fn test_reuses_running_server() {
        let server = MockServer::start().await;
        // Unmatched GET still gets a 404, which counts as alive
        let transport = HttpTransport::connect(config_for(&server), &unused_command())
            .await
            .unwrap();
        assert!(matches!(transport.launch(), ServerLaunch::Reused));
    }

    #[tokio::test]
    async fn test_call_posts_to_mcp() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(json!({"method": "tools/call", "params": {"name": "getAPIResources"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 5,
                "result": {"content": [{"type": "text", "text": "ok"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut transport = HttpTransport::new(config_for(&server)).unwrap();
        let response = transport
            .send(&RpcRequest::call(5, "getAPIResources", Map::new()))
            .await
            .unwrap();
        assert_eq!(response.id, Some(5));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let mut transport = HttpTransport::new(config_for(&server)).unwrap();
        let err = transport.send(&RpcRequest::list(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportMalformed);
    }

    #[tokio::test]
    async fn test_call_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.call_timeout = Duration::from_millis(50);
        let mut transport = HttpTransport::new(config).unwrap();

        let err = transport
            .send(&RpcRequest::call(1, "listResources", Map::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let config = HttpConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..HttpConfig::default()
        };
        let mut transport = HttpTransport::new(config).unwrap();
        let err = transport.send(&RpcRequest::list(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);
    }

    #[tokio::test]
    async fn test_probe_deadline_independent_of_call_deadline() {
        let server = MockServer::start().await;
        // Probe answers too slowly, so the session spawns its own server
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;
        // Discovery is slower than the probe deadline but within the list deadline
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {"tools": [{"name": "listResources"}]}
                    }))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let fake_server = ServerCommand::new("sh").args(["-c", "sleep 30"]);
        let mut transport = HttpTransport::connect(config_for(&server), &fake_server)
            .await
            .unwrap();
        assert!(matches!(transport.launch(), ServerLaunch::Spawned(_)));

        let response = transport.send(&RpcRequest::list(1)).await.unwrap();
        assert_eq!(response.tools().unwrap().len(), 1);

        transport.shutdown().await;
        assert!(matches!(transport.launch(), ServerLaunch::Reused));
    }

    #[tokio::test]
    async fn test_interrupted_warm_up_releases_spawned_server() {
        let config = HttpConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            warmup: Duration::from_secs(30),
            ..HttpConfig::default()
        };
        let fake_server = ServerCommand::new("sh").args(["-c", "sleep 30"]);

        // Spawning does not wait out the warm-up
        let mut transport = tokio::time::timeout(
            Duration::from_secs(5),
            HttpTransport::establish(config, &fake_server),
        )
        .await
        .expect("establish should not wait for warm-up")
        .unwrap();
        let pid = match transport.launch() {
            ServerLaunch::Spawned(process) => process.id(),
            ServerLaunch::Reused => panic!("expected a spawned server"),
        };
        assert!(pid.is_some());

        let signal = std::future::ready(());
        tokio::pin!(signal);
        let warmed = crate::repl::interruptible(transport.warm_up(), signal.as_mut()).await;
        assert!(warmed.is_none());

        transport.shutdown().await;
        assert!(matches!(transport.launch(), ServerLaunch::Reused));
    }
}
