//! KubeBridge CLI - chat with a Kubernetes MCP server through a language model

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use kubebridge::agent::{ControllerConfig, ConversationController};
use kubebridge::llm::{ApiFlavor, ChatClient, ChatConfig};
use kubebridge::mcp::{
    HttpConfig, HttpTransport, McpClient, PipeConfig, PipeTransport, ServerCommand, ToolCatalog,
    Transport, TransportError,
};
use kubebridge::{metrics, repl, telemetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Spawn the server and talk over its stdin/stdout
    Pipe,
    /// POST to a running server (spawned if the probe fails)
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LlmApi {
    Openai,
    Ollama,
}

impl From<LlmApi> for ApiFlavor {
    fn from(api: LlmApi) -> Self {
        match api {
            LlmApi::Openai => ApiFlavor::OpenAi,
            LlmApi::Ollama => ApiFlavor::Ollama,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "kubebridge",
    about = "Chat with a Kubernetes cluster through an MCP tool server",
    version
)]
struct Cli {
    /// How to reach the tool server
    #[arg(long, value_enum, default_value_t = TransportKind::Http)]
    transport: TransportKind,

    /// Tool server binary
    #[arg(long, default_value_t = ServerCommand::default_binary().to_string())]
    server_bin: String,

    /// Serving mode passed to a spawned network server
    #[arg(long, default_value = "streamable-http")]
    server_mode: String,

    /// Port for a spawned network server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the network server (defaults to http://localhost:<port>)
    #[arg(long)]
    server_url: Option<String>,

    /// Connectivity probe deadline
    #[arg(long, default_value_t = 1000)]
    probe_timeout_ms: u64,

    /// Deadline for tool discovery requests
    #[arg(long, default_value_t = 10)]
    list_timeout_secs: u64,

    /// Deadline for tool call requests
    #[arg(long, default_value_t = 30)]
    call_timeout_secs: u64,

    /// Wait after spawning a network server
    #[arg(long, default_value_t = 3)]
    warmup_secs: u64,

    /// Lines read from a pipe server per request before giving up
    #[arg(long, default_value_t = 10)]
    max_read_attempts: usize,

    /// Wait after spawning a pipe server
    #[arg(long, default_value_t = 500)]
    pipe_startup_ms: u64,

    /// Language model base URL
    #[arg(long, env = "KUBEBRIDGE_LLM_URL", default_value = "http://localhost:11434/v1")]
    llm_url: String,

    /// Bearer token for the language model
    #[arg(long, env = "KUBEBRIDGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, default_value = "deepseek-r1")]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f64,

    /// Language model HTTP API
    #[arg(long, value_enum, default_value_t = LlmApi::Openai)]
    llm_api: LlmApi,

    /// Language model request deadline
    #[arg(long, default_value_t = 60)]
    llm_timeout_secs: u64,

    /// Replace the default instruction preamble
    #[arg(long)]
    system_prompt: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Export spans to this OTLP endpoint
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    print_metrics: bool,
}

/// Probe or spawn the tool server; a spawned server is not warmed up yet
async fn launch_transport(cli: &Cli) -> Result<Box<dyn Transport>, TransportError> {
    match cli.transport {
        TransportKind::Pipe => {
            println!("🚀 Starting {} in stdio mode...", cli.server_bin);
            let config = PipeConfig {
                max_read_attempts: cli.max_read_attempts,
                startup_delay: Duration::from_millis(cli.pipe_startup_ms),
            };
            let transport =
                PipeTransport::launch(&ServerCommand::stdio(cli.server_bin.clone()), config).await?;
            Ok(Box::new(transport))
        }
        TransportKind::Http => {
            let base_url = cli
                .server_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}", cli.port));
            println!("🔍 Checking if {} is already running at {}...", cli.server_bin, base_url);
            let config = HttpConfig {
                base_url,
                probe_timeout: Duration::from_millis(cli.probe_timeout_ms),
                list_timeout: Duration::from_secs(cli.list_timeout_secs),
                call_timeout: Duration::from_secs(cli.call_timeout_secs),
                warmup: Duration::from_secs(cli.warmup_secs),
            };
            let command = ServerCommand::network(cli.server_bin.clone(), &cli.server_mode, cli.port);
            let transport = HttpTransport::establish(config, &command).await?;
            println!("✅ Tool server reachable ({})", transport.launch().label());
            Ok(Box::new(transport))
        }
    }
}

fn prompt() {
    print!("You: ");
    let _ = std::io::stdout().flush();
}

fn interrupted_during_startup() {
    println!("\n👋 Interrupted during start-up");
}

/// Start-up and conversation; every path past the spawn shuts the server down
async fn session<S>(cli: &Cli, mut interrupt: Pin<&mut S>) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future,
{
    let agent = ChatClient::new(ChatConfig {
        base_url: cli.llm_url.clone(),
        api_key: cli.api_key.clone(),
        model: cli.model.clone(),
        temperature: cli.temperature,
        timeout: Duration::from_secs(cli.llm_timeout_secs),
        flavor: cli.llm_api.into(),
    })?;

    let mut transport = match repl::interruptible(launch_transport(cli), interrupt.as_mut()).await {
        Some(transport) => transport?,
        None => {
            interrupted_during_startup();
            return Ok(());
        }
    };

    if repl::interruptible(transport.warm_up(), interrupt.as_mut()).await.is_none() {
        interrupted_during_startup();
        transport.shutdown().await;
        return Ok(());
    }

    let mut client = McpClient::new(transport);
    let catalog = match repl::interruptible(ToolCatalog::discover(&mut client), interrupt.as_mut()).await {
        Some(Ok(catalog)) => catalog,
        Some(Err(e)) => {
            eprintln!("❌ Failed to connect to {}: {}", cli.server_bin, e);
            client.shutdown().await;
            return Err(e.into());
        }
        None => {
            interrupted_during_startup();
            client.shutdown().await;
            return Ok(());
        }
    };

    let config = ControllerConfig {
        system_prompt: cli.system_prompt.clone(),
        ..ControllerConfig::default()
    };
    let mut controller = ConversationController::new(
        Box::new(agent),
        client,
        catalog,
        config,
        Box::new(std::io::stdout()),
    );
    controller.greet();

    let mut lines = match repl::spawn_line_reader(std::io::BufReader::new(std::io::stdin())) {
        Ok(lines) => lines,
        Err(e) => {
            controller.shutdown().await;
            return Err(e.into());
        }
    };

    repl::run(&mut controller, &mut lines, interrupt, prompt).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    telemetry::init_tracing("kubebridge", cli.otlp_endpoint.as_deref(), cli.verbose)
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = session(&cli, ctrl_c.as_mut()).await;

    if cli.print_metrics {
        println!("{}", metrics::render());
    }

    telemetry::shutdown_tracing();
    result
}
