//! Tool server process lifecycle
//!
//! Functions for spawning the server binary and reaping it on exit.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use super::transport::TransportError;

/// How to launch the tool server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl ServerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// `<bin> --mode stdio`
    pub fn stdio(program: impl Into<PathBuf>) -> Self {
        Self::new(program).args(["--mode", "stdio"]).with_home()
    }

    /// `<bin> --mode <mode> --port <port>`
    pub fn network(program: impl Into<PathBuf>, mode: &str, port: u16) -> Self {
        Self::new(program)
            .args(["--mode", mode, "--port"])
            .arg(port.to_string())
            .with_home()
    }

    /// Pass the caller's home directory explicitly
    pub fn with_home(self) -> Self {
        match home_dir() {
            Some(home) => self.env("HOME", home),
            None => self,
        }
    }

    /// Default binary name for the current platform
    pub fn default_binary() -> &'static str {
        if cfg!(windows) {
            "k8s-mcp-server.exe"
        } else {
            "k8s-mcp-server"
        }
    }

    fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

fn home_dir() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .filter(|h| !h.is_empty())
}

/// A server process this session spawned and therefore must reap
#[derive(Debug)]
pub struct ServerProcess {
    program: String,
    child: Child,
}

impl ServerProcess {
    /// Spawn with explicit stdio wiring; the child inherits the current environment
    pub fn spawn(
        command: &ServerCommand,
        stdin: Stdio,
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<Self, TransportError> {
        let program = command.display_program();

        let child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        info!(program = %program, pid = child.id(), "Spawned tool server");
        Ok(Self { program, child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Kill the process and wait for it to exit
    pub async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Process might already be dead
            warn!(program = %self.program, error = %e, "Failed to kill tool server");
        }

        match self.child.wait().await {
            Ok(status) => info!(program = %self.program, %status, "Tool server exited"),
            Err(e) => warn!(program = %self.program, error = %e, "Failed to reap tool server"),
        }
    }
}
