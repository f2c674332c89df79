//! Interactive input loop around a [`ConversationController`]
//!
//! Terminal lines are read on a dedicated OS thread and forwarded over a
//! channel, so waiting for input never blocks the runtime and an interrupt
//! can end the session while the terminal is still open.
//!
//! ```text
//! stdin thread ──lines──→ mpsc ──→ run() ──→ controller.handle_input()
//!                                    ↑
//!                               interrupt (ctrl-c)
//! ```
//!
//! Every way out of [`run`] ends in `controller.shutdown()`.

use std::future::Future;
use std::io::{self, BufRead};
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agent::{ConversationController, TurnOutcome};

/// Lines buffered between the reader thread and the loop
const LINE_BUFFER: usize = 16;

/// Why the input loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed an exit keyword
    ExitKeyword,
    /// Input was closed
    EndOfInput,
    /// The interrupt future completed
    Interrupted,
    /// Reading input failed
    InputError,
}

impl SessionEnd {
    pub fn label(&self) -> &'static str {
        match self {
            SessionEnd::ExitKeyword => "exit_keyword",
            SessionEnd::EndOfInput => "end_of_input",
            SessionEnd::Interrupted => "interrupted",
            SessionEnd::InputError => "input_error",
        }
    }
}

/// Read `reader` line by line on its own thread.
///
/// The thread stops after the first read error, at end of input, or once
/// the receiver is dropped and the next line arrives.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    std::thread::Builder::new()
        .name("kubebridge-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(rx)
}

/// Drive `work` unless `interrupt` completes first; `None` means interrupted.
///
/// The interrupt is polled first, which also installs a signal handler
/// behind it before any of `work` runs.
pub async fn interruptible<F, S>(work: F, interrupt: Pin<&mut S>) -> Option<F::Output>
where
    F: Future,
    S: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => None,
        output = work => Some(output),
    }
}

/// Feed lines to the controller until exit, end of input or interrupt,
/// then shut the controller down.
///
/// # Arguments
/// * `controller` - Session to drive
/// * `lines` - Input lines, usually from [`spawn_line_reader`]
/// * `interrupt` - Completes when the session should end (ctrl-c)
/// * `prompt` - Called before waiting for each line
pub async fn run<S, P>(
    controller: &mut ConversationController,
    lines: &mut mpsc::Receiver<io::Result<String>>,
    mut interrupt: Pin<&mut S>,
    mut prompt: P,
) -> SessionEnd
where
    S: Future,
    P: FnMut(),
{
    let end = loop {
        prompt();

        let line = match interruptible(lines.recv(), interrupt.as_mut()).await {
            None => break SessionEnd::Interrupted,
            Some(None) => break SessionEnd::EndOfInput,
            Some(Some(Err(e))) => {
                warn!(error = %e, "Failed to read input");
                break SessionEnd::InputError;
            }
            Some(Some(Ok(line))) => line,
        };

        match interruptible(controller.handle_input(&line), interrupt.as_mut()).await {
            None => break SessionEnd::Interrupted,
            Some(TurnOutcome::Exit) => break SessionEnd::ExitKeyword,
            Some(_) => {}
        }
    };

    if end != SessionEnd::ExitKeyword {
        controller.farewell();
    }

    info!(
        session_id = %controller.session_id(),
        reason = end.label(),
        "Input loop finished"
    );
    controller.shutdown().await;
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reader_forwards_lines_then_closes() {
        let mut rx = spawn_line_reader(Cursor::new("list pods\n\nexit\n")).unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), "list pods");
        assert_eq!(rx.recv().await.unwrap().unwrap(), "");
        assert_eq!(rx.recv().await.unwrap().unwrap(), "exit");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_interruptible_prefers_interrupt() {
        let signal = std::future::ready(());
        tokio::pin!(signal);

        let out = interruptible(async { 42 }, signal.as_mut()).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn test_interruptible_returns_work_output() {
        let signal = tokio::time::sleep(Duration::from_secs(30));
        tokio::pin!(signal);

        let out = interruptible(async { 42 }, signal.as_mut()).await;
        assert_eq!(out, Some(42));
    }
}
