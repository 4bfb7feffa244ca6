//! # Console Surface
//!
//! Terminal implementation of [`Responder`] and the read-eval loop over stdin.

use anyhow::Result;
use async_trait::async_trait;
use std::io::{BufRead, Write};
use tokio::sync::{mpsc, watch};

use crate::domain::traits::Responder;
use crate::interface::commands::{Flow, Session};

pub struct ConsoleResponder;

impl ConsoleResponder {
    fn print(&self, content: &str) -> Result<(), String> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{content}").map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Responder for ConsoleResponder {
    async fn send_message(&self, content: &str) -> Result<(), String> {
        self.print(content)
    }

    async fn send_notification(&self, content: &str) -> Result<(), String> {
        self.print(&format!("  {content}"))
    }
}

fn prompt() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "> ");
    let _ = out.flush();
}

/// Stdin is read on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Reads lines until EOF, `.quit` or `shutdown` flips to true.
pub async fn run_repl(
    session: &Session,
    responder: &dyn Responder,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut lines = spawn_stdin_reader();
    loop {
        prompt();
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = shutdown.changed() => break,
        };
        let Some(line) = line else {
            break;
        };
        if session.handle_line(responder, &line).await == Flow::Quit {
            break;
        }
    }
    Ok(())
}
