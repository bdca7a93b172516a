//! Terminal input for the interactive session.
//!
//! One thread reads stdin. The REPL prompt and every permission request,
//! including those raised by background sub-tasks, take lines from that single
//! source in turn, so an approval answer is never read as a chat message.

use std::convert::Infallible;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tandem_agent::{PermissionHook, PermissionRequest};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::approved;

/// A pending permission request and where to send the answer.
struct Approval {
    request: PermissionRequest,
    reply: oneshot::Sender<bool>,
}

pub struct Console {
    lines: mpsc::Receiver<String>,
    approvals: mpsc::UnboundedReceiver<Approval>,
    requests: mpsc::UnboundedSender<Approval>,
    closed: bool,
}

impl Console {
    /// Start the stdin reader thread.
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(16);
        // A plain thread, so a pending read never holds up runtime shutdown.
        std::thread::spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });
        Self::from_lines(rx)
    }

    pub fn from_lines(lines: mpsc::Receiver<String>) -> Self {
        let (requests, approvals) = mpsc::unbounded_channel();
        Self {
            lines,
            approvals,
            requests,
            closed: false,
        }
    }

    /// A permission hook that queues its requests for this console.
    pub fn approval_hook(&self) -> Arc<dyn PermissionHook> {
        Arc::new(ConsoleApproval {
            requests: self.requests.clone(),
        })
    }

    /// Wait for the next user line, answering any approval that arrives
    /// first. `None` once input is closed.
    pub async fn read_line(&mut self, prompt: &str) -> Option<String> {
        loop {
            show(prompt);
            tokio::select! {
                biased;
                Some(approval) = self.approvals.recv() => {
                    eprintln!();
                    self.answer(approval).await;
                }
                line = self.lines.recv() => {
                    if line.is_none() {
                        self.closed = true;
                    }
                    return line;
                }
            }
        }
    }

    /// Drive `work` to completion while answering approvals it (or a
    /// sub-task) raises.
    pub async fn serve_while<F: Future>(&mut self, work: F) -> F::Output {
        tokio::select! {
            out = work => out,
            never = self.serve_approvals() => match never {},
        }
    }

    async fn serve_approvals(&mut self) -> Infallible {
        loop {
            let Some(approval) = self.approvals.recv().await else {
                return std::future::pending().await;
            };
            self.answer(approval).await;
        }
    }

    async fn answer(&mut self, approval: Approval) {
        let Approval { request, reply } = approval;
        // Dropping `reply` denies.
        if self.closed {
            return;
        }
        show(&format!(
            "  Allow {} `{}`? [y/N] ",
            request.tool, request.description
        ));
        match self.lines.recv().await {
            Some(line) => {
                let _ = reply.send(approved(&line));
            }
            None => self.closed = true,
        }
    }
}

fn show(prompt: &str) {
    eprint!("{prompt}");
    let _ = std::io::stderr().flush();
}

struct ConsoleApproval {
    requests: mpsc::UnboundedSender<Approval>,
}

#[async_trait]
impl PermissionHook for ConsoleApproval {
    async fn check(&self, request: &PermissionRequest) -> bool {
        let (reply, answer) = oneshot::channel();
        let approval = Approval {
            request: request.clone(),
            reply,
        };
        if self.requests.send(approval).is_err() {
            return false;
        }
        answer.await.unwrap_or(false)
    }
}
