pub mod chat;
pub mod console;
pub mod init;
pub mod run;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tandem_agent::{AgentCallbacks, AgentLoop, AgentOptions, PermissionHook, PermissionRequest};
use tandem_config::AppConfig;
use tandem_core::host::Host;
use tandem_core::task::{Task, TaskStatus, TaskStore};
use tandem_tools::LocalHost;
use tracing::warn;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Everything a command needs to drive one agent.
pub struct Session {
    pub agent: AgentLoop,
    pub config: AppConfig,
}

/// Who answers permission requests for gated tools.
pub enum Approval {
    /// `--yes`: gated tools run without asking.
    Auto,
    /// Ask on the terminal through the host.
    Terminal,
    /// Hand every request to this hook.
    Hook(Arc<dyn PermissionHook>),
}

pub fn build_session(config: AppConfig, approval: Approval) -> CliResult<Session> {
    if !config.has_api_key() && config.base_url.is_none() {
        let var = AppConfig::api_key_var(config.provider);
        eprintln!();
        eprintln!("  ERROR: No API key configured for {}!", config.provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TANDEM_API_KEY");
        eprintln!("    {var}");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = tandem_providers::factory::build_from_config(&config)?;
    let host: Arc<dyn Host> = Arc::new(LocalHost::new()?);
    let tasks = TaskStore::new();
    let tools = tandem_tools::default_registry(tasks.clone());

    let mut callbacks = terminal_callbacks();
    callbacks.permission = match approval {
        Approval::Auto => None,
        Approval::Terminal => {
            let hook: Arc<dyn PermissionHook> = Arc::new(TerminalApproval { host: host.clone() });
            Some(hook)
        }
        Approval::Hook(hook) => Some(hook),
    };

    let agent = AgentLoop::new(provider, host, tools, AgentOptions::from_config(&config))
        .with_callbacks(callbacks)
        .with_task_store(tasks);

    Ok(Session { agent, config })
}

/// Stream answers to stdout; tools, reasoning and task updates to stderr.
fn terminal_callbacks() -> AgentCallbacks {
    AgentCallbacks {
        on_text: Some(Arc::new(|delta: &str| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        })),
        on_thinking: Some(Arc::new(|delta: &str| eprint!("\x1b[2m{delta}\x1b[0m"))),
        on_tool_start: Some(Arc::new(|call: &tandem_core::tool::ToolCall| {
            eprintln!("\n  → {} {}", call.name, summarize(&call.arguments));
        })),
        on_tool_end: Some(Arc::new(|call: &tandem_core::tool::ToolCall, outcome: &tandem_agent::ToolOutcome| {
            if outcome.is_error {
                let first = outcome.content.lines().next().unwrap_or_default();
                eprintln!("  ✗ {}: {first}", call.name);
            } else {
                eprintln!("  ✓ {} ({} ms)", call.name, outcome.duration.as_millis());
            }
        })),
        on_retry: Some(Arc::new(|event: &tandem_agent::RetryEvent| {
            eprintln!(
                "  ⟳ retry {}/{} in {:.1}s ({})",
                event.attempt,
                event.max_retries,
                event.delay.as_secs_f64(),
                event.error
            );
        })),
        on_error: Some(Arc::new(|err: &tandem_core::error::Error| eprintln!("  [Error] {err}"))),
        on_stats: None,
        on_task_update: Some(Arc::new(|tasks: &[Task]| print_tasks(tasks))),
        permission: None,
    }
}

fn summarize(arguments: &serde_json::Value) -> String {
    let text = ["command", "path", "pattern", "subject"]
        .iter()
        .find_map(|key| arguments[*key].as_str())
        .map(String::from)
        .unwrap_or_else(|| arguments.to_string());
    match text.char_indices().nth(80) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text,
    }
}

fn print_tasks(tasks: &[Task]) {
    eprintln!("  Tasks:");
    for task in tasks {
        let mark = match task.status {
            TaskStatus::Pending => "[ ]",
            TaskStatus::InProgress => "[~]",
            TaskStatus::Completed => "[x]",
        };
        eprintln!("    {mark} #{} {}", task.id, task.subject);
    }
}

/// Asks on the terminal before a gated tool runs.
struct TerminalApproval {
    host: Arc<dyn Host>,
}

#[async_trait]
impl PermissionHook for TerminalApproval {
    async fn check(&self, request: &PermissionRequest) -> bool {
        let prompt = format!("\n  Allow {} `{}`? [y/N] ", request.tool, request.description);
        match self.host.read_line(&prompt).await {
            Ok(answer) => approved(&answer),
            Err(e) => {
                warn!(error = %e, "Could not read approval, denying");
                false
            }
        }
    }
}

/// Whether a y/N answer grants permission.
fn approved(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Cancel the agent's current run when Ctrl-C arrives. Abort the returned
/// handle once the run is over.
pub fn cancel_on_ctrl_c(agent: &AgentLoop) -> tokio::task::JoinHandle<()> {
    let token = agent.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling...");
            token.cancel();
        }
    })
}
