//! `tandem chat` — interactive session.

use std::path::Path;

use tandem_agent::{SubTaskManager, SubTaskStatus};
use tandem_core::agent::AgentState;

use super::console::Console;
use super::{Approval, CliResult, Session, build_session, cancel_on_ctrl_c, load_config};

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    Clear,
    Compact,
    Stats,
    Spawn(&'a str),
    SubTasks,
    Wait,
    Help,
    Exit,
    Unknown(&'a str),
    Empty,
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Prompt(line);
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));
    match name {
        "clear" => Input::Clear,
        "compact" => Input::Compact,
        "stats" => Input::Stats,
        "spawn" if !rest.is_empty() => Input::Spawn(rest),
        "subtasks" => Input::SubTasks,
        "wait" => Input::Wait,
        "help" => Input::Help,
        "exit" | "quit" => Input::Exit,
        _ => Input::Unknown(line),
    }
}

const HELP: &str = "\
  /clear           Forget the conversation and reset stats
  /compact         Replace the conversation with a summary
  /stats           Token usage, turns and cost so far
  /spawn <prompt>  Start a background sub-task
  /subtasks        List sub-tasks
  /wait            Wait for running sub-tasks and show their results
  /exit            Leave

  Approval requests from gated tools, sub-tasks included, are asked
  one at a time; answer them before typing the next message.";

pub async fn run(config_path: Option<&Path>, auto_approve: bool) -> CliResult {
    let config = load_config(config_path)?;
    let mut console = Console::stdin();
    // Sub-tasks inherit this hook, so their requests reach the same console.
    let approval = if auto_approve {
        Approval::Auto
    } else {
        Approval::Hook(console.approval_hook())
    };
    let Session { mut agent, config } = build_session(config, approval)?;
    let mut subtasks = agent.subtask_manager();

    println!();
    println!("  tandem — interactive mode");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!();
    println!("  Type a message and press Enter, /help for commands.");
    println!("  Ctrl-C cancels a running answer; /exit quits.");
    println!();

    loop {
        let Some(line) = console.read_line("  You > ").await else {
            break;
        };

        match parse(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => println!("{HELP}"),
            Input::Clear => {
                agent.clear();
                println!("  Conversation cleared.");
            }
            Input::Compact => {
                let before = agent.conversation().estimated_tokens();
                match agent.compact().await {
                    Ok(()) => println!(
                        "  Compacted: ~{before} → ~{} tokens",
                        agent.conversation().estimated_tokens()
                    ),
                    Err(e) => eprintln!("  [Error] {e}"),
                }
            }
            Input::Stats => {
                let stats = agent.stats();
                println!("  Turns:       {}", stats.turns);
                println!("  Tool calls:  {}", stats.tool_calls);
                println!(
                    "  Tokens:      {} ({} in / {} out)",
                    stats.total_tokens, stats.input_tokens, stats.output_tokens
                );
                println!("  Elapsed:     {:.1}s", stats.elapsed.as_secs_f64());
                match agent.estimated_cost() {
                    Some(cost) => println!("  Cost:        ${cost:.4}"),
                    None => println!("  Cost:        unknown for {}", config.model),
                }
            }
            Input::Spawn(prompt) => {
                let id = subtasks.spawn(prompt, None);
                println!("  Started {id}");
            }
            Input::SubTasks => list_subtasks(&subtasks),
            Input::Wait => {
                for result in console.serve_while(subtasks.wait_all()).await {
                    match result.status {
                        SubTaskStatus::Error => eprintln!(
                            "  {} failed: {}",
                            result.id,
                            result.error.as_deref().unwrap_or("unknown error")
                        ),
                        _ => println!("  {} done:\n{}\n", result.id, result.result),
                    }
                }
            }
            Input::Unknown(command) => eprintln!("  Unknown command {command}. Try /help."),
            Input::Prompt(prompt) => {
                let watcher = cancel_on_ctrl_c(&agent);
                let answer = console.serve_while(agent.run(prompt)).await;
                watcher.abort();

                match agent.state() {
                    AgentState::Aborted => {
                        println!("\n  (cancelled)");
                        agent.reset_cancellation();
                        // Keep finished sub-tasks listed; new ones hang off the fresh token.
                        subtasks = subtasks.with_cancellation(agent.cancellation_token().child_token());
                    }
                    // Streamed already; errors went through on_error.
                    AgentState::Completed | AgentState::Errored => println!(),
                    _ => println!("\n  {answer}"),
                }
            }
        }
    }

    subtasks.abort_all();
    println!();
    println!("  Goodbye!");
    Ok(())
}

fn list_subtasks(subtasks: &SubTaskManager) {
    let all = subtasks.list();
    if all.is_empty() {
        println!("  No sub-tasks.");
        return;
    }
    for info in all {
        let status = match info.status {
            SubTaskStatus::Running => "running",
            SubTaskStatus::Completed => "done",
            SubTaskStatus::Error => "failed",
        };
        println!(
            "  {:<12} {:<8} {}",
            info.id,
            status,
            info.description.unwrap_or_default()
        );
    }
}
