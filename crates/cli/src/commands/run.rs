//! `tandem run` — answer one prompt and exit.

use std::path::Path;

use tandem_agent::RunOutcome;

use super::{Approval, CliResult, build_session, cancel_on_ctrl_c, load_config};

pub async fn run(config_path: Option<&Path>, prompt: &str, auto_approve: bool) -> CliResult {
    let config = load_config(config_path)?;
    let approval = if auto_approve {
        Approval::Auto
    } else {
        Approval::Terminal
    };
    let mut session = build_session(config, approval)?;

    let watcher = cancel_on_ctrl_c(&session.agent);
    let outcome = session.agent.try_run(prompt).await;
    watcher.abort();
    println!();

    let stats = session.agent.stats();
    eprintln!(
        "  {} turns, {} tool calls, {} tokens in {:.1}s",
        stats.turns,
        stats.tool_calls,
        stats.total_tokens,
        stats.elapsed.as_secs_f64()
    );

    match outcome {
        Ok(RunOutcome::Completed(_)) => Ok(()),
        Ok(RunOutcome::MaxTurnsReached) => Err(format!(
            "{} after {} turns",
            tandem_agent::MAX_TURNS_SENTINEL,
            session.config.agent.max_turns
        )
        .into()),
        Err(e) if e.is_cancelled() => Err("Cancelled".into()),
        Err(e) => Err(e.into()),
    }
}
