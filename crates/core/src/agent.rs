//! Agent run state and statistics types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where an agent loop is in its turn cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    CallingProvider,
    ExecutingTools,
    Completed,
    MaxTurnsReached,
    Errored,
    Aborted,
}

impl AgentState {
    /// Terminal states end a `run`; the loop can start another from any of them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Completed
                | AgentState::MaxTurnsReached
                | AgentState::Errored
                | AgentState::Aborted
        )
    }
}

/// Usage accumulated over the lifetime of one loop. Only `clear` resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub turns: u32,
    pub tool_calls: u32,
    pub elapsed: Duration,
}

impl Stats {
    /// Add one provider call's token counts.
    pub fn record_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        self.total_tokens += input_tokens + output_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_state_starts_idle() {
        let state = AgentState::default();
        assert_eq!(state, AgentState::Idle);
        assert!(!state.is_terminal());
        assert!(AgentState::Aborted.is_terminal());
    }

    #[test]
    fn usage_accumulates() {
        let mut stats = Stats::default();
        stats.record_usage(10, 5);
        stats.record_usage(7, 3);
        assert_eq!(stats.input_tokens, 17);
        assert_eq!(stats.output_tokens, 8);
        assert_eq!(stats.total_tokens, 25);
    }
}
