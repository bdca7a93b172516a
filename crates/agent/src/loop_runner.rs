//! The agent turn loop.

use std::sync::Arc;

use tandem_core::CancellationToken;
use tandem_core::agent::{AgentState, Stats};
use tandem_core::error::{Error, ProviderError, ToolError};
use tandem_core::host::Host;
use tandem_core::message::{ContentBlock, Conversation, Message, Role};
use tandem_core::provider::{Provider, ProviderRequest, StreamedResult};
use tandem_core::task::TaskStore;
use tandem_core::tool::{ToolCall, ToolDefinition, ToolRegistry};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::options::{AgentCallbacks, AgentOptions, CallbackObserver, ToolOutcome};
use crate::permission::{self, PermissionRequest};
use crate::retry;
use crate::subtask::SubTaskManager;

/// Returned by [`AgentLoop::run`] when the turn budget runs out.
pub const MAX_TURNS_SENTINEL: &str = "[Max turns reached]";

const COMPACT_INSTRUCTION: &str = "Summarize the conversation so far so it can replace the full \
transcript. Keep every file path, command, decision and open question, and list pending tasks. \
Reply with the summary only.";

const COMPACT_ACK: &str = "Understood. I have the summary and will continue from there.";

/// How a successful `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Completed(String),
    MaxTurnsReached,
}

/// One conversation with one model: calls the provider, runs the tools it
/// asks for, feeds the results back, and repeats until the model answers.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    host: Arc<dyn Host>,
    tools: ToolRegistry,
    options: AgentOptions,
    callbacks: AgentCallbacks,
    tasks: Option<TaskStore>,
    conversation: Conversation,
    stats: Stats,
    state: AgentState,
    cancel: CancellationToken,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        host: Arc<dyn Host>,
        tools: ToolRegistry,
        options: AgentOptions,
    ) -> Self {
        Self {
            provider,
            host,
            tools,
            options,
            callbacks: AgentCallbacks::default(),
            tasks: None,
            conversation: Conversation::new(),
            stats: Stats::default(),
            state: AgentState::Idle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: AgentCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Watch `store` and report changes through `on_task_update`.
    pub fn with_task_store(mut self, store: TaskStore) -> Self {
        self.tasks = Some(store);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Changes take effect with the next provider call.
    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort the in-flight provider call and every sub-task derived from
    /// this loop. Tool side effects already committed stay.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Install a fresh token after a cancelled run so the loop can be used
    /// again. Sub-task managers built earlier keep the old token.
    pub fn reset_cancellation(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Drop the conversation and zero the stats.
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.stats = Stats::default();
        self.state = AgentState::Idle;
    }

    /// Cost of the tokens used so far, if the model has known pricing.
    pub fn estimated_cost(&self) -> Option<f64> {
        self.provider
            .pricing(&self.options.model)
            .map(|p| p.cost(self.stats.input_tokens, self.stats.output_tokens))
    }

    /// A manager whose sub-tasks share this loop's provider, host and tools,
    /// run silently, and are cancelled along with this loop.
    pub fn subtask_manager(&self) -> SubTaskManager {
        SubTaskManager::new(
            self.provider.clone(),
            self.host.clone(),
            self.tools.clone(),
            self.options.for_subtask(),
            self.callbacks.silent(),
            self.cancel.child_token(),
        )
    }

    /// Run one user request to completion and render the result as text:
    /// the answer, [`MAX_TURNS_SENTINEL`], or `[Error: ...]`.
    pub async fn run(&mut self, user_text: &str) -> String {
        match self.try_run(user_text).await {
            Ok(RunOutcome::Completed(text)) => text,
            Ok(RunOutcome::MaxTurnsReached) => MAX_TURNS_SENTINEL.to_string(),
            Err(e) => format!("[Error: {e}]"),
        }
    }

    pub async fn try_run(&mut self, user_text: &str) -> Result<RunOutcome, Error> {
        let started = Instant::now();
        self.state = AgentState::Running;
        self.conversation.push(Message::user(user_text));

        let result = self.drive().await;

        self.stats.elapsed += started.elapsed();
        self.state = match &result {
            Ok(RunOutcome::Completed(_)) => AgentState::Completed,
            Ok(RunOutcome::MaxTurnsReached) => AgentState::MaxTurnsReached,
            Err(e) if e.is_cancelled() => AgentState::Aborted,
            Err(_) => AgentState::Errored,
        };
        match &result {
            Ok(RunOutcome::MaxTurnsReached) => {
                warn!(max_turns = self.options.max_turns, "Turn budget exhausted")
            }
            Err(e) if e.is_cancelled() => info!("Run cancelled"),
            Err(e) => {
                warn!(error = %e, "Run failed");
                self.callbacks.error(e);
            }
            Ok(_) => {}
        }
        self.callbacks.stats(&self.stats);
        result
    }

    async fn drive(&mut self) -> Result<RunOutcome, Error> {
        let mut turns = 0;
        while turns < self.options.max_turns {
            if self.cancel.is_cancelled() {
                return Err(ProviderError::Cancelled.into());
            }

            self.state = AgentState::CallingProvider;
            let result = self
                .call_provider(self.conversation.messages.clone(), self.tools.definitions())
                .await?;
            turns += 1;
            self.stats.turns += 1;
            self.stats.record_usage(result.input_tokens, result.output_tokens);
            debug!(
                turn = turns,
                stop_reason = ?result.stop_reason,
                input_tokens = result.input_tokens,
                output_tokens = result.output_tokens,
                "Provider turn finished"
            );

            let calls = result.tool_calls();
            let text = result.text();
            if !result.content.is_empty() {
                self.conversation.push(Message::assistant_blocks(result.content));
            }
            self.callbacks.stats(&self.stats);

            if calls.is_empty() {
                return Ok(RunOutcome::Completed(text));
            }

            self.state = AgentState::ExecutingTools;
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(self.execute_tool(call).await);
            }
            self.conversation.push(Message::user_blocks(results));
            self.state = AgentState::Running;
        }
        Ok(RunOutcome::MaxTurnsReached)
    }

    async fn call_provider(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<StreamedResult, ProviderError> {
        let request = ProviderRequest {
            model: self.options.model.clone(),
            system: self.options.system_prompt.clone(),
            messages,
            tools,
            max_tokens: self.options.max_tokens,
            thinking_budget: self.options.thinking_budget,
        };
        debug!(
            provider = %self.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            "Sending request"
        );

        let provider = self.provider.as_ref();
        let observer = CallbackObserver(&self.callbacks);
        let (request, observer, cancel) = (&request, &observer, &self.cancel);
        retry::with_retry(
            &self.options.retry,
            cancel,
            |event| self.callbacks.retry(event),
            move || provider.send_streaming(request, observer, cancel),
        )
        .await
    }

    /// Run one tool call and turn whatever happens into a ToolResult block.
    async fn execute_tool(&mut self, call: &ToolCall) -> ContentBlock {
        self.stats.tool_calls += 1;
        self.callbacks.tool_start(call);
        info!(tool = %call.name, id = %call.id, "Executing tool");

        let revision = self.tasks.as_ref().map(TaskStore::revision);
        let started = Instant::now();
        let outcome = match self.dispatch(call).await {
            Ok(content) => ToolOutcome {
                content,
                is_error: false,
                duration: started.elapsed(),
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                ToolOutcome {
                    content: e.to_string(),
                    is_error: true,
                    duration: started.elapsed(),
                }
            }
        };
        debug!(
            tool = %call.name,
            is_error = outcome.is_error,
            duration_ms = outcome.duration.as_millis() as u64,
            "Tool finished"
        );
        self.callbacks.tool_end(call, &outcome);

        if let (Some(store), Some(before)) = (&self.tasks, revision) {
            if store.revision() != before {
                self.callbacks.task_update(&store.list());
            }
        }

        if outcome.is_error {
            ContentBlock::tool_error(&call.id, outcome.content)
        } else {
            ContentBlock::tool_result(&call.id, outcome.content)
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<String, ToolError> {
        if permission::is_gated(&call.name) {
            if let Some(hook) = &self.callbacks.permission {
                let request = PermissionRequest::new(&call.name, &call.arguments);
                if !hook.check(&request).await {
                    info!(tool = %call.name, target = %request.description, "Permission denied");
                    return Err(ToolError::PermissionDenied {
                        tool_name: call.name.clone(),
                    });
                }
            }
        }

        let timeout = self.options.tool_timeout;
        let execution = self
            .tools
            .execute(&call.name, call.arguments.clone(), self.host.as_ref());
        match tokio::time::timeout(timeout, execution).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Replace the conversation with a model-written summary plus a fixed
    /// acknowledgment.
    pub async fn compact(&mut self) -> Result<(), Error> {
        if self.conversation.is_empty() {
            return Ok(());
        }

        let mut messages = self.conversation.messages.clone();
        match messages.last_mut() {
            Some(last) if last.role == Role::User => {
                let mut blocks = last.blocks();
                blocks.push(ContentBlock::text(COMPACT_INSTRUCTION));
                *last = Message::user_blocks(blocks);
            }
            _ => messages.push(Message::user(COMPACT_INSTRUCTION)),
        }

        let before = self.conversation.len();
        let result = self.call_provider(messages, self.tools.definitions()).await?;
        self.stats.record_usage(result.input_tokens, result.output_tokens);

        let summary = result.text();
        self.conversation.replace(vec![
            Message::user(format!("Summary of the conversation so far:\n\n{summary}")),
            Message::assistant(COMPACT_ACK),
        ]);
        info!(before, after = self.conversation.len(), "Conversation compacted");
        self.callbacks.stats(&self.stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tandem_core::host::NullHost;
    use tandem_core::message::MessageContent;
    use tandem_core::tool::Tool;

    /// Echoes its `value` argument after an optional sleep.
    struct EchoTool {
        name: &'static str,
        sleep: Option<Duration>,
        calls: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl EchoTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                sleep: None,
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echo"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }

        async fn execute(&self, input: serde_json::Value, _host: &dyn Host) -> Result<String, ToolError> {
            self.calls.lock().unwrap().push(input.clone());
            if let Some(sleep) = self.sleep {
                tokio::time::sleep(sleep).await;
            }
            Ok(format!("echo: {}", input["value"].as_str().unwrap_or_default()))
        }
    }

    fn agent(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(provider, Arc::new(NullHost), tools, AgentOptions::default())
    }

    fn tool_results(message: &Message) -> Vec<(String, String, bool)> {
        message
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some((tool_use_id, content, is_error)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(text_response("Hello!"))]));
        let mut agent = agent(provider.clone(), ToolRegistry::new());

        assert_eq!(agent.run("Hi").await, "Hello!");
        assert_eq!(agent.state(), AgentState::Completed);
        assert_eq!(agent.conversation().len(), 2);
        assert_eq!(agent.stats().turns, 1);
        assert_eq!(agent.stats().total_tokens, 15);

        let request = &provider.requests()[0];
        assert_eq!(request.system, crate::DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.messages, vec![Message::user("Hi")]);
    }

    #[tokio::test]
    async fn tool_results_keep_request_order_in_one_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[
                ("call_a", "echo", serde_json::json!({"value": "first"})),
                ("call_b", "missing_tool", serde_json::json!({})),
                ("call_c", "echo", serde_json::json!({"value": "third"})),
            ])),
            Ok(text_response("done")),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool::new("echo")));
        let mut agent = agent(provider.clone(), tools);

        assert_eq!(agent.run("go").await, "done");

        let messages = &agent.conversation().messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::User);
        let results = tool_results(&messages[2]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], ("call_a".into(), "echo: first".into(), false));
        assert_eq!(results[1].0, "call_b");
        assert!(results[1].2);
        assert!(results[1].1.contains("missing_tool"));
        assert_eq!(results[2], ("call_c".into(), "echo: third".into(), false));

        assert_eq!(agent.stats().turns, 2);
        assert_eq!(agent.stats().tool_calls, 3);
        // The second request carried the tool results back.
        assert_eq!(provider.requests()[1].messages.len(), 3);
        assert_eq!(provider.requests()[0].tools.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_status_is_retried_after_backoff() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(http_error(503)),
            Ok(text_response("recovered")),
        ]));
        let retries = Arc::new(Mutex::new(Vec::new()));
        let sink = retries.clone();
        let callbacks = AgentCallbacks {
            on_retry: Some(Arc::new(move |e: &crate::RetryEvent| {
                sink.lock().unwrap().push((e.attempt, e.delay))
            })),
            ..AgentCallbacks::default()
        };
        let mut agent = agent(provider.clone(), ToolRegistry::new()).with_callbacks(callbacks);

        let started = Instant::now();
        assert_eq!(agent.run("hi").await, "recovered");
        let elapsed = started.elapsed();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(*retries.lock().unwrap(), vec![(1, Duration::from_millis(1000))]);
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(http_error(401))]));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let callbacks = AgentCallbacks {
            on_retry: Some(Arc::new(|_: &crate::RetryEvent| panic!("401 must not be retried"))),
            on_error: Some(Arc::new(move |e: &Error| sink.lock().unwrap().push(e.to_string()))),
            ..AgentCallbacks::default()
        };
        let mut agent = agent(provider.clone(), ToolRegistry::new()).with_callbacks(callbacks);

        let out = agent.run("hi").await;
        assert!(out.starts_with("[Error: "), "{out}");
        assert!(out.contains("401"), "{out}");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(agent.state(), AgentState::Errored);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_tool_times_out_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[("call_1", "slow", serde_json::json!({}))])),
            Ok(text_response("moved on")),
        ]));
        let mut slow = EchoTool::new("slow");
        slow.sleep = Some(Duration::from_secs(3600));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(slow));
        let mut agent = agent(provider, tools);

        let started = Instant::now();
        assert_eq!(agent.run("go").await, "moved on");
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(60));

        let results = tool_results(&agent.conversation().messages[2]);
        assert_eq!(results.len(), 1);
        assert!(results[0].2);
        assert!(results[0].1.contains("timed out after 30s"), "{}", results[0].1);
    }

    #[tokio::test]
    async fn denied_tool_never_executes() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[
                ("call_1", "run_command", serde_json::json!({"command": "rm -rf /"})),
                ("call_2", "echo", serde_json::json!({"value": "ungated"})),
            ])),
            Ok(text_response("ok")),
        ]));
        let gated = EchoTool::new("run_command");
        let gated_calls = gated.calls.clone();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(gated));
        tools.register(Arc::new(EchoTool::new("echo")));

        let asked = Arc::new(Mutex::new(Vec::new()));
        let sink = asked.clone();
        let callbacks = AgentCallbacks {
            permission: Some(Arc::new(move |req: &PermissionRequest| {
                sink.lock().unwrap().push(req.description.clone());
                false
            })),
            ..AgentCallbacks::default()
        };
        let mut agent = agent(provider, tools).with_callbacks(callbacks);

        assert_eq!(agent.run("clean up").await, "ok");
        assert!(gated_calls.lock().unwrap().is_empty());
        assert_eq!(*asked.lock().unwrap(), vec!["rm -rf /".to_string()]);

        let results = tool_results(&agent.conversation().messages[2]);
        assert!(results[0].2);
        assert!(results[0].1.contains("Permission denied"), "{}", results[0].1);
        assert_eq!(results[1], ("call_2".into(), "echo: ungated".into(), false));
    }

    #[tokio::test]
    async fn max_turns_returns_sentinel() {
        let provider = Arc::new(ScriptedProvider::from_fn(|_| {
            Ok(tool_response(&[("call", "echo", serde_json::json!({"value": "again"}))]))
        }));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool::new("echo")));
        let mut agent = AgentLoop::new(
            provider.clone(),
            Arc::new(NullHost),
            tools,
            AgentOptions::default().with_max_turns(1),
        );

        assert_eq!(agent.run("loop forever").await, MAX_TURNS_SENTINEL);
        assert_eq!(agent.state(), AgentState::MaxTurnsReached);
        assert_eq!(agent.stats().turns, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_call() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok(text_response("too late"))]).with_delay(Duration::from_secs(10)),
        );
        let mut agent = agent(provider, ToolRegistry::new());
        let token = agent.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let result = agent.try_run("slow").await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(agent.state(), AgentState::Aborted);

        agent.reset_cancellation();
        assert!(!agent.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn compact_leaves_two_messages() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[("call_1", "echo", serde_json::json!({"value": "a"}))])),
            Ok(text_response("first answer")),
            Ok(text_response("second answer")),
            Ok(text_response("We echoed 'a' and answered twice.")),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool::new("echo")));
        let mut agent = agent(provider.clone(), tools);

        agent.run("one").await;
        agent.run("two").await;
        assert_eq!(agent.conversation().len(), 6);

        agent.compact().await.unwrap();
        let messages = &agent.conversation().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].text().contains("We echoed 'a' and answered twice."));
        assert_eq!(messages[1].content, MessageContent::Text(COMPACT_ACK.into()));

        // The summary request carried the whole transcript plus the instruction.
        let request = provider.requests().pop().unwrap();
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[6].text(), COMPACT_INSTRUCTION);
    }

    #[tokio::test]
    async fn clear_resets_conversation_and_stats() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(text_response("hi"))]));
        let mut agent = agent(provider, ToolRegistry::new());
        agent.run("hello").await;
        assert!(agent.stats().turns > 0);

        agent.clear();
        assert!(agent.conversation().is_empty());
        assert_eq!(*agent.stats(), Stats::default());
        assert_eq!(agent.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn task_changes_are_reported() {
        struct CreateTask(TaskStore);

        #[async_trait]
        impl Tool for CreateTask {
            fn name(&self) -> &str {
                "task_create"
            }
            fn description(&self) -> &str {
                "Create a task"
            }
            fn input_schema(&self) -> serde_json::Value {
                serde_json::json!({ "type": "object" })
            }
            async fn execute(&self, input: serde_json::Value, _host: &dyn Host) -> Result<String, ToolError> {
                let task = self.0.create(input["subject"].as_str().unwrap_or_default(), "");
                Ok(format!("created #{}", task.id))
            }
        }

        let store = TaskStore::new();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[
                ("call_1", "task_create", serde_json::json!({"subject": "Plan"})),
                ("call_2", "echo", serde_json::json!({"value": "x"})),
            ])),
            Ok(text_response("planned")),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CreateTask(store.clone())));
        tools.register(Arc::new(EchoTool::new("echo")));

        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        let callbacks = AgentCallbacks {
            on_task_update: Some(Arc::new(move |tasks: &[tandem_core::task::Task]| {
                sink.lock().unwrap().push(tasks.len())
            })),
            ..AgentCallbacks::default()
        };
        let mut agent = agent(provider, tools)
            .with_callbacks(callbacks)
            .with_task_store(store);

        agent.run("plan").await;
        // Only the tool that changed the store triggers a notification.
        assert_eq!(*updates.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn callbacks_see_text_tools_and_stats() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_response(&[("call_1", "echo", serde_json::json!({"value": "v"}))])),
            Ok(text_response("final")),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool::new("echo")));

        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
        let callbacks = AgentCallbacks {
            on_text: Some(Arc::new(move |t: &str| l1.lock().unwrap().push(format!("text:{t}")))),
            on_tool_start: Some(Arc::new(move |c: &ToolCall| {
                l2.lock().unwrap().push(format!("start:{}", c.id))
            })),
            on_tool_end: Some(Arc::new(move |c: &ToolCall, o: &ToolOutcome| {
                l3.lock().unwrap().push(format!("end:{}:{}", c.id, o.content))
            })),
            on_stats: Some(Arc::new(move |s: &Stats| l4.lock().unwrap().push(format!("stats:{}", s.turns)))),
            ..AgentCallbacks::default()
        };
        let mut agent = agent(provider, tools).with_callbacks(callbacks);
        agent.run("go").await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "stats:1",
                "start:call_1",
                "end:call_1:echo: v",
                "text:final",
                "stats:2",
                "stats:2",
            ]
        );
    }
}
