//! The streaming chat pipeline.
//!
//! A request moves through validation, model resolution, quota and
//! ownership checks, tool assembly, and prompt composition before the
//! first upstream byte. Everything up to that point rejects with a typed
//! [`ChatError`]; once streaming starts, failures surface as in-stream
//! `error` frames because the response status has already committed.
//!
//! Persistence of the assistant's output runs after the stream ends,
//! including on client disconnect, via a drop guard that spawns the
//! finalize task.

use {
    async_stream::stream,
    chrono::{Duration, Utc},
    futures::{Stream, StreamExt},
    serde_json::Value,
    std::sync::{Arc, Mutex},
    tandem_models::{ModelDescriptor, ModelRegistry, ResolveError},
    tandem_protocol::{
        AgentDescriptor, AgentStatus, ChatMessage, ChatRequest, ErrorShape, MAX_STEPS_PER_TURN,
        MessagePart, RequestHints, Role, StreamEvent, Usage, error_codes,
    },
    tandem_providers::{
        LanguageModel, ProviderEvent, TurnContent, TurnMessage, TurnRequest, TurnRole,
        build_provider_options, create_model, validate_credential,
    },
    tandem_storage::Storage,
    tandem_tools::base_tools,
    tracing::{debug, warn},
    uuid::Uuid,
};

use crate::{
    assembler::{ActiveToolSet, BridgeLoader, assemble},
    error::{ChatError, Result},
    prompt, sink, title,
};

/// Agent consulted for every chat request until per-request agent
/// selection exists.
pub const DEFAULT_AGENT_ID: &str = "chat";

/// Rolling window for the per-user message quota.
pub const RATE_LIMIT_WINDOW_HOURS: i64 = 24;

// ── Model factory seam ───────────────────────────────────────────────────────

/// Construction point for per-request model handles. The default
/// implementation defers to the provider clients; tests substitute
/// scripted models.
pub trait ModelFactory: Send + Sync {
    fn create(
        &self,
        descriptor: &ModelDescriptor,
        api_key: &str,
    ) -> tandem_providers::Result<Box<dyn LanguageModel>>;
}

pub struct ProviderFactory;

impl ModelFactory for ProviderFactory {
    fn create(
        &self,
        descriptor: &ModelDescriptor,
        api_key: &str,
    ) -> tandem_providers::Result<Box<dyn LanguageModel>> {
        create_model(descriptor.provider, api_key, &descriptor.concrete_model_id)
    }
}

// ── Service ──────────────────────────────────────────────────────────────────

/// Orchestrates one chat turn end to end. Cheap to clone; per-request
/// state lives on the stream it returns.
#[derive(Clone)]
pub struct ChatService {
    storage: Storage,
    registry: Arc<ModelRegistry>,
    factory: Arc<dyn ModelFactory>,
    bridge: Option<Arc<dyn BridgeLoader>>,
    /// User messages allowed per rolling window; `<= 0` means unlimited.
    message_limit: i64,
}

impl ChatService {
    pub fn new(storage: Storage, registry: Arc<ModelRegistry>) -> Self {
        Self {
            storage,
            registry,
            factory: Arc::new(ProviderFactory),
            bridge: None,
            message_limit: 0,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeLoader>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_message_limit(mut self, limit: i64) -> Self {
        self.message_limit = limit;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn ModelFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Runs the pre-stream pipeline and, on success, returns the event
    /// stream for the turn. Every rejection here happens before any
    /// model traffic; the incoming user message is already persisted by
    /// the time this returns, so it survives a failed model call.
    pub async fn stream_chat(
        &self,
        user_id: &str,
        hints: RequestHints,
        request: ChatRequest,
    ) -> Result<impl Stream<Item = StreamEvent> + Send + 'static> {
        let text = request.message.text();
        if request.message.parts.is_empty() || text.trim().is_empty() {
            return Err(ChatError::BadRequest(
                "message must contain at least one non-empty text part".into(),
            ));
        }

        let descriptor = self
            .registry
            .resolve(&request.selected_model_id)
            .await
            .map_err(|err| match err {
                ResolveError::NotFound(id) => ChatError::ModelNotFound(id),
                ResolveError::Disabled(id) => ChatError::ModelDisabled(id),
            })?;

        // Quota check happens before any write.
        if self.message_limit > 0 {
            let since = Utc::now() - Duration::hours(RATE_LIMIT_WINDOW_HOURS);
            let sent = self
                .storage
                .count_recent_user_messages(user_id, since)
                .await?;
            if sent >= self.message_limit {
                return Err(ChatError::RateLimited);
            }
        }

        if let Some(existing) = self.storage.get_conversation(request.id).await?
            && existing.owner_id != user_id
        {
            return Err(ChatError::Forbidden);
        }

        let check = validate_credential(descriptor.provider, &request.api_key);
        if !check.is_valid {
            return Err(ChatError::InvalidCredential(
                check
                    .error_message
                    .unwrap_or_else(|| "invalid API key".into()),
            ));
        }

        let agent = match self.storage.get_agent_config(DEFAULT_AGENT_ID).await? {
            Some(agent) if agent.status == AgentStatus::ComingSoon => {
                return Err(ChatError::BadRequest(format!(
                    "agent '{}' is not yet available",
                    agent.id
                )));
            },
            Some(agent) => agent,
            None => AgentDescriptor::unrestricted(DEFAULT_AGENT_ID),
        };

        let preferences = self.storage.get_preferences(user_id).await?;
        let tool_configs = self.storage.list_tool_configs().await?;

        // History is loaded before the new user message is saved so the
        // replay and the inbound message never duplicate.
        let history = self.storage.list_messages(request.id).await?;

        self.storage
            .ensure_conversation(
                request.id,
                user_id,
                &title::derive_title(&text),
                request.visibility,
            )
            .await?;

        let base = base_tools(Arc::new(self.storage.clone()), user_id, &tool_configs);
        let bridge = match (&self.bridge, &request.github_token) {
            (Some(loader), Some(token)) => Some((loader.as_ref(), token.as_str())),
            _ => None,
        };
        let toolset = assemble(&agent, &descriptor, &tool_configs, base, bridge).await;

        let system = prompt::compose(
            &agent,
            &descriptor,
            &hints,
            &tool_configs,
            &toolset.active,
            preferences.thinking_enabled,
        );

        let user_message = ChatMessage {
            id: request.message.id,
            conversation_id: request.id,
            role: Role::User,
            parts: request.message.parts.clone(),
            attachments: request.message.attachments.clone(),
            created_at: Utc::now(),
        };
        self.storage.save_message(&user_message).await?;
        self.storage
            .record_stream(Uuid::new_v4(), request.id)
            .await?;

        let model = self
            .factory
            .create(&descriptor, &request.api_key)
            .map_err(|err| ChatError::InvalidCredential(err.to_string()))?;

        let mut turn = TurnRequest::new(system);
        turn.messages = replay_history(&history);
        turn.messages.push(TurnMessage::user_text(text));
        turn.tools = toolset.tool_specs();
        turn.native_tools = toolset.native_wire();
        turn.options = build_provider_options(&descriptor, preferences.thinking_enabled);

        debug!(
            model = %descriptor.id,
            tools = toolset.active.len(),
            conversation = %request.id,
            "starting chat turn"
        );

        Ok(run_turn(
            self.storage.clone(),
            descriptor,
            request.id,
            user_id.to_string(),
            model,
            turn,
            toolset,
        ))
    }
}

// ── Turn state and finalize guard ────────────────────────────────────────────

/// Output accumulated while streaming, shared with the finalize guard so
/// partial output persists even when the client disconnects mid-stream.
#[derive(Default)]
struct TurnState {
    assistant_parts: Vec<MessagePart>,
    usage: Usage,
    tools_used: Vec<String>,
}

impl TurnState {
    fn append_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.assistant_parts.last_mut() {
            text.push_str(delta);
        } else {
            self.assistant_parts.push(MessagePart::Text {
                text: delta.to_string(),
            });
        }
    }
}

struct FinalizeGuard {
    storage: Storage,
    descriptor: ModelDescriptor,
    conversation_id: Uuid,
    owner_id: String,
    state: Arc<Mutex<TurnState>>,
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        let outcome = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            sink::TurnOutcome {
                conversation_id: self.conversation_id,
                owner_id: std::mem::take(&mut self.owner_id),
                assistant_parts: std::mem::take(&mut state.assistant_parts),
                usage: state.usage,
                tools_used: std::mem::take(&mut state.tools_used),
            }
        };
        // Nothing was generated; skip the ledger entirely.
        if outcome.assistant_parts.is_empty()
            && outcome.usage.total_tokens == 0
            && outcome.tools_used.is_empty()
        {
            return;
        }
        let storage = self.storage.clone();
        let descriptor = self.descriptor.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                sink::finalize_turn(&storage, &descriptor, outcome).await;
            });
        } else {
            warn!("no runtime at stream teardown, dropping turn outcome");
        }
    }
}

// ── The agentic loop ─────────────────────────────────────────────────────────

fn upstream_error_shape(err: &tandem_providers::Error) -> ErrorShape {
    if err.is_billing_required() {
        ErrorShape::new(
            error_codes::BILLING_REQUIRED,
            "the provider account requires an active billing method",
        )
    } else {
        ErrorShape::new(error_codes::UPSTREAM_ERROR, err.to_string())
    }
}

fn output_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drives up to [`MAX_STEPS_PER_TURN`] model invocations, executing local
/// tools between steps. Events are yielded in generation order; the shared
/// [`TurnState`] mirrors everything the client has seen.
fn run_turn(
    storage: Storage,
    descriptor: ModelDescriptor,
    conversation_id: Uuid,
    owner_id: String,
    model: Box<dyn LanguageModel>,
    mut turn: TurnRequest,
    toolset: ActiveToolSet,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let state = Arc::new(Mutex::new(TurnState::default()));
    let guard = FinalizeGuard {
        storage,
        descriptor,
        conversation_id,
        owner_id,
        state: Arc::clone(&state),
    };

    stream! {
        let _guard = guard;
        let mut total = Usage::default();
        let mut errored = false;

        'steps: for _ in 0..MAX_STEPS_PER_TURN {
            let mut events = match model.stream_turn(turn.clone()).await {
                Ok(events) => events,
                Err(err) => {
                    warn!(%err, "model invocation failed");
                    yield StreamEvent::Error { error: upstream_error_shape(&err) };
                    errored = true;
                    break 'steps;
                },
            };

            let mut step_text = String::new();
            let mut step_calls: Vec<(String, String, Value)> = Vec::new();

            while let Some(event) = events.next().await {
                match event {
                    Ok(ProviderEvent::TextDelta(delta)) => {
                        step_text.push_str(&delta);
                        state
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .append_text(&delta);
                        yield StreamEvent::TextDelta { delta };
                    },
                    Ok(ProviderEvent::ToolCall { id, name, arguments }) => {
                        step_calls.push((id, name, arguments));
                    },
                    Ok(ProviderEvent::Usage(usage)) => {
                        total = Usage::new(
                            total.input_tokens + usage.input_tokens,
                            total.output_tokens + usage.output_tokens,
                        );
                        state.lock().unwrap_or_else(|e| e.into_inner()).usage = total;
                    },
                    Ok(ProviderEvent::Done) => break,
                    Err(err) => {
                        warn!(%err, "stream failed mid-turn");
                        yield StreamEvent::Error { error: upstream_error_shape(&err) };
                        errored = true;
                        break;
                    },
                }
            }

            if errored || step_calls.is_empty() {
                break 'steps;
            }

            let mut assistant_content: Vec<TurnContent> = Vec::new();
            if !step_text.is_empty() {
                assistant_content.push(TurnContent::Text(step_text));
            }
            let mut results: Vec<TurnContent> = Vec::new();

            for (id, name, arguments) in step_calls {
                yield StreamEvent::ToolCall {
                    tool_name: name.clone(),
                    arguments: arguments.clone(),
                };

                let output = match toolset.local(&name) {
                    Some(tool) => match tool.execute(arguments.clone()).await {
                        Ok(value) => output_string(&value),
                        Err(err) => {
                            warn!(tool = %name, %err, "tool execution failed");
                            serde_json::json!({ "error": err.to_string() }).to_string()
                        },
                    },
                    None => serde_json::json!({ "error": "unknown tool" }).to_string(),
                };

                yield StreamEvent::ToolResult {
                    tool_name: name.clone(),
                    output: output.clone(),
                };

                {
                    let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
                    s.assistant_parts.push(MessagePart::ToolCall {
                        tool_name: name.clone(),
                        arguments: arguments.clone(),
                    });
                    s.assistant_parts.push(MessagePart::ToolResult {
                        tool_name: name.clone(),
                        output: output.clone(),
                    });
                    if !s.tools_used.contains(&name) {
                        s.tools_used.push(name.clone());
                    }
                }

                assistant_content.push(TurnContent::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments,
                });
                results.push(TurnContent::ToolResult { id, name, output });
            }

            turn.messages.push(TurnMessage {
                role: TurnRole::Assistant,
                content: assistant_content,
            });
            turn.messages.push(TurnMessage {
                role: TurnRole::User,
                content: results,
            });
        }

        if !errored {
            yield StreamEvent::DataUsage { usage: total };
            yield StreamEvent::Finish;
        }
    }
}

// ── History replay ───────────────────────────────────────────────────────────

/// Converts persisted messages back into the transcript shape providers
/// expect. Stored parts carry no call ids, so ids are synthesized and
/// paired in order within each assistant message.
fn replay_history(history: &[ChatMessage]) -> Vec<TurnMessage> {
    let mut messages = Vec::new();
    let mut call_counter = 0usize;

    for message in history {
        match message.role {
            Role::System => {},
            Role::User => {
                let text = message
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        MessagePart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if !text.is_empty() {
                    messages.push(TurnMessage::user_text(text));
                }
            },
            Role::Assistant => {
                let mut content: Vec<TurnContent> = Vec::new();
                let mut results: Vec<TurnContent> = Vec::new();
                let mut pending_ids: Vec<String> = Vec::new();

                for part in &message.parts {
                    match part {
                        MessagePart::Text { text } => {
                            content.push(TurnContent::Text(text.clone()));
                        },
                        MessagePart::ToolCall { tool_name, arguments } => {
                            call_counter += 1;
                            let id = format!("call_{call_counter}");
                            pending_ids.push(id.clone());
                            content.push(TurnContent::ToolCall {
                                id,
                                name: tool_name.clone(),
                                arguments: arguments.clone(),
                            });
                        },
                        MessagePart::ToolResult { tool_name, output } => {
                            let id = if pending_ids.is_empty() {
                                call_counter += 1;
                                format!("call_{call_counter}")
                            } else {
                                pending_ids.remove(0)
                            };
                            results.push(TurnContent::ToolResult {
                                id,
                                name: tool_name.clone(),
                                output: output.clone(),
                            });
                        },
                    }
                }

                if !content.is_empty() {
                    messages.push(TurnMessage {
                        role: TurnRole::Assistant,
                        content,
                    });
                }
                if !results.is_empty() {
                    messages.push(TurnMessage {
                        role: TurnRole::User,
                        content: results,
                    });
                }
            },
        }
    }

    messages
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        std::{collections::VecDeque, time::Duration as StdDuration},
        tandem_protocol::IncomingMessage,
        tandem_providers::EventStream,
        tokio::time::sleep,
    };

    // ── Scripted model ───────────────────────────────────────────────────────

    /// Plays back a programmed sequence of steps; each step is the event
    /// list one `stream_turn` call yields.
    struct ScriptedModel {
        steps: Mutex<VecDeque<Vec<tandem_providers::Result<ProviderEvent>>>>,
    }

    impl ScriptedModel {
        fn new(steps: Vec<Vec<tandem_providers::Result<ProviderEvent>>>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LanguageModel for ScriptedModel {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn stream_turn(&self, _request: TurnRequest) -> tandem_providers::Result<EventStream> {
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| vec![Ok(ProviderEvent::Done)]);
            Ok(futures::stream::iter(step).boxed())
        }
    }

    struct ScriptedFactory {
        steps: Mutex<Option<Vec<Vec<tandem_providers::Result<ProviderEvent>>>>>,
    }

    impl ScriptedFactory {
        fn new(steps: Vec<Vec<tandem_providers::Result<ProviderEvent>>>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(Some(steps)),
            })
        }
    }

    impl ModelFactory for ScriptedFactory {
        fn create(
            &self,
            _descriptor: &ModelDescriptor,
            _api_key: &str,
        ) -> tandem_providers::Result<Box<dyn LanguageModel>> {
            let steps = self.steps.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(ScriptedModel::new(steps)))
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    async fn service_with(
        steps: Vec<Vec<tandem_providers::Result<ProviderEvent>>>,
    ) -> ChatService {
        let storage = Storage::connect(":memory:").await.unwrap();
        let registry = Arc::new(ModelRegistry::static_only());
        ChatService::new(storage, registry).with_factory(ScriptedFactory::new(steps))
    }

    fn chat_request(conversation_id: Uuid, text: &str) -> ChatRequest {
        ChatRequest {
            id: conversation_id,
            message: IncomingMessage {
                id: Uuid::new_v4(),
                parts: vec![MessagePart::Text { text: text.into() }],
                attachments: vec![],
            },
            selected_model_id: "gpt-4o".into(),
            visibility: Default::default(),
            api_key: "sk-test-key".into(),
            github_token: None,
        }
    }

    async fn collect(
        stream: impl Stream<Item = StreamEvent> + Send + 'static,
    ) -> Vec<StreamEvent> {
        let events: Vec<_> = stream.collect().await;
        events
    }

    /// Finalize runs on a spawned task after the stream drops; poll until
    /// the assistant message lands or the deadline passes.
    async fn wait_for_messages(
        storage: &Storage,
        conversation_id: Uuid,
        expected: usize,
    ) -> Vec<ChatMessage> {
        for _ in 0..100 {
            let messages = storage.list_messages(conversation_id).await.unwrap();
            if messages.len() >= expected {
                return messages;
            }
            sleep(StdDuration::from_millis(10)).await;
        }
        storage.list_messages(conversation_id).await.unwrap()
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn plain_text_turn_streams_and_persists() {
        let service = service_with(vec![vec![
            Ok(ProviderEvent::TextDelta("Hello".into())),
            Ok(ProviderEvent::TextDelta(" there".into())),
            Ok(ProviderEvent::Usage(Usage::new(12, 4))),
            Ok(ProviderEvent::Done),
        ]])
        .await;

        let conversation_id = Uuid::new_v4();
        let stream = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(conversation_id, "hi"),
            )
            .await
            .unwrap();
        let events = collect(stream).await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { delta: "Hello".into() },
                StreamEvent::TextDelta { delta: " there".into() },
                StreamEvent::DataUsage { usage: Usage::new(12, 4) },
                StreamEvent::Finish,
            ]
        );

        // User message plus finalized assistant message.
        let messages = wait_for_messages(service.storage(), conversation_id, 2).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(
            messages[1].parts,
            vec![MessagePart::Text { text: "Hello there".into() }]
        );

        let totals = service
            .storage()
            .usage_totals("user-1", None)
            .await
            .unwrap();
        assert_eq!(totals.total_tokens, 16);
    }

    #[tokio::test]
    async fn tool_call_step_executes_and_feeds_back() {
        let service = service_with(vec![
            vec![
                Ok(ProviderEvent::ToolCall {
                    id: "toolu_1".into(),
                    name: "createDocument".into(),
                    arguments: serde_json::json!({"title": "Notes", "kind": "text"}),
                }),
                Ok(ProviderEvent::Usage(Usage::new(20, 8))),
                Ok(ProviderEvent::Done),
            ],
            vec![
                Ok(ProviderEvent::TextDelta("Created it.".into())),
                Ok(ProviderEvent::Usage(Usage::new(30, 5))),
                Ok(ProviderEvent::Done),
            ],
        ])
        .await;

        let conversation_id = Uuid::new_v4();
        let stream = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(conversation_id, "make a doc"),
            )
            .await
            .unwrap();
        let events = collect(stream).await;

        assert!(matches!(
            &events[0],
            StreamEvent::ToolCall { tool_name, .. } if tool_name == "createDocument"
        ));
        assert!(matches!(
            &events[1],
            StreamEvent::ToolResult { tool_name, output }
                if tool_name == "createDocument" && output.contains("visible to the user")
        ));
        assert_eq!(events[2], StreamEvent::TextDelta { delta: "Created it.".into() });
        // Usage sums across both steps.
        assert_eq!(
            events[3],
            StreamEvent::DataUsage { usage: Usage::new(50, 13) }
        );
        assert_eq!(events[4], StreamEvent::Finish);

        let messages = wait_for_messages(service.storage(), conversation_id, 2).await;
        let assistant = &messages[1];
        assert!(assistant.parts.iter().any(|p| matches!(
            p,
            MessagePart::ToolCall { tool_name, .. } if tool_name == "createDocument"
        )));

        let by_tool = service.storage().usage_by_tool("user-1").await.unwrap();
        assert_eq!(by_tool[0].key, "createDocument");
    }

    #[tokio::test]
    async fn step_cap_stops_runaway_loops() {
        let step = || {
            vec![
                Ok(ProviderEvent::ToolCall {
                    id: "toolu_1".into(),
                    name: "createDocument".into(),
                    arguments: serde_json::json!({"title": "again", "kind": "text"}),
                }),
                Ok(ProviderEvent::Done),
            ]
        };
        let service = service_with((0..10).map(|_| step()).collect()).await;

        let stream = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(Uuid::new_v4(), "loop forever"),
            )
            .await
            .unwrap();
        let events = collect(stream).await;

        let calls = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolCall { .. }))
            .count();
        assert_eq!(calls, MAX_STEPS_PER_TURN);
        assert_eq!(events.last(), Some(&StreamEvent::Finish));
    }

    #[tokio::test]
    async fn billing_failure_surfaces_as_in_stream_error() {
        let service = service_with(vec![vec![Err(tandem_providers::Error::Upstream {
            provider: "anthropic",
            status: 402,
            body: "please add a credit card to continue".into(),
        })]])
        .await;

        let conversation_id = Uuid::new_v4();
        let stream = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(conversation_id, "hi"),
            )
            .await
            .unwrap();
        let events = collect(stream).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { error } => {
                assert_eq!(error.code, error_codes::BILLING_REQUIRED);
            },
            other => panic!("expected error frame, got {other:?}"),
        }

        // The user message was persisted before the model call.
        let messages = service
            .storage()
            .list_messages(conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn unknown_model_rejects_before_any_write() {
        let service = service_with(vec![]).await;
        let conversation_id = Uuid::new_v4();
        let mut request = chat_request(conversation_id, "hi");
        request.selected_model_id = "made-up-model".into();

        let err = service
            .stream_chat("user-1", RequestHints::default(), request)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::ModelNotFound(_)));
        assert!(
            service
                .storage()
                .get_conversation(conversation_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn foreign_conversation_is_forbidden() {
        let service = service_with(vec![]).await;
        let conversation_id = Uuid::new_v4();
        service
            .storage()
            .ensure_conversation(conversation_id, "someone-else", "t", Default::default())
            .await
            .unwrap();

        let err = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(conversation_id, "hi"),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Forbidden));
    }

    #[tokio::test]
    async fn message_quota_rejects_before_side_effects() {
        let steps = vec![vec![
            Ok(ProviderEvent::TextDelta("ok".into())),
            Ok(ProviderEvent::Done),
        ]];
        let service = service_with(steps).await.with_message_limit(1);

        let first = Uuid::new_v4();
        let stream = service
            .stream_chat("user-1", RequestHints::default(), chat_request(first, "one"))
            .await
            .unwrap();
        collect(stream).await;

        let second = Uuid::new_v4();
        let err = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(second, "two"),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::RateLimited));
        assert!(
            service
                .storage()
                .get_conversation(second)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_credential_rejects() {
        let service = service_with(vec![]).await;
        let mut request = chat_request(Uuid::new_v4(), "hi");
        request.selected_model_id = "claude-3-5-sonnet-20241022".into();
        request.api_key = "sk-not-anthropic".into();

        let err = service
            .stream_chat("user-1", RequestHints::default(), request)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let service = service_with(vec![]).await;
        let mut request = chat_request(Uuid::new_v4(), "   ");
        request.message.parts = vec![MessagePart::Text { text: "   ".into() }];

        let err = service
            .stream_chat("user-1", RequestHints::default(), request)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::BadRequest(_)));
    }

    #[tokio::test]
    async fn disconnect_mid_stream_still_finalizes_partial_output() {
        let service = service_with(vec![vec![
            Ok(ProviderEvent::TextDelta("partial".into())),
            Ok(ProviderEvent::TextDelta(" answer".into())),
            Ok(ProviderEvent::Usage(Usage::new(8, 2))),
            Ok(ProviderEvent::Done),
        ]])
        .await;

        let conversation_id = Uuid::new_v4();
        let stream = service
            .stream_chat(
                "user-1",
                RequestHints::default(),
                chat_request(conversation_id, "hi"),
            )
            .await
            .unwrap();

        // Take one frame, then drop the stream like a closed connection.
        // Box::pin keeps ownership so the drop really tears the stream down.
        let mut stream = Box::pin(stream);
        let first = stream.next().await.unwrap();
        assert_eq!(first, StreamEvent::TextDelta { delta: "partial".into() });
        drop(stream);

        let messages = wait_for_messages(service.storage(), conversation_id, 2).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1].parts,
            vec![MessagePart::Text { text: "partial".into() }]
        );
    }

    #[test]
    fn replay_pairs_tool_calls_with_results() {
        let conversation_id = Uuid::new_v4();
        let history = vec![
            ChatMessage {
                id: Uuid::new_v4(),
                conversation_id,
                role: Role::User,
                parts: vec![MessagePart::Text { text: "weather?".into() }],
                attachments: vec![],
                created_at: Utc::now(),
            },
            ChatMessage {
                id: Uuid::new_v4(),
                conversation_id,
                role: Role::Assistant,
                parts: vec![
                    MessagePart::ToolCall {
                        tool_name: "getWeather".into(),
                        arguments: serde_json::json!({"latitude": 1.0, "longitude": 2.0}),
                    },
                    MessagePart::ToolResult {
                        tool_name: "getWeather".into(),
                        output: "{\"temp\": 20}".into(),
                    },
                    MessagePart::Text { text: "It's 20C.".into() },
                ],
                attachments: vec![],
                created_at: Utc::now(),
            },
        ];

        let messages = replay_history(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, TurnRole::User);
        assert_eq!(messages[1].role, TurnRole::Assistant);
        let (call_id, result_id) = match (&messages[1].content[0], &messages[2].content[0]) {
            (
                TurnContent::ToolCall { id: call, .. },
                TurnContent::ToolResult { id: result, .. },
            ) => (call.clone(), result.clone()),
            other => panic!("unexpected replay shape {other:?}"),
        };
        assert_eq!(call_id, result_id);
    }

    #[test]
    fn upstream_errors_map_to_codes() {
        let billing = tandem_providers::Error::Upstream {
            provider: "openai",
            status: 402,
            body: "billing hard limit reached".into(),
        };
        assert_eq!(
            upstream_error_shape(&billing).code,
            error_codes::BILLING_REQUIRED
        );

        let overloaded = tandem_providers::Error::Upstream {
            provider: "openai",
            status: 529,
            body: "overloaded".into(),
        };
        assert_eq!(
            upstream_error_shape(&overloaded).code,
            error_codes::UPSTREAM_ERROR
        );
    }
}
