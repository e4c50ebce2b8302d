//! Persistence and accounting after a stream ends.
//!
//! Everything here runs after the response contract with the client is
//! fulfilled, so failures are logged and swallowed rather than surfaced.

use {
    chrono::Utc,
    tandem_models::{ModelDescriptor, Pricing},
    tandem_protocol::{ChatMessage, MessagePart, Role, Usage},
    tandem_storage::{Storage, UsageRecord},
    tracing::warn,
    uuid::Uuid,
};

/// Dollar cost for one invocation; zero when no pricing is configured.
pub fn estimate_cost(usage: Usage, pricing: Option<&Pricing>) -> f64 {
    pricing.map_or(0.0, |p| {
        usage.input_tokens as f64 / 1e6 * p.input_per_million
            + usage.output_tokens as f64 / 1e6 * p.output_per_million
    })
}

/// Outcome of one streamed turn, handed to the sink.
pub struct TurnOutcome {
    pub conversation_id: Uuid,
    pub owner_id: String,
    pub assistant_parts: Vec<MessagePart>,
    pub usage: Usage,
    pub tools_used: Vec<String>,
}

impl TurnOutcome {
    pub fn tool_call_count(&self) -> u32 {
        self.assistant_parts
            .iter()
            .filter(|part| matches!(part, MessagePart::ToolCall { .. }))
            .count() as u32
    }
}

/// Persists the assistant message, the usage ledger entry, and the
/// conversation's last-usage snapshot. Best-effort throughout.
pub async fn finalize_turn(storage: &Storage, descriptor: &ModelDescriptor, outcome: TurnOutcome) {
    let message_id = if outcome.assistant_parts.is_empty() {
        None
    } else {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            conversation_id: outcome.conversation_id,
            role: Role::Assistant,
            parts: outcome.assistant_parts.clone(),
            attachments: vec![],
            created_at: Utc::now(),
        };
        match storage.save_messages(std::slice::from_ref(&message)).await {
            Ok(()) => Some(message.id),
            Err(err) => {
                warn!(%err, conversation = %outcome.conversation_id,
                    "failed to persist assistant message");
                None
            },
        }
    };

    let tool_call_count = outcome.tool_call_count();
    let record = UsageRecord {
        conversation_id: outcome.conversation_id,
        message_id,
        owner_id: outcome.owner_id.clone(),
        model_id: descriptor.id.clone(),
        provider: descriptor.provider.as_str().to_string(),
        input_tokens: outcome.usage.input_tokens,
        output_tokens: outcome.usage.output_tokens,
        total_tokens: outcome.usage.total_tokens,
        estimated_cost: estimate_cost(outcome.usage, descriptor.pricing.as_ref()),
        tools_used: outcome.tools_used,
        tool_call_count,
    };
    if let Err(err) = storage.record_usage(&record).await {
        warn!(%err, "failed to record usage, continuing");
    }

    let snapshot = serde_json::json!({
        "modelId": record.model_id,
        "inputTokens": record.input_tokens,
        "outputTokens": record.output_tokens,
        "estimatedCost": record.estimated_cost,
    });
    if let Err(err) = storage
        .update_last_usage(outcome.conversation_id, &snapshot)
        .await
    {
        warn!(%err, "failed to update last-usage snapshot");
    }
}
