//! Streaming client for the OpenAI Chat Completions API.

use {
    async_stream::try_stream,
    futures::StreamExt,
    serde_json::{Value, json},
    tandem_protocol::Usage,
};

use crate::{
    Error, Result,
    model::{EventStream, LanguageModel, ProviderEvent, TurnContent, TurnRequest, TurnRole},
    sse::SseDecoder,
};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiModel {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
}

impl OpenAiModel {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model_id: model_id.into(),
        }
    }

    fn request_body(&self, request: &TurnRequest) -> Value {
        let mut messages = vec![json!({"role": "system", "content": request.system})];
        for message in &request.messages {
            render_message(message, &mut messages);
        }

        let mut body = json!({
            "model": self.model_id,
            "messages": messages,
            "stream": true,
            // Usage arrives in a final chunk with an empty choices array.
            "stream_options": {"include_usage": true},
        });

        let mut tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();
        tools.extend(request.native_tools.iter().cloned());
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        if let Some(Value::Object(options)) = &request.options
            && let Some(obj) = body.as_object_mut()
        {
            for (k, v) in options {
                obj.insert(k.clone(), v.clone());
            }
        }

        body
    }
}

/// Chat Completions has no content-part encoding for tool traffic, so a
/// single turn message can fan out into several wire messages.
fn render_message(message: &crate::model::TurnMessage, out: &mut Vec<Value>) {
    let role = match message.role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in &message.content {
        match part {
            TurnContent::Text(t) => text.push_str(t),
            TurnContent::ToolCall { id, name, arguments } => tool_calls.push(json!({
                "id": id,
                "type": "function",
                "function": {
                    "name": name,
                    "arguments": arguments.to_string(),
                },
            })),
            TurnContent::ToolResult { id, output, .. } => out.push(json!({
                "role": "tool",
                "tool_call_id": id,
                "content": output,
            })),
        }
    }

    if !text.is_empty() || !tool_calls.is_empty() {
        let mut rendered = json!({"role": role, "content": text});
        if !tool_calls.is_empty() {
            rendered["tool_calls"] = Value::Array(tool_calls);
        }
        out.push(rendered);
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiModel {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<EventStream> {
        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                provider: "openai",
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut decoder = SseDecoder::new();
            // Tool calls stream as indexed fragments within one choice.
            let mut pending: Vec<PendingToolCall> = Vec::new();
            let mut usage = Usage::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for payload in decoder.feed(&chunk) {
                    let event: Value = serde_json::from_str(&payload)?;

                    if let Some(u) = event.get("usage").filter(|u| u.is_object()) {
                        usage = Usage::new(
                            u["prompt_tokens"].as_u64().unwrap_or_default(),
                            u["completion_tokens"].as_u64().unwrap_or_default(),
                        );
                    }

                    let Some(choice) = event["choices"].get(0) else {
                        continue;
                    };
                    let delta = &choice["delta"];

                    if let Some(text) = delta["content"].as_str()
                        && !text.is_empty()
                    {
                        yield ProviderEvent::TextDelta(text.to_string());
                    }

                    if let Some(calls) = delta["tool_calls"].as_array() {
                        for fragment in calls {
                            let index = fragment["index"].as_u64().unwrap_or_default() as usize;
                            if pending.len() <= index {
                                pending.resize_with(index + 1, PendingToolCall::default);
                            }
                            let slot = &mut pending[index];
                            if let Some(id) = fragment["id"].as_str() {
                                slot.id.push_str(id);
                            }
                            if let Some(name) = fragment["function"]["name"].as_str() {
                                slot.name.push_str(name);
                            }
                            if let Some(args) = fragment["function"]["arguments"].as_str() {
                                slot.arguments_json.push_str(args);
                            }
                        }
                    }

                    if choice["finish_reason"].as_str().is_some() {
                        for call in pending.drain(..) {
                            let arguments = if call.arguments_json.is_empty() {
                                json!({})
                            } else {
                                serde_json::from_str(&call.arguments_json)?
                            };
                            yield ProviderEvent::ToolCall {
                                id: call.id,
                                name: call.name,
                                arguments,
                            };
                        }
                    }
                }
            }

            yield ProviderEvent::Usage(usage);
            yield ProviderEvent::Done;
        };

        Ok(stream.boxed())
    }
}
