//! Thin streaming client for the Anthropic Messages API.
//!
//! Parses only what the orchestrator needs from the event stream: text
//! deltas, complete tool calls (argument JSON is accumulated across
//! `input_json_delta` events), and token usage. Everything else in the
//! wire format is ignored.

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

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
}

impl AnthropicModel {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model_id: model_id.into(),
        }
    }

    fn request_body(&self, request: &TurnRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(render_message).collect();

        let mut body = json!({
            "model": self.model_id,
            "max_tokens": request.max_output_tokens,
            "system": request.system,
            "messages": messages,
            "stream": true,
        });

        let mut tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
        tools.extend(request.native_tools.iter().cloned());
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        // Provider options (e.g. thinking config) merge at the top level.
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

fn render_message(message: &crate::model::TurnMessage) -> Value {
    let role = match message.role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    };
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|part| match part {
            TurnContent::Text(text) => json!({"type": "text", "text": text}),
            TurnContent::ToolCall { id, name, arguments } => json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": arguments,
            }),
            TurnContent::ToolResult { id, output, .. } => json!({
                "type": "tool_result",
                "tool_use_id": id,
                "content": output,
            }),
        })
        .collect();
    json!({"role": role, "content": content})
}

/// In-flight tool call being assembled from argument deltas.
struct PendingToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

#[async_trait::async_trait]
impl LanguageModel for AnthropicModel {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<EventStream> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                provider: "anthropic",
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut decoder = SseDecoder::new();
            let mut pending: Option<PendingToolCall> = None;
            let mut input_tokens = 0u64;
            let mut output_tokens = 0u64;

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for payload in decoder.feed(&chunk) {
                    let event: Value = serde_json::from_str(&payload)?;
                    match event["type"].as_str().unwrap_or_default() {
                        "message_start" => {
                            input_tokens = event["message"]["usage"]["input_tokens"]
                                .as_u64()
                                .unwrap_or_default();
                        },
                        "content_block_start" => {
                            let block = &event["content_block"];
                            if block["type"] == "tool_use" {
                                pending = Some(PendingToolCall {
                                    id: block["id"].as_str().unwrap_or_default().to_string(),
                                    name: block["name"].as_str().unwrap_or_default().to_string(),
                                    arguments_json: String::new(),
                                });
                            }
                        },
                        "content_block_delta" => {
                            let delta = &event["delta"];
                            match delta["type"].as_str().unwrap_or_default() {
                                "text_delta" => {
                                    if let Some(text) = delta["text"].as_str() {
                                        yield ProviderEvent::TextDelta(text.to_string());
                                    }
                                },
                                "input_json_delta" => {
                                    if let (Some(call), Some(partial)) =
                                        (pending.as_mut(), delta["partial_json"].as_str())
                                    {
                                        call.arguments_json.push_str(partial);
                                    }
                                },
                                _ => {},
                            }
                        },
                        "content_block_stop" => {
                            if let Some(call) = pending.take() {
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
                        },
                        "message_delta" => {
                            if let Some(out) = event["usage"]["output_tokens"].as_u64() {
                                output_tokens = out;
                            }
                        },
                        "error" => {
                            let message = event["error"]["message"]
                                .as_str()
                                .unwrap_or("provider stream error")
                                .to_string();
                            Err(Error::message(message))?;
                        },
                        _ => {},
                    }
                }
            }

            yield ProviderEvent::Usage(Usage::new(input_tokens, output_tokens));
            yield ProviderEvent::Done;
        };

        Ok(stream.boxed())
    }
}
