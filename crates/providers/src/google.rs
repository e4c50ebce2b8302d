//! Streaming client for the Google Generative Language API.
//!
//! Uses `streamGenerateContent?alt=sse` so the response shares the SSE
//! framing of the other providers.

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

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GoogleModel {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
}

impl GoogleModel {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model_id: model_id.into(),
        }
    }

    fn url(&self) -> String {
        format!("{API_BASE}/{}:streamGenerateContent?alt=sse", self.model_id)
    }

    fn request_body(&self, request: &TurnRequest) -> Value {
        let contents: Vec<Value> = request.messages.iter().map(render_message).collect();

        let mut body = json!({
            "systemInstruction": {"parts": [{"text": request.system}]},
            "contents": contents,
            "generationConfig": {"maxOutputTokens": request.max_output_tokens},
        });

        let mut tools: Vec<Value> = Vec::new();
        if !request.tools.is_empty() {
            tools.push(json!({
                "functionDeclarations": request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        })
                    })
                    .collect::<Vec<_>>(),
            }));
        }
        tools.extend(request.native_tools.iter().cloned());
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        // Options land inside generationConfig (thinkingConfig and friends).
        if let Some(Value::Object(options)) = &request.options
            && let Some(config) = body["generationConfig"].as_object_mut()
        {
            for (k, v) in options {
                config.insert(k.clone(), v.clone());
            }
        }

        body
    }
}

fn render_message(message: &crate::model::TurnMessage) -> Value {
    let role = match message.role {
        TurnRole::User => "user",
        TurnRole::Assistant => "model",
    };
    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|part| match part {
            TurnContent::Text(text) => json!({"text": text}),
            TurnContent::ToolCall { name, arguments, .. } => json!({
                "functionCall": {"name": name, "args": arguments},
            }),
            TurnContent::ToolResult { name, output, .. } => json!({
                "functionResponse": {
                    "name": name,
                    "response": {"output": output},
                },
            }),
        })
        .collect();
    json!({"role": role, "parts": parts})
}

#[async_trait::async_trait]
impl LanguageModel for GoogleModel {
    fn provider(&self) -> &'static str {
        "google"
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<EventStream> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                provider: "google",
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut decoder = SseDecoder::new();
            // Google repeats cumulative usage on every chunk.
            let mut usage = Usage::default();
            let mut call_counter = 0u32;

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for payload in decoder.feed(&chunk) {
                    let event: Value = serde_json::from_str(&payload)?;

                    if let Some(meta) = event.get("usageMetadata") {
                        usage = Usage::new(
                            meta["promptTokenCount"].as_u64().unwrap_or_default(),
                            meta["candidatesTokenCount"].as_u64().unwrap_or_default(),
                        );
                    }

                    let parts = event["candidates"][0]["content"]["parts"]
                        .as_array()
                        .cloned()
                        .unwrap_or_default();
                    for part in parts {
                        // Thought summaries are flagged; skip them so only
                        // answer text reaches the turn transcript.
                        if part["thought"].as_bool().unwrap_or(false) {
                            continue;
                        }
                        if let Some(text) = part["text"].as_str() {
                            yield ProviderEvent::TextDelta(text.to_string());
                        }
                        if let Some(call) = part.get("functionCall") {
                            call_counter += 1;
                            yield ProviderEvent::ToolCall {
                                // The API carries no call id; synthesize one
                                // stable within the stream.
                                id: format!("call_{call_counter}"),
                                name: call["name"].as_str().unwrap_or_default().to_string(),
                                arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::TurnMessage;

    #[test]
    fn assistant_maps_to_model_role() {
        let rendered = render_message(&TurnMessage::assistant_text("ok"));
        assert_eq!(rendered["role"], "model");
        assert_eq!(rendered["parts"][0]["text"], "ok");
    }

    #[test]
    fn options_merge_into_generation_config() {
        let model = GoogleModel::new(reqwest::Client::new(), "k", "gemini-2.0-flash");
        let mut request = TurnRequest::new("sys");
        request.messages.push(TurnMessage::user_text("hi"));
        request.options = Some(json!({
            "thinkingConfig": {"thinkingBudget": 8192, "includeThoughts": true},
        }));
        let body = model.request_body(&request);
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            8192
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn url_targets_sse_endpoint() {
        let model = GoogleModel::new(reqwest::Client::new(), "k", "gemini-2.0-flash");
        assert!(model.url().ends_with("gemini-2.0-flash:streamGenerateContent?alt=sse"));
    }
}
