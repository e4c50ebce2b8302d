//! Minimal server-sent-events decoding shared by the provider clients.
//!
//! Only `data:` payloads are surfaced; event names, comments, and retry
//! hints are dropped. The `[DONE]` sentinel used by OpenAI-style streams is
//! filtered here so clients only see JSON payloads.

/// Incremental decoder fed raw response chunks, yielding complete `data:`
/// payloads as they become available.
#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns any complete data payloads.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() && data != "[DONE]" {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}
