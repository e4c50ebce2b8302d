//! Stdio JSON-RPC client for the GitHub MCP server.
//!
//! Spawns `github-mcp-server stdio` as a subprocess and speaks
//! newline-delimited JSON-RPC 2.0: `initialize` → `tools/list` →
//! `tools/call`. One client owns one subprocess.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    std::{
        process::Stdio,
        sync::atomic::{AtomicBool, AtomicU64, Ordering},
    },
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        process::{Child, ChildStdin, ChildStdout, Command},
        sync::Mutex,
    },
    tracing::{debug, warn},
};

use crate::{Error, Result};

const SERVER_COMMAND: &str = "github-mcp-server";
const TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// A tool as listed by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ForeignTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    tools: Vec<ForeignTool>,
}

#[derive(Debug, Deserialize)]
struct CallContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(default)]
    content: Vec<CallContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

pub struct McpClient {
    process: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    request_id: AtomicU64,
    alive: AtomicBool,
}

impl McpClient {
    /// Spawns the server subprocess with the caller's token in its
    /// environment and completes the initialize handshake.
    pub async fn connect(token: &str) -> Result<Self> {
        let mut process = Command::new(SERVER_COMMAND)
            .arg("stdio")
            .env(TOKEN_ENV, token)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::message("tool server stdin unavailable"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::message("tool server stdout unavailable"))?;

        let client = Self {
            process: Mutex::new(process),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            request_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Whether the subprocess is still usable. Marked dead on transport
    /// failure or when the process has exited.
    pub fn is_alive(&self) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        if let Ok(mut process) = self.process.try_lock()
            && matches!(process.try_wait(), Ok(Some(_)) | Err(_))
        {
            self.alive.store(false, Ordering::Release);
            return false;
        }
        true
    }

    async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "tandem",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        self.request("initialize", Some(params)).await?;
        self.send_line(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {},
        }))
        .await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<ForeignTool>> {
        let result = self.request("tools/list", Some(json!({}))).await?;
        let listed: ToolsListResult = serde_json::from_value(result)?;
        debug!(count = listed.tools.len(), "listed bridge tools");
        Ok(listed.tools)
    }

    /// Calls a tool and normalizes the multi-part result to one display
    /// string.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .request("tools/call", Some(json!({"name": name, "arguments": arguments})))
            .await?;
        let call: CallResult = serde_json::from_value(result)?;

        let text = call
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        if call.is_error {
            return Err(Error::message(if text.is_empty() {
                format!("tool {name} failed")
            } else {
                text
            }));
        }
        Ok(text)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };
        self.send_line(&serde_json::to_value(&request)?).await?;

        let response = self.read_response(id).await.inspect_err(|_| {
            self.alive.store(false, Ordering::Release);
        })?;
        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| Error::message("tool server returned an empty result"))
    }

    async fn send_line(&self, value: &Value) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let line = serde_json::to_string(value)?;
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        if written.is_err() {
            self.alive.store(false, Ordering::Release);
        }
        Ok(written?)
    }

    async fn read_response(&self, id: u64) -> Result<RpcResponse> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();
        loop {
            line.clear();
            let read = stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(Error::message("tool server closed its stdout"));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RpcResponse>(trimmed) {
                Ok(response) if response.id == Some(id) => return Ok(response),
                // Notifications and responses to other ids are skipped.
                Ok(_) => {},
                Err(err) => warn!(%err, "ignoring non-JSON-RPC line from tool server"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rpc_request_serializes_without_empty_params() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "tools/list".into(),
            params: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""id":7"#));
        assert!(!json.contains("params"));
    }

    #[test]
    fn foreign_tool_parses_input_schema_alias() {
        let tool: ForeignTool = serde_json::from_value(json!({
            "name": "list_issues",
            "description": "List issues in a repository",
            "inputSchema": {"type": "object", "properties": {}}
        }))
        .unwrap();
        assert_eq!(tool.name, "list_issues");
        assert!(tool.input_schema.is_some());
    }

    #[test]
    fn error_result_surfaces_joined_text() {
        let call: CallResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "not found"}],
            "isError": true
        }))
        .unwrap();
        assert!(call.is_error);
        assert_eq!(call.content[0].text.as_deref(), Some("not found"));
    }
}
