//! Administrator-managed policy overlay on top of concrete tools.

use serde::{Deserialize, Serialize};

/// Optional prompt documentation for a tool, rendered into the system
/// prompt when the tool is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolPrompts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_guidelines: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
}

impl ToolPrompts {
    /// Joins the populated sub-fields with newlines; `None` when all are
    /// empty so the tool contributes nothing to the prompt.
    pub fn fragment(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.description.as_deref(),
            self.usage_guidelines.as_deref(),
            self.examples.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Policy and documentation overlay for one tool id. A disabled descriptor
/// suppresses the tool even when an agent lists it as enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: String,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_prompts: Option<ToolPrompts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_hour: Option<u32>,
    #[serde(default)]
    pub cost_per_call: f64,
}

impl ToolDescriptor {
    pub fn enabled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_enabled: true,
            tool_prompts: None,
            rate_limit_per_minute: None,
            rate_limit_per_hour: None,
            cost_per_call: 0.0,
        }
    }
}

/// Whether a tool id is permitted by the descriptor set. Tools with no
/// descriptor default to enabled for backward compatibility.
pub fn tool_permitted(descriptors: &[ToolDescriptor], id: &str) -> bool {
    descriptors
        .iter()
        .find(|d| d.id == id)
        .is_none_or(|d| d.is_enabled)
}
