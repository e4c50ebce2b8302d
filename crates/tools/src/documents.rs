//! Document tools: `createDocument`, `updateDocument`, `requestSuggestions`.
//!
//! Persistence goes through the [`DocumentStore`] port; actual document
//! content is authored client-side, so the tool results carry the contract
//! the model sees (ids, titles, status messages), not rendered content.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    std::sync::Arc,
    uuid::Uuid,
};

use crate::{
    ChatTool,
    params::{require_str, str_param},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Code,
    Sheet,
}

impl DocumentKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "code" => Some(Self::Code),
            "sheet" => Some(Self::Sheet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Sheet => "sheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub kind: DocumentKind,
    pub content: String,
    pub owner_id: String,
}

/// Storage port for the document tools.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Saves a document revision; revisions share an id and are ordered by
    /// write time.
    async fn save_document(&self, document: &Document) -> anyhow::Result<()>;
    /// Loads the latest revision of a document.
    async fn load_document(&self, id: Uuid) -> anyhow::Result<Option<Document>>;
}

pub struct CreateDocumentTool {
    store: Arc<dyn DocumentStore>,
    owner_id: String,
}

impl CreateDocumentTool {
    pub fn new(store: Arc<dyn DocumentStore>, owner_id: impl Into<String>) -> Self {
        Self {
            store,
            owner_id: owner_id.into(),
        }
    }
}

#[async_trait]
impl ChatTool for CreateDocumentTool {
    fn name(&self) -> &str {
        "createDocument"
    }

    fn description(&self) -> &str {
        "Create a document for writing or content creation activities"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["title", "kind"],
            "properties": {
                "title": { "type": "string" },
                "kind": { "type": "string", "enum": ["text", "code", "sheet"] }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let title = require_str(&params, "title")?;
        let kind = str_param(&params, "kind")
            .and_then(DocumentKind::parse)
            .unwrap_or(DocumentKind::Text);

        let document = Document {
            id: Uuid::new_v4(),
            title: title.to_string(),
            kind,
            content: String::new(),
            owner_id: self.owner_id.clone(),
        };
        self.store.save_document(&document).await?;

        Ok(json!({
            "id": document.id,
            "title": document.title,
            "kind": kind.as_str(),
            "content": "A document was created and is now visible to the user.",
        }))
    }
}

pub struct UpdateDocumentTool {
    store: Arc<dyn DocumentStore>,
}

impl UpdateDocumentTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatTool for UpdateDocumentTool {
    fn name(&self) -> &str {
        "updateDocument"
    }

    fn description(&self) -> &str {
        "Update a document with the given description"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["id", "description"],
            "properties": {
                "id": { "type": "string", "description": "The ID of the document to update" },
                "description": {
                    "type": "string",
                    "description": "The description of changes that need to be made"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let id = require_str(&params, "id")?;
        let description = require_str(&params, "description")?;
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(json!({"error": "Document not found"}));
        };

        let Some(document) = self.store.load_document(id).await? else {
            return Ok(json!({"error": "Document not found"}));
        };
        // New revision under the same id; content evolves client-side.
        self.store.save_document(&document).await?;

        Ok(json!({
            "id": document.id,
            "title": document.title,
            "kind": document.kind.as_str(),
            "description": description,
            "content": "The document has been updated successfully.",
        }))
    }
}

pub struct RequestSuggestionsTool {
    store: Arc<dyn DocumentStore>,
}

impl RequestSuggestionsTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatTool for RequestSuggestionsTool {
    fn name(&self) -> &str {
        "requestSuggestions"
    }

    fn description(&self) -> &str {
        "Request suggestions for a document"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["documentId"],
            "properties": {
                "documentId": {
                    "type": "string",
                    "description": "The ID of the document to request edits"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let id = require_str(&params, "documentId")?;
        let document = match Uuid::parse_str(id) {
            Ok(id) => self.store.load_document(id).await?,
            Err(_) => None,
        };
        let Some(document) = document else {
            return Ok(json!({"error": "Document not found"}));
        };

        Ok(json!({
            "id": document.id,
            "title": document.title,
            "kind": document.kind.as_str(),
            "message": "Suggestions have been added to the document",
        }))
    }
}
