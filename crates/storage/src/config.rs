//! Dynamic configuration overlays: model, agent, and tool descriptors
//! managed through the admin endpoints. Rows store the serialized
//! descriptor; ids are duplicated into the key column for upserts.

use {
    async_trait::async_trait,
    chrono::Utc,
    serde::{Serialize, de::DeserializeOwned},
    tandem_models::{ModelConfigStore, ModelDescriptor},
    tandem_protocol::AgentDescriptor,
    tandem_tools::ToolDescriptor,
};

use crate::{Result, Storage};

impl Storage {
    async fn list_config<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let rows: Vec<String> =
            sqlx::query_scalar(&format!("SELECT data FROM {table} ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|data| Ok(serde_json::from_str(data)?))
            .collect()
    }

    async fn get_config<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>> {
        let data: Option<String> =
            sqlx::query_scalar(&format!("SELECT data FROM {table} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        data.as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }

    async fn upsert_config<T: Serialize>(&self, table: &str, id: &str, value: &T) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {table} (id, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET data = excluded.data,
                updated_at = excluded.updated_at"
        ))
        .bind(id)
        .bind(serde_json::to_string(value)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_model_configs(&self) -> Result<Vec<ModelDescriptor>> {
        self.list_config("model_config").await
    }

    pub async fn get_model_config(&self, id: &str) -> Result<Option<ModelDescriptor>> {
        self.get_config("model_config", id).await
    }

    pub async fn upsert_model_config(&self, descriptor: &ModelDescriptor) -> Result<()> {
        self.upsert_config("model_config", &descriptor.id, descriptor)
            .await
    }

    pub async fn list_agent_configs(&self) -> Result<Vec<AgentDescriptor>> {
        self.list_config("agent_config").await
    }

    pub async fn get_agent_config(&self, id: &str) -> Result<Option<AgentDescriptor>> {
        self.get_config("agent_config", id).await
    }

    pub async fn upsert_agent_config(&self, descriptor: &AgentDescriptor) -> Result<()> {
        self.upsert_config("agent_config", &descriptor.id, descriptor)
            .await
    }

    pub async fn list_tool_configs(&self) -> Result<Vec<ToolDescriptor>> {
        self.list_config("tool_config").await
    }

    pub async fn get_tool_config(&self, id: &str) -> Result<Option<ToolDescriptor>> {
        self.get_config("tool_config", id).await
    }

    pub async fn upsert_tool_config(&self, descriptor: &ToolDescriptor) -> Result<()> {
        self.upsert_config("tool_config", &descriptor.id, descriptor)
            .await
    }
}

#[async_trait]
impl ModelConfigStore for Storage {
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
        Ok(self.list_model_configs().await?)
    }
}
