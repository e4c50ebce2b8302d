//! Stream checkpoint rows, written once per chat request before the model
//! call.

use {chrono::Utc, uuid::Uuid};

use crate::{Result, Storage};

impl Storage {
    pub async fn record_stream(&self, stream_id: Uuid, conversation_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO streams (id, conversation_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(stream_id)
        .bind(conversation_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_streams(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM streams WHERE conversation_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
