//! Conversation rows: ownership, title, visibility, last-usage snapshot.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    sqlx::Row,
    tandem_protocol::Visibility,
    uuid::Uuid,
};

use crate::{Result, Storage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub visibility: Visibility,
    /// Snapshot of the most recent usage event, stored as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_usage: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation> {
    let visibility: String = row.try_get("visibility")?;
    let last_usage: Option<String> = row.try_get("last_usage")?;
    Ok(Conversation {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        visibility: if visibility == "public" {
            Visibility::Public
        } else {
            Visibility::Private
        },
        last_usage: last_usage
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    /// Create-if-absent: returns the existing conversation untouched, or
    /// inserts one with the given title. Two racing calls insert once.
    pub async fn ensure_conversation(
        &self,
        id: Uuid,
        owner_id: &str,
        title: &str,
        visibility: Visibility,
    ) -> Result<Conversation> {
        sqlx::query(
            "INSERT INTO conversations (id, owner_id, title, visibility, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(owner_id)
        .bind(title)
        .bind(match visibility {
            Visibility::Public => "public",
            Visibility::Private => "private",
        })
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_conversation(id)
            .await?
            .ok_or_else(|| crate::Error::message("conversation vanished after ensure"))
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_conversation).transpose()
    }

    /// Deletes a conversation with its messages and stream checkpoints.
    /// Returns the deleted record, or `None` if it did not exist.
    pub async fn delete_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let Some(conversation) = self.get_conversation(id).await? else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM streams WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(conversation))
    }

    pub async fn update_last_usage(&self, id: Uuid, usage: &serde_json::Value) -> Result<()> {
        sqlx::query("UPDATE conversations SET last_usage = ?2 WHERE id = ?1")
            .bind(id)
            .bind(serde_json::to_string(usage)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, crate::test_support::memory_storage};

    #[tokio::test]
    async fn ensure_is_idempotent_without_title_drift() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();

        let first = storage
            .ensure_conversation(id, "user-1", "First message title", Visibility::Private)
            .await
            .unwrap();
        let second = storage
            .ensure_conversation(id, "user-1", "A different title", Visibility::Private)
            .await
            .unwrap();

        assert_eq!(first.title, "First message title");
        assert_eq!(second.title, "First message title");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn delete_returns_record_and_removes_children() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();
        storage
            .ensure_conversation(id, "user-1", "t", Visibility::Private)
            .await
            .unwrap();
        storage.record_stream(Uuid::new_v4(), id).await.unwrap();

        let deleted = storage.delete_conversation(id).await.unwrap().unwrap();
        assert_eq!(deleted.owner_id, "user-1");
        assert!(storage.get_conversation(id).await.unwrap().is_none());
        assert!(storage.delete_conversation(id).await.unwrap().is_none());

        let streams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM streams")
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert_eq!(streams, 0);
    }

    #[tokio::test]
    async fn last_usage_round_trips_as_json() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();
        storage
            .ensure_conversation(id, "user-1", "t", Visibility::Public)
            .await
            .unwrap();

        let usage = serde_json::json!({"inputTokens": 120, "outputTokens": 340});
        storage.update_last_usage(id, &usage).await.unwrap();

        let loaded = storage.get_conversation(id).await.unwrap().unwrap();
        assert_eq!(loaded.visibility, Visibility::Public);
        assert_eq!(loaded.last_usage, Some(usage));
    }
}
