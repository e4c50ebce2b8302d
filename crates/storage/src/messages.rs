//! Message rows. Append-only once written; edits are modeled as new
//! trailing messages plus deletion-after-timestamp.

use {
    chrono::{DateTime, Utc},
    sqlx::Row,
    tandem_protocol::{ChatMessage, Role},
    uuid::Uuid,
};

use crate::{Result, Storage};

fn role_from_str(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => Role::User,
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage> {
    let role: String = row.try_get("role")?;
    let parts: String = row.try_get("parts")?;
    let attachments: String = row.try_get("attachments")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        role: role_from_str(&role),
        parts: serde_json::from_str(&parts)?,
        attachments: serde_json::from_str(&attachments)?,
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    /// Idempotent by message id.
    pub async fn save_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, parts, attachments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.role.as_str())
        .bind(serde_json::to_string(&message.parts)?)
        .bind(serde_json::to_string(&message.attachments)?)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Saves a batch in one transaction, preserving order.
    pub async fn save_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for message in messages {
            sqlx::query(
                "INSERT INTO messages (id, conversation_id, role, parts, attachments, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(message.id)
            .bind(message.conversation_id)
            .bind(message.role.as_str())
            .bind(serde_json::to_string(&message.parts)?)
            .bind(serde_json::to_string(&message.attachments)?)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Full history for a conversation, strictly by creation time.
    pub async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    /// Removes messages at or after a timestamp, the edit/regenerate
    /// truncation primitive.
    pub async fn delete_messages_after(
        &self,
        conversation_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE conversation_id = ?1 AND created_at >= ?2",
        )
        .bind(conversation_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// User messages across all of an owner's conversations since a
    /// cutoff, for the rolling message quota.
    pub async fn count_recent_user_messages(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE c.owner_id = ?1 AND m.role = 'user' AND m.created_at >= ?2",
        )
        .bind(owner_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::test_support::memory_storage,
        chrono::Duration,
        tandem_protocol::{MessagePart, Visibility},
    };

    fn message(conversation_id: Uuid, role: Role, text: &str, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            parts: vec![MessagePart::Text { text: text.into() }],
            attachments: vec![],
            created_at: at,
        }
    }

    #[tokio::test]
    async fn history_preserves_parts_and_order() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();
        storage
            .ensure_conversation(id, "user-1", "t", Visibility::Private)
            .await
            .unwrap();

        let base = Utc::now();
        let first = message(id, Role::User, "hello", base);
        let second = message(id, Role::Assistant, "hi there", base + Duration::seconds(1));
        storage.save_message(&first).await.unwrap();
        storage.save_messages(std::slice::from_ref(&second)).await.unwrap();

        let history = storage.list_messages(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].parts, first.parts);
        assert_eq!(history[0].created_at, first.created_at);
        assert_eq!(history[1].id, second.id);
    }

    #[tokio::test]
    async fn save_message_is_idempotent_by_id() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();
        storage
            .ensure_conversation(id, "user-1", "t", Visibility::Private)
            .await
            .unwrap();

        let m = message(id, Role::User, "once", Utc::now());
        storage.save_message(&m).await.unwrap();
        storage.save_message(&m).await.unwrap();
        assert_eq!(storage.list_messages(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_after_truncates_tail() {
        let storage = memory_storage().await;
        let id = Uuid::new_v4();
        storage
            .ensure_conversation(id, "user-1", "t", Visibility::Private)
            .await
            .unwrap();

        let base = Utc::now();
        storage
            .save_message(&message(id, Role::User, "keep", base))
            .await
            .unwrap();
        storage
            .save_message(&message(id, Role::Assistant, "drop", base + Duration::seconds(5)))
            .await
            .unwrap();

        let removed = storage
            .delete_messages_after(id, base + Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(storage.list_messages(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quota_count_scopes_to_owner_and_role() {
        let storage = memory_storage().await;
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        storage
            .ensure_conversation(mine, "user-1", "t", Visibility::Private)
            .await
            .unwrap();
        storage
            .ensure_conversation(theirs, "user-2", "t", Visibility::Private)
            .await
            .unwrap();

        let now = Utc::now();
        storage
            .save_message(&message(mine, Role::User, "a", now))
            .await
            .unwrap();
        storage
            .save_message(&message(mine, Role::Assistant, "b", now))
            .await
            .unwrap();
        storage
            .save_message(&message(theirs, Role::User, "c", now))
            .await
            .unwrap();

        let count = storage
            .count_recent_user_messages("user-1", now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
