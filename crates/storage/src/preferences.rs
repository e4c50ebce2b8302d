//! Per-user preferences. Currently a single flag; absent rows read as
//! defaults.

use serde::{Deserialize, Serialize};

use crate::{Result, Storage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub thinking_enabled: bool,
}

impl Storage {
    pub async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences> {
        let thinking: Option<bool> = sqlx::query_scalar(
            "SELECT thinking_enabled FROM user_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(UserPreferences {
            thinking_enabled: thinking.unwrap_or(false),
        })
    }

    pub async fn put_preferences(&self, user_id: &str, preferences: UserPreferences) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, thinking_enabled) VALUES (?1, ?2)
             ON CONFLICT (user_id) DO UPDATE SET thinking_enabled = excluded.thinking_enabled",
        )
        .bind(user_id)
        .bind(preferences.thinking_enabled)
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
    async fn defaults_off_and_round_trips() {
        let storage = memory_storage().await;
        assert!(!storage.get_preferences("user-1").await.unwrap().thinking_enabled);

        storage
            .put_preferences("user-1", UserPreferences { thinking_enabled: true })
            .await
            .unwrap();
        assert!(storage.get_preferences("user-1").await.unwrap().thinking_enabled);

        storage
            .put_preferences("user-1", UserPreferences { thinking_enabled: false })
            .await
            .unwrap();
        assert!(!storage.get_preferences("user-1").await.unwrap().thinking_enabled);
    }
}
