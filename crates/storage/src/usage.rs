//! Usage/cost ledger and aggregation queries.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    sqlx::Row,
    uuid::Uuid,
};

use crate::{Result, Storage};

/// One ledger entry per completed model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub conversation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    pub owner_id: String,
    pub model_id: String,
    pub provider: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub tools_used: Vec<String>,
    pub tool_call_count: u32,
}

/// Per-owner totals for the usage page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub invocations: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub estimated_cost: f64,
}

/// Totals bucketed by one key column (model or tool name).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    pub key: String,
    pub invocations: i64,
    pub total_tokens: i64,
    pub estimated_cost: f64,
}

impl Storage {
    pub async fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_log (conversation_id, message_id, owner_id, model_id, provider,
                input_tokens, output_tokens, total_tokens, estimated_cost, tools_used,
                tool_call_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(record.conversation_id)
        .bind(record.message_id)
        .bind(&record.owner_id)
        .bind(&record.model_id)
        .bind(&record.provider)
        .bind(record.input_tokens as i64)
        .bind(record.output_tokens as i64)
        .bind(record.total_tokens as i64)
        .bind(record.estimated_cost)
        .bind(serde_json::to_string(&record.tools_used)?)
        .bind(i64::from(record.tool_call_count))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn usage_totals(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<UsageTotals> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS invocations,
                    COALESCE(SUM(input_tokens), 0) AS input_tokens,
                    COALESCE(SUM(output_tokens), 0) AS output_tokens,
                    COALESCE(SUM(total_tokens), 0) AS total_tokens,
                    COALESCE(SUM(estimated_cost), 0.0) AS estimated_cost
             FROM usage_log
             WHERE owner_id = ?1 AND created_at >= ?2",
        )
        .bind(owner_id)
        .bind(since.unwrap_or(DateTime::<Utc>::MIN_UTC))
        .fetch_one(&self.pool)
        .await?;
        Ok(UsageTotals {
            invocations: row.try_get("invocations")?,
            input_tokens: row.try_get("input_tokens")?,
            output_tokens: row.try_get("output_tokens")?,
            total_tokens: row.try_get("total_tokens")?,
            estimated_cost: row.try_get("estimated_cost")?,
        })
    }

    pub async fn usage_by_model(&self, owner_id: &str) -> Result<Vec<UsageBucket>> {
        let rows = sqlx::query(
            "SELECT model_id AS key,
                    COUNT(*) AS invocations,
                    COALESCE(SUM(total_tokens), 0) AS total_tokens,
                    COALESCE(SUM(estimated_cost), 0.0) AS estimated_cost
             FROM usage_log WHERE owner_id = ?1
             GROUP BY model_id ORDER BY total_tokens DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(UsageBucket {
                    key: row.try_get("key")?,
                    invocations: row.try_get("invocations")?,
                    total_tokens: row.try_get("total_tokens")?,
                    estimated_cost: row.try_get("estimated_cost")?,
                })
            })
            .collect()
    }

    /// Tool-name buckets, expanded from the per-record `tools_used` JSON
    /// arrays. SQLite's `json_each` does the unnesting.
    pub async fn usage_by_tool(&self, owner_id: &str) -> Result<Vec<UsageBucket>> {
        let rows = sqlx::query(
            "SELECT je.value AS key,
                    COUNT(*) AS invocations,
                    COALESCE(SUM(u.total_tokens), 0) AS total_tokens,
                    COALESCE(SUM(u.estimated_cost), 0.0) AS estimated_cost
             FROM usage_log u, json_each(u.tools_used) je
             WHERE u.owner_id = ?1
             GROUP BY je.value ORDER BY invocations DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(UsageBucket {
                    key: row.try_get("key")?,
                    invocations: row.try_get("invocations")?,
                    total_tokens: row.try_get("total_tokens")?,
                    estimated_cost: row.try_get("estimated_cost")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, crate::test_support::memory_storage};

    fn record(owner: &str, model: &str, tools: &[&str]) -> UsageRecord {
        UsageRecord {
            conversation_id: Uuid::new_v4(),
            message_id: None,
            owner_id: owner.into(),
            model_id: model.into(),
            provider: "anthropic".into(),
            input_tokens: 120,
            output_tokens: 340,
            total_tokens: 460,
            estimated_cost: 120.0 / 1e6 * 3.0 + 340.0 / 1e6 * 15.0,
            tools_used: tools.iter().map(ToString::to_string).collect(),
            tool_call_count: tools.len() as u32,
        }
    }

    #[tokio::test]
    async fn totals_scope_to_owner() {
        let storage = memory_storage().await;
        storage
            .record_usage(&record("user-1", "claude-3-5-sonnet-20241022", &[]))
            .await
            .unwrap();
        storage
            .record_usage(&record("user-2", "gpt-4o", &[]))
            .await
            .unwrap();

        let totals = storage.usage_totals("user-1", None).await.unwrap();
        assert_eq!(totals.invocations, 1);
        assert_eq!(totals.total_tokens, 460);
        assert!((totals.estimated_cost - (120.0 / 1e6 * 3.0 + 340.0 / 1e6 * 15.0)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn model_buckets_group_and_sum() {
        let storage = memory_storage().await;
        for _ in 0..2 {
            storage
                .record_usage(&record("user-1", "gpt-4o", &[]))
                .await
                .unwrap();
        }
        storage
            .record_usage(&record("user-1", "gemini-2.0-flash", &[]))
            .await
            .unwrap();

        let buckets = storage.usage_by_model("user-1").await.unwrap();
        assert_eq!(buckets[0].key, "gpt-4o");
        assert_eq!(buckets[0].invocations, 2);
        assert_eq!(buckets[0].total_tokens, 920);
    }

    #[tokio::test]
    async fn tool_buckets_unnest_json_arrays() {
        let storage = memory_storage().await;
        storage
            .record_usage(&record("user-1", "gpt-4o", &["getWeather", "createDocument"]))
            .await
            .unwrap();
        storage
            .record_usage(&record("user-1", "gpt-4o", &["getWeather"]))
            .await
            .unwrap();

        let buckets = storage.usage_by_tool("user-1").await.unwrap();
        assert_eq!(buckets[0].key, "getWeather");
        assert_eq!(buckets[0].invocations, 2);
        assert_eq!(buckets.len(), 2);
    }
}
