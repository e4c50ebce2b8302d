//! Document revisions backing the document tools. Rows append per save;
//! reads return the newest revision for an id.

use {
    async_trait::async_trait,
    chrono::Utc,
    sqlx::Row,
    tandem_tools::{Document, DocumentKind, DocumentStore},
    uuid::Uuid,
};

use crate::Storage;

fn kind_from_str(kind: &str) -> DocumentKind {
    match kind {
        "code" => DocumentKind::Code,
        "sheet" => DocumentKind::Sheet,
        _ => DocumentKind::Text,
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn save_document(&self, document: &Document) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, title, kind, content, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(document.kind.as_str())
        .bind(&document.content)
        .bind(&document.owner_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_document(&self, id: Uuid) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT * FROM documents WHERE id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let kind: String = row.try_get("kind")?;
        Ok(Some(Document {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            kind: kind_from_str(&kind),
            content: row.try_get("content")?,
            owner_id: row.try_get("owner_id")?,
        }))
    }
}
