use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskhive_core::attachment::{Attachment, NewAttachment};

use crate::{Db, DbError, SqliteResultExt};

pub(crate) fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        file_name: row.get("file_name")?,
        file_url: row.get("file_url")?,
        file_key: row.get("file_key")?,
        file_size: row.get("file_size")?,
        uploader_id: row.get("uploader_id")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

/// Insert one attachment row. Callers own the enclosing transaction, if any.
pub(crate) fn insert_attachment(
    conn: &Connection,
    task_id: &str,
    file: &NewAttachment,
) -> Result<Attachment, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let uploaded_at = Utc::now();
    conn.execute(
        "INSERT INTO attachments (
            id, task_id, file_name, file_url, file_key, file_size, uploader_id, uploaded_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            task_id,
            file.file_name,
            file.file_url,
            file.file_key,
            file.file_size,
            file.uploader_id,
            uploaded_at,
        ],
    )
    .to_db()?;
    Ok(Attachment {
        id,
        task_id: task_id.to_string(),
        file_name: file.file_name.clone(),
        file_url: file.file_url.clone(),
        file_key: file.file_key.clone(),
        file_size: file.file_size,
        uploader_id: file.uploader_id.clone(),
        uploaded_at,
    })
}

impl Db {
    pub async fn add_attachments(
        &self,
        task_id: &str,
        files: &[NewAttachment],
    ) -> Result<Vec<Attachment>, DbError> {
        let db = self.clone();
        let task_id = task_id.to_string();
        let files = files.to_vec();
        tokio::task::spawn_blocking(move || db.add_attachments_sync(&task_id, &files))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn remove_attachment_by_url(
        &self,
        task_id: &str,
        file_url: &str,
    ) -> Result<Option<Attachment>, DbError> {
        let db = self.clone();
        let task_id = task_id.to_string();
        let file_url = file_url.to_string();
        tokio::task::spawn_blocking(move || db.remove_attachment_by_url_sync(&task_id, &file_url))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn list_attachment_keys(&self) -> Result<Vec<String>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.list_attachment_keys_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub fn add_attachments_sync(
        &self,
        task_id: &str,
        files: &[NewAttachment],
    ) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let mut inserted = Vec::with_capacity(files.len());
            for file in files {
                inserted.push(insert_attachment(&tx, task_id, file)?);
            }
            tx.commit().to_db()?;
            Ok(inserted)
        })
    }

    /// Delete the attachment of `task_id` whose stored URL matches, returning
    /// the removed row. `Ok(None)` when nothing matched.
    pub fn remove_attachment_by_url_sync(
        &self,
        task_id: &str,
        file_url: &str,
    ) -> Result<Option<Attachment>, DbError> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT * FROM attachments WHERE task_id = ?1 AND file_url = ?2",
                params![task_id, file_url],
                row_to_attachment,
            );
            let attachment = match found {
                Ok(attachment) => attachment,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(other) => return Err(DbError::Internal(other.to_string())),
            };
            conn.execute(
                "DELETE FROM attachments WHERE id = ?1",
                params![attachment.id],
            )
            .to_db()?;
            Ok(Some(attachment))
        })
    }

    /// Every stored file key across all tasks. Feeds orphan reconciliation.
    pub fn list_attachment_keys_sync(&self) -> Result<Vec<String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT file_key FROM attachments").to_db()?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(keys)
        })
    }
}
