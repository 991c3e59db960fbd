use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskhive_core::attachment::{Attachment, NewAttachment};
use taskhive_core::task::{Category, CreateTask, Status, Task, TaskOwner, TaskWithOwner, UpdateTask};

use super::attachments::{insert_attachment, row_to_attachment};
use crate::{Db, DbError, SqliteResultExt};

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let category_str: String = row.get("category")?;
    Ok(Task {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: Category::from_str(&category_str).unwrap_or(Category::Other),
        status: Status::from_str(&status_str).unwrap_or(Status::Pending),
        due_date: row.get("due_date")?,
        due_time: row.get("due_time")?,
        attachments: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Load one task with its attachments populated.
pub(crate) fn fetch_task(conn: &Connection, id: &str) -> Result<Task, DbError> {
    let mut task = conn
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("task {id}")),
            other => DbError::Internal(other.to_string()),
        })?;
    task.attachments = fetch_attachments(conn, id)?;
    Ok(task)
}

pub(crate) fn fetch_attachments(conn: &Connection, task_id: &str) -> Result<Vec<Attachment>, DbError> {
    let mut stmt = conn
        .prepare("SELECT * FROM attachments WHERE task_id = ?1 ORDER BY uploaded_at ASC, id ASC")
        .to_db()?;
    let attachments = stmt
        .query_map(params![task_id], row_to_attachment)
        .to_db()?
        .collect::<Result<Vec<_>, _>>()
        .to_db()?;
    Ok(attachments)
}

/// Attachments for every task (optionally scoped to one owner), grouped by
/// task id. Avoids per-task queries when embedding attachment lists.
fn attachments_by_task(
    conn: &Connection,
    owner_id: Option<&str>,
) -> Result<HashMap<String, Vec<Attachment>>, DbError> {
    let sql = match owner_id {
        Some(_) => {
            "SELECT a.* FROM attachments a
             JOIN tasks t ON t.id = a.task_id
             WHERE t.owner_id = ?1
             ORDER BY a.uploaded_at ASC, a.id ASC"
        }
        None => "SELECT * FROM attachments ORDER BY uploaded_at ASC, id ASC",
    };
    let mut stmt = conn.prepare(sql).to_db()?;
    let rows = match owner_id {
        Some(owner) => stmt.query_map(params![owner], row_to_attachment).to_db()?,
        None => stmt.query_map([], row_to_attachment).to_db()?,
    }
    .collect::<Result<Vec<_>, _>>()
    .to_db()?;

    let mut grouped: HashMap<String, Vec<Attachment>> = HashMap::new();
    for attachment in rows {
        grouped
            .entry(attachment.task_id.clone())
            .or_default()
            .push(attachment);
    }
    Ok(grouped)
}

impl Db {
    pub async fn create_task(
        &self,
        owner_id: &str,
        input: &CreateTask,
        files: &[NewAttachment],
    ) -> Result<Task, DbError> {
        let db = self.clone();
        let owner_id = owner_id.to_string();
        let input = input.clone();
        let files = files.to_vec();
        tokio::task::spawn_blocking(move || db.create_task_sync(&owner_id, &input, &files))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_task_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn list_tasks_by_owner(&self, owner_id: &str) -> Result<Vec<Task>, DbError> {
        let db = self.clone();
        let owner_id = owner_id.to_string();
        tokio::task::spawn_blocking(move || db.list_tasks_by_owner_sync(&owner_id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn list_all_tasks(&self) -> Result<Vec<TaskWithOwner>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.list_all_tasks_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let update = update.clone();
        tokio::task::spawn_blocking(move || db.update_task_sync(&id, &update))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn set_task_owner(&self, id: &str, owner_id: &str) -> Result<Task, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        tokio::task::spawn_blocking(move || db.set_task_owner_sync(&id, &owner_id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_task_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn count_tasks_by_status(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<(String, i64)>, DbError> {
        let db = self.clone();
        let owner_id = owner_id.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || db.count_tasks_by_status_sync(owner_id.as_deref()))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub fn create_task_sync(
        &self,
        owner_id: &str,
        input: &CreateTask,
        files: &[NewAttachment],
    ) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();

            // Task row and attachment metadata land together or not at all.
            let tx = conn.unchecked_transaction().to_db()?;
            tx.execute(
                "INSERT INTO tasks (
                    id, owner_id, title, description, category, status,
                    due_date, due_time, created_at, updated_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    owner_id,
                    input.title,
                    input.description,
                    input.category.as_str(),
                    input.status.as_str(),
                    input.due_date,
                    input.due_time,
                    now,
                    now,
                ],
            )
            .to_db()?;
            for file in files {
                insert_attachment(&tx, &id, file)?;
            }
            tx.commit().to_db()?;

            fetch_task(conn, &id)
        })
    }

    pub fn get_task_sync(&self, id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| fetch_task(conn, id))
    }

    pub fn list_tasks_by_owner_sync(&self, owner_id: &str) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM tasks WHERE owner_id = ?1 ORDER BY created_at DESC")
                .to_db()?;
            let mut tasks = stmt
                .query_map(params![owner_id], row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;

            let mut grouped = attachments_by_task(conn, Some(owner_id))?;
            for task in &mut tasks {
                if let Some(attachments) = grouped.remove(&task.id) {
                    task.attachments = attachments;
                }
            }
            Ok(tasks)
        })
    }

    pub fn list_all_tasks_sync(&self) -> Result<Vec<TaskWithOwner>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT t.*, u.name AS owner_name, u.email AS owner_email
                     FROM tasks t
                     JOIN users u ON u.id = t.owner_id
                     ORDER BY t.created_at DESC",
                )
                .to_db()?;
            let mut tasks = stmt
                .query_map([], |row| {
                    let task = row_to_task(row)?;
                    let owner = TaskOwner {
                        id: task.owner_id.clone(),
                        name: row.get("owner_name")?,
                        email: row.get("owner_email")?,
                    };
                    Ok(TaskWithOwner { task, owner })
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;

            let mut grouped = attachments_by_task(conn, None)?;
            for entry in &mut tasks {
                if let Some(attachments) = grouped.remove(&entry.task.id) {
                    entry.task.attachments = attachments;
                }
            }
            Ok(tasks)
        })
    }

    pub fn update_task_sync(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

            if let Some(ref title) = update.title {
                param_values.push(Box::new(title.clone()));
                sets.push(format!("title = ?{}", param_values.len()));
            }
            if let Some(ref description) = update.description {
                param_values.push(Box::new(description.clone()));
                sets.push(format!("description = ?{}", param_values.len()));
            }
            if let Some(category) = update.category {
                param_values.push(Box::new(category.as_str().to_string()));
                sets.push(format!("category = ?{}", param_values.len()));
            }
            if let Some(status) = update.status {
                param_values.push(Box::new(status.as_str().to_string()));
                sets.push(format!("status = ?{}", param_values.len()));
            }
            if let Some(due_date) = update.due_date {
                param_values.push(Box::new(due_date));
                sets.push(format!("due_date = ?{}", param_values.len()));
            }
            if let Some(ref due_time) = update.due_time {
                param_values.push(Box::new(due_time.clone()));
                sets.push(format!("due_time = ?{}", param_values.len()));
            }

            param_values.push(Box::new(id.to_string()));
            let id_param = param_values.len();

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ?{}",
                sets.join(", "),
                id_param
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }

            fetch_task(conn, id)
        })
    }

    pub fn set_task_owner_sync(&self, id: &str, owner_id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE tasks SET owner_id = ?1, updated_at = ?2 WHERE id = ?3",
                    params![owner_id, Utc::now(), id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            fetch_task(conn, id)
        })
    }

    pub fn delete_task_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }

    pub fn count_tasks_by_status_sync(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<(String, i64)>, DbError> {
        self.with_conn(|conn| {
            let sql = match owner_id {
                Some(_) => {
                    "SELECT status, COUNT(*) FROM tasks WHERE owner_id = ?1 GROUP BY status"
                }
                None => "SELECT status, COUNT(*) FROM tasks GROUP BY status",
            };
            let mut stmt = conn.prepare(sql).to_db()?;
            let map_row = |row: &Row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
            let counts = match owner_id {
                Some(owner) => stmt.query_map(params![owner], map_row).to_db()?,
                None => stmt.query_map([], map_row).to_db()?,
            }
            .collect::<Result<Vec<_>, _>>()
            .to_db()?;
            Ok(counts)
        })
    }
}
