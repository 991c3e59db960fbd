//! Multipart form handling for task create/update. Files arrive under the
//! `files` field; `deletedFiles` is a JSON-encoded array of attachment
//! URLs; everything else is a scalar task field.

use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::NaiveDate;

use taskhive_core::task::{Category, CreateTask, Status, UpdateTask};
use taskhive_store::NewUpload;

pub struct TaskForm {
    pub fields: HashMap<String, String>,
    pub deleted_files: Vec<String>,
    pub uploads: Vec<NewUpload>,
}

impl TaskForm {
    /// Drain a multipart body into scalar fields, the delete list, and raw
    /// uploads. No validation happens here beyond well-formedness.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, String> {
        let mut form = TaskForm {
            fields: HashMap::new(),
            deleted_files: Vec::new(),
            uploads: Vec::new(),
        };
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("malformed multipart body: {e}"))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "files" => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = match field.content_type() {
                        Some(ct) => ct.to_string(),
                        None => mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string(),
                    };
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| format!("failed to read file {file_name}: {e}"))?;
                    form.uploads.push(NewUpload {
                        file_name,
                        content_type,
                        data,
                    });
                }
                "deletedFiles" => {
                    let raw = field
                        .text()
                        .await
                        .map_err(|e| format!("failed to read deletedFiles: {e}"))?;
                    if !raw.trim().is_empty() {
                        form.deleted_files = serde_json::from_str(&raw)
                            .map_err(|_| "deletedFiles must be a JSON array of URLs".to_string())?;
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| format!("failed to read field {name}: {e}"))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Build a `CreateTask` from the scalar fields. Title presence is
    /// enforced by the service; category must parse here.
    pub fn create_input(&self) -> Result<CreateTask, String> {
        let category = match self.field("category") {
            Some(raw) => parse_category(raw)?,
            None => return Err("category is required".into()),
        };
        let status = match self.field("status") {
            Some(raw) => parse_status(raw)?,
            None => Status::default(),
        };
        Ok(CreateTask {
            title: self.fields.get("title").cloned().unwrap_or_default(),
            description: self.fields.get("description").cloned().unwrap_or_default(),
            category,
            status,
            due_date: self.field("dueDate").map(parse_date).transpose()?,
            due_time: self.field("dueTime").map(str::to_string),
        })
    }

    /// Build an explicit patch: absent fields stay untouched; a present but
    /// empty `description`, `dueDate`, or `dueTime` clears the stored value;
    /// empty `title`/`category`/`status` are ignored (never clearable).
    pub fn update_input(&self) -> Result<UpdateTask, String> {
        let mut update = UpdateTask::default();
        if let Some(title) = self.field("title") {
            update.title = Some(title.to_string());
        }
        if let Some(description) = self.fields.get("description") {
            update.description = Some(description.clone());
        }
        if let Some(raw) = self.field("category") {
            update.category = Some(parse_category(raw)?);
        }
        if let Some(raw) = self.field("status") {
            update.status = Some(parse_status(raw)?);
        }
        if let Some(raw) = self.fields.get("dueDate") {
            update.due_date = Some(match raw.trim() {
                "" => None,
                raw => Some(parse_date(raw)?),
            });
        }
        if let Some(raw) = self.fields.get("dueTime") {
            update.due_time = Some(match raw.trim() {
                "" => None,
                raw => Some(raw.to_string()),
            });
        }
        Ok(update)
    }

    /// `assignToUserId`, for the admin create-for-user route.
    pub fn target_user(&self) -> Option<&str> {
        self.field("assignToUserId")
    }

    /// A scalar field, treating empty strings as absent.
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::from_str(raw).ok_or_else(|| format!("unknown category: {raw}"))
}

fn parse_status(raw: &str) -> Result<Status, String> {
    Status::from_str(raw).ok_or_else(|| format!("unknown status: {raw}"))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date: {raw} (expected YYYY-MM-DD)"))
}
