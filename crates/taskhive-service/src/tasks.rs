use taskhive_core::attachment::NewAttachment;
use taskhive_core::task::{CreateTask, Task, TaskOwner, TaskWithOwner, UpdateTask};
use taskhive_core::user::Caller;
use taskhive_store::NewUpload;

use crate::{ServiceError, TaskService};

fn ensure_owner(caller: &Caller, task: &Task) -> Result<(), ServiceError> {
    if caller.is_admin() || caller.user_id == task.owner_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("you do not own this task".into()))
    }
}

impl TaskService {
    /// Tasks owned by the caller, newest first, attachments embedded.
    pub async fn list_tasks(&self, caller: &Caller) -> Result<Vec<Task>, ServiceError> {
        Ok(self.db.list_tasks_by_owner(&caller.user_id).await?)
    }

    /// Every task in the system with its owner joined in. Admin listings.
    pub async fn list_all_tasks(&self) -> Result<Vec<TaskWithOwner>, ServiceError> {
        Ok(self.db.list_all_tasks().await?)
    }

    pub async fn create_task(
        &self,
        caller: &Caller,
        input: &CreateTask,
        uploads: Vec<NewUpload>,
    ) -> Result<Task, ServiceError> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title is required".into()));
        }
        let files = self.store_uploads(caller, &caller.user_id, uploads).await?;
        match self.db.create_task(&caller.user_id, input, &files).await {
            Ok(task) => Ok(task),
            Err(e) => {
                self.discard_stored(&files).await;
                Err(e.into())
            }
        }
    }

    /// Admin create on behalf of another user. The target must exist.
    pub async fn create_task_for(
        &self,
        caller: &Caller,
        target_user_id: &str,
        input: &CreateTask,
        uploads: Vec<NewUpload>,
    ) -> Result<TaskWithOwner, ServiceError> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title is required".into()));
        }
        let owner = self.db.get_user(target_user_id).await?;
        let files = self.store_uploads(caller, &owner.id, uploads).await?;
        let task = match self.db.create_task(&owner.id, input, &files).await {
            Ok(task) => task,
            Err(e) => {
                self.discard_stored(&files).await;
                return Err(e.into());
            }
        };
        Ok(TaskWithOwner {
            task,
            owner: TaskOwner {
                id: owner.id,
                name: owner.name,
                email: owner.email,
            },
        })
    }

    /// Patch a task the caller owns (admins may touch any task).
    pub async fn update_task(
        &self,
        caller: &Caller,
        task_id: &str,
        update: &UpdateTask,
        deleted_file_urls: &[String],
        uploads: Vec<NewUpload>,
    ) -> Result<Task, ServiceError> {
        let task = self.db.get_task(task_id).await?;
        ensure_owner(caller, &task)?;
        self.apply_update(caller, task, update, deleted_file_urls, uploads)
            .await
    }

    /// Admin route variant: no ownership gate, otherwise identical.
    pub async fn update_task_unchecked(
        &self,
        caller: &Caller,
        task_id: &str,
        update: &UpdateTask,
        deleted_file_urls: &[String],
        uploads: Vec<NewUpload>,
    ) -> Result<Task, ServiceError> {
        let task = self.db.get_task(task_id).await?;
        self.apply_update(caller, task, update, deleted_file_urls, uploads)
            .await
    }

    /// Remove a task, its attachment rows, and its stored files. File
    /// deletion is best-effort: one attempt per attachment, failures are
    /// logged and never abort the row delete.
    pub async fn delete_task(&self, caller: &Caller, task_id: &str) -> Result<(), ServiceError> {
        let task = self.db.get_task(task_id).await?;
        ensure_owner(caller, &task)?;
        for attachment in &task.attachments {
            self.remove_stored(&attachment.file_key).await;
        }
        Ok(self.db.delete_task(task_id).await?)
    }

    /// Admin-only reassignment. Fails NotFound when either the task or the
    /// new owner is missing.
    pub async fn assign_task(
        &self,
        task_id: &str,
        new_owner_id: &str,
    ) -> Result<TaskWithOwner, ServiceError> {
        let owner = self.db.get_user(new_owner_id).await?;
        let task = self.db.set_task_owner(task_id, &owner.id).await?;
        Ok(TaskWithOwner {
            task,
            owner: TaskOwner {
                id: owner.id,
                name: owner.name,
                email: owner.email,
            },
        })
    }

    async fn apply_update(
        &self,
        caller: &Caller,
        task: Task,
        update: &UpdateTask,
        deleted_file_urls: &[String],
        uploads: Vec<NewUpload>,
    ) -> Result<Task, ServiceError> {
        // Validate and store new files before touching anything else, so a
        // rejected upload leaves the task exactly as it was.
        let new_files = self.store_uploads(caller, &task.owner_id, uploads).await?;

        // Stored file first, then the row; a file that outlives its row is
        // picked up by the orphan sweep. URLs that match no attachment are
        // skipped; removal is idempotent.
        for url in deleted_file_urls {
            let Some(attachment) = task.attachments.iter().find(|a| &a.file_url == url) else {
                continue;
            };
            self.remove_stored(&attachment.file_key).await;
            self.db.remove_attachment_by_url(&task.id, url).await?;
        }

        if !new_files.is_empty() {
            if let Err(e) = self.db.add_attachments(&task.id, &new_files).await {
                self.discard_stored(&new_files).await;
                return Err(e.into());
            }
        }

        // Always runs, so `updated_at` refreshes even for file-only edits.
        Ok(self.db.update_task(&task.id, update).await?)
    }

    /// Push every upload into the store, returning the attachment metadata
    /// to persist. Any rejection undoes the files already stored for this
    /// request and aborts.
    async fn store_uploads(
        &self,
        caller: &Caller,
        owner_id: &str,
        uploads: Vec<NewUpload>,
    ) -> Result<Vec<NewAttachment>, ServiceError> {
        if uploads.len() > taskhive_store::MAX_FILES_PER_REQUEST {
            return Err(ServiceError::InvalidInput(format!(
                "too many files (maximum {} per request)",
                taskhive_store::MAX_FILES_PER_REQUEST
            )));
        }
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store.save(&upload, owner_id).await {
                Ok(file) => stored.push(NewAttachment {
                    file_name: upload.file_name,
                    file_url: file.file_url,
                    file_key: file.file_key,
                    file_size: file.file_size,
                    uploader_id: Some(caller.user_id.clone()),
                }),
                Err(e) => {
                    self.discard_stored(&stored).await;
                    return Err(e.into());
                }
            }
        }
        Ok(stored)
    }

    async fn discard_stored(&self, files: &[NewAttachment]) {
        for file in files {
            self.remove_stored(&file.file_key).await;
        }
    }

    async fn remove_stored(&self, file_key: &str) {
        if let Err(e) = self.store.remove(file_key).await {
            tracing::warn!(key = %file_key, error = %e, "failed to delete stored file");
        }
    }
}
