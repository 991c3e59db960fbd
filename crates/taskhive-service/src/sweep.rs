use std::collections::HashSet;

use crate::{ServiceError, TaskService};

/// Outcome of an orphan reconciliation pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Keys present in the store when the pass started.
    pub scanned: usize,
    /// Orphaned keys successfully deleted.
    pub deleted: Vec<String>,
    /// Orphaned keys whose delete failed, with the error text.
    pub failed: Vec<(String, String)>,
}

impl TaskService {
    /// Delete stored files that no attachment row references. This is the
    /// out-of-band cleanup for file deletes that failed at request time.
    ///
    /// Intended to run while the server is idle: files stored by an
    /// in-flight request look orphaned until their rows are committed.
    pub async fn sweep_orphans(&self) -> Result<SweepReport, ServiceError> {
        let keys = self.store.list_keys().await?;
        let referenced: HashSet<String> =
            self.db.list_attachment_keys().await?.into_iter().collect();

        let mut report = SweepReport {
            scanned: keys.len(),
            ..Default::default()
        };
        for key in keys {
            if referenced.contains(&key) {
                continue;
            }
            match self.store.remove(&key).await {
                Ok(()) => {
                    tracing::info!(key = %key, "removed orphaned file");
                    report.deleted.push(key);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "failed to remove orphaned file");
                    report.failed.push((key, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use taskhive_core::task::{Category, CreateTask, Status};
    use taskhive_core::user::{Caller, CreateUser, Role};
    use taskhive_db::Db;
    use taskhive_store::{AttachmentStore, NewUpload, StoreConfig};

    use crate::TaskService;

    fn service(tmp: &tempfile::TempDir) -> TaskService {
        let db = Db::open_in_memory().unwrap();
        let config = StoreConfig {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_upload_dir: Some(tmp.path().to_string_lossy().to_string()),
        };
        let store = AttachmentStore::new(&config).unwrap();
        TaskService::new(db, store).with_bcrypt_cost(crate::MIN_BCRYPT_COST)
    }

    #[tokio::test]
    async fn sweep_deletes_only_unreferenced_files() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);

        let ann = svc
            .register_user(
                &CreateUser {
                    name: "Ann".into(),
                    email: "a@example.com".into(),
                    password: "secret1".into(),
                },
                Role::User,
            )
            .await
            .unwrap();
        let caller = Caller::new(ann.id.clone(), Role::User);

        let task = svc
            .create_task(
                &caller,
                &CreateTask {
                    title: "Linked".into(),
                    description: String::new(),
                    category: Category::Work,
                    status: Status::Pending,
                    due_date: None,
                    due_time: None,
                },
                vec![NewUpload {
                    file_name: "kept.pdf".into(),
                    content_type: "application/pdf".into(),
                    data: Bytes::from_static(b"%PDF-1.4"),
                }],
            )
            .await
            .unwrap();
        let linked_key = task.attachments[0].file_key.clone();

        // A file with no attachment row, as left behind by a failed delete.
        let orphan = svc
            .store()
            .save(
                &NewUpload {
                    file_name: "stray.pdf".into(),
                    content_type: "application/pdf".into(),
                    data: Bytes::from_static(b"%PDF-1.4 stray"),
                },
                &ann.id,
            )
            .await
            .unwrap();

        let report = svc.sweep_orphans().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, vec![orphan.file_key.clone()]);
        assert!(report.failed.is_empty());

        let keys = svc.store().list_keys().await.unwrap();
        assert_eq!(keys, vec![linked_key]);
    }

    #[tokio::test]
    async fn sweep_on_consistent_state_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);

        let report = svc.sweep_orphans().await.unwrap();
        assert_eq!(report.scanned, 0);
        assert!(report.deleted.is_empty());
        assert!(report.failed.is_empty());
    }
}
