//! Business rules for taskhive: account registration, ownership checks,
//! upload orchestration, and reconciliation between attachment rows and
//! stored files.

mod error;
mod sweep;
mod tasks;
mod users;

pub use error::ServiceError;
pub use sweep::SweepReport;

/// The lowest cost bcrypt will accept. Test setups pass this to
/// [`TaskService::with_bcrypt_cost`] so hashing stays fast; the crate only
/// exports `DEFAULT_COST`, hence the local constant.
pub const MIN_BCRYPT_COST: u32 = 4;

use taskhive_db::Db;
use taskhive_store::AttachmentStore;

/// Coordinates the database and the attachment store behind every
/// operation the HTTP layer and the CLI expose.
#[derive(Clone)]
pub struct TaskService {
    db: Db,
    store: AttachmentStore,
    bcrypt_cost: u32,
}

impl TaskService {
    pub fn new(db: Db, store: AttachmentStore) -> Self {
        Self {
            db,
            store,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower the hashing cost. Tests use [`MIN_BCRYPT_COST`].
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// The underlying attachment store, for serving file bytes directly.
    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }
}
