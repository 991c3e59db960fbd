pub mod attachment;
pub mod task;
pub mod user;

pub use attachment::{Attachment, NewAttachment};
pub use task::{Category, CreateTask, Status, Task, TaskStats, TaskWithOwner, UpdateTask};
pub use user::{Caller, CreateUser, Role, User};
