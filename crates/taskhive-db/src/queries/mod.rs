pub mod attachments;
pub mod tasks;
pub mod users;
