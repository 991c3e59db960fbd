use rusqlite::Connection;

use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Baseline schema — idempotent CREATE TABLE IF NOT EXISTS
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role          TEXT NOT NULL DEFAULT 'user'
                              CHECK(role IN ('user', 'admin')),
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category    TEXT NOT NULL
                            CHECK(category IN (
                                'Work', 'Personal', 'Shopping', 'Health', 'Other'
                            )),
            status      TEXT NOT NULL DEFAULT 'pending'
                            CHECK(status IN ('pending', 'in-progress', 'completed')),
            due_date    TEXT,
            due_time    TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_owner  ON tasks(owner_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(owner_id, status);

        CREATE TABLE IF NOT EXISTS attachments (
            id          TEXT PRIMARY KEY,
            task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            file_name   TEXT NOT NULL,
            file_url    TEXT NOT NULL,
            file_key    TEXT NOT NULL,
            file_size   INTEGER NOT NULL DEFAULT 0,
            uploader_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            uploaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_task ON attachments(task_id);
        ",
    )
    .map_err(crate::map_sqlite_err)?;

    Ok(())
}
