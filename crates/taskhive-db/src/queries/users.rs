use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskhive_core::user::{CreateUser, Role, User};

use crate::{Db, DbError, SqliteResultExt};

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        role: Role::from_str(&role_str).unwrap_or(Role::User),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn fetch_user(conn: &Connection, id: &str) -> Result<User, DbError> {
    conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("user {id}")),
            other => DbError::Internal(other.to_string()),
        })
}

impl Db {
    pub async fn create_user(
        &self,
        input: &CreateUser,
        password_hash: &str,
        role: Role,
    ) -> Result<User, DbError> {
        let db = self.clone();
        let input = input.clone();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || db.create_user_sync(&input, &password_hash, role))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn get_user(&self, id: &str) -> Result<User, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_user_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let db = self.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || db.find_user_by_email_sync(&email))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.list_users_by_role_sync(role))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn set_user_role(&self, id: &str, role: Role) -> Result<User, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.set_user_role_sync(&id, role))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub async fn count_users_by_role(&self, role: Role) -> Result<i64, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.count_users_by_role_sync(role))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    pub fn create_user_sync(
        &self,
        input: &CreateUser,
        password_hash: &str,
        role: Role,
    ) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, input.name, input.email, password_hash, role.as_str(), now, now],
            )
            .to_db()?;
            fetch_user(conn, &id)
        })
    }

    pub fn get_user_sync(&self, id: &str) -> Result<User, DbError> {
        self.with_conn(|conn| fetch_user(conn, id))
    }

    pub fn find_user_by_email_sync(&self, email: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            match conn.query_row(
                "SELECT * FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            ) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(DbError::Internal(e.to_string())),
            }
        })
    }

    pub fn list_users_by_role_sync(&self, role: Role) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM users WHERE role = ?1 ORDER BY created_at ASC")
                .to_db()?;
            let users = stmt
                .query_map(params![role.as_str()], row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }

    pub fn set_user_role_sync(&self, id: &str, role: Role) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                    params![role.as_str(), Utc::now(), id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            fetch_user(conn, id)
        })
    }

    pub fn count_users_by_role_sync(&self, role: Role) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                params![role.as_str()],
                |row| row.get(0),
            )
            .to_db()
        })
    }
}
