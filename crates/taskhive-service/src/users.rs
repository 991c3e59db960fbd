use taskhive_core::task::TaskStats;
use taskhive_core::user::{CreateUser, Role, User};

use crate::{ServiceError, TaskService};

fn valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl TaskService {
    /// Create an account with a bcrypt-hashed password. Rejects blank
    /// names, malformed emails, passwords under 6 characters, and emails
    /// that are already registered.
    pub async fn register_user(
        &self,
        input: &CreateUser,
        role: Role,
    ) -> Result<User, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("name is required".into()));
        }
        if !valid_email(&input.email) {
            return Err(ServiceError::InvalidInput(
                "a valid email is required".into(),
            ));
        }
        if input.password.len() < 6 {
            return Err(ServiceError::InvalidInput(
                "password must be at least 6 characters".into(),
            ));
        }
        if self.db.find_user_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::InvalidInput(
                "email already registered".into(),
            ));
        }
        let password_hash = self.hash_password(input.password.clone()).await?;
        Ok(self.db.create_user(input, &password_hash, role).await?)
    }

    /// Check credentials. `Ok(None)` on unknown email or wrong password;
    /// callers decide the status code.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let Some(user) = self.db.find_user_by_email(email).await? else {
            return Ok(None);
        };
        let hash = user.password_hash.clone();
        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(matches.then_some(user))
    }

    pub async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        Ok(self.db.get_user(id).await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.db.find_user_by_email(email).await?)
    }

    pub async fn promote_user(&self, email: &str) -> Result<User, ServiceError> {
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no user with email {email}")))?;
        Ok(self.db.set_user_role(&user.id, Role::Admin).await?)
    }

    /// Regular accounts only; admins are not listed.
    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.db.list_users_by_role(Role::User).await?)
    }

    /// Task counts by status, either for one owner (`scope`) or across the
    /// whole system. The global variant also reports how many regular
    /// accounts exist.
    pub async fn stats(&self, scope: Option<&str>) -> Result<TaskStats, ServiceError> {
        let counts = self.db.count_tasks_by_status(scope).await?;
        let mut stats = TaskStats {
            total_tasks: 0,
            pending_tasks: 0,
            in_progress_tasks: 0,
            completed_tasks: 0,
            total_users: None,
        };
        for (status, count) in counts {
            stats.total_tasks += count;
            match status.as_str() {
                "pending" => stats.pending_tasks = count,
                "in-progress" => stats.in_progress_tasks = count,
                "completed" => stats.completed_tasks = count,
                _ => {}
            }
        }
        if scope.is_none() {
            stats.total_users = Some(self.db.count_users_by_role(Role::User).await?);
        }
        Ok(stats)
    }

    /// bcrypt work runs off the async workers.
    async fn hash_password(&self, password: String) -> Result<String, ServiceError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}
