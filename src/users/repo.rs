use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::users::repo_types::{NewUser, User, UserChanges, UserRow};

/// Persistence seam for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Fails with `Conflict` when the username or email is taken.
    async fn create(&self, new: NewUser) -> AppResult<User>;
    /// Returns `None` when no user has that username.
    async fn update(&self, username: &str, changes: &UserChanges) -> AppResult<Option<User>>;
    /// Removes the user and their payments; `false` when nothing matched.
    async fn delete(&self, username: &str) -> AppResult<bool>;
}

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, password_hash, role, created_at";

pub struct PgUserRepo {
    pub db: PgPool,
}

fn into_users(rows: Vec<UserRow>) -> AppResult<Vec<User>> {
    Ok(rows
        .into_iter()
        .map(User::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?)
}

fn into_user(row: Option<UserRow>) -> AppResult<Option<User>> {
    Ok(row.map(User::try_from).transpose()?)
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.db)
        .await?;
        into_users(rows)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn create(&self, new: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, first_name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn update(&self, username: &str, changes: &UserChanges) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET first_name    = COALESCE($2, first_name),
                   last_name     = COALESCE($3, last_name),
                   email         = COALESCE($4, email),
                   password_hash = COALESCE($5, password_hash),
                   role          = COALESCE($6, role)
             WHERE username = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.password_hash.as_deref())
        .bind(changes.role.map(|r| r.as_str()))
        .fetch_optional(&self.db)
        .await?;
        into_user(row)
    }

    async fn delete(&self, username: &str) -> AppResult<bool> {
        // payments go with the user through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
