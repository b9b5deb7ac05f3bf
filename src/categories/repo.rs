use async_trait::async_trait;
use sqlx::PgPool;

use crate::categories::repo_types::Category;
use crate::error::AppResult;

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Category>>;
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>>;
    /// Fails with `Conflict` when the name is taken.
    async fn create(&self, name: &str, description: Option<&str>) -> AppResult<Category>;
    /// Returns the category with that name, creating it first if needed.
    async fn ensure(&self, name: &str) -> AppResult<Category>;
}

pub struct PgCategoryRepo {
    pub db: PgPool,
}

#[async_trait]
impl CategoryRepo for PgCategoryRepo {
    async fn list(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, name: &str, description: Option<&str>) -> AppResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn ensure(&self, name: &str) -> AppResult<Category> {
        // the no-op update makes RETURNING yield the existing row too
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }
}
