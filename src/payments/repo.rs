use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::payments::repo_types::{CategoryTotal, NewPayment, Payment, PaymentView};

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    /// All payments, newest first.
    async fn list(&self) -> AppResult<Vec<PaymentView>>;
    async fn create(&self, new: NewPayment) -> AppResult<Payment>;
    /// Per-category sums for one user, largest first.
    async fn totals_by_category(&self, user_id: Uuid) -> AppResult<Vec<CategoryTotal>>;
}

pub struct PgPaymentRepo {
    pub db: PgPool,
}

#[async_trait]
impl PaymentRepo for PgPaymentRepo {
    async fn list(&self) -> AppResult<Vec<PaymentView>> {
        let rows = sqlx::query_as::<_, PaymentView>(
            r#"
            SELECT p.id, p.amount, p.date, p.description,
                   u.username, c.name AS category
              FROM payments p
              JOIN users u      ON u.id = p.user_id
              JOIN categories c ON c.id = p.category_id
             ORDER BY p.date DESC, p.created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, new: NewPayment) -> AppResult<Payment> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (amount, date, description, user_id, category_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, amount, date, description, user_id, category_id, created_at
            "#,
        )
        .bind(new.amount)
        .bind(new.date)
        .bind(new.description)
        .bind(new.user_id)
        .bind(new.category_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn totals_by_category(&self, user_id: Uuid) -> AppResult<Vec<CategoryTotal>> {
        let rows = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT c.name AS category,
                   SUM(p.amount) AS total,
                   COUNT(*) AS payments
              FROM payments p
              JOIN categories c ON c.id = p.category_id
             WHERE p.user_id = $1
             GROUP BY c.name
             ORDER BY total DESC, c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
