use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment record in the database.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub description: Option<String>,
    pub user_id: Uuid,
    pub category_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Payment joined with the owning username and category name.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: Uuid,
    pub amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub description: Option<String>,
    pub username: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub date: OffsetDateTime,
    pub description: Option<String>,
    pub user_id: Uuid,
    pub category_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub payments: i64,
}
