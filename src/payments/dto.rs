use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::payments::repo_types::CategoryTotal;

/// Category given either by bare name or as `{ "name": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Name(String),
    Object { name: String },
}

impl CategoryRef {
    pub fn name(&self) -> &str {
        match self {
            CategoryRef::Name(n) | CategoryRef::Object { name: n } => n,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    pub description: Option<String>,
    /// Category name, or an object with a `name` field.
    #[schema(value_type = String, example = "Food")]
    pub category: CategoryRef,
    /// Owner of the payment; defaults to the logged-in user.
    pub username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpendingSummary {
    pub username: String,
    pub total: Decimal,
    pub categories: Vec<CategoryTotal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_accepts_name_or_object() {
        let by_name: CreatePaymentRequest =
            serde_json::from_str(r#"{"amount": 12.5, "category": "Food"}"#).unwrap();
        let by_object: CreatePaymentRequest = serde_json::from_str(
            r#"{"amount": "3", "category": {"name": "Rent"}, "date": "2025-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(by_name.category.name(), "Food");
        assert_eq!(by_name.amount, Decimal::new(125, 1));
        assert!(by_name.date.is_none());
        assert_eq!(by_object.category.name(), "Rent");
        assert!(by_object.date.is_some());
    }
}
