use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    categories::services::{self as categories, category_name},
    error::{AppError, AppResult},
    payments::{
        dto::{CreatePaymentRequest, SpendingSummary},
        repo_types::{NewPayment, Payment, PaymentView},
    },
    state::AppState,
};

pub async fn list(st: &AppState) -> AppResult<Vec<PaymentView>> {
    st.payments.list().await
}

/// Records a payment for `username`, creating its category on first use.
///
/// Category creation and the payment insert are separate calls; a failure
/// in between leaves at most an unused category behind.
pub async fn create(st: &AppState, username: &str, req: CreatePaymentRequest) -> AppResult<Payment> {
    let amount = req.amount.round_dp(2);
    if amount <= Decimal::ZERO {
        warn!(%username, amount = %req.amount, "rejected non-positive payment");
        return Err(AppError::validation("Amount must be greater than zero"));
    }
    let category_name = category_name(req.category.name())?;

    let user = st
        .users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))?;
    let category = categories::ensure(st, &category_name).await?;

    let payment = st
        .payments
        .create(NewPayment {
            amount,
            date: req.date.unwrap_or_else(OffsetDateTime::now_utc),
            description: req
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            user_id: user.id,
            category_id: category.id,
        })
        .await?;

    info!(payment_id = %payment.id, %username, category = %category.name, %amount, "payment created");
    Ok(payment)
}

pub async fn summary(st: &AppState, username: &str) -> AppResult<SpendingSummary> {
    let user = st
        .users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))?;
    let categories = st.payments.totals_by_category(user.id).await?;
    let total = categories.iter().map(|c| c.total).sum();
    Ok(SpendingSummary {
        username: user.username,
        total,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::dto::CategoryRef;
    use crate::state::testing::fake;
    use crate::users::{dto::RegisterRequest, services as users};

    async fn with_user() -> AppState {
        let (st, _) = fake();
        users::register(
            &st,
            RegisterRequest {
                username: "jefvermeiren".into(),
                first_name: "Jef".into(),
                last_name: "Vermeiren".into(),
                email: "jef@x.io".into(),
                password: "Passw0rd".into(),
                role: None,
            },
        )
        .await
        .unwrap();
        st
    }

    fn req(amount: Decimal, category: &str) -> CreatePaymentRequest {
        CreatePaymentRequest {
            amount,
            date: None,
            description: Some("Dinner".into()),
            category: CategoryRef::Name(category.into()),
            username: None,
        }
    }

    #[tokio::test]
    async fn unknown_category_is_created_before_payment() {
        let st = with_user().await;
        assert!(categories::list(&st).await.unwrap().is_empty());

        let payment = create(&st, "jefvermeiren", req(Decimal::new(5000, 2), "Food"))
            .await
            .unwrap();
        let cats = categories::list(&st).await.unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].name, "Food");
        assert_eq!(payment.category_id, cats[0].id);

        let listed = list(&st).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "jefvermeiren");
        assert_eq!(listed[0].category, "Food");
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let st = with_user().await;
        for amount in [Decimal::ZERO, Decimal::new(-1, 0), Decimal::new(1, 3)] {
            let res = create(&st, "jefvermeiren", req(amount, "Food")).await;
            assert!(matches!(res, Err(AppError::Validation(_))), "amount {amount}");
        }
        assert!(list(&st).await.unwrap().is_empty());
        assert!(categories::list(&st).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let st = with_user().await;
        let res = create(&st, "ghost", req(Decimal::ONE, "Food")).await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn summary_totals_per_category() {
        let st = with_user().await;
        create(&st, "jefvermeiren", req(Decimal::new(100, 0), "Food")).await.unwrap();
        create(&st, "jefvermeiren", req(Decimal::new(50, 0), "Food")).await.unwrap();
        create(&st, "jefvermeiren", req(Decimal::new(200, 0), "Electronics")).await.unwrap();

        let s = summary(&st, "jefvermeiren").await.unwrap();
        assert_eq!(s.total, Decimal::new(350, 0));
        assert_eq!(s.categories[0].category, "Electronics");
        assert_eq!(s.categories[1].total, Decimal::new(150, 0));
        assert_eq!(s.categories[1].payments, 2);
    }
}
