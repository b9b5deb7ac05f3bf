use rust_decimal::Decimal;
use time::{macros::time, OffsetDateTime};
use tracing::info;

use crate::{
    categories::services as categories,
    error::AppResult,
    payments::{
        dto::{CategoryRef, CreatePaymentRequest},
        services as payments,
    },
    state::AppState,
    users::{dto::RegisterRequest, repo_types::Role, services as users},
};

const DEMO_USERS: [(&str, &str, &str, &str, &str, Role); 2] = [
    ("bramcelis", "Bram", "Celis", "bram.celis21@gmail.com", "Bramcelis1", Role::Admin),
    ("jefvermeiren", "Jef", "Vermeiren", "jef.vermeire@gmail.com", "Jefvermeiren1", Role::User),
];

const DEMO_CATEGORIES: [(&str, &str); 2] = [
    ("Food", "All food expenses"),
    ("Electronics", "All electronic expenses"),
];

/// Loads two users, two categories and three payments dated today.
///
/// Does nothing when any user already exists.
pub async fn seed_demo(st: &AppState) -> AppResult<()> {
    if !users::list(st).await?.is_empty() {
        info!("store not empty, skipping demo seed");
        return Ok(());
    }

    for (username, first_name, last_name, email, password, role) in DEMO_USERS {
        users::register(
            st,
            RegisterRequest {
                username: username.into(),
                first_name: first_name.into(),
                last_name: last_name.into(),
                email: email.into(),
                password: password.into(),
                role: Some(role),
            },
        )
        .await?;
    }
    for (name, description) in DEMO_CATEGORIES {
        categories::create(st, name, Some(description)).await?;
    }

    let today = OffsetDateTime::now_utc();
    let demo_payments = [
        ("bramcelis", 100, time!(12:00), "Lunch", "Food"),
        ("jefvermeiren", 50, time!(18:00), "Dinner", "Food"),
        ("bramcelis", 200, time!(12:00), "New gaming mouse", "Electronics"),
    ];
    for (username, amount, at, description, category) in demo_payments {
        payments::create(
            st,
            username,
            CreatePaymentRequest {
                amount: Decimal::from(amount),
                date: Some(today.replace_time(at)),
                description: Some(description.into()),
                category: CategoryRef::Name(category.into()),
                username: None,
            },
        )
        .await?;
    }

    info!(users = DEMO_USERS.len(), payments = demo_payments.len(), "demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::fake;

    #[tokio::test]
    async fn seeds_once_and_logs_in() {
        let (st, _) = fake();
        seed_demo(&st).await.unwrap();
        seed_demo(&st).await.unwrap();

        assert_eq!(users::list(&st).await.unwrap().len(), 2);
        assert_eq!(categories::list(&st).await.unwrap().len(), 2);
        assert_eq!(payments::list(&st).await.unwrap().len(), 3);

        let (_, role) = users::authenticate(&st, "bramcelis", "Bramcelis1").await.unwrap();
        assert_eq!(role, Role::Admin);
        let summary = payments::summary(&st, "bramcelis").await.unwrap();
        assert_eq!(summary.total, Decimal::from(300));
    }
}
