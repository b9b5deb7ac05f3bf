//! In-process store used when no `DATABASE_URL` is configured, and by tests.
//!
//! Mirrors the constraints of the SQL schema: unique usernames, emails and
//! category names, payments referencing existing rows, and cascade of a
//! user's payments on delete.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::categories::{repo::CategoryRepo, repo_types::Category};
use crate::error::{AppError, AppResult};
use crate::payments::{
    repo::PaymentRepo,
    repo_types::{CategoryTotal, NewPayment, Payment, PaymentView},
};
use crate::users::{
    repo::UserRepo,
    repo_types::{NewUser, User, UserChanges},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    payments: Vec<Payment>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn list(&self) -> AppResult<Vec<User>> {
        let t = self.tables.lock().await;
        let mut users = t.users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut t = self.tables.lock().await;
        if t
            .users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(AppError::Conflict("Record already exists".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, username: &str, changes: &UserChanges) -> AppResult<Option<User>> {
        let mut t = self.tables.lock().await;
        if let Some(email) = &changes.email {
            if t
                .users
                .iter()
                .any(|u| &u.email == email && u.username != username)
            {
                return Err(AppError::Conflict("Record already exists".into()));
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.username == username) else {
            return Ok(None);
        };
        changes.apply(user);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, username: &str) -> AppResult<bool> {
        let mut t = self.tables.lock().await;
        let Some(pos) = t.users.iter().position(|u| u.username == username) else {
            return Ok(false);
        };
        let removed = t.users.remove(pos);
        t.payments.retain(|p| p.user_id != removed.id);
        Ok(true)
    }
}

#[async_trait]
impl CategoryRepo for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Category>> {
        let t = self.tables.lock().await;
        let mut categories = t.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let t = self.tables.lock().await;
        Ok(t.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn create(&self, name: &str, description: Option<&str>) -> AppResult<Category> {
        let mut t = self.tables.lock().await;
        if t.categories.iter().any(|c| c.name == name) {
            return Err(AppError::Conflict("Record already exists".into()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        t.categories.push(category.clone());
        Ok(category)
    }

    async fn ensure(&self, name: &str) -> AppResult<Category> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t.categories.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.categories.push(category.clone());
        Ok(category)
    }
}

#[async_trait]
impl PaymentRepo for MemoryStore {
    async fn list(&self) -> AppResult<Vec<PaymentView>> {
        let t = self.tables.lock().await;
        let mut views: Vec<(OffsetDateTime, PaymentView)> = t
            .payments
            .iter()
            .filter_map(|p| {
                let user = t.users.iter().find(|u| u.id == p.user_id)?;
                let category = t.categories.iter().find(|c| c.id == p.category_id)?;
                Some((
                    p.created_at,
                    PaymentView {
                        id: p.id,
                        amount: p.amount,
                        date: p.date,
                        description: p.description.clone(),
                        username: user.username.clone(),
                        category: category.name.clone(),
                    },
                ))
            })
            .collect();
        views.sort_by(|(ca, a), (cb, b)| b.date.cmp(&a.date).then(cb.cmp(ca)));
        Ok(views.into_iter().map(|(_, v)| v).collect())
    }

    async fn create(&self, new: NewPayment) -> AppResult<Payment> {
        let mut t = self.tables.lock().await;
        let user_exists = t.users.iter().any(|u| u.id == new.user_id);
        let category_exists = t.categories.iter().any(|c| c.id == new.category_id);
        if !user_exists || !category_exists {
            return Err(AppError::not_found("Referenced record does not exist"));
        }
        let payment = Payment {
            id: Uuid::new_v4(),
            amount: new.amount,
            date: new.date,
            description: new.description,
            user_id: new.user_id,
            category_id: new.category_id,
            created_at: OffsetDateTime::now_utc(),
        };
        t.payments.push(payment.clone());
        Ok(payment)
    }

    async fn totals_by_category(&self, user_id: Uuid) -> AppResult<Vec<CategoryTotal>> {
        let t = self.tables.lock().await;
        let mut sums: HashMap<Uuid, (Decimal, i64)> = HashMap::new();
        for p in t.payments.iter().filter(|p| p.user_id == user_id) {
            let entry = sums.entry(p.category_id).or_insert((Decimal::ZERO, 0));
            entry.0 += p.amount;
            entry.1 += 1;
        }
        let mut totals: Vec<CategoryTotal> = sums
            .into_iter()
            .filter_map(|(category_id, (total, payments))| {
                let name = t.categories.iter().find(|c| c.id == category_id)?.name.clone();
                Some(CategoryTotal {
                    category: name,
                    total,
                    payments,
                })
            })
            .collect();
        totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
        Ok(totals)
    }
}
