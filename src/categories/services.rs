use tracing::info;

use crate::{
    categories::repo_types::Category,
    error::{AppError, AppResult},
    state::AppState,
};

pub(crate) fn category_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    Ok(name.to_string())
}

pub async fn list(st: &AppState) -> AppResult<Vec<Category>> {
    st.categories.list().await
}

pub async fn create(st: &AppState, name: &str, description: Option<&str>) -> AppResult<Category> {
    let name = category_name(name)?;
    if st.categories.find_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict(format!("Category {name} already exists")));
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let category = st.categories.create(&name, description).await?;
    info!(category_id = %category.id, name = %category.name, "category created");
    Ok(category)
}

/// Looks the category up by name and creates it when missing.
pub async fn ensure(st: &AppState, name: &str) -> AppResult<Category> {
    let name = category_name(name)?;
    let category = st.categories.ensure(&name).await?;
    Ok(category)
}
