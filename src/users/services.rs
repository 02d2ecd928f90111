use anyhow::Context;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    filters::ListQuery,
    model::{NewUser, User, UserChanges},
    pagination::Page,
    repo::{StoreError, UserStore},
    validation::{NewUserInput, MIN_PASSWORD_LENGTH},
};
use crate::{auth::password::hash_password, config::AdminSeed, error::AppError};

pub const INDEX_PATH: &str = "/user-management";

pub async fn list_users(store: &dyn UserStore, query: &ListQuery) -> Result<Page<User>, StoreError> {
    let total = store.count(query).await?;
    let users = store.fetch_page(query).await?;
    debug!(
        total,
        returned = users.len(),
        page = query.page,
        engine = ?store.engine(),
        strategy = store.search_strategy_name(),
        "listed users"
    );
    Ok(Page::new(users, total, query, INDEX_PATH))
}

pub async fn find_user(store: &dyn UserStore, id: Uuid) -> Result<User, AppError> {
    store.find(id).await?.ok_or(AppError::NotFound)
}

pub async fn create_user(
    store: &dyn UserStore,
    input: NewUserInput,
    is_admin: bool,
) -> Result<User, AppError> {
    let password_hash = hash_password(&input.password)?;
    let user = store
        .create(&NewUser {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            password_hash,
            is_admin,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn update_user(
    store: &dyn UserStore,
    id: Uuid,
    changes: UserChanges,
) -> Result<User, AppError> {
    let user = store.update(id, &changes).await?.ok_or(AppError::NotFound)?;
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

pub async fn delete_user(store: &dyn UserStore, id: Uuid) -> Result<(), AppError> {
    if !store.delete(id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

/// Makes sure the configured bootstrap admin exists. An existing account
/// with that email is left untouched.
pub async fn ensure_admin(store: &dyn UserStore, seed: &AdminSeed) -> anyhow::Result<()> {
    if let Some(existing) = store.find_by_email(&seed.email).await? {
        if !existing.is_admin {
            warn!(email = %seed.email, "seed admin email belongs to a non-admin account");
        }
        return Ok(());
    }

    anyhow::ensure!(
        seed.password.chars().count() >= MIN_PASSWORD_LENGTH,
        "ADMIN_PASSWORD must be at least {MIN_PASSWORD_LENGTH} characters"
    );

    let input = NewUserInput {
        name: seed.name.clone(),
        email: seed.email.clone(),
        password: seed.password.clone(),
    };
    create_user(store, input, true)
        .await
        .context("seeding admin account")?;
    Ok(())
}
