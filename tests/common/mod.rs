#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    config::JwtConfig,
    db::{create_orm_conn, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    models::{Product, ROLE_ADMIN, ROLE_CUSTOMER},
    services::product_service,
    state::AppState,
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Fresh in-memory database with the full schema applied.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let orm = create_orm_conn("sqlite::memory:").await?;
    run_migrations(&orm).await?;
    Ok(AppState::new(orm, JwtConfig::new(TEST_SECRET, 1)))
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test User".into()),
        email: Set(email.into()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub async fn customer(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    Ok(AuthUser::customer(create_user(state, ROLE_CUSTOMER, email).await?))
}

pub async fn admin(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    Ok(AuthUser::admin(create_user(state, ROLE_ADMIN, email).await?))
}

pub async fn create_product(state: &AppState, name: &str, price: i64) -> anyhow::Result<Product> {
    let now = Utc::now();
    let model = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(None),
        category: Set("general".into()),
        price: Set(price),
        stock: Set(100),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(product_service::product_from_entity(model))
}

/// Bearer header value for `user`, signed with the test secret.
pub fn bearer(user: &AuthUser) -> String {
    let claims = storefront_api::dto::auth::Claims {
        sub: user.user_id.to_string(),
        email: format!("{}@example.com", user.user_id),
        role: user.role.clone(),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("sign test token");
    format!("Bearer {token}")
}
