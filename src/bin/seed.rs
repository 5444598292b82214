use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{products, users},
    models::{ROLE_ADMIN, ROLE_CUSTOMER},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "Admin", "admin@example.com", "admin123", ROLE_ADMIN).await?;
    let user_id =
        ensure_user(&orm, "Customer", "user@example.com", "user123", ROLE_CUSTOMER).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?;

    let now = Utc::now();
    let user_id = match existing {
        Some(user) if user.role == role => user.id,
        Some(user) => {
            let mut active: users::ActiveModel = user.into();
            active.role = Set(role.to_string());
            active.updated_at = Set(now.into());
            active.update(orm).await?.id
        }
        None => {
            users::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name.to_string()),
                email: Set(email.to_string()),
                password_hash: Set(hash_password(password)?),
                role: Set(role.to_string()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(orm)
            .await?
            .id
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let catalog = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", "apparel", 5500, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", "kitchen", 1200, 100),
        ("Rust Sticker Pack", "Decorate your laptop", "accessories", 500, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", "books", 2500, 75),
    ];

    for (name, description, category, price, stock) in catalog {
        let exists = products::Entity::find()
            .filter(products::Column::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let now = Utc::now();
        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            category: Set(category.to_string()),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
