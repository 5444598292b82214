use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::JwtConfig,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ROLE_CUSTOMER, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let name = validate_name(&payload.name)?;
    let email = validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    ensure_email_free(state, &email, None).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(ROLE_CUSTOMER.to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = %user.id, "user registered");
    audit::record(
        state,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", user_from_entity(user), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = normalize_email(&payload.email);
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_credentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(invalid_credentials());
    }

    let token = issue_token(&state.jwt, &user)?;

    audit::record(
        state,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = LoginResponse {
        token,
        user: user_from_entity(user),
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("Profile retrieved", user, None))
}

/// Applies the supplied fields to the caller's own record.
pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let name = payload.name.as_deref().map(validate_name).transpose()?;
    let email = payload.email.as_deref().map(validate_email).transpose()?;
    if let Some(password) = payload.password.as_deref() {
        validate_password(password)?;
    }

    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if let Some(email) = email.as_deref() {
        ensure_email_free(state, email, Some(existing.id)).await?;
    }
    let password_hash = payload.password.as_deref().map(hash_password).transpose()?;

    let mut changed = Vec::new();
    let mut active: UserActive = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
        changed.push("name");
    }
    if let Some(email) = email {
        active.email = Set(email);
        changed.push("email");
    }
    if let Some(hash) = password_hash {
        active.password_hash = Set(hash);
        changed.push("password");
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    tracing::info!(user_id = %updated.id, fields = ?changed, "user profile updated");
    audit::record(
        state,
        Some(updated.id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": updated.id, "fields": changed }),
    )
    .await;

    Ok(ApiResponse::success(
        "User profile updated successfully",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

/// Signs an HS256 token carrying `sub`, `email`, `role` and `exp`.
pub fn issue_token(jwt: &JwtConfig, user: &UserModel) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(jwt.ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AppError::bad_request("email is invalid"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// `owner` is the user allowed to already hold `email`.
async fn ensure_email_free(state: &AppState, email: &str, owner: Option<Uuid>) -> AppResult<()> {
    let mut finder = Users::find().filter(UserCol::Email.eq(email));
    if let Some(owner) = owner {
        finder = finder.filter(UserCol::Id.ne(owner));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::bad_request("Email is already taken"));
    }
    Ok(())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
