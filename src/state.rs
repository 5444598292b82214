use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::JwtConfig, locks::UserLocks};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub jwt: Arc<JwtConfig>,
    pub cart_locks: UserLocks,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, jwt: JwtConfig) -> Self {
        Self {
            orm,
            jwt: Arc::new(jwt),
            cart_locks: UserLocks::new(),
        }
    }
}
