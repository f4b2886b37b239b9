//! Profile service layer
//!
//! Read side of the identity and profile store. Rating and volume aggregates
//! are written by the review service and the transaction engine.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{User, UserProfile};

/// Service for user profiles
#[derive(Clone)]
pub struct ProfileService {
    db_pool: PgPool,
}

impl ProfileService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Public profile projection for a user
    pub async fn get_profile(&self, user_id: Uuid) -> ApiResult<UserProfile> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user_id)))?;

        Ok(user.into())
    }
}
