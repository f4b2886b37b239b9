//! Shared data models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// User model (identity and profile store)
///
/// Account creation and sign-in belong to the auth collaborator; this crate
/// reads profiles and maintains the rating and volume aggregates.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub rating_avg: f64,
    pub rating_count: i64,
    pub completed_sales: i64,
    pub completed_trades: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile projection of a user
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub rating_avg: f64,
    pub rating_count: i64,
    pub completed_sales: i64,
    pub completed_trades: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            rating_avg: user.rating_avg,
            rating_count: user.rating_count,
            completed_sales: user.completed_sales,
            completed_trades: user.completed_trades,
            created_at: user.created_at,
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

impl PaginationParams {
    /// Resolve page/limit to a LIMIT/OFFSET pair (limit clamped to 1..=100)
    pub fn to_limit_offset(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(50).clamp(1, 100);
        (limit as i64, ((page - 1) * limit) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams {
            page: None,
            limit: None,
        };
        assert_eq!(params.to_limit_offset(), (50, 0));
    }

    #[test]
    fn test_pagination_clamps_limit() {
        let params = PaginationParams {
            page: Some(2),
            limit: Some(500),
        };
        assert_eq!(params.to_limit_offset(), (100, 100));
    }
}
