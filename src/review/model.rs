//! Review models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A rating attached to a completed transaction, authored by one participant
/// about the other
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub card_condition_accuracy: Option<i32>,
    pub communication_rating: Option<i32>,
    pub shipping_rating: Option<i32>,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a review
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub transaction_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "rating must be 1-5"))]
    pub rating: i32,
    pub comment: Option<String>,
    #[validate(range(min = 1, max = 5, message = "sub-ratings must be 1-5"))]
    pub card_condition_accuracy: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "sub-ratings must be 1-5"))]
    pub communication_rating: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "sub-ratings must be 1-5"))]
    pub shipping_rating: Option<i32>,
    #[serde(default)]
    pub photos: Vec<String>,
}
