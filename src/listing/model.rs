//! Card listing models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A physical trading card listed on the marketplace
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub series: String,
    pub card_number: String,
    pub pokemon_name: Option<String>,
    pub card_type: Option<String>,
    pub rarity: Option<String>,
    pub condition: CardCondition,
    pub condition_score: i32,
    pub price_cents: i64,
    pub images: Vec<String>,
    pub status: CardStatus,
    pub accepts_trade: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Physical condition grades
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "card_condition", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CardCondition {
    Mint,
    NearMint,
    Excellent,
    VeryGood,
    Good,
    LightlyPlayed,
    ModeratelyPlayed,
    HeavilyPlayed,
    Poor,
}

impl CardCondition {
    /// Human-readable label, as shown on the listing
    pub fn label(&self) -> &'static str {
        match self {
            CardCondition::Mint => "Mint",
            CardCondition::NearMint => "Near Mint",
            CardCondition::Excellent => "Excellent",
            CardCondition::VeryGood => "Very Good",
            CardCondition::Good => "Good",
            CardCondition::LightlyPlayed => "Lightly Played",
            CardCondition::ModeratelyPlayed => "Moderately Played",
            CardCondition::HeavilyPlayed => "Heavily Played",
            CardCondition::Poor => "Poor",
        }
    }
}

/// Listing lifecycle status; only the transaction engine moves a card out of
/// `active`, and cards are never hard-deleted
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "card_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Pending,
    Sold,
    Traded,
}

/// Request DTO for listing a card
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCardRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "series must not be empty"))]
    pub series: String,
    #[validate(length(min = 1, message = "card number must not be empty"))]
    pub card_number: String,
    pub pokemon_name: Option<String>,
    pub card_type: Option<String>,
    pub rarity: Option<String>,
    pub condition: CardCondition,
    #[validate(range(min = 1, max = 10, message = "condition score must be 1-10"))]
    pub condition_score: i32,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price_cents: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub accepts_trade: bool,
}

/// Request DTO for editing an active listing
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCardRequest {
    pub condition: Option<CardCondition>,
    #[validate(range(min = 1, max = 10, message = "condition score must be 1-10"))]
    pub condition_score: Option<i32>,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price_cents: Option<i64>,
    pub images: Option<Vec<String>>,
    pub accepts_trade: Option<bool>,
}

/// Query parameters for browsing active listings
#[derive(Debug, Default, Deserialize)]
pub struct FilterCardsQuery {
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub condition: Option<CardCondition>,
    pub series: Option<String>,
    pub accepts_trade: Option<bool>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Query parameters for text search
#[derive(Debug, Deserialize)]
pub struct SearchCardsQuery {
    pub query: String,
    pub limit: Option<i32>,
}
