use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::auth::UserResponse, entity::reviews, response::Pagination};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    pub comment: String,
    pub rating: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub comment: String,
    pub rating: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    pub comment: String,
    pub rating: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewResponse {
    pub fn from_entity(review: reviews::Model, user: Option<UserResponse>) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            user_id: review.user_id,
            user,
            comment: review.comment,
            rating: review.rating,
            is_active: review.is_active,
            created_at: review.created_at.with_timezone(&Utc),
            updated_at: review.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewStats {
    pub total_reviews: i64,
    pub average_rating: Decimal,
    /// Count per star value, keys "1" through "5".
    pub rating_breakdown: BTreeMap<String, i64>,
}

impl ReviewStats {
    pub fn empty() -> Self {
        Self {
            total_reviews: 0,
            average_rating: Decimal::ZERO,
            rating_breakdown: (1..=5).map(|r| (r.to_string(), 0)).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductReviewsResponse {
    pub reviews: Vec<ReviewResponse>,
    pub pagination: Pagination,
    pub statistics: ReviewStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserReviewsResponse {
    pub reviews: Vec<ReviewResponse>,
    pub pagination: Pagination,
}
