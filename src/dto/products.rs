use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{categories, product_sizes, products},
    models::effective_unit_price,
    response::Pagination,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: String,
    pub is_active: bool,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryResponse {
    pub fn from_entity(category: categories::Model, product_count: i64) -> Self {
        Self {
            id: category.id,
            name: category.name,
            slug: category.slug,
            description: category.description,
            thumbnail: category.thumbnail,
            is_active: category.is_active,
            product_count,
            created_at: category.created_at.with_timezone(&Utc),
            updated_at: category.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductSizeRequest {
    pub size: String,
    #[serde(default)]
    pub stock: i32,
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub category_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub sizes: Vec<ProductSizeRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSizeResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub stock: i32,
    pub price: Option<Decimal>,
    pub final_price: Decimal,
    pub is_active: bool,
    pub stock_status: &'static str,
}

impl ProductSizeResponse {
    pub fn from_entity(
        size: product_sizes::Model,
        product_price: Decimal,
        discount_price: Option<Decimal>,
    ) -> Self {
        let final_price = effective_unit_price(product_price, discount_price, size.price);
        Self {
            id: size.id,
            product_id: size.product_id,
            size: size.size,
            stock: size.stock,
            price: size.price,
            final_price,
            is_active: size.is_active,
            stock_status: size_stock_status(size.stock),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub final_price: Decimal,
    pub discount_rate: Decimal,
    pub description: String,
    pub total_stock: i32,
    pub stock_status: &'static str,
    pub thumbnail: String,
    pub images: serde_json::Value,
    pub is_featured: bool,
    pub is_active: bool,
    pub view_count: i64,
    pub average_rating: Decimal,
    pub review_count: i64,
    pub sizes: Vec<ProductSizeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn from_entity(product: products::Model, sizes: Vec<product_sizes::Model>) -> Self {
        let final_price = effective_unit_price(product.price, product.discount_price, None);
        let discount_rate = match product.discount_price {
            Some(d) if d > Decimal::ZERO && d < product.price => {
                ((product.price - d) / product.price * Decimal::from(100)).round_dp(2)
            }
            _ => Decimal::ZERO,
        };

        let sizes = sizes
            .into_iter()
            .map(|s| ProductSizeResponse::from_entity(s, product.price, product.discount_price))
            .collect();

        Self {
            id: product.id,
            category_id: product.category_id,
            name: product.name,
            slug: product.slug,
            price: product.price,
            discount_price: product.discount_price,
            final_price,
            discount_rate,
            description: product.description,
            total_stock: product.total_stock,
            stock_status: product_stock_status(product.total_stock),
            thumbnail: product.thumbnail,
            images: product.images,
            is_featured: product.is_featured,
            is_active: product.is_active,
            view_count: product.view_count,
            average_rating: product.average_rating,
            review_count: product.review_count,
            sizes,
            created_at: product.created_at.with_timezone(&Utc),
            updated_at: product.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub pagination: Pagination,
}

pub fn product_stock_status(total_stock: i32) -> &'static str {
    match total_stock {
        0 => "out_of_stock",
        1..=10 => "low_stock",
        _ => "in_stock",
    }
}

pub fn size_stock_status(stock: i32) -> &'static str {
    match stock {
        0 => "out_of_stock",
        1..=5 => "low_stock",
        _ => "in_stock",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(product_stock_status(0), "out_of_stock");
        assert_eq!(product_stock_status(10), "low_stock");
        assert_eq!(product_stock_status(11), "in_stock");
        assert_eq!(size_stock_status(5), "low_stock");
        assert_eq!(size_stock_status(6), "in_stock");
    }
}
