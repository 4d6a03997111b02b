use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Returns (page, limit, offset) with the given default page size and a
    /// hard cap of 100.
    pub fn normalize(&self, default_limit: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 100);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

/// Product list sort keys. Unknown values fall back to `newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Newest,
    Oldest,
    Rating,
    Popular,
}

impl ProductSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "price_asc" => ProductSort::PriceAsc,
            "price_desc" => ProductSort::PriceDesc,
            "name_asc" => ProductSort::NameAsc,
            "name_desc" => ProductSort::NameDesc,
            "oldest" => ProductSort::Oldest,
            "rating" => ProductSort::Rating,
            "popular" => ProductSort::Popular,
            _ => ProductSort::Newest,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductListParams {
    #[serde(flatten)]
    pub page: PageParams,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_featured: Option<bool>,
    /// Honored only on admin routes; public reads pin `true`.
    pub is_active: Option<bool>,
    pub in_stock: Option<bool>,
    pub sort: Option<String>,
}

/// Review list sort keys. Unknown values fall back to `newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSort {
    Newest,
    Oldest,
    RatingHigh,
    RatingLow,
}

impl ReviewSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or_default() {
            "oldest" => ReviewSort::Oldest,
            "rating_high" => ReviewSort::RatingHigh,
            "rating_low" => ReviewSort::RatingLow,
            _ => ReviewSort::Newest,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewListParams {
    #[serde(flatten)]
    pub page: PageParams,
    pub product_id: Option<Uuid>,
    pub rating: Option<i32>,
    pub is_active: Option<bool>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SearchParams {
    #[serde(flatten)]
    pub page: PageParams,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FeaturedParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CategoryListParams {
    /// Honored only on admin routes.
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_and_offsets() {
        let params = PageParams {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(params.normalize(20), (3, 100, 200));

        let params = PageParams {
            page: Some(-1),
            limit: None,
        };
        assert_eq!(params.normalize(10), (1, 10, 0));
    }

    #[test]
    fn unknown_sorts_fall_back_to_newest() {
        assert_eq!(ProductSort::parse(Some("price_asc")), ProductSort::PriceAsc);
        assert_eq!(ProductSort::parse(Some("bogus")), ProductSort::Newest);
        assert_eq!(ProductSort::parse(None), ProductSort::Newest);
        assert_eq!(ReviewSort::parse(Some("rating_low")), ReviewSort::RatingLow);
        assert_eq!(ReviewSort::parse(Some("bogus")), ReviewSort::Newest);
    }
}
