use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::{
        auth::UserResponse,
        reviews::{
            CreateReviewRequest, ProductReviewsResponse, ReviewResponse, ReviewStats,
            UpdateReviewRequest, UserReviewsResponse,
        },
    },
    entity::{
        products::{Column as ProdCol, Entity as Products},
        reviews::{self, Column as ReviewCol, Entity as Reviews},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Role,
    response::Pagination,
    routes::params::{ReviewListParams, ReviewSort},
    slug::sanitize,
    state::AppState,
};

fn validate_review_input(comment: &str, rating: i32) -> AppResult<String> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }
    let comment = sanitize(comment);
    let len = comment.chars().count();
    if len < 10 {
        return Err(AppError::Validation(
            "Comment must be at least 10 characters".into(),
        ));
    }
    if len > 1000 {
        return Err(AppError::Validation(
            "Comment must be at most 1000 characters".into(),
        ));
    }
    Ok(comment)
}

#[derive(FromQueryResult)]
struct RatingAggregate {
    count: i64,
    average: Option<Decimal>,
}

/// Recomputes review_count and average_rating from the live active reviews in
/// one aggregate query, inside the caller's transaction.
async fn recompute_product_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<()> {
    let agg = Reviews::find()
        .select_only()
        .column_as(Expr::col(ReviewCol::Id).count(), "count")
        .column_as(SimpleExpr::from(Func::avg(Expr::col(ReviewCol::Rating))), "average")
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::IsActive.eq(true))
        .filter(ReviewCol::DeletedAt.is_null())
        .into_model::<RatingAggregate>()
        .one(conn)
        .await?
        .unwrap_or(RatingAggregate {
            count: 0,
            average: None,
        });

    let average = agg
        .average
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Products::update_many()
        .col_expr(ProdCol::ReviewCount, Expr::value(agg.count))
        .col_expr(ProdCol::AverageRating, Expr::value(average))
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn load_review(state: &AppState, id: Uuid) -> AppResult<reviews::Model> {
    Reviews::find_by_id(id)
        .filter(ReviewCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Review"))
}

fn ensure_owner_or_admin(review: &reviews::Model, user: &AuthUser) -> AppResult<()> {
    if review.user_id != user.user_id && user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    req: CreateReviewRequest,
) -> AppResult<ReviewResponse> {
    let comment = validate_review_input(&req.comment, req.rating)?;

    let product = Products::find_by_id(req.product_id)
        .filter(ProdCol::DeletedAt.is_null())
        .filter(ProdCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::NotFound("Product"));
    }

    let existing = Reviews::find()
        .filter(ReviewCol::DeletedAt.is_null())
        .filter(ReviewCol::ProductId.eq(req.product_id))
        .filter(ReviewCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "You have already reviewed this product".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let review = reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(req.product_id),
        user_id: Set(user.user_id),
        comment: Set(comment),
        rating: Set(req.rating),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&txn)
    .await?;
    recompute_product_rating(&txn, req.product_id).await?;
    txn.commit().await?;

    let author = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .map(UserResponse::from);
    Ok(ReviewResponse::from_entity(review, author))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    req: UpdateReviewRequest,
) -> AppResult<ReviewResponse> {
    let review = load_review(state, id).await?;
    ensure_owner_or_admin(&review, user)?;

    let comment = validate_review_input(&req.comment, req.rating)?;
    let rating_changed = review.rating != req.rating;
    let product_id = review.product_id;

    let txn = state.orm.begin().await?;
    let mut active: reviews::ActiveModel = review.into();
    active.comment = Set(comment);
    active.rating = Set(req.rating);
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&txn).await?;
    if rating_changed {
        recompute_product_rating(&txn, product_id).await?;
    }
    txn.commit().await?;

    let author = Users::find_by_id(review.user_id)
        .one(&state.orm)
        .await?
        .map(UserResponse::from);
    Ok(ReviewResponse::from_entity(review, author))
}

pub async fn delete_review(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let review = load_review(state, id).await?;
    ensure_owner_or_admin(&review, user)?;
    let product_id = review.product_id;

    let txn = state.orm.begin().await?;
    let mut active: reviews::ActiveModel = review.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.update(&txn).await?;
    recompute_product_rating(&txn, product_id).await?;
    txn.commit().await?;
    Ok(())
}

#[derive(FromQueryResult)]
struct RatingBucket {
    rating: i32,
    count: i64,
}

pub async fn review_stats(state: &AppState, product_id: Uuid) -> AppResult<ReviewStats> {
    let live = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::IsActive.eq(true))
        .filter(ReviewCol::DeletedAt.is_null());

    let agg = live
        .clone()
        .select_only()
        .column_as(Expr::col(ReviewCol::Id).count(), "count")
        .column_as(SimpleExpr::from(Func::avg(Expr::col(ReviewCol::Rating))), "average")
        .into_model::<RatingAggregate>()
        .one(&state.orm)
        .await?
        .unwrap_or(RatingAggregate {
            count: 0,
            average: None,
        });

    let buckets = live
        .select_only()
        .column(ReviewCol::Rating)
        .column_as(Expr::col(ReviewCol::Id).count(), "count")
        .group_by(ReviewCol::Rating)
        .into_model::<RatingBucket>()
        .all(&state.orm)
        .await?;

    let mut stats = ReviewStats::empty();
    stats.total_reviews = agg.count;
    stats.average_rating = agg
        .average
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    for bucket in buckets {
        stats
            .rating_breakdown
            .insert(bucket.rating.to_string(), bucket.count);
    }
    Ok(stats)
}

fn apply_sort(
    finder: sea_orm::Select<Reviews>,
    sort: Option<&str>,
) -> sea_orm::Select<Reviews> {
    match ReviewSort::parse(sort) {
        ReviewSort::Newest => finder.order_by_desc(ReviewCol::CreatedAt),
        ReviewSort::Oldest => finder.order_by_asc(ReviewCol::CreatedAt),
        ReviewSort::RatingHigh => finder
            .order_by_desc(ReviewCol::Rating)
            .order_by_desc(ReviewCol::CreatedAt),
        ReviewSort::RatingLow => finder
            .order_by_asc(ReviewCol::Rating)
            .order_by_desc(ReviewCol::CreatedAt),
    }
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
    params: &ReviewListParams,
    admin: bool,
) -> AppResult<ProductReviewsResponse> {
    let (page, limit, offset) = params.page.normalize(10);

    let mut finder = Reviews::find()
        .filter(ReviewCol::DeletedAt.is_null())
        .filter(ReviewCol::ProductId.eq(product_id));
    if let Some(rating) = params.rating {
        finder = finder.filter(ReviewCol::Rating.eq(rating));
    }
    let active_filter = if admin { params.is_active } else { Some(true) };
    if let Some(is_active) = active_filter {
        finder = finder.filter(ReviewCol::IsActive.eq(is_active));
    }
    finder = apply_sort(finder, params.sort.as_deref());

    let total = finder.clone().count(&state.orm).await? as i64;
    let reviews = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let user_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
    let users: HashMap<Uuid, UserResponse> = Users::find()
        .filter(UserCol::Id.is_in(user_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, UserResponse::from(u)))
        .collect();

    let reviews = reviews
        .into_iter()
        .map(|r| {
            let user = users.get(&r.user_id).cloned();
            ReviewResponse::from_entity(r, user)
        })
        .collect();

    Ok(ProductReviewsResponse {
        reviews,
        pagination: Pagination::new(page, limit, total),
        statistics: review_stats(state, product_id).await?,
    })
}

pub async fn list_user_reviews(
    state: &AppState,
    user_id: Uuid,
    params: &ReviewListParams,
) -> AppResult<UserReviewsResponse> {
    let (page, limit, offset) = params.page.normalize(10);

    let mut finder = Reviews::find()
        .filter(ReviewCol::DeletedAt.is_null())
        .filter(ReviewCol::UserId.eq(user_id));
    if let Some(product_id) = params.product_id {
        finder = finder.filter(ReviewCol::ProductId.eq(product_id));
    }
    if let Some(rating) = params.rating {
        finder = finder.filter(ReviewCol::Rating.eq(rating));
    }
    finder = apply_sort(finder, params.sort.as_deref());

    let total = finder.clone().count(&state.orm).await? as i64;
    let reviews = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| ReviewResponse::from_entity(r, None))
        .collect();

    Ok(UserReviewsResponse {
        reviews,
        pagination: Pagination::new(page, limit, total),
    })
}
