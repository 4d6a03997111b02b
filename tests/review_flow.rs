mod common;

use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use storefront_api::{
    dto::reviews::{CreateReviewRequest, UpdateReviewRequest},
    entity::products,
    error::AppError,
    middleware::auth::AuthUser,
    models::Role,
    routes::params::ReviewListParams,
    services::review_service,
};

fn reviewer(user: &storefront_api::entity::users::Model) -> AuthUser {
    AuthUser {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        csrf_token: String::new(),
    }
}

// Rating aggregates follow the active review set through create, update and
// delete, and the one-review-per-user rule holds.
#[tokio::test]
async fn review_aggregation_flow() -> anyhow::Result<()> {
    let Some((state, _notifier)) = common::setup_state().await? else {
        eprintln!("Skipping: set TEST_DATABASE_URL or DATABASE_URL to run integration flows.");
        return Ok(());
    };

    let category = common::create_category(&state, "Books").await?;
    let (product, _) =
        common::create_product_with_size(&state, category.id, "Novel", "Std", 5, 150_000).await?;

    assert_eq!(product.review_count, 0);
    assert_eq!(product.average_rating, Decimal::ZERO);

    let u1 = common::create_user(&state, "u1@example.com", Role::User).await?;
    let u2 = common::create_user(&state, "u2@example.com", Role::User).await?;
    let u3 = common::create_user(&state, "u3@example.com", Role::User).await?;

    let mut reviews = Vec::new();
    for (user, rating) in [(&u1, 5), (&u2, 3), (&u3, 4)] {
        let review = review_service::create_review(
            &state,
            &reviewer(user),
            CreateReviewRequest {
                product_id: product.id,
                comment: format!("A thoughtful review worth {rating} stars."),
                rating,
            },
        )
        .await?;
        reviews.push(review);
    }

    let current = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(current.review_count, 3);
    assert_eq!(current.average_rating, Decimal::new(400, 2));

    // Short comments and out-of-range ratings are rejected.
    let short = review_service::create_review(
        &state,
        &reviewer(&u1),
        CreateReviewRequest {
            product_id: product.id,
            comment: "too short".into(),
            rating: 4,
        },
    )
    .await;
    assert!(matches!(short, Err(AppError::Validation(_))));

    // A second review by the same user conflicts.
    let dup = review_service::create_review(
        &state,
        &reviewer(&u2),
        CreateReviewRequest {
            product_id: product.id,
            comment: "Trying to review this one twice.".into(),
            rating: 5,
        },
    )
    .await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    // u2 drops to one star: (5 + 1 + 4) / 3 = 3.33.
    review_service::update_review(
        &state,
        &reviewer(&u2),
        reviews[1].id,
        UpdateReviewRequest {
            comment: "Changed my mind about this one.".into(),
            rating: 1,
        },
    )
    .await?;

    let current = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(current.review_count, 3);
    assert_eq!(current.average_rating, Decimal::new(333, 2));

    // Only the owner (or an admin) may touch a review.
    let foreign = review_service::update_review(
        &state,
        &reviewer(&u3),
        reviews[1].id,
        UpdateReviewRequest {
            comment: "Not mine to change at all.".into(),
            rating: 5,
        },
    )
    .await;
    assert!(matches!(foreign, Err(AppError::Forbidden)));

    // u1 deletes: (1 + 4) / 2 = 2.5.
    review_service::delete_review(&state, &reviewer(&u1), reviews[0].id).await?;

    let current = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(current.review_count, 2);
    assert_eq!(current.average_rating, Decimal::new(250, 2));

    // The statistics object mirrors the aggregate plus the per-star counts.
    let listing = review_service::list_product_reviews(
        &state,
        product.id,
        &ReviewListParams::default(),
        false,
    )
    .await?;
    assert_eq!(listing.reviews.len(), 2);
    assert_eq!(listing.statistics.total_reviews, 2);
    assert_eq!(listing.statistics.average_rating, Decimal::new(250, 2));
    assert_eq!(listing.statistics.rating_breakdown["1"], 1);
    assert_eq!(listing.statistics.rating_breakdown["4"], 1);
    assert_eq!(listing.statistics.rating_breakdown["5"], 0);

    // Deleting frees the slot for a fresh review by the same user.
    review_service::create_review(
        &state,
        &reviewer(&u1),
        CreateReviewRequest {
            product_id: product.id,
            comment: "Second take after re-reading it.".into(),
            rating: 2,
        },
    )
    .await?;
    let current = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(current.review_count, 3);

    Ok(())
}
