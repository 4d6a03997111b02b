mod common;

use rust_decimal::Decimal;
use storefront_api::{
    dto::products::{CategoryRequest, ProductRequest, ProductSizeRequest},
    error::AppError,
    routes::params::ProductListParams,
    services::catalog_service,
};

fn size(name: &str, stock: i32) -> ProductSizeRequest {
    ProductSizeRequest {
        size: name.into(),
        stock,
        price: None,
        is_active: None,
    }
}

fn product_request(category_id: uuid::Uuid, name: &str, sizes: Vec<ProductSizeRequest>) -> ProductRequest {
    ProductRequest {
        category_id,
        name: name.into(),
        price: Decimal::from(200_000),
        discount_price: None,
        description: "Bản phối màu mới cho mùa hè".into(),
        thumbnail: String::new(),
        images: vec![],
        is_featured: None,
        is_active: None,
        sizes,
    }
}

// Catalog writes: slug uniqueness, size validation, transactional
// product-with-sizes updates and the search path.
#[tokio::test]
async fn catalog_admin_flow() -> anyhow::Result<()> {
    let Some((state, _notifier)) = common::setup_state().await? else {
        eprintln!("Skipping: set TEST_DATABASE_URL or DATABASE_URL to run integration flows.");
        return Ok(());
    };

    let category = catalog_service::create_category(
        &state,
        CategoryRequest {
            name: "Giày thể thao".into(),
            description: String::new(),
            thumbnail: String::new(),
            is_active: None,
        },
    )
    .await?;
    assert_eq!(category.slug, "giay-the-thao");

    // A different name with the same folded slug conflicts.
    let clash = catalog_service::create_category(
        &state,
        CategoryRequest {
            name: "Giày Thể Thao".into(),
            description: String::new(),
            thumbnail: String::new(),
            is_active: None,
        },
    )
    .await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));

    // Sizes must exist, be unique case-insensitively, and discount < price.
    let no_sizes = catalog_service::create_product(
        &state,
        product_request(category.id, "Runner Đỏ", vec![]),
    )
    .await;
    assert!(matches!(no_sizes, Err(AppError::Validation(_))));

    let dup_sizes = catalog_service::create_product(
        &state,
        product_request(category.id, "Runner Đỏ", vec![size("M", 2), size("m", 3)]),
    )
    .await;
    assert!(matches!(dup_sizes, Err(AppError::Validation(_))));

    let mut bad_discount = product_request(category.id, "Runner Đỏ", vec![size("M", 2)]);
    bad_discount.discount_price = Some(Decimal::from(200_000));
    let bad_discount = catalog_service::create_product(&state, bad_discount).await;
    assert!(matches!(bad_discount, Err(AppError::Validation(_))));

    // total_stock is the sum of the submitted sizes.
    let product = catalog_service::create_product(
        &state,
        product_request(
            category.id,
            "Runner Đỏ",
            vec![size("M", 2), size("L", 3)],
        ),
    )
    .await?;
    assert_eq!(product.slug, "runner-do");
    assert_eq!(product.total_stock, 5);
    assert_eq!(product.sizes.len(), 2);

    // Product slug conflicts are caught too.
    let clash = catalog_service::create_product(
        &state,
        product_request(category.id, "Runner đỏ", vec![size("S", 1)]),
    )
    .await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));

    // Update replaces the size set wholesale and recomputes total_stock.
    let updated = catalog_service::update_product(
        &state,
        product.id,
        product_request(category.id, "Runner Đỏ", vec![size("XL", 7)]),
    )
    .await?;
    assert_eq!(updated.total_stock, 7);
    assert_eq!(updated.sizes.len(), 1);
    assert_eq!(updated.sizes[0].size, "XL");

    // Public listing pins is_active; the admin override reaches hidden rows.
    let mut hidden = product_request(category.id, "Runner Ẩn", vec![size("M", 1)]);
    hidden.is_active = Some(false);
    catalog_service::create_product(&state, hidden).await?;

    let (public, _, _, total) =
        catalog_service::list_products(&state, &ProductListParams::default(), false).await?;
    assert_eq!(total, 1);
    assert!(public.iter().all(|p| p.is_active));

    let admin_params = ProductListParams {
        is_active: Some(false),
        ..Default::default()
    };
    let (_, _, _, hidden_total) =
        catalog_service::list_products(&state, &admin_params, true).await?;
    assert_eq!(hidden_total, 1);

    // Search: tokens AND across the row, OR across name/description.
    let (hits, _, _, search_total) =
        catalog_service::search_products(&state, "runner mùa", 1, 20, 0).await?;
    assert_eq!(search_total, 1);
    assert_eq!(hits[0].slug, "runner-do");

    let (_, _, _, miss_total) =
        catalog_service::search_products(&state, "runner xanh", 1, 20, 0).await?;
    assert_eq!(miss_total, 0);

    // A category with live products refuses deletion.
    let blocked = catalog_service::delete_category(&state, category.id).await;
    assert!(matches!(blocked, Err(AppError::FailedPrecondition(_))));

    Ok(())
}
