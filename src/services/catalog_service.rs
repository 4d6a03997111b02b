use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::products::{
        CategoryRequest, CategoryResponse, ProductRequest, ProductResponse, ProductSizeRequest,
    },
    entity::{
        categories::{self, Column as CatCol, Entity as Categories},
        product_sizes::{self, Column as SizeCol, Entity as ProductSizes},
        products::{self, Column as ProdCol, Entity as Products},
        reviews::{Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    routes::params::{ProductListParams, ProductSort},
    slug::{sanitize, slugify},
    state::AppState,
};

// ---------------------------------------------------------------- categories

#[derive(FromQueryResult)]
struct CategoryProductCount {
    category_id: Uuid,
    count: i64,
}

async fn product_counts(conn: &OrmConn) -> AppResult<HashMap<Uuid, i64>> {
    let rows = Products::find()
        .select_only()
        .column(ProdCol::CategoryId)
        .column_as(Expr::col(ProdCol::Id).count(), "count")
        .filter(ProdCol::DeletedAt.is_null())
        .group_by(ProdCol::CategoryId)
        .into_model::<CategoryProductCount>()
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| (r.category_id, r.count)).collect())
}

pub async fn list_categories(
    state: &AppState,
    is_active: Option<bool>,
    admin: bool,
) -> AppResult<Vec<CategoryResponse>> {
    let mut condition = Condition::all().add(CatCol::DeletedAt.is_null());
    // The is_active override is an admin affordance; public reads pin true.
    let filter = if admin { is_active } else { Some(true) };
    if let Some(active) = filter {
        condition = condition.add(CatCol::IsActive.eq(active));
    }

    let categories = Categories::find()
        .filter(condition)
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?;
    let counts = product_counts(&state.orm).await?;

    Ok(categories
        .into_iter()
        .map(|c| {
            let count = counts.get(&c.id).copied().unwrap_or(0);
            CategoryResponse::from_entity(c, count)
        })
        .collect())
}

async fn find_live_category(conn: &OrmConn, id: Uuid) -> AppResult<categories::Model> {
    Categories::find_by_id(id)
        .filter(CatCol::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Category"))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<CategoryResponse> {
    let category = find_live_category(&state.orm, id).await?;
    let count = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .filter(ProdCol::DeletedAt.is_null())
        .count(&state.orm)
        .await? as i64;
    Ok(CategoryResponse::from_entity(category, count))
}

pub async fn get_category_by_slug(state: &AppState, slug: &str) -> AppResult<CategoryResponse> {
    let category = Categories::find()
        .filter(CatCol::DeletedAt.is_null())
        .filter(CatCol::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let count = Products::find()
        .filter(ProdCol::CategoryId.eq(category.id))
        .filter(ProdCol::DeletedAt.is_null())
        .count(&state.orm)
        .await? as i64;
    Ok(CategoryResponse::from_entity(category, count))
}

async fn category_slug_taken(conn: &OrmConn, slug: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let mut finder = Categories::find()
        .filter(CatCol::DeletedAt.is_null())
        .filter(CatCol::Slug.eq(slug));
    if let Some(id) = exclude {
        finder = finder.filter(CatCol::Id.ne(id));
    }
    Ok(finder.one(conn).await?.is_some())
}

pub async fn create_category(
    state: &AppState,
    payload: CategoryRequest,
) -> AppResult<CategoryResponse> {
    let name = sanitize(&payload.name);
    if name.len() < 2 {
        return Err(AppError::Validation(
            "Category name must be at least 2 characters".into(),
        ));
    }

    let slug = slugify(&name);
    if category_slug_taken(&state.orm, &slug, None).await? {
        return Err(AppError::Conflict(
            "Category with this name already exists".into(),
        ));
    }

    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(slug),
        description: Set(sanitize(&payload.description)),
        thumbnail: Set(payload.thumbnail),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(CategoryResponse::from_entity(category, 0))
}

pub async fn update_category(
    state: &AppState,
    id: Uuid,
    payload: CategoryRequest,
) -> AppResult<CategoryResponse> {
    let category = find_live_category(&state.orm, id).await?;

    let name = sanitize(&payload.name);
    if name.len() < 2 {
        return Err(AppError::Validation(
            "Category name must be at least 2 characters".into(),
        ));
    }

    let slug = slugify(&name);
    if slug != category.slug && category_slug_taken(&state.orm, &slug, Some(id)).await? {
        return Err(AppError::Conflict(
            "Category with this name already exists".into(),
        ));
    }

    let is_active = payload.is_active.unwrap_or(category.is_active);
    let mut active: categories::ActiveModel = category.into();
    active.name = Set(name);
    active.slug = Set(slug);
    active.description = Set(sanitize(&payload.description));
    active.thumbnail = Set(payload.thumbnail);
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now().into());
    let category = active.update(&state.orm).await?;

    let count = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .filter(ProdCol::DeletedAt.is_null())
        .count(&state.orm)
        .await? as i64;
    Ok(CategoryResponse::from_entity(category, count))
}

pub async fn delete_category(state: &AppState, id: Uuid) -> AppResult<()> {
    let category = find_live_category(&state.orm, id).await?;

    let product_count = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .filter(ProdCol::DeletedAt.is_null())
        .count(&state.orm)
        .await?;
    if product_count > 0 {
        return Err(AppError::FailedPrecondition(format!(
            "Cannot delete category with {product_count} products"
        )));
    }

    let mut active: categories::ActiveModel = category.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.update(&state.orm).await?;
    Ok(())
}

// ------------------------------------------------------------------ products

async fn active_sizes_by_product(
    conn: &OrmConn,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<product_sizes::Model>>> {
    let sizes = ProductSizes::find()
        .filter(SizeCol::ProductId.is_in(product_ids.to_vec()))
        .filter(SizeCol::DeletedAt.is_null())
        .filter(SizeCol::IsActive.eq(true))
        .order_by_asc(SizeCol::CreatedAt)
        .all(conn)
        .await?;

    let mut map: HashMap<Uuid, Vec<product_sizes::Model>> = HashMap::new();
    for size in sizes {
        map.entry(size.product_id).or_default().push(size);
    }
    Ok(map)
}

async fn to_responses(
    conn: &OrmConn,
    products: Vec<products::Model>,
) -> AppResult<Vec<ProductResponse>> {
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut sizes = active_sizes_by_product(conn, &ids).await?;
    Ok(products
        .into_iter()
        .map(|p| {
            let product_sizes = sizes.remove(&p.id).unwrap_or_default();
            ProductResponse::from_entity(p, product_sizes)
        })
        .collect())
}

pub async fn list_products(
    state: &AppState,
    params: &ProductListParams,
    admin: bool,
) -> AppResult<(Vec<ProductResponse>, i64, i64, i64)> {
    let (page, limit, offset) = params.page.normalize(20);

    let mut condition = Condition::all().add(ProdCol::DeletedAt.is_null());
    if let Some(category_id) = params.category_id {
        condition = condition.add(ProdCol::CategoryId.eq(category_id));
    }
    if let Some(search) = params.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", sanitize(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Description).ilike(pattern)),
        );
    }
    if let Some(min_price) = params.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }
    if let Some(max_price) = params.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }
    if let Some(is_featured) = params.is_featured {
        condition = condition.add(ProdCol::IsFeatured.eq(is_featured));
    }
    let active_filter = if admin { params.is_active } else { Some(true) };
    if let Some(is_active) = active_filter {
        condition = condition.add(ProdCol::IsActive.eq(is_active));
    }
    if params.in_stock == Some(true) {
        condition = condition.add(ProdCol::TotalStock.gt(0));
    }

    let mut finder = Products::find().filter(condition);
    finder = match ProductSort::parse(params.sort.as_deref()) {
        ProductSort::PriceAsc => finder.order_by_asc(ProdCol::Price),
        ProductSort::PriceDesc => finder.order_by_desc(ProdCol::Price),
        ProductSort::NameAsc => finder.order_by_asc(ProdCol::Name),
        ProductSort::NameDesc => finder.order_by_desc(ProdCol::Name),
        ProductSort::Newest => finder.order_by_desc(ProdCol::CreatedAt),
        ProductSort::Oldest => finder.order_by_asc(ProdCol::CreatedAt),
        ProductSort::Rating => finder.order_by_desc(ProdCol::AverageRating),
        ProductSort::Popular => finder.order_by_desc(ProdCol::ViewCount),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let responses = to_responses(&state.orm, products).await?;
    Ok((responses, page, limit, total))
}

/// Bumps view_count off the request path; a failed bump is logged, never felt.
fn bump_view_count(state: &AppState, product_id: Uuid) {
    let orm = state.orm.clone();
    tokio::spawn(async move {
        let result = Products::update_many()
            .col_expr(
                ProdCol::ViewCount,
                Expr::col(ProdCol::ViewCount).add(1),
            )
            .filter(ProdCol::Id.eq(product_id))
            .exec(&orm)
            .await;
        if let Err(err) = result {
            tracing::warn!(product_id = %product_id, error = %err, "view count bump failed");
        }
    });
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ProductResponse> {
    let product = Products::find_by_id(id)
        .filter(ProdCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    bump_view_count(state, product.id);
    let mut responses = to_responses(&state.orm, vec![product]).await?;
    Ok(responses.remove(0))
}

pub async fn get_product_by_slug(state: &AppState, slug: &str) -> AppResult<ProductResponse> {
    let product = Products::find()
        .filter(ProdCol::DeletedAt.is_null())
        .filter(ProdCol::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    bump_view_count(state, product.id);
    let mut responses = to_responses(&state.orm, vec![product]).await?;
    Ok(responses.remove(0))
}

pub async fn featured_products(state: &AppState, limit: i64) -> AppResult<Vec<ProductResponse>> {
    let limit = if (1..=50).contains(&limit) { limit } else { 10 };
    let products = Products::find()
        .filter(ProdCol::DeletedAt.is_null())
        .filter(ProdCol::IsFeatured.eq(true))
        .filter(ProdCol::IsActive.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(limit as u64)
        .all(&state.orm)
        .await?;
    to_responses(&state.orm, products).await
}

/// Tokenized search: every whitespace-separated token must match the name or
/// the description; matching products rank by popularity, then rating.
pub async fn search_products(
    state: &AppState,
    query: &str,
    page: i64,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<ProductResponse>, i64, i64, i64)> {
    let query = sanitize(query);
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".into()));
    }

    let mut condition = Condition::all()
        .add(ProdCol::DeletedAt.is_null())
        .add(ProdCol::IsActive.eq(true));
    for token in query.to_lowercase().split_whitespace() {
        let pattern = format!("%{token}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Description).ilike(pattern)),
        );
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(ProdCol::ViewCount)
        .order_by_desc(ProdCol::AverageRating)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let responses = to_responses(&state.orm, products).await?;
    Ok((responses, page, limit, total))
}

fn validate_product_request(payload: &ProductRequest) -> AppResult<()> {
    if payload.name.trim().len() < 2 {
        return Err(AppError::Validation(
            "Product name must be at least 2 characters".into(),
        ));
    }
    if payload.price < Decimal::ZERO {
        return Err(AppError::Validation("Price must not be negative".into()));
    }
    if let Some(discount) = payload.discount_price {
        if discount >= payload.price {
            return Err(AppError::Validation(
                "Discount price must be less than original price".into(),
            ));
        }
    }
    if payload.sizes.is_empty() {
        return Err(AppError::Validation("At least one size is required".into()));
    }

    let mut seen = HashSet::new();
    for size in &payload.sizes {
        if size.size.trim().is_empty() {
            return Err(AppError::Validation("Size name is required".into()));
        }
        if size.stock < 0 {
            return Err(AppError::Validation("Size stock must not be negative".into()));
        }
        let key = size.size.trim().to_uppercase();
        if !seen.insert(key) {
            return Err(AppError::Validation(format!(
                "Duplicate size: {}",
                size.size
            )));
        }
    }
    Ok(())
}

async fn product_slug_taken(conn: &OrmConn, slug: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let mut finder = Products::find()
        .filter(ProdCol::DeletedAt.is_null())
        .filter(ProdCol::Slug.eq(slug));
    if let Some(id) = exclude {
        finder = finder.filter(ProdCol::Id.ne(id));
    }
    Ok(finder.one(conn).await?.is_some())
}

fn clean_images(images: &[String]) -> serde_json::Value {
    let cleaned: Vec<String> = images
        .iter()
        .map(|img| sanitize(img))
        .filter(|img| !img.is_empty())
        .collect();
    serde_json::json!(cleaned)
}

fn size_active_model(product_id: Uuid, req: &ProductSizeRequest) -> product_sizes::ActiveModel {
    product_sizes::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        size: Set(sanitize(&req.size)),
        stock: Set(req.stock),
        price: Set(req.price),
        is_active: Set(req.is_active.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
}

pub async fn create_product(state: &AppState, payload: ProductRequest) -> AppResult<ProductResponse> {
    validate_product_request(&payload)?;

    let category = find_live_category(&state.orm, payload.category_id).await?;
    if !category.is_active {
        return Err(AppError::Validation("Category not found or inactive".into()));
    }

    let name = sanitize(&payload.name);
    let slug = slugify(&name);
    if product_slug_taken(&state.orm, &slug, None).await? {
        return Err(AppError::Conflict(
            "Product with this name already exists".into(),
        ));
    }

    let total_stock: i32 = payload.sizes.iter().map(|s| s.stock).sum();

    let txn = state.orm.begin().await?;
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        category_id: Set(payload.category_id),
        name: Set(name),
        slug: Set(slug),
        price: Set(payload.price),
        discount_price: Set(payload.discount_price),
        description: Set(sanitize(&payload.description)),
        total_stock: Set(total_stock),
        thumbnail: Set(payload.thumbnail.clone()),
        images: Set(clean_images(&payload.images)),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        view_count: Set(0),
        average_rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for size in &payload.sizes {
        size_active_model(product.id, size).insert(&txn).await?;
    }
    txn.commit().await?;

    let mut responses = to_responses(&state.orm, vec![product]).await?;
    Ok(responses.remove(0))
}

/// Replaces the product row and its whole size set in one transaction;
/// total_stock is recomputed from the submitted sizes.
pub async fn update_product(
    state: &AppState,
    id: Uuid,
    payload: ProductRequest,
) -> AppResult<ProductResponse> {
    validate_product_request(&payload)?;

    let product = Products::find_by_id(id)
        .filter(ProdCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let category = find_live_category(&state.orm, payload.category_id).await?;
    if !category.is_active {
        return Err(AppError::Validation("Category not found or inactive".into()));
    }

    let name = sanitize(&payload.name);
    let slug = slugify(&name);
    if slug != product.slug && product_slug_taken(&state.orm, &slug, Some(id)).await? {
        return Err(AppError::Conflict(
            "Product with this name already exists".into(),
        ));
    }

    let total_stock: i32 = payload.sizes.iter().map(|s| s.stock).sum();
    let is_featured = payload.is_featured.unwrap_or(product.is_featured);
    let is_active = payload.is_active.unwrap_or(product.is_active);

    let txn = state.orm.begin().await?;

    let mut active: products::ActiveModel = product.into();
    active.category_id = Set(payload.category_id);
    active.name = Set(name);
    active.slug = Set(slug);
    active.price = Set(payload.price);
    active.discount_price = Set(payload.discount_price);
    active.description = Set(sanitize(&payload.description));
    active.total_stock = Set(total_stock);
    active.thumbnail = Set(payload.thumbnail.clone());
    active.images = Set(clean_images(&payload.images));
    active.is_featured = Set(is_featured);
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    // Old size rows are retired, not erased: order items keep pointing at them.
    ProductSizes::update_many()
        .col_expr(SizeCol::DeletedAt, Expr::value(Utc::now()))
        .filter(SizeCol::ProductId.eq(product.id))
        .filter(SizeCol::DeletedAt.is_null())
        .exec(&txn)
        .await?;

    for size in &payload.sizes {
        size_active_model(product.id, size).insert(&txn).await?;
    }
    txn.commit().await?;

    let mut responses = to_responses(&state.orm, vec![product]).await?;
    Ok(responses.remove(0))
}

pub async fn delete_product(state: &AppState, id: Uuid) -> AppResult<()> {
    let product = Products::find_by_id(id)
        .filter(ProdCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let review_count = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .filter(ReviewCol::DeletedAt.is_null())
        .count(&state.orm)
        .await?;
    if review_count > 0 {
        return Err(AppError::FailedPrecondition(format!(
            "Cannot delete product that has reviews ({review_count})"
        )));
    }

    let txn = state.orm.begin().await?;
    ProductSizes::update_many()
        .col_expr(SizeCol::DeletedAt, Expr::value(Utc::now()))
        .filter(SizeCol::ProductId.eq(product.id))
        .filter(SizeCol::DeletedAt.is_null())
        .exec(&txn)
        .await?;
    let mut active: products::ActiveModel = product.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.update(&txn).await?;
    txn.commit().await?;
    Ok(())
}
