use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{auth as auth_dto, cart as cart_dto, orders as orders_dto, products as products_dto,
        reviews as reviews_dto},
    models,
    response::{ApiResponse, Pagination},
    routes::{auth, cart, categories, health, orders, products, reviews, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::request_recovery,
        auth::verify_recovery,
        users::profile,
        users::get_user,
        users::list_users,
        categories::list_categories,
        categories::get_category,
        categories::get_category_by_slug,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::list_products_admin,
        products::featured_products,
        products::search_products,
        products::get_product,
        products::get_product_by_slug,
        products::create_product,
        products::update_product,
        products::delete_product,
        reviews::product_reviews,
        reviews::my_reviews,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::validate_cart,
        cart::cart_count,
        cart::merge_guest_cart,
        orders::payment_methods,
        orders::order_summary,
        orders::create_order,
        orders::get_order,
        orders::bank_transfer_info,
        orders::cancel_order,
        orders::payment_webhook,
        orders::confirm_cod,
    ),
    components(
        schemas(
            models::Role,
            models::OrderStatus,
            models::PaymentStatus,
            models::PaymentMethod,
            models::PaymentGateway,
            models::PaymentRecordStatus,
            auth_dto::RegisterRequest,
            auth_dto::LoginRequest,
            auth_dto::LoginResponse,
            auth_dto::UserResponse,
            auth_dto::RecoveryRequest,
            auth_dto::RecoveryVerifyRequest,
            auth_dto::RecoveryVerifyResponse,
            products_dto::CategoryRequest,
            products_dto::CategoryResponse,
            products_dto::ProductRequest,
            products_dto::ProductSizeRequest,
            products_dto::ProductResponse,
            products_dto::ProductSizeResponse,
            products_dto::ProductListResponse,
            reviews_dto::CreateReviewRequest,
            reviews_dto::UpdateReviewRequest,
            reviews_dto::ReviewResponse,
            reviews_dto::ReviewStats,
            reviews_dto::ProductReviewsResponse,
            reviews_dto::UserReviewsResponse,
            cart_dto::AddToCartRequest,
            cart_dto::UpdateCartItemRequest,
            cart_dto::CartItemResponse,
            cart_dto::CartResponse,
            cart_dto::CartValidationResult,
            cart_dto::CartCountResponse,
            orders_dto::ShippingAddress,
            orders_dto::CreateOrderRequest,
            orders_dto::CancelOrderRequest,
            orders_dto::PaymentWebhookRequest,
            orders_dto::OrderSummary,
            orders_dto::OrderItemResponse,
            orders_dto::OrderResponse,
            orders_dto::CreatedOrderResponse,
            orders_dto::BankTransferInfo,
            orders_dto::PaymentMethodInfo,
            Pagination,
            ApiResponse<auth_dto::UserResponse>,
            ApiResponse<auth_dto::LoginResponse>,
            ApiResponse<products_dto::ProductResponse>,
            ApiResponse<products_dto::ProductListResponse>,
            ApiResponse<cart_dto::CartResponse>,
            ApiResponse<orders_dto::OrderResponse>,
            ApiResponse<orders_dto::CreatedOrderResponse>,
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login, account recovery"),
        (name = "Users", description = "User profile endpoints"),
        (name = "Categories", description = "Category catalog"),
        (name = "Products", description = "Product catalog"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Cart", description = "Guest and user carts"),
        (name = "Orders", description = "Checkout, payment and cancellation"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
